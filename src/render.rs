use std::fmt;

use crate::form::{FormState, ViewState};
use crate::types::FormField;

pub const SUBMIT_LABEL: &str = "✨ Generate Image";
pub const SUBMIT_LABEL_LOADING: &str = "🔄 Generating...";
pub const PLACEHOLDER_TEXT: &str = "Your generated image will appear here";
pub const LOADING_TEXT: &str = "Generating your image...";

/// Content of the image area.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePanel {
    Placeholder,
    Loading,
    Image {
        data_url: String,
        download_name: String,
        dimensions: Option<(usize, usize)>,
        byte_len: usize,
    },
}

/// Everything a host needs to draw the form for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub api_url: String,
    pub fields: Vec<(FormField, String)>,
    pub submit_label: &'static str,
    pub submit_enabled: bool,
    pub error_banner: Option<String>,
    pub panel: ImagePanel,
}

impl FormView {
    pub fn from_state(state: &FormState, download_name: &str) -> Self {
        let draft = &state.draft;
        let fields = vec![
            (FormField::Prompt, draft.prompt.clone()),
            (FormField::Height, draft.height.to_string()),
            (FormField::Width, draft.width.to_string()),
            (FormField::GuidanceScale, draft.guidance_scale.to_string()),
            (FormField::NumInferenceSteps, draft.num_inference_steps.to_string()),
            (
                FormField::Seed,
                draft.seed.map(|s| s.to_string()).unwrap_or_default(),
            ),
        ];

        let loading = state.is_loading();
        let panel = match &state.view {
            ViewState::Loading => ImagePanel::Loading,
            ViewState::Result(image) => ImagePanel::Image {
                data_url: image.data_url(),
                download_name: download_name.to_string(),
                dimensions: image.dimensions,
                byte_len: image.len(),
            },
            ViewState::Idle | ViewState::Error(_) => ImagePanel::Placeholder,
        };

        Self {
            api_url: state.api_url.clone(),
            fields,
            submit_label: if loading { SUBMIT_LABEL_LOADING } else { SUBMIT_LABEL },
            submit_enabled: !loading,
            error_banner: state.view.error().map(String::from),
            panel,
        }
    }
}

impl fmt::Display for FormView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API URL: {}", self.api_url)?;
        for (field, value) in &self.fields {
            writeln!(f, "{}: {}", field, value)?;
        }
        let disabled = if self.submit_enabled { "" } else { " (disabled)" };
        writeln!(f, "[{}]{}", self.submit_label, disabled)?;
        if let Some(error) = &self.error_banner {
            writeln!(f, "❌ {}", error)?;
        }
        match &self.panel {
            ImagePanel::Placeholder => writeln!(f, "🎨 {}", PLACEHOLDER_TEXT),
            ImagePanel::Loading => writeln!(f, "{}", LOADING_TEXT),
            ImagePanel::Image {
                download_name,
                dimensions,
                byte_len,
                ..
            } => {
                write!(f, "Generated Image: {} bytes", byte_len)?;
                if let Some((w, h)) = dimensions {
                    write!(f, " ({}x{})", w, h)?;
                }
                writeln!(f, " [💾 Download Image as {}]", download_name)
            }
        }
    }
}
