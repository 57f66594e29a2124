//! Form state and its transition function.
//!
//! [`FormState`] is a plain value. Every change goes through
//! [`FormState::apply`], which consumes the current snapshot and an event
//! and returns the next snapshot.

use crate::types::{FieldValue, FormField, GeneratedImage, GenerationRequest, DEFAULT_API_URL};

/// What the result area of the form is showing.
///
/// `Loading` replaces any previous error or image, so a snapshot can never
/// hold an error and an image at the same time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Error(String),
    Result(GeneratedImage),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&GeneratedImage> {
        match self {
            ViewState::Result(image) => Some(image),
            _ => None,
        }
    }
}

/// Events that move the form from one snapshot to the next.
#[derive(Debug, Clone)]
pub enum FormEvent {
    /// A draft field (anything but the API URL) was edited.
    FieldEdited { field: FormField, value: FieldValue },
    /// The API URL text changed.
    ApiUrlEdited(String),
    /// The seed was randomized.
    SeedRandomized(u64),
    /// Submission was refused before any request was sent.
    ValidationFailed(String),
    /// A request tagged `token` was dispatched.
    SubmitStarted { token: u64 },
    /// The request tagged `token` returned an image.
    SubmitSucceeded { token: u64, image: GeneratedImage },
    /// The request tagged `token` failed.
    SubmitFailed { token: u64, message: String },
}

/// Complete state of the generation form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub draft: GenerationRequest,
    pub api_url: String,
    pub view: ViewState,
    /// Token of the most recently dispatched request. Settle events carrying
    /// any other token are dropped.
    pub latest_token: Option<u64>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl FormState {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            draft: GenerationRequest::default(),
            api_url: api_url.into(),
            view: ViewState::Idle,
            latest_token: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.view.is_loading()
    }

    /// Whether a settle event for `token` would be applied.
    pub fn is_current(&self, token: u64) -> bool {
        self.latest_token == Some(token)
    }

    /// Compute the next snapshot.
    pub fn apply(mut self, event: FormEvent) -> FormState {
        match event {
            FormEvent::FieldEdited { field, value } => {
                self.set_field(field, value);
            }
            FormEvent::ApiUrlEdited(url) => {
                self.api_url = url;
            }
            FormEvent::SeedRandomized(seed) => {
                self.draft.seed = Some(seed);
            }
            FormEvent::ValidationFailed(message) => {
                self.view = ViewState::Error(message);
            }
            FormEvent::SubmitStarted { token } => {
                self.latest_token = Some(token);
                self.view = ViewState::Loading;
            }
            FormEvent::SubmitSucceeded { token, image } if self.is_current(token) => {
                self.view = ViewState::Result(image);
            }
            FormEvent::SubmitFailed { token, message } if self.is_current(token) => {
                self.view = ViewState::Error(message);
            }
            // Stale settle
            FormEvent::SubmitSucceeded { .. } | FormEvent::SubmitFailed { .. } => {}
        }
        self
    }

    fn set_field(&mut self, field: FormField, value: FieldValue) {
        let draft = &mut self.draft;
        match (field, value) {
            (FormField::Prompt, FieldValue::Text(text)) => draft.prompt = text,
            (FormField::ApiUrl, FieldValue::Text(text)) => self.api_url = text,
            (FormField::Height, FieldValue::Integer(n)) => draft.height = n,
            (FormField::Width, FieldValue::Integer(n)) => draft.width = n,
            (FormField::NumInferenceSteps, FieldValue::Integer(n)) => draft.num_inference_steps = n,
            (FormField::GuidanceScale, FieldValue::Float(x)) => draft.guidance_scale = x,
            (FormField::GuidanceScale, FieldValue::Integer(n)) => draft.guidance_scale = f64::from(n),
            (FormField::Seed, FieldValue::Seed(seed)) => draft.seed = seed,
            (field, value) => {
                tracing::debug!(%field, ?value, "ignoring mismatched field value");
            }
        }
    }
}
