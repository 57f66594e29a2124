use rand::Rng;
use tracing::{debug, info, warn};

use crate::client::ImageGenerator;
use crate::config::ClientConfig;
use crate::error::{LuminaError, Result};
use crate::form::{FormEvent, FormState, ViewState};
use crate::render::FormView;
use crate::types::{FieldValue, FormField, GeneratedImage, GenerationRequest, SEED_UPPER_BOUND};

/// A request captured at dispatch time.
///
/// Later edits to the form do not affect it.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub token: u64,
    pub api_url: String,
    pub request: GenerationRequest,
}

/// Owns the form state and mediates between inputs, the generator and the view.
///
/// Hosts with their own event loop can call [`begin_submit`](Self::begin_submit),
/// run the request themselves, and hand the result to [`settle`](Self::settle).
/// [`submit`](Self::submit) does all three in one call.
///
/// # Example
/// ```no_run
/// use lumina_client::{FormController, FormField, LuminaClient};
///
/// # async fn example() -> lumina_client::Result<()> {
/// // Submissions go to http://localhost:8000/generate until the API URL is edited.
/// let mut form = FormController::new(LuminaClient::new("http://localhost:8000"));
/// form.update_field(FormField::Prompt, "a lighthouse at dusk")?;
/// form.randomize_seed();
/// form.submit().await;
/// println!("{}", form.view());
/// # Ok(())
/// # }
/// ```
pub struct FormController<G> {
    generator: G,
    state: FormState,
    download_filename: String,
    next_token: u64,
}

impl<G: ImageGenerator> FormController<G> {
    /// Create a controller whose API URL starts at the generator's endpoint.
    pub fn new(generator: G) -> Self {
        let config = ClientConfig::builder()
            .with_api_url(generator.default_api_url())
            .build();
        Self::with_config(generator, &config)
    }

    /// Create a controller starting at `config.api_url`.
    pub fn with_config(generator: G, config: &ClientConfig) -> Self {
        Self {
            generator,
            state: FormState::new(config.api_url.clone()),
            download_filename: config.download_filename.clone(),
            next_token: 1,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// View model for the current snapshot.
    pub fn view(&self) -> FormView {
        FormView::from_state(&self.state, &self.download_filename)
    }

    /// The submit action is disabled while a request is outstanding.
    pub fn can_submit(&self) -> bool {
        !self.state.is_loading()
    }

    fn dispatch(&mut self, event: FormEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(event);
    }

    // ── Editing ─────────────────────────────────────────────────────

    /// Store raw input text for `field`.
    ///
    /// Numeric text that does not parse is rejected and the draft is left
    /// unchanged. No network activity.
    pub fn update_field(&mut self, field: FormField, raw: &str) -> Result<()> {
        let value = FieldValue::parse(field, raw)?;
        let event = match (field, value) {
            (FormField::ApiUrl, FieldValue::Text(url)) => FormEvent::ApiUrlEdited(url),
            (field, value) => FormEvent::FieldEdited { field, value },
        };
        self.dispatch(event);
        Ok(())
    }

    /// Same as [`update_field`](Self::update_field), addressing the field by its form name.
    pub fn update_field_by_name(&mut self, name: &str, raw: &str) -> Result<()> {
        let field: FormField = name.parse()?;
        self.update_field(field, raw)
    }

    /// Replace the API base URL. Only the next submission is affected.
    pub fn set_api_url(&mut self, url: impl Into<String>) {
        self.dispatch(FormEvent::ApiUrlEdited(url.into()));
    }

    /// Pick a seed uniformly from `1..1_000_000` and store it in the draft.
    pub fn randomize_seed(&mut self) -> u64 {
        let seed = rand::rng().random_range(1..SEED_UPPER_BOUND);
        self.dispatch(FormEvent::SeedRandomized(seed));
        seed
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Validate the draft and, if valid, move to `Loading` and capture the request.
    ///
    /// An empty or whitespace-only prompt returns [`LuminaError::EmptyPrompt`]
    /// without issuing a token. The error view is shown unless a request is
    /// still outstanding.
    pub fn begin_submit(&mut self) -> Result<Submission> {
        if !self.state.draft.has_prompt() {
            debug!("submit refused: empty prompt");
            // An outstanding request keeps the form in Loading until it settles.
            if !self.state.is_loading() {
                self.dispatch(FormEvent::ValidationFailed(
                    LuminaError::EmptyPrompt.user_message(),
                ));
            }
            return Err(LuminaError::EmptyPrompt);
        }

        let token = self.next_token;
        self.next_token += 1;
        let submission = Submission {
            token,
            api_url: self.state.api_url.clone(),
            request: self.state.draft.clone(),
        };
        self.dispatch(FormEvent::SubmitStarted { token });
        info!(token, api_url = %submission.api_url, "generation submitted");
        Ok(submission)
    }

    /// Apply the outcome of the request tagged `token`.
    ///
    /// Returns `false` when a newer submission has superseded it and the
    /// outcome was discarded.
    pub fn settle(&mut self, token: u64, outcome: Result<GeneratedImage>) -> bool {
        if !self.state.is_current(token) {
            warn!(token, latest = ?self.state.latest_token, "dropping stale generation result");
            return false;
        }

        let event = match outcome {
            Ok(image) => {
                info!(token, id = image.id, bytes = image.len(), "generation succeeded");
                FormEvent::SubmitSucceeded { token, image }
            }
            Err(err) => {
                let message = err.user_message();
                warn!(token, error = %message, "generation failed");
                FormEvent::SubmitFailed { token, message }
            }
        };
        self.dispatch(event);
        true
    }

    /// Validate, send exactly one request, and settle.
    ///
    /// Unless a request started through [`begin_submit`](Self::begin_submit)
    /// is still outstanding, the view afterwards is `Error` or `Result`.
    pub async fn submit(&mut self) -> &ViewState {
        if let Ok(submission) = self.begin_submit() {
            let outcome = self
                .generator
                .generate(&submission.api_url, &submission.request)
                .await;
            self.settle(submission.token, outcome);
        }
        &self.state.view
    }

    /// Save the current result under the configured download file name in `dir`.
    ///
    /// Returns `None` when there is no result to save.
    pub async fn download(&self, dir: impl AsRef<std::path::Path>) -> Result<Option<std::path::PathBuf>> {
        match self.state.view.image() {
            Some(image) => Ok(Some(image.save_in_dir(dir, &self.download_filename).await?)),
            None => Ok(None),
        }
    }
}
