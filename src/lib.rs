//! # lumina-client
//!
//! Async Rust client and form controller for the Lumina text-to-image API.
//!
//! The service takes a JSON [`GenerationRequest`] at `POST {api_url}/generate`
//! and answers with the image bytes. This crate provides:
//!
//! - **[`LuminaClient`]** for the HTTP calls (`/generate`, `/health`)
//! - **[`FormController`]** holding the form draft, validating the prompt,
//!   dispatching one request and settling it into a view state
//! - **[`FormState::apply`]**, a pure transition function over an explicit
//!   `Idle | Loading | Error | Result` state, with stale responses dropped
//! - **[`FormView`]**, a render model any UI layer can draw
//! - **[`BatchRunner`]**, reproducible CSV batches with retry and backoff
//!
//! ## Quick Start
//!
//! ```no_run
//! use lumina_client::{FormController, FormField, LuminaClient, ViewState};
//!
//! # async fn example() -> lumina_client::Result<()> {
//! // The form targets the client's endpoint until the API URL field is edited.
//! let mut form = FormController::new(LuminaClient::new("http://localhost:8000"));
//! form.update_field(FormField::Prompt, "a sunset over mountains")?;
//! form.update_field(FormField::GuidanceScale, "5.5")?;
//!
//! match form.submit().await {
//!     ViewState::Result(image) => image.save_to("sunset.png").await?,
//!     ViewState::Error(message) => eprintln!("{}", message),
//!     _ => unreachable!("submit always settles"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod render;
pub mod types;

pub use batch::{
    batch_seed, parse_prompts_csv, read_prompts_csv, BatchFailure, BatchOptions, BatchPrompt,
    BatchReport, BatchRunner, RetryPolicy, BATCH_SEED_MODULUS,
};
pub use client::{ImageGenerator, LuminaClient};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{FormController, Submission};
pub use error::{LuminaError, Result};
pub use form::{FormEvent, FormState, ViewState};
pub use render::{FormView, ImagePanel};
pub use types::{
    stable_seed, FieldBounds, FieldValue, FormField, GeneratedImage, GenerationRequest,
    HealthStatus, DEFAULT_API_URL, DOWNLOAD_FILENAME, MAX_SEED, SEED_UPPER_BOUND,
};
