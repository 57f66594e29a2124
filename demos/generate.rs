//! Generate a single image through the form controller.
//!
//! ```sh
//! cargo run --example generate -- "a beautiful sunset" http://localhost:8000
//! ```
//!
//! The API URL argument is optional and defaults to the production endpoint.

use lumina_client::{FormController, FormField, LuminaClient, ViewState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let prompt = args.next().unwrap_or_default();

    let api_url = args
        .next()
        .unwrap_or_else(|| lumina_client::DEFAULT_API_URL.to_string());
    let mut form = FormController::new(LuminaClient::new(api_url));

    // Check the service before submitting
    match form.generator().health().await {
        Ok(health) if !health.is_ready() => {
            eprintln!(
                "Service is {}: {}",
                health.status,
                health.message.unwrap_or_default()
            );
        }
        Ok(_) => println!("Service is ready"),
        Err(e) => eprintln!("Health check failed: {}", e),
    }

    form.update_field(FormField::Prompt, &prompt)?;
    form.randomize_seed();
    println!("{}", form.view());

    let succeeded = matches!(form.submit().await, ViewState::Result(_));
    if succeeded {
        if let Some(path) = form.download(".").await? {
            println!("Saved: {}", path.display());
        }
    }
    println!("{}", form.view());

    Ok(())
}
