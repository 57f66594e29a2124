//! Reproducible batch generation from a CSV of prompts.
//!
//! Each row yields [`BatchOptions::images_per_prompt`] images. Image `i` of a
//! row is seeded from the row's id and prompt text, so reruns reproduce the
//! same files (`{prompt_id}_{i+1}.png`). Throttling and gateway errors are
//! retried with exponential backoff.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio_retry::RetryIf;
use tracing::{info, warn};

use crate::client::ImageGenerator;
use crate::error::{LuminaError, Result};
use crate::types::{stable_seed, GeneratedImage, GenerationRequest};

/// Batch seeds are reduced modulo 2^31 - 1.
pub const BATCH_SEED_MODULUS: u64 = (1 << 31) - 1;

/// Statuses retried by the default [`RetryPolicy`].
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const REQUIRED_COLUMNS: [&str; 2] = ["prompt_id", "prompt"];

/// Seed for image `index` of the row `(prompt_id, prompt)`.
pub fn batch_seed(prompt_id: &str, prompt: &str, index: usize) -> u64 {
    (stable_seed(&format!("{}|{}", prompt_id, prompt)) + index as u64) % BATCH_SEED_MODULUS
}

/// One row of the prompt file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchPrompt {
    pub prompt_id: String,
    pub prompt: String,
}

impl BatchPrompt {
    pub fn new(prompt_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            prompt: prompt.into(),
        }
    }

    pub fn seed(&self, index: usize) -> u64 {
        batch_seed(&self.prompt_id, &self.prompt, index)
    }

    /// Output file name for image `index` (zero-based).
    pub fn file_name(&self, index: usize) -> String {
        format!("{}_{}.png", self.prompt_id, index + 1)
    }

    fn is_blank(&self) -> bool {
        self.prompt_id.trim().is_empty() || self.prompt.trim().is_empty()
    }
}

/// Parse a CSV with `prompt_id` and `prompt` columns. Other columns are ignored,
/// values are trimmed and rows with an empty id or prompt are skipped.
pub fn parse_prompts_csv<R: Read>(reader: R) -> Result<Vec<BatchPrompt>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?;
    let has_columns = REQUIRED_COLUMNS
        .iter()
        .all(|column| headers.iter().any(|h| h == *column));
    if !has_columns {
        return Err(LuminaError::InvalidBatch(format!(
            "CSV must contain columns: {}",
            REQUIRED_COLUMNS.join(",")
        )));
    }

    let mut prompts = Vec::new();
    for row in reader.deserialize::<BatchPrompt>() {
        let row = row?;
        if !row.is_blank() {
            prompts.push(row);
        }
    }
    Ok(prompts)
}

/// Read and parse a prompt CSV from disk.
pub async fn read_prompts_csv(path: impl AsRef<Path>) -> Result<Vec<BatchPrompt>> {
    let bytes = tokio::fs::read(path).await?;
    parse_prompts_csv(&bytes[..])
}

/// When and how often a failed batch request is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retries).
    pub max_retries: usize,

    /// Delay before the first retry. Doubles on each further retry.
    pub backoff: Duration,

    /// HTTP statuses worth retrying.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(500),
            retry_statuses: RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sleep before each retry, in order.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map(|n| self.backoff * 2u32.saturating_pow(n as u32))
            .collect()
    }

    /// Listed statuses and connection/timeout failures are retried.
    pub fn should_retry(&self, err: &LuminaError) -> bool {
        match err {
            LuminaError::Http { status } => self.retry_statuses.contains(status),
            LuminaError::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Generation parameters shared by every row of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub height: u32,
    pub width: u32,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub images_per_prompt: usize,
    /// Stop after this many non-blank rows.
    pub limit: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        let defaults = GenerationRequest::default();
        Self {
            height: defaults.height,
            width: defaults.width,
            guidance_scale: defaults.guidance_scale,
            num_inference_steps: defaults.num_inference_steps,
            images_per_prompt: 2,
            limit: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_guidance_scale(mut self, scale: f64) -> Self {
        self.guidance_scale = scale;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    pub fn with_images_per_prompt(mut self, count: usize) -> Self {
        self.images_per_prompt = count;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// An image that could not be generated.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub prompt_id: String,
    pub index: usize,
    pub message: String,
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Rows processed (blank rows excluded).
    pub processed: usize,
    pub saved: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

/// Runs prompt rows through an [`ImageGenerator`] and saves the results.
pub struct BatchRunner<G> {
    generator: G,
    api_url: String,
    options: BatchOptions,
}

impl<G: ImageGenerator> BatchRunner<G> {
    pub fn new(generator: G, options: BatchOptions) -> Self {
        Self {
            api_url: generator.default_api_url().to_string(),
            generator,
            options,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Request for image `index` of `prompt`.
    pub fn request_for(&self, prompt: &BatchPrompt, index: usize) -> GenerationRequest {
        GenerationRequest::new(prompt.prompt.clone())
            .size(self.options.width, self.options.height)
            .guidance_scale(self.options.guidance_scale)
            .steps(self.options.num_inference_steps)
            .seed(prompt.seed(index))
    }

    async fn generate_with_retry(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let retry = &self.options.retry;
        RetryIf::spawn(
            retry.delays(),
            || self.generator.generate(&self.api_url, request),
            |err: &LuminaError| {
                let retryable = retry.should_retry(err);
                if retryable {
                    warn!(error = %err, "retryable generation failure");
                }
                retryable
            },
        )
        .await
    }

    /// Generate every row into `out_dir`.
    ///
    /// Generation failures are collected in the report. Failing to write
    /// an image aborts the batch.
    pub async fn run(&self, prompts: &[BatchPrompt], out_dir: impl AsRef<Path>) -> Result<BatchReport> {
        let out_dir = out_dir.as_ref();
        tokio::fs::create_dir_all(out_dir).await?;

        let mut report = BatchReport::default();
        for prompt in prompts {
            if self.options.limit.is_some_and(|limit| report.processed >= limit) {
                break;
            }
            if prompt.is_blank() {
                continue;
            }

            for index in 0..self.options.images_per_prompt {
                let request = self.request_for(prompt, index);
                match self.generate_with_retry(&request).await {
                    Ok(image) => {
                        let path = image.save_in_dir(out_dir, &prompt.file_name(index)).await?;
                        info!(prompt_id = %prompt.prompt_id, index, path = %path.display(), "saved");
                        report.saved.push(path);
                    }
                    Err(err) => {
                        let message = err.user_message();
                        warn!(prompt_id = %prompt.prompt_id, index, error = %message, "request failed");
                        report.failures.push(BatchFailure {
                            prompt_id: prompt.prompt_id.clone(),
                            index,
                            message,
                        });
                    }
                }
            }
            report.processed += 1;
        }

        info!(
            processed = report.processed,
            saved = report.saved.len(),
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyGenerator {
        calls: AtomicUsize,
        fail_first: usize,
        status: u16,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl FlakyGenerator {
        fn failing(fail_first: usize, status: u16) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                status,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ImageGenerator for FlakyGenerator {
        async fn generate(
            &self,
            _api_url: &str,
            request: &GenerationRequest,
        ) -> Result<GeneratedImage> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if n < self.fail_first {
                Err(LuminaError::Http { status: self.status })
            } else {
                Ok(GeneratedImage::new(b"png".to_vec(), Some("image/png".into())))
            }
        }
    }

    fn fast_retry(retries: usize) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(retries)
            .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_batch_seed() {
        let base = stable_seed("p1|a cat");
        assert_eq!(batch_seed("p1", "a cat", 0), base % BATCH_SEED_MODULUS);
        assert_eq!(batch_seed("p1", "a cat", 1), (base + 1) % BATCH_SEED_MODULUS);
        assert_ne!(batch_seed("p1", "a cat", 0), batch_seed("p2", "a cat", 0));
        for i in 0..10 {
            assert!(batch_seed("id", "prompt", i) < BATCH_SEED_MODULUS);
        }
    }

    #[test]
    fn test_file_names() {
        let row = BatchPrompt::new("p7", "a cat");
        assert_eq!(row.file_name(0), "p7_1.png");
        assert_eq!(row.file_name(1), "p7_2.png");
        assert_eq!(row.seed(1), batch_seed("p7", "a cat", 1));
    }

    #[test]
    fn test_parse_csv() {
        let csv = "prompt_id,prompt,notes\n\
                   p1, a red fox ,x\n\
                   p2,,empty prompt\n\
                   p3,\"a cat, sleeping\",y\n";
        let prompts = parse_prompts_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            prompts,
            vec![
                BatchPrompt::new("p1", "a red fox"),
                BatchPrompt::new("p3", "a cat, sleeping"),
            ]
        );
    }

    #[test]
    fn test_parse_csv_missing_columns() {
        let err = parse_prompts_csv("id,prompt\n1,a cat\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LuminaError::InvalidBatch(_)));
        assert_eq!(err.to_string(), "CSV must contain columns: prompt_id,prompt");
    }

    #[tokio::test]
    async fn test_read_prompts_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.csv");
        std::fs::write(&path, "prompt,prompt_id\na boat,b1\n").unwrap();
        let prompts = read_prompts_csv(&path).await.unwrap();
        assert_eq!(prompts, vec![BatchPrompt::new("b1", "a boat")]);
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delays(),
            [500, 1000, 2000, 4000, 8000].map(Duration::from_millis).to_vec()
        );
        assert!(policy.should_retry(&LuminaError::Http { status: 503 }));
        assert!(policy.should_retry(&LuminaError::Http { status: 429 }));
        assert!(!policy.should_retry(&LuminaError::Http { status: 400 }));
        assert!(!policy.should_retry(&LuminaError::EmptyPrompt));
        assert!(RetryPolicy::none().delays().is_empty());
    }

    #[tokio::test]
    async fn test_run_retries_then_succeeds() {
        let options = BatchOptions::default().with_retry(fast_retry(3));
        let runner = BatchRunner::new(FlakyGenerator::failing(2, 503), options);
        let dir = tempfile::tempdir().unwrap();

        let report = runner
            .run(&[BatchPrompt::new("p1", "a cat")], dir.path())
            .await
            .unwrap();

        assert_eq!(runner.generator().calls(), 4);
        assert_eq!(report.processed, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.saved, vec![dir.path().join("p1_1.png"), dir.path().join("p1_2.png")]);
        assert_eq!(std::fs::read(dir.path().join("p1_2.png")).unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_run_gives_up_after_retries() {
        let options = BatchOptions::default().with_retry(fast_retry(2));
        let runner = BatchRunner::new(FlakyGenerator::failing(usize::MAX, 500), options);
        let dir = tempfile::tempdir().unwrap();

        let report = runner
            .run(&[BatchPrompt::new("p1", "a cat")], dir.path())
            .await
            .unwrap();

        assert_eq!(runner.generator().calls(), 6);
        assert!(report.saved.is_empty());
        assert_eq!(
            report.failures,
            vec![
                BatchFailure { prompt_id: "p1".into(), index: 0, message: "HTTP error! status: 500".into() },
                BatchFailure { prompt_id: "p1".into(), index: 1, message: "HTTP error! status: 500".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let options = BatchOptions::default().with_retry(fast_retry(5));
        let runner = BatchRunner::new(FlakyGenerator::failing(usize::MAX, 400), options);
        let dir = tempfile::tempdir().unwrap();

        let report = runner
            .run(&[BatchPrompt::new("p1", "a cat")], dir.path())
            .await
            .unwrap();
        assert_eq!(runner.generator().calls(), 2);
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_and_request_parameters() {
        let options = BatchOptions::default()
            .with_size(512, 768)
            .with_steps(20)
            .with_guidance_scale(6.5)
            .with_limit(2)
            .with_retry(RetryPolicy::none());
        let runner = BatchRunner::new(FlakyGenerator::failing(0, 500), options);
        let dir = tempfile::tempdir().unwrap();
        let prompts = [
            BatchPrompt::new("a", "first"),
            BatchPrompt::new("", "no id"),
            BatchPrompt::new("b", "second"),
            BatchPrompt::new("c", "third"),
        ];

        let report = runner.run(&prompts, dir.path()).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.saved.len(), 4);
        assert!(!dir.path().join("c_1.png").exists());

        let requests = runner.generator().requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2], runner.request_for(&prompts[2], 0));
        assert_eq!(requests[0].width, 512);
        assert_eq!(requests[0].height, 768);
        assert_eq!(requests[0].num_inference_steps, 20);
        assert_eq!(requests[0].guidance_scale, 6.5);
        assert_eq!(requests[1].seed, Some(batch_seed("a", "first", 1)));
    }
}
