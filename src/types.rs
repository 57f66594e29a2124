use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{LuminaError, Result};

/// Production endpoint the form points at until the user edits it.
pub const DEFAULT_API_URL: &str = "https://lumina-backend-cwms2mqttq-el.a.run.app";

/// File name offered by the download action.
pub const DOWNLOAD_FILENAME: &str = "lumina-generated-image.png";

/// Exclusive upper bound for randomized seeds.
pub const SEED_UPPER_BOUND: u64 = 1_000_000;

/// Largest seed accepted from text input: the largest integer a JSON
/// number carries exactly (2^53 - 1).
pub const MAX_SEED: u64 = (1 << 53) - 1;

/// Input bounds a host UI should apply to a numeric field.
///
/// These are hints for rendering controls. The controller does not clamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBounds {
    pub range: RangeInclusive<f64>,
    pub step: f64,
}

pub const HEIGHT_BOUNDS: FieldBounds = FieldBounds { range: 256.0..=2048.0, step: 64.0 };
pub const WIDTH_BOUNDS: FieldBounds = FieldBounds { range: 256.0..=2048.0, step: 64.0 };
pub const GUIDANCE_SCALE_BOUNDS: FieldBounds = FieldBounds { range: 1.0..=20.0, step: 0.5 };
pub const INFERENCE_STEPS_BOUNDS: FieldBounds = FieldBounds { range: 10.0..=100.0, step: 5.0 };

/// Body of `POST {api_url}/generate`.
///
/// `seed` is omitted from the JSON when unset so the service picks one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub height: u32,
    pub width: u32,
    #[serde(serialize_with = "serialize_js_number")]
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Whole numbers go out as JSON integers (`4`, not `4.0`), the way a browser
/// `JSON.stringify` writes them.
fn serialize_js_number<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() <= MAX_SEED as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            height: 1024,
            width: 1024,
            guidance_scale: 4.0,
            num_inference_steps: 30,
            seed: None,
        }
    }
}

impl GenerationRequest {
    /// Create a request with default parameters (1024x1024, guidance 4.0, 30 steps).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set output dimensions.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the classifier-free guidance scale.
    pub fn guidance_scale(mut self, scale: f64) -> Self {
        self.guidance_scale = scale;
        self
    }

    /// Set the number of denoising steps.
    pub fn steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    /// Pin the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// True when the prompt has non-whitespace content.
    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }
}

/// Editable inputs of the generation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Prompt,
    Height,
    Width,
    GuidanceScale,
    NumInferenceSteps,
    Seed,
    ApiUrl,
}

impl FormField {
    pub const ALL: [FormField; 7] = [
        FormField::Prompt,
        FormField::Height,
        FormField::Width,
        FormField::GuidanceScale,
        FormField::NumInferenceSteps,
        FormField::Seed,
        FormField::ApiUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Prompt => "prompt",
            FormField::Height => "height",
            FormField::Width => "width",
            FormField::GuidanceScale => "guidance_scale",
            FormField::NumInferenceSteps => "num_inference_steps",
            FormField::Seed => "seed",
            FormField::ApiUrl => "apiUrl",
        }
    }

    /// Input bounds for numeric fields, `None` for text fields and the seed.
    pub fn bounds(&self) -> Option<FieldBounds> {
        match self {
            FormField::Height => Some(HEIGHT_BOUNDS),
            FormField::Width => Some(WIDTH_BOUNDS),
            FormField::GuidanceScale => Some(GUIDANCE_SCALE_BOUNDS),
            FormField::NumInferenceSteps => Some(INFERENCE_STEPS_BOUNDS),
            _ => None,
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = LuminaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prompt" => Ok(FormField::Prompt),
            "height" => Ok(FormField::Height),
            "width" => Ok(FormField::Width),
            "guidance_scale" => Ok(FormField::GuidanceScale),
            "num_inference_steps" => Ok(FormField::NumInferenceSteps),
            "seed" => Ok(FormField::Seed),
            "apiUrl" | "api_url" => Ok(FormField::ApiUrl),
            other => Err(LuminaError::UnknownField(other.to_string())),
        }
    }
}

/// A parsed, storable field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(u32),
    Float(f64),
    Seed(Option<u64>),
}

impl FieldValue {
    /// Parse raw input text for `field`.
    ///
    /// Numeric text must be finite and non-negative. Integer fields round
    /// to the nearest whole number. Blank seed text clears the seed.
    pub fn parse(field: FormField, raw: &str) -> Result<Self> {
        let invalid = || LuminaError::InvalidField {
            field,
            value: raw.to_string(),
        };

        match field {
            FormField::Prompt | FormField::ApiUrl => Ok(FieldValue::Text(raw.to_string())),
            FormField::Seed if raw.trim().is_empty() => Ok(FieldValue::Seed(None)),
            _ => {
                let number = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .ok_or_else(invalid)?;
                match field {
                    FormField::GuidanceScale => Ok(FieldValue::Float(number)),
                    FormField::Seed if number.round() > MAX_SEED as f64 => Err(invalid()),
                    FormField::Seed => Ok(FieldValue::Seed(Some(number.round() as u64))),
                    _ if number.round() > u32::MAX as f64 => Err(invalid()),
                    _ => Ok(FieldValue::Integer(number.round() as u32)),
                }
            }
        }
    }
}

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Binary image returned by a successful generation, held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Session-unique handle id.
    pub id: u64,
    pub bytes: Bytes,
    /// `Content-Type` reported by the service, if any.
    pub content_type: Option<String>,
    /// Pixel dimensions `(width, height)` when the header is recognised.
    pub dimensions: Option<(usize, usize)>,
}

impl GeneratedImage {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        let bytes = bytes.into();
        let dimensions = imagesize::blob_size(&bytes)
            .ok()
            .map(|size| (size.width, size.height));
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            bytes,
            content_type,
            dimensions,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type used for the data URL. Falls back to `image/png`.
    pub fn mime_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or("image/png")
    }

    /// A self-contained `data:` URL that renders the image without the network.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }

    /// Write the image to `path`.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }

    /// Write the image into `dir` under `file_name`. Returns the full path.
    pub async fn save_in_dir(&self, dir: impl AsRef<Path>, file_name: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(file_name);
        self.save_to(&path).await?;
        Ok(path)
    }
}

/// Response of the service's `GET /health` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    /// Ready to accept `/generate` calls.
    pub fn is_ready(&self) -> bool {
        self.status == "healthy" && self.model_loaded
    }
}

/// Deterministic seed derived from text: the first 48 bits of its SHA-256.
pub fn stable_seed(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    digest[..6]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}
