//! Vision collaborator client.
//!
//! Each photo is sent to a Gemini model as an inline image with a prompt
//! asking for subject, mood, visual energy and an emotion vector. Calls are
//! serialized with a fixed delay because the API enforces per-request quotas.
//! Any failure degrades to neutral attributes; planning never stops here.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as base64_engine;
use base64::Engine;
use reel_models::{ImageAttributes, VisionReply};
use reqwest::Client;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Prompt asking for the reply described by [`VisionReply`].
fn vision_prompt() -> String {
    let schema = serde_json::to_string_pretty(&schema_for!(VisionReply)).unwrap_or_default();
    format!(
        r#"Describe this photo for a video editor planning a cinematic reel.

Return ONLY a single JSON object matching this JSON schema:
{schema}

- subject is the main subject in one or two words.
- mood holds one to three mood tags.
- visual_energy is 1 (still, empty) to 10 (busy, dynamic).
- Every emotion_vector value is between 0 and 1.
"#
    )
}

/// One image handed to the vision collaborator.
#[derive(Debug, Clone)]
pub struct VisionImage {
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Upright dimensions recorded in the resulting attributes
    pub width: u32,
    pub height: u32,
}

/// Something that can describe a photo.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Raw reply text for one image; parsed leniently by the caller.
    async fn describe(&self, image: &VisionImage) -> WorkerResult<String>;
}

/// Describe images one at a time, pausing `delay` between calls.
///
/// The result is in input order and has one entry per image. Failed calls
/// and unusable replies yield neutral attributes.
pub async fn analyze_sequentially(
    analyzer: &dyn VisionAnalyzer,
    images: &[VisionImage],
    delay: Duration,
) -> Vec<ImageAttributes> {
    let mut attributes = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let parsed = match analyzer.describe(image).await {
            Ok(raw) => ImageAttributes::from_vision_reply(&image.id, &raw, image.width, image.height),
            Err(e) => {
                warn!(image_id = %image.id, error = %e, "Vision call failed, using neutral attributes");
                ImageAttributes::neutral(&image.id, image.width, image.height)
            }
        };
        attributes.push(parsed);
    }
    attributes
}

/// MIME type for an image path, by extension.
pub fn mime_for_path(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" | "heif" => "image/heic",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Gemini API client for photo attributes.
pub struct GeminiVisionClient {
    api_key: String,
    client: Client,
    models: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiVisionClient {
    pub fn new(api_key: impl Into<String>, models: Vec<String>, timeout: Duration) -> WorkerResult<Self> {
        if models.is_empty() {
            return Err(WorkerError::config_error("no vision models configured"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            client,
            models,
        })
    }

    /// Client using `GEMINI_API_KEY` and the configured models.
    pub fn from_env(config: &WorkerConfig) -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        Self::new(api_key, config.vision_models.clone(), config.vision_timeout)
    }

    async fn call_gemini_api(&self, model: &str, image: &VisionImage) -> WorkerResult<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&build_request(image))
            .send()
            .await
            .map_err(|e| WorkerError::vision_failed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::vision_failed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            WorkerError::vision_failed(format!("Failed to parse Gemini response: {}", e))
        })?;

        reply_text(gemini_response)
    }
}

#[async_trait]
impl VisionAnalyzer for GeminiVisionClient {
    async fn describe(&self, image: &VisionImage) -> WorkerResult<String> {
        let mut last_error = None;
        for model in &self.models {
            debug!(image_id = %image.id, model = %model, "Requesting vision attributes");
            match self.call_gemini_api(model, image).await {
                Ok(text) => {
                    info!(image_id = %image.id, model = %model, "Vision attributes received");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(image_id = %image.id, model = %model, error = %e, "Vision model failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| WorkerError::vision_failed("All Gemini models failed")))
    }
}

fn build_request(image: &VisionImage) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part {
                    text: Some(vision_prompt()),
                    inline_data: None,
                },
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type.clone(),
                        data: base64_engine.encode(&image.bytes),
                    }),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
        },
    }
}

fn reply_text(response: GeminiResponse) -> WorkerResult<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| WorkerError::vision_failed("No content in Gemini response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedAnalyzer {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VisionAnalyzer for ScriptedAnalyzer {
        async fn describe(&self, image: &VisionImage) -> WorkerResult<String> {
            self.calls.lock().unwrap().push(image.id.clone());
            match image.id.as_str() {
                "beach" => Ok(r#"```json
{"subject": "Sea", "mood": ["Calm", "open"], "visual_energy": 3,
 "emotion_vector": {"calm": 0.9, "tension": 0.1, "mystery": 0.2, "intimacy": 0.3, "awe": 0.6}}
```"#
                    .to_string()),
                "garbled" => Ok("the photo shows a dog".to_string()),
                _ => Err(WorkerError::vision_failed("quota exceeded")),
            }
        }
    }

    fn image(id: &str) -> VisionImage {
        VisionImage {
            id: id.to_string(),
            bytes: vec![0xff, 0xd8, 0xff],
            mime_type: "image/jpeg".to_string(),
            width: 1200,
            height: 800,
        }
    }

    #[test]
    fn test_sequential_analysis_degrades_to_neutral() {
        let analyzer = ScriptedAnalyzer {
            calls: Mutex::new(Vec::new()),
        };
        let images = vec![image("beach"), image("garbled"), image("offline")];

        let attributes =
            tokio_test::block_on(analyze_sequentially(&analyzer, &images, Duration::ZERO));

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].subject, "Sea");
        assert_eq!(attributes[0].mood, vec!["calm", "open"]);
        assert_eq!(attributes[0].visual_energy, 3.0);
        assert_eq!(attributes[1], ImageAttributes::neutral("garbled", 1200, 800));
        assert_eq!(attributes[2], ImageAttributes::neutral("offline", 1200, 800));
        assert_eq!(
            *analyzer.calls.lock().unwrap(),
            vec!["beach", "garbled", "offline"]
        );
    }

    #[tokio::test]
    async fn test_delay_between_calls() {
        let analyzer = ScriptedAnalyzer {
            calls: Mutex::new(Vec::new()),
        };
        let images = vec![image("a"), image("b"), image("c")];
        let started = std::time::Instant::now();

        analyze_sequentially(&analyzer, &images, Duration::from_millis(20)).await;

        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_request_carries_inline_image() {
        let value = serde_json::to_value(build_request(&image("a"))).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("emotion_vector"));
        assert!(parts[0].get("inlineData").is_none());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9j/");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_reply_text_requires_content() {
        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(reply_text(empty), Err(WorkerError::VisionFailed(_))));

        let full: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"subject\": \"cat\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(full).unwrap(), r#"{"subject": "cat"}"#);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path("/photos/IMG_001.JPG"), "image/jpeg");
        assert_eq!(mime_for_path("shot.png"), "image/png");
        assert_eq!(mime_for_path("shot.HEIC"), "image/heic");
        assert_eq!(mime_for_path("noext"), "image/jpeg");
    }

    #[test]
    fn test_client_requires_models() {
        assert!(GeminiVisionClient::new("key", Vec::new(), Duration::from_secs(5)).is_err());
    }
}
