//! Image question-answering tool.
//!
//! Accepts a local image path or an image URL plus a natural-language
//! question and routes both through the oracle's vision interface.
//! Local files are inlined as base64 data URLs; SVG content is not
//! accepted by the vision endpoint and is refused with a pointer to the
//! raster alternatives.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use llm::{ChatMessage, Oracle};

use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
You cannot inspect images yourself: instead call this tool to inspect an image by providing a local \
image file path or an image URI and ask questions about it. This tool handles the following file \
extensions: [\".jpeg\", \".jpg\", \".png\"] it does **NOT** handle .mp3 files.";

const SYSTEM_PROMPT: &str = "\
You are an expert in image analysis, reading and extraction. You will be given an image along with a \
specific question related to that image. Give an in-depth description of what is found in the image. \
Give an in-depth answer to the question. If you are unable to answer the question, give a detailed \
description of the items in the image which could help someone else answer the question. Do not add \
any information that is not present in the image. If the image includes any code, text or numbers, \
transcribe it after the answer.";

#[derive(Debug, Deserialize)]
struct ImageQuestionArgs {
    question: String,
    full_path_to_image: String,
}

fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// `image_inspector`.
pub struct ImageQuestionTool {
    oracle: Arc<Oracle>,
    client: reqwest::Client,
}

impl ImageQuestionTool {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self {
            oracle,
            client: reqwest::Client::new(),
        }
    }

    fn image_format(path: &str) -> Option<&'static str> {
        let lower = path.to_lowercase();
        if lower.ends_with(".png") {
            Some("png")
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Some("jpeg")
        } else if lower.ends_with(".svg") {
            Some("svg")
        } else {
            None
        }
    }

    /// Resolve the image reference to a URL the vision endpoint accepts.
    async fn resolve_image_url(&self, reference: &str) -> Result<String, ToolError> {
        if is_url(reference) {
            let response = self.client.get(reference).send().await?;
            if !response.status().is_success() {
                return Err(ToolError::Failed("The URL provided is not valid.".to_string()));
            }
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if content_type.contains("image/svg+xml") {
                error!(url = reference, "SVG images are not accepted by the vision endpoint");
                return Err(ToolError::Failed(
                    "The URL points to an SVG image, which the vision endpoint does not accept; \
                     look for a PNG or JPEG rendition of the same image."
                        .to_string(),
                ));
            }
            return Ok(reference.to_string());
        }

        let format = Self::image_format(reference).unwrap_or("png");
        if format == "svg" {
            return Err(ToolError::Failed(
                "SVG files are not accepted by the vision endpoint; convert the image to PNG or \
                 JPEG first."
                    .to_string(),
            ));
        }

        let bytes = std::fs::read(Path::new(reference)).map_err(|_| {
            ToolError::Failed(
                "Failed to open the file as an image, try using inspect_file_as_text instead!"
                    .to_string(),
            )
        })?;
        Ok(format!(
            "data:image/{format};base64,{}",
            BASE64_STANDARD.encode(&bytes)
        ))
    }
}

#[async_trait]
impl Tool for ImageQuestionTool {
    fn name(&self) -> &str {
        "image_inspector"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask about the image.",
                },
                "full_path_to_image": {
                    "type": "string",
                    "description": "The full path to the image file.",
                },
            },
            "required": ["question", "full_path_to_image"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: ImageQuestionArgs = parse_args(&args)?;

        if args.full_path_to_image.to_lowercase().ends_with(".mp3") {
            return Ok(Value::String(
                "Cannot use image_inspector tool with .mp3 files: use inspect_file_as_text instead!"
                    .to_string(),
            ));
        }

        let question = if args.question.trim().is_empty() {
            "Please write a detailed caption for this image".to_string()
        } else {
            args.question
        };

        let url = match self.resolve_image_url(&args.full_path_to_image).await {
            Ok(url) => url,
            Err(ToolError::Failed(message)) => return Ok(Value::String(message)),
            Err(other) => return Err(other),
        };

        info!(image = %args.full_path_to_image, "Asking vision question");
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_image(
                format!("{question} Take a deep breath and do this step-by-step."),
                url,
            ),
        ];
        let answer = self.oracle.invoke_text("image_inspector", messages).await?;
        Ok(Value::String(answer))
    }
}
