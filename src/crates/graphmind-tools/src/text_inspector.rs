//! Text-inspector tool: read a local file as Markdown-ish text and
//! optionally answer a question about it through the oracle.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use llm::{ChatMessage, Oracle};

use crate::convert;
use crate::extract_zip::ExtractZipTool;
use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
You cannot load files yourself: instead call this tool to read a file as markdown text and ask \
questions about it. The tool is able to unzip files with the extension \".zip\", in which case it \
will return a list of the paths to each extracted file. This tool handles the following file \
extensions: [\".html\", \".htm\", \".csv\", \".xlsx\", \".pptx\", \".wav\", \".mp3\", \".flac\", \
\".pdf\", \".docx\"], and all other types of text files. IT DOES NOT HANDLE IMAGES.";

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".svg"];

/// Converted text longer than this is truncated before the oracle call.
const MAX_ORACLE_CHARS: usize = 70_000;

#[derive(Debug, Deserialize)]
struct TextInspectorArgs {
    file_path: String,
    #[serde(default)]
    question: Option<String>,
}

/// `inspect_file_as_text`.
pub struct TextInspectorTool {
    oracle: Arc<Oracle>,
}

impl TextInspectorTool {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Tool for TextInspectorTool {
    fn name(&self) -> &str {
        "inspect_file_as_text"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file you want to read as text. Must be a '.something' file, like '.pdf'. If it is an image, use the image_inspector tool instead! DO NOT USE THIS TOOL FOR A WEBPAGE: use the search tool instead!",
                },
                "question": {
                    "type": "string",
                    "description": "Your question, as a natural language sentence. Provide as much context as possible. Do not pass this parameter if you just want to directly return the content of the file.",
                },
            },
            "required": ["file_path"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: TextInspectorArgs = match &args {
            Value::String(path) => TextInspectorArgs {
                file_path: path.clone(),
                question: None,
            },
            _ => parse_args(&args)?,
        };

        let lower = args.file_path.to_lowercase();
        if lower.contains(".zip") {
            return ExtractZipTool::extract(&args.file_path);
        }
        if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Ok(Value::String(
                "Cannot use inspect_file_as_text tool with images: use the image_inspector tool instead!"
                    .to_string(),
            ));
        }

        let document = convert::convert(Path::new(&args.file_path))?;
        info!(
            file = %args.file_path,
            chars = document.text_content.len(),
            "Converted file to text"
        );

        let Some(question) = args.question.filter(|q| !q.trim().is_empty()) else {
            return Ok(Value::String(document.text_content));
        };

        let mut content = document.text_content;
        graphmind_core::truncate_utf8(&mut content, MAX_ORACLE_CHARS);
        let title = document.title.unwrap_or_else(|| args.file_path.clone());

        let messages = vec![
            ChatMessage::user(format!(
                "You will have to write a short caption for this file, then answer this question: {question}"
            )),
            ChatMessage::user(format!("Here is the complete file:\n### {title}\n\n{content}")),
            ChatMessage::user(format!(
                "Now answer the question below. Use these three headings: '1. Short answer', \
                 '2. Extremely detailed answer', '3. Additional Context on the document and question asked'. {question}"
            )),
        ];

        let answer = self
            .oracle
            .invoke_text("inspect_file_as_text", messages)
            .await?;
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::UsageStatistics;
    use llm::ChatClient;
    use llm::MockChatClient;
    use tempfile::tempdir;

    fn tool(mock: &MockChatClient, dir: &tempfile::TempDir) -> TextInspectorTool {
        let stats = UsageStatistics::new(dir.path().join("usage.jsonl")).unwrap();
        TextInspectorTool::new(Arc::new(Oracle::new(mock.clone_box(), stats, 1)))
    }

    #[tokio::test]
    async fn refuses_images() {
        let dir = tempdir().unwrap();
        let tool = tool(&MockChatClient::new("m"), &dir);
        let output = tool
            .invoke(serde_json::json!({"file_path": "/tmp/photo.jpeg"}))
            .await
            .unwrap();
        assert!(output.as_str().unwrap().contains("image_inspector"));
    }

    #[tokio::test]
    async fn returns_content_without_question() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "quarterly revenue was 68000").unwrap();

        let tool = tool(&MockChatClient::new("m"), &dir);
        let output = tool
            .invoke(serde_json::json!({"file_path": path.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(output.as_str().unwrap(), "quarterly revenue was 68000");
    }

    #[tokio::test]
    async fn question_routes_through_oracle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "quarterly revenue was 68000").unwrap();

        let mock = MockChatClient::new("m");
        mock.push_text("1. Short answer: 68000");
        let tool = tool(&mock, &dir);

        let output = tool
            .invoke(serde_json::json!({
                "file_path": path.to_str().unwrap(),
                "question": "What was the revenue?",
            }))
            .await
            .unwrap();
        assert!(output.as_str().unwrap().contains("68000"));
        // The oracle received the file content.
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn zip_paths_are_forwarded_to_extraction() {
        let dir = tempdir().unwrap();
        let tool = tool(&MockChatClient::new("m"), &dir);
        // Missing archive: extraction reports an I/O failure rather
        // than the image/extension refusals, proving the forwarding path.
        let missing = dir.path().join("bundle.zip");
        let result = tool
            .invoke(serde_json::json!({"file_path": missing.to_str().unwrap()}))
            .await;
        assert!(matches!(result, Err(ToolError::Io(_))));
    }
}
