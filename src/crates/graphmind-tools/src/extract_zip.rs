//! Zip-extraction tool.
//!
//! Extracts an archive into a sibling `<name>_EXTRACTED` directory and
//! returns the extracted paths. Results are never cached (the manager
//! enforces the exemption): extraction is a filesystem side effect.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
This tool extracts the contents of a zip file to a directory named after the zip file (without the \
.zip extension) in the same location as the zip file. It returns a list of the paths of all extracted \
files. It does **NOT** return the content of the extracted files. Once files have been extracted, they \
need to be read using a different tool such as inspect_file_as_text or image_inspector.

This tool **ONLY** handles files with a \".zip\" extension.";

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".svg"];

#[derive(Debug, Deserialize)]
struct ExtractZipArgs {
    zip_path: String,
}

/// `extract_zip`.
pub struct ExtractZipTool;

impl ExtractZipTool {
    pub fn new() -> Self {
        Self
    }

    /// Extraction shared with the text inspector's `.zip` forwarding.
    pub fn extract(zip_path: &str) -> Result<Value, ToolError> {
        let lower = zip_path.to_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Ok(Value::String(
                "Cannot use extract_zip tool with images: use the image_inspector tool instead!"
                    .to_string(),
            ));
        }
        if !lower.ends_with(".zip") {
            return Ok(Value::String(
                "Cannot use extract_zip tool with this file: try using the inspect_file_as_text tool instead!"
                    .to_string(),
            ));
        }

        let zip_path = Path::new(zip_path);
        let stem = zip_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("archive");
        let extract_dir = zip_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_EXTRACTED"));

        if extract_dir.exists() {
            let existing = collect_files(&extract_dir)?;
            return Ok(Value::String(format!(
                "This zip file has already been extracted. Try using the inspect_file_as_text or \
                 image_inspector tool to inspect the following extracted files {existing:?}"
            )));
        }

        fs::create_dir_all(&extract_dir)?;

        let file = fs::File::open(zip_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ToolError::Failed(format!("cannot open archive: {e}")))?;
        archive
            .extract(&extract_dir)
            .map_err(|e| ToolError::Failed(format!("cannot extract archive: {e}")))?;

        let extracted = collect_files(&extract_dir)?;
        info!(count = extracted.len(), dir = %extract_dir.display(), "Extracted archive");

        Ok(Value::String(format!(
            "\nZip file extracted.\nThe extracted files have the following paths: {extracted:?}.\n\
             You can use inspect_file_as_text or image_inspector tool to inspect the extracted files.\n"
        )))
    }
}

impl Default for ExtractZipTool {
    fn default() -> Self {
        Self::new()
    }
}

/// All file paths under `dir`, depth-first.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl Tool for ExtractZipTool {
    fn name(&self) -> &str {
        "extract_zip"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "zip_path": {
                    "type": "string",
                    "description": "The full path to the zip file to extract.",
                },
            },
            "required": ["zip_path"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let zip_path = match &args {
            Value::String(path) => path.clone(),
            _ => parse_args::<ExtractZipArgs>(&args)?.zip_path,
        };
        Self::extract(&zip_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_test_zip(dir: &Path) -> PathBuf {
        let zip_path = dir.join("bundle.zip");
        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("inner/data.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.start_file("top.txt", options).unwrap();
        writer.write_all(b"world").unwrap();
        writer.finish().unwrap();
        zip_path
    }

    #[tokio::test]
    async fn refuses_images_and_non_zip_files() {
        let tool = ExtractZipTool::new();

        let image = tool
            .invoke(serde_json::json!({"zip_path": "/tmp/cat.png"}))
            .await
            .unwrap();
        assert!(image.as_str().unwrap().contains("image_inspector"));

        let other = tool
            .invoke(serde_json::json!({"zip_path": "/tmp/doc.pdf"}))
            .await
            .unwrap();
        assert!(other.as_str().unwrap().contains("inspect_file_as_text"));
    }

    #[tokio::test]
    async fn extracts_into_sibling_directory() {
        let dir = tempdir().unwrap();
        let zip_path = write_test_zip(dir.path());
        let tool = ExtractZipTool::new();

        let output = tool
            .invoke(serde_json::json!({"zip_path": zip_path.to_str().unwrap()}))
            .await
            .unwrap();

        let text = output.as_str().unwrap();
        assert!(text.contains("Zip file extracted."));
        assert!(dir.path().join("bundle_EXTRACTED/top.txt").exists());
        assert!(dir.path().join("bundle_EXTRACTED/inner/data.txt").exists());
    }

    #[tokio::test]
    async fn second_extraction_reports_existing_listing() {
        let dir = tempdir().unwrap();
        let zip_path = write_test_zip(dir.path());
        let tool = ExtractZipTool::new();
        let args = serde_json::json!({"zip_path": zip_path.to_str().unwrap()});

        tool.invoke(args.clone()).await.unwrap();
        let second = tool.invoke(args).await.unwrap();
        assert!(second.as_str().unwrap().contains("already been extracted"));
    }
}
