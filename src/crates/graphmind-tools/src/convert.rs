//! File-to-text conversion for the text-inspector tool.
//!
//! Produces a Markdown-ish rendering of common file types: plain text,
//! HTML, CSV/TSV tables, Office XML documents (docx/xlsx/pptx), PDF.
//! Image formats are refused upstream; audio formats are reported as
//! requiring transcription, which this build does not perform.

use std::fs;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};

use crate::ToolError;

/// Result of a conversion: optional document title plus text content.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub title: Option<String>,
    pub text_content: String,
}

/// Extensions handled by [`convert`]; everything else falls back to a
/// plain-text read.
pub const HANDLED_EXTENSIONS: [&str; 9] = [
    ".html", ".htm", ".csv", ".tsv", ".xlsx", ".pptx", ".docx", ".pdf", ".txt",
];

const AUDIO_EXTENSIONS: [&str; 3] = [".wav", ".mp3", ".flac"];

/// Convert a local file to Markdown-ish text.
pub fn convert(path: &Path) -> Result<ConvertedDocument, ToolError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if AUDIO_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return Ok(ConvertedDocument {
            title: None,
            text_content:
                "This is an audio file; speech transcription is not available in this build. \
                 Consider asking for the information another way."
                    .to_string(),
        });
    }

    if name.ends_with(".html") || name.ends_with(".htm") {
        return convert_html(path);
    }
    if name.ends_with(".csv") || name.ends_with(".tsv") {
        return convert_delimited(path, if name.ends_with(".tsv") { '\t' } else { ',' });
    }
    if name.ends_with(".docx") {
        return convert_office_xml(path, &["word/document.xml"]);
    }
    if name.ends_with(".xlsx") {
        return convert_office_xml(path, &["xl/sharedStrings.xml"]);
    }
    if name.ends_with(".pptx") {
        return convert_pptx(path);
    }
    if name.ends_with(".pdf") {
        return convert_pdf(path);
    }

    // Plain text and anything else that reads as UTF-8.
    let text = fs::read_to_string(path)?;
    Ok(ConvertedDocument {
        title: None,
        text_content: text,
    })
}

fn convert_html(path: &Path) -> Result<ConvertedDocument, ToolError> {
    let html = fs::read_to_string(path)?;
    let document = Html::parse_document(&html);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string());

    let body_selector = Selector::parse("body").expect("static selector");
    let text = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    Ok(ConvertedDocument {
        title,
        text_content: squeeze_whitespace(&text),
    })
}

fn convert_delimited(path: &Path, delimiter: char) -> Result<ConvertedDocument, ToolError> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();

    let mut table = String::new();
    if let Some(header) = lines.next() {
        let cells: Vec<&str> = header.split(delimiter).collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
        table.push_str(&format!("|{}\n", " --- |".repeat(cells.len())));
    }
    for line in lines {
        let cells: Vec<&str> = line.split(delimiter).collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    Ok(ConvertedDocument {
        title: None,
        text_content: table,
    })
}

/// Extract the text runs of XML parts inside an Office archive.
fn convert_office_xml(path: &Path, parts: &[&str]) -> Result<ConvertedDocument, ToolError> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ToolError::Failed(format!("cannot open document archive: {e}")))?;

    let mut text = String::new();
    for part in parts {
        let mut entry = match archive.by_name(part) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        text.push_str(&xml_text(&xml)?);
        text.push('\n');
    }

    Ok(ConvertedDocument {
        title: None,
        text_content: squeeze_whitespace(&text),
    })
}

fn convert_pptx(path: &Path) -> Result<ConvertedDocument, ToolError> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ToolError::Failed(format!("cannot open presentation archive: {e}")))?;

    let slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| {
            let name = archive.by_index(i).ok()?.name().to_string();
            (name.starts_with("ppt/slides/slide") && name.ends_with(".xml")).then_some(name)
        })
        .collect();

    let mut slides = slide_names;
    slides.sort();

    let mut text = String::new();
    for (index, name) in slides.iter().enumerate() {
        let mut xml = String::new();
        archive
            .by_name(name)
            .map_err(|e| ToolError::Failed(e.to_string()))?
            .read_to_string(&mut xml)?;
        text.push_str(&format!("## Slide {}\n", index + 1));
        text.push_str(&xml_text(&xml)?);
        text.push('\n');
    }

    Ok(ConvertedDocument {
        title: None,
        text_content: squeeze_whitespace(&text),
    })
}

fn convert_pdf(path: &Path) -> Result<ConvertedDocument, ToolError> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| ToolError::Failed(format!("PDF text extraction failed: {e}")))?;
    Ok(ConvertedDocument {
        title: None,
        text_content: text,
    })
}

/// Character data of an XML document, tags stripped.
fn xml_text(xml: &str) -> Result<String, ToolError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| ToolError::Failed(format!("bad XML text: {e}")))?;
                text.push_str(&chunk);
                text.push(' ');
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ToolError::Failed(format!("bad XML: {e}"))),
        }
    }

    Ok(text)
}

fn squeeze_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c == '\n' {
            output.push('\n');
            last_was_space = true;
        } else if c.is_whitespace() {
            if !last_was_space {
                output.push(' ');
            }
            last_was_space = true;
        } else {
            output.push(c);
            last_was_space = false;
        }
    }
    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plain_text_passes_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one\nline two").unwrap();

        let document = convert(&path).unwrap();
        assert_eq!(document.text_content, "line one\nline two");
    }

    #[test]
    fn html_extracts_title_and_body_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(
            &path,
            "<html><head><title>The Title</title></head><body><p>Hello <b>world</b></p></body></html>",
        )
        .unwrap();

        let document = convert(&path).unwrap();
        assert_eq!(document.title.as_deref(), Some("The Title"));
        assert!(document.text_content.contains("Hello"));
        assert!(document.text_content.contains("world"));
        assert!(!document.text_content.contains("<p>"));
    }

    #[test]
    fn csv_becomes_a_markdown_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "name,legs\nspider,8\nant,6").unwrap();

        let document = convert(&path).unwrap();
        assert!(document.text_content.contains("| name | legs |"));
        assert!(document.text_content.contains("| spider | 8 |"));
    }

    #[test]
    fn audio_reports_missing_transcription() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, [0u8; 4]).unwrap();

        let document = convert(&path).unwrap();
        assert!(document.text_content.contains("audio file"));
    }

    #[test]
    fn xml_text_strips_tags() {
        let text = xml_text("<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>").unwrap();
        assert_eq!(squeeze_whitespace(&text), "Hello world");
    }
}
