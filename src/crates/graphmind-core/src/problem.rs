//! Problem statement and attachments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Immutable problem input: the natural-language statement plus any
/// attachment file paths handed in alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// The problem statement to solve.
    pub statement: String,

    /// Paths of files attached to the problem, in the order given.
    pub attachment_paths: Vec<PathBuf>,
}

impl Problem {
    /// Create a problem with no attachments.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            attachment_paths: Vec::new(),
        }
    }

    /// Attach files given a directory and a list of file names.
    ///
    /// Empty names are skipped. Paths are joined as `<dir>/<name>`.
    pub fn with_attachments<P: AsRef<Path>>(mut self, dir: P, names: &[String]) -> Self {
        for name in names {
            if name.is_empty() {
                continue;
            }
            self.attachment_paths.push(dir.as_ref().join(name));
        }
        self
    }

    /// Attach files by full path.
    pub fn with_attachment_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.attachment_paths.extend(paths);
        self
    }

    /// Render the problem for the oracle.
    ///
    /// With attachments the statement is suffixed with an
    /// `<attached_file_paths>` block listing one path per line.
    pub fn prompt_text(&self) -> String {
        if self.attachment_paths.is_empty() {
            return self.statement.clone();
        }

        let paths = self
            .attachment_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n<attached_file_paths>\n{}\n</attached_file_paths>",
            self.statement, paths
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_text_without_attachments_is_statement() {
        let problem = Problem::new("How many legs does a spider have?");
        assert_eq!(problem.prompt_text(), "How many legs does a spider have?");
    }

    #[test]
    fn prompt_text_lists_attachment_paths() {
        let problem = Problem::new("Summarize the report.")
            .with_attachments("/data", &["report.pdf".to_string(), String::new()]);

        let text = problem.prompt_text();
        assert!(text.starts_with("Summarize the report."));
        assert!(text.contains("<attached_file_paths>"));
        assert!(text.contains("/data/report.pdf"));
        // The empty name is skipped entirely.
        assert_eq!(problem.attachment_paths.len(), 1);
    }
}
