//! Prompt templates with named placeholders.
//!
//! Interpolation is by `{name}` only, no positional arguments. `{{` and
//! `}}` escape literal braces (the example sections of the query prompts
//! are full of them). A placeholder left unbound is an error; bindings
//! the template never mentions are ignored.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("placeholder '{{{0}}}' has no binding")]
    UnboundPlaceholder(String),

    #[error("unbalanced brace at offset {0}")]
    UnbalancedBrace(usize),
}

/// A named-placeholder template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pattern: std::borrow::Cow<'static, str>,
}

impl PromptTemplate {
    pub const fn new(pattern: &'static str) -> Self {
        Self {
            pattern: std::borrow::Cow::Borrowed(pattern),
        }
    }

    /// Template over a pattern assembled at runtime.
    pub fn from_string(pattern: String) -> Self {
        Self {
            pattern: std::borrow::Cow::Owned(pattern),
        }
    }

    /// The raw pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Interpolate the template with `(name, value)` bindings.
    pub fn render(&self, bindings: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut output = String::with_capacity(self.pattern.len());
        let mut chars = self.pattern.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if let Some(&(_, '{')) = chars.peek() {
                        chars.next();
                        output.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(PromptError::UnbalancedBrace(offset));
                    }
                    let value = bindings
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or(PromptError::UnboundPlaceholder(name))?;
                    output.push_str(value);
                }
                '}' => {
                    if let Some(&(_, '}')) = chars.peek() {
                        chars.next();
                        output.push('}');
                    } else {
                        return Err(PromptError::UnbalancedBrace(offset));
                    }
                }
                other => output.push(other),
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_named_placeholders() {
        let template = PromptTemplate::new("solve {problem} using {graph}");
        let rendered = template
            .render(&[("problem", "P"), ("graph", "G")])
            .unwrap();
        assert_eq!(rendered, "solve P using G");
    }

    #[test]
    fn unused_bindings_are_ignored() {
        let template = PromptTemplate::new("just {one}");
        let rendered = template
            .render(&[("one", "1"), ("two", "2")])
            .unwrap();
        assert_eq!(rendered, "just 1");
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let template = PromptTemplate::new("needs {missing}");
        assert_eq!(
            template.render(&[]),
            Err(PromptError::UnboundPlaceholder("missing".to_string()))
        );
    }

    #[test]
    fn double_braces_escape_literals() {
        let template = PromptTemplate::new("MERGE (n:Label {{name: '{value}'}})");
        let rendered = template.render(&[("value", "x")]).unwrap();
        assert_eq!(rendered, "MERGE (n:Label {name: 'x'})");
    }

    #[test]
    fn stray_close_brace_is_an_error() {
        let template = PromptTemplate::new("oops }");
        assert!(matches!(
            template.render(&[]),
            Err(PromptError::UnbalancedBrace(_))
        ));
    }
}
