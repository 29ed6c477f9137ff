//! Content templates for synthetic post jobs.
//!
//! A template is a printf-style string with exactly one `%d` placeholder, e.g. `"template%d"`.
//! A literal percent sign is written as `%%`. Any other directive is rejected when parsing, so a
//! template that was accepted always renders.

use std::fmt;

use thiserror::Error;

/// Errors that can occur when parsing a [`ContentTemplate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template has no `%d` placeholder.
    #[error("content template has no `%d` placeholder")]
    MissingPlaceholder,

    /// The template has more than one `%d` placeholder.
    #[error("content template has more than one `%d` placeholder")]
    MultiplePlaceholders,

    /// A `%` is followed by something other than `d` or `%`.
    #[error("unsupported directive `%{directive}` at byte position {position}")]
    UnsupportedDirective {
        /// The character following the `%`.
        directive: char,
        /// Byte offset of the `%`.
        position: usize,
    },

    /// The template ends with a lone `%`.
    #[error("content template ends with an incomplete `%` directive")]
    TrailingPercent,
}

/// A parsed content template with a single counter placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentTemplate {
    raw: String,
    prefix: String,
    suffix: String,
}

impl ContentTemplate {
    /// Parses a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut seen_placeholder = false;

        let mut chars = raw.char_indices();
        while let Some((position, c)) = chars.next() {
            let out = if seen_placeholder {
                &mut suffix
            } else {
                &mut prefix
            };

            if c != '%' {
                out.push(c);
                continue;
            }

            match chars.next() {
                Some((_, '%')) => out.push('%'),
                Some((_, 'd')) if seen_placeholder => {
                    return Err(TemplateError::MultiplePlaceholders);
                }
                Some((_, 'd')) => seen_placeholder = true,
                Some((_, directive)) => {
                    return Err(TemplateError::UnsupportedDirective {
                        directive,
                        position,
                    });
                }
                None => return Err(TemplateError::TrailingPercent),
            }
        }

        if !seen_placeholder {
            return Err(TemplateError::MissingPlaceholder);
        }

        Ok(Self {
            raw: raw.to_owned(),
            prefix,
            suffix,
        })
    }

    /// Renders the template with the given counter value.
    pub fn render(&self, counter: u64) -> String {
        format!("{}{counter}{}", self.prefix, self.suffix)
    }

    /// Returns the template as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for ContentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentTemplate").field(&self.raw).finish()
    }
}

impl fmt::Display for ContentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counter() {
        let template = ContentTemplate::parse("template%d").unwrap();
        assert_eq!(template.render(2), "template2");
        assert_eq!(template.render(1234), "template1234");
    }

    #[test]
    fn placeholder_in_the_middle() {
        let template = ContentTemplate::parse("{\"seq\": %d, \"pct\": \"100%%\"}").unwrap();
        assert_eq!(template.render(7), "{\"seq\": 7, \"pct\": \"100%\"}");
        assert_eq!(template.as_str(), "{\"seq\": %d, \"pct\": \"100%%\"}");
    }

    #[test]
    fn rejects_invalid_templates() {
        assert_eq!(
            ContentTemplate::parse("no placeholder"),
            Err(TemplateError::MissingPlaceholder)
        );
        assert_eq!(
            ContentTemplate::parse("%d-%d"),
            Err(TemplateError::MultiplePlaceholders)
        );
        assert_eq!(
            ContentTemplate::parse("obj-%s"),
            Err(TemplateError::UnsupportedDirective {
                directive: 's',
                position: 4
            })
        );
        assert_eq!(
            ContentTemplate::parse("%d%"),
            Err(TemplateError::TrailingPercent)
        );
        assert_eq!(
            ContentTemplate::parse("100%%"),
            Err(TemplateError::MissingPlaceholder)
        );
    }
}
