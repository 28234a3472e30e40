//! Path Templates - Forward Rendering and Inverse Matching
//!
//! A template such as `${kind}/${name}/${dep}/${name}_v${version}.${extension}`
//! renders a concrete path from a field map, and compiles into a pattern that
//! recovers the field map from a concrete path.

use fancy_regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Field values keyed by placeholder name.
pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unterminated placeholder at byte {offset} in template '{template}'")]
    Unterminated { template: String, offset: usize },

    #[error("Invalid placeholder name '{name}' in template '{template}'")]
    InvalidPlaceholder { template: String, name: String },

    #[error("Missing field '{0}'")]
    MissingField(String),

    #[error("Placeholder '{field}' is not allowed in template '{template}'")]
    UnknownField { template: String, field: String },

    #[error("Pattern error: {0}")]
    Pattern(#[from] fancy_regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed `${name}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
                offset: offset + start,
            })?;
            let name = &after[..end];
            if !is_identifier(name) {
                return Err(TemplateError::InvalidPlaceholder {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }
            segments.push(Segment::Placeholder(name.to_string()));

            let consumed = start + 2 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Distinct placeholder names in order of first occurrence.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Rejects any placeholder outside `allowed`.
    pub fn require_only(&self, allowed: &[&str]) -> Result<(), TemplateError> {
        match self.placeholders().into_iter().find(|p| !allowed.contains(p)) {
            Some(field) => Err(TemplateError::UnknownField {
                template: self.to_string(),
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn render(&self, fields: &Fields) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = fields
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingField(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Compile the inverse matcher.
    ///
    /// Literal text is escaped. The first occurrence of a placeholder captures
    /// one or more characters of a single path segment; later occurrences must
    /// repeat the first capture exactly.
    pub fn pattern(&self) -> Result<PathPattern, TemplateError> {
        let mut source = String::from("^");
        let mut names: Vec<String> = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => source.push_str(&fancy_regex::escape(text)),
                Segment::Placeholder(name) if names.contains(name) => {
                    source.push_str(&format!("(?P={})", name));
                }
                Segment::Placeholder(name) => {
                    source.push_str(&format!("(?P<{}>[^/]+)", name));
                    names.push(name.clone());
                }
            }
        }
        source.push('$');

        Ok(PathPattern {
            regex: Regex::new(&source)?,
            names,
        })
    }

    /// Split at the last `/` into a directory template and a file-name template.
    pub fn split_parent(&self) -> (PathTemplate, PathTemplate) {
        let cut = self.segments.iter().enumerate().rev().find_map(|(idx, segment)| {
            match segment {
                Segment::Literal(text) => text.rfind('/').map(|pos| (idx, pos)),
                Segment::Placeholder(_) => None,
            }
        });

        let Some((idx, pos)) = cut else {
            return (PathTemplate { segments: vec![] }, self.clone());
        };

        let mut parent = self.segments[..idx].to_vec();
        let mut file = Vec::new();
        if let Segment::Literal(text) = &self.segments[idx] {
            if pos > 0 {
                parent.push(Segment::Literal(text[..pos].to_string()));
            }
            if pos + 1 < text.len() {
                file.push(Segment::Literal(text[pos + 1..].to_string()));
            }
        }
        file.extend_from_slice(&self.segments[idx + 1..]);

        (PathTemplate { segments: parent }, PathTemplate { segments: file })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(name) => write!(f, "${{{}}}", name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Inverse matcher compiled from a [`PathTemplate`].
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    /// Extract the field map from `path`, or `None` when it does not fit.
    pub fn matches(&self, path: &str) -> Option<Fields> {
        match self.regex.captures(path) {
            Ok(Some(caps)) => Some(
                self.names
                    .iter()
                    .filter_map(|name| {
                        caps.name(name)
                            .map(|m| (name.clone(), m.as_str().to_string()))
                    })
                    .collect(),
            ),
            Ok(None) => None,
            Err(e) => {
                warn!("Pattern {} failed on '{}': {}", self.regex.as_str(), path, e);
                None
            }
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// A template split into its directory part and its file-name part.
#[derive(Debug, Clone)]
pub struct LocationTemplate {
    pub full: PathTemplate,
    pub dir: PathTemplate,
    pub file: PathTemplate,
}

impl LocationTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let full = PathTemplate::parse(template)?;
        let (dir, file) = full.split_parent();
        Ok(Self { full, dir, file })
    }
}
