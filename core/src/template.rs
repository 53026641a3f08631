use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template placeholder '{{{name}}}' has no matching run variable")]
    MissingVariable { name: String },
}

/// The user-supplied values for one run (organization type, mission, ...).
///
/// Built once before the pipeline starts and only ever read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunVariables {
    values: BTreeMap<String, String>,
}

impl RunVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for RunVariables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A prompt string with `{name}` placeholders.
///
/// Only `{` + identifier + `}` counts as a placeholder. Any other brace is
/// copied through untouched, so JSON snippets or stray braces in a prompt
/// never need escaping. Substitution is a single pass: a value that itself
/// contains `{org_type}` is inserted literally and never re-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    /// Names of every placeholder, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in Segments::new(&self.source) {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn resolve(&self, vars: &RunVariables) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in Segments::new(&self.source) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = vars.get(name).ok_or_else(|| TemplateError::MissingVariable {
                        name: name.to_string(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl From<&str> for PromptTemplate {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for PromptTemplate {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    fn new(source: &'a str) -> Self {
        Self { rest: source }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let mut search_from = 0;
        while let Some(offset) = self.rest[search_from..].find('{') {
            let open = search_from + offset;
            if let Some(len) = placeholder_len(&self.rest[open + 1..]) {
                if open > 0 {
                    let literal = &self.rest[..open];
                    self.rest = &self.rest[open..];
                    return Some(Segment::Literal(literal));
                }
                let name = &self.rest[1..1 + len];
                self.rest = &self.rest[len + 2..];
                return Some(Segment::Placeholder(name));
            }
            search_from = open + 1;
        }

        let literal = self.rest;
        self.rest = "";
        Some(Segment::Literal(literal))
    }
}

/// Length of the identifier at the start of `s` if it is closed by `}`.
fn placeholder_len(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return None,
    }
    for (idx, c) in chars {
        if c == '}' {
            return Some(idx);
        }
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
    }
    None
}
