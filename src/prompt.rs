use std::path::Path;

pub const QUERY_PLACEHOLDER: &str = "query";
pub const FIELD_GUIDE_PLACEHOLDER: &str = "field_guide";
pub const ALLOWED_ENTITIES_PLACEHOLDER: &str = "allowed_entities";

pub const DEFAULT_TEMPLATE: &str = r#"
You are an SAP Query Interpreter.
Given a vague or confusing user request, your job is to:
1. Understand what the user really wants.
2. Identify the correct OData entity and filters from SAP ES5 system.
3. Return strictly valid JSON in this format:
{
  "views": [
    { "view": "GWSAMPLE_BASIC", "entity": "BusinessPartnerSet", "filter": "$filter=Country eq 'DE'" }
  ],
  "interpretation": "Explain what the query returns in plain language",
  "suggestion": "Suggest how the user could refine their query"
}

Only use the following entity sets and fields:
{allowed_entities}

Field aliases per service (alias -> field name):
{field_guide}

User query: {query}
"#;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read prompt template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Prompt template has no {{{0}}} placeholder")]
    MissingPlaceholder(&'static str),
}

/// Instruction template with `{name}` substitution points.
///
/// Braces that do not enclose a known identifier are left as-is, so JSON examples in the
/// template need no escaping.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        if !placeholders(&text).contains(&QUERY_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder(QUERY_PLACEHOLDER));
        }
        Ok(Self { text })
    }

    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(text)
    }

    pub fn placeholders(&self) -> Vec<&str> {
        placeholders(&self.text)
    }

    /// Single pass: substituted values are never re-scanned for placeholders.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            let value = placeholder_name(tail).and_then(|name| {
                values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (name.len() + 2, *value))
            });
            match value {
                Some((consumed, value)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// `tail` starts at a `{`; returns the identifier when it is closed right after.
fn placeholder_name(tail: &str) -> Option<&str> {
    let end = tail[1..].find('}')?;
    let name = &tail[1..1 + end];
    let is_ident = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_ident.then_some(name)
}

fn placeholders(text: &str) -> Vec<&str> {
    text.match_indices('{')
        .filter_map(|(pos, _)| placeholder_name(&text[pos..]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_placeholders() {
        let template = PromptTemplate::default();
        let names = template.placeholders();
        assert!(names.contains(&QUERY_PLACEHOLDER));
        assert!(names.contains(&FIELD_GUIDE_PLACEHOLDER));
        assert!(names.contains(&ALLOWED_ENTITIES_PLACEHOLDER));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_render_keeps_json_braces() {
        let template = PromptTemplate::default();
        let rendered = template.render(&[
            (QUERY_PLACEHOLDER, "german companies"),
            (FIELD_GUIDE_PLACEHOLDER, "{}"),
            (ALLOWED_ENTITIES_PLACEHOLDER, "- Entity: BusinessPartnerSet"),
        ]);
        assert!(rendered.contains("User query: german companies"));
        assert!(rendered.contains(r#"{ "view": "GWSAMPLE_BASIC""#));
        assert!(rendered.contains("\"views\": ["));
        assert!(!rendered.contains("{query}"));
    }

    #[test]
    fn test_query_is_not_rescanned() {
        let template = PromptTemplate::new("Q: {query} G: {field_guide}").unwrap();
        let rendered = template.render(&[("query", "{field_guide}"), ("field_guide", "X")]);
        assert_eq!(rendered, "Q: {field_guide} G: X");
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let template = PromptTemplate::new("{greeting}, {query}!").unwrap();
        assert_eq!(template.render(&[("query", "world")]), "{greeting}, world!");
    }

    #[test]
    fn test_template_requires_query_placeholder() {
        let err = PromptTemplate::new("no placeholders here {}").unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder("query")));
    }

    #[test]
    fn test_non_ascii_text_around_braces() {
        let template = PromptTemplate::new("Frage: {query} – ende {").unwrap();
        assert_eq!(template.render(&[("query", "Müller")]), "Frage: Müller – ende {");
    }
}
