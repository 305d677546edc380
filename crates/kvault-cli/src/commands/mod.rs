//! Subcommand implementations.

pub(crate) mod read;
pub(crate) mod write;

use std::io::Read as _;

use anyhow::{Context, bail};
use kvault_storage::Document;
use serde_json::Value;

/// Whether the addressed document was there.
///
/// `Missing` maps to exit status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Found,
    Missing,
}

impl Outcome {
    pub(crate) fn from_found(found: bool) -> Self {
        if found { Self::Found } else { Self::Missing }
    }
}

/// A `field=value` test against a top-level document field.
///
/// The value is parsed as JSON when it can be (`status=2`, `done=true`)
/// and taken as a string otherwise (`name=jo`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    field: String,
    value: Value,
}

impl Condition {
    pub(crate) fn matches(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// `clap` value parser for `--where`.
pub(crate) fn parse_condition(raw: &str) -> Result<Condition, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    if field.is_empty() {
        return Err("field name must not be empty".to_owned());
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok(Condition {
        field: field.to_owned(),
        value,
    })
}

/// Parse a JSON object argument. `-` reads it from stdin.
pub(crate) fn parse_document(raw: &str) -> anyhow::Result<Document> {
    let text = if raw == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read document from stdin")?;
        buffer
    } else {
        raw.to_owned()
    };
    match serde_json::from_str::<Value>(&text).context("document is not valid JSON")? {
        Value::Object(document) => Ok(document),
        other => bail!("document must be a JSON object, got {other}"),
    }
}

/// Renders documents to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Output {
    pretty: bool,
}

impl Output {
    pub(crate) fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub(crate) fn render(self, value: &Value) -> anyhow::Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    pub(crate) fn print(self, value: &Value) -> anyhow::Result<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }

    pub(crate) fn print_document(self, document: Document) -> anyhow::Result<()> {
        self.print(&Value::Object(document))
    }

    pub(crate) fn print_entry(self, key: String, document: Document) -> anyhow::Result<()> {
        let mut object = serde_json::Map::new();
        object.insert("key".to_owned(), Value::String(key));
        object.insert("value".to_owned(), Value::Object(document));
        self.print(&Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_condition_json_value() {
        let condition = parse_condition("status=2").unwrap();
        assert!(condition.matches(json!({"status": 2}).as_object().unwrap()));
        assert!(!condition.matches(json!({"status": "2"}).as_object().unwrap()));
    }

    #[test]
    fn test_parse_condition_string_fallback() {
        let condition = parse_condition("name=jo").unwrap();
        assert!(condition.matches(json!({"name": "jo"}).as_object().unwrap()));
        assert!(!condition.matches(json!({}).as_object().unwrap()));
    }

    #[test]
    fn test_parse_condition_keeps_later_equals() {
        let condition = parse_condition("expr=a=b").unwrap();
        assert!(condition.matches(json!({"expr": "a=b"}).as_object().unwrap()));
    }

    #[test]
    fn test_parse_condition_errors() {
        assert!(parse_condition("status").is_err());
        assert!(parse_condition("=2").is_err());
    }

    #[test]
    fn test_parse_document() {
        let document = parse_document(r#"{"status": 0}"#).unwrap();
        assert_eq!(document["status"], 0);
        assert!(parse_document("[1, 2]").is_err());
        assert!(parse_document("{not json").is_err());
    }

    #[test]
    fn test_render() {
        let value = json!({"a": 1});
        assert_eq!(Output::new(false).render(&value).unwrap(), r#"{"a":1}"#);
        assert_eq!(
            Output::new(true).render(&value).unwrap(),
            "{\n  \"a\": 1\n}"
        );
    }
}
