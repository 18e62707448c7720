//! Parser plugins: decode raw bytes into a document value.

use regex::Regex;
use serde_json::Value;

use crate::error::RefError;
use crate::plugins::{FileInfo, Matcher, Plugin};

/// Decodes the bytes of a document.
pub trait Parser: Plugin {
    /// Whether an empty result (blank file, `{}`, `[]`, `""`) is acceptable.
    fn allow_empty(&self) -> bool {
        true
    }

    /// Parse `file.data` into a value.
    fn parse(&self, file: &FileInfo) -> Result<Value, RefError>;
}

/// Returns true for values that count as an empty document.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn utf8<'a>(file: &'a FileInfo) -> Result<&'a str, RefError> {
    std::str::from_utf8(file.bytes()).map_err(|e| RefError::ParseError {
        uri: file.url.to_string(),
        message: e.to_string(),
    })
}

fn parse_error(file: &FileInfo, err: impl std::fmt::Display) -> RefError {
    RefError::ParseError {
        uri: file.url.to_string(),
        message: err.to_string(),
    }
}

/// Strict JSON.
#[derive(Debug, Clone)]
pub struct JsonParser {
    matcher: Matcher,
}

impl Default for JsonParser {
    fn default() -> Self {
        Self {
            matcher: Matcher::extensions(&[".json"]),
        }
    }
}

impl Plugin for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn order(&self) -> i32 {
        100
    }

    fn handles(&self, file: &FileInfo) -> bool {
        self.matcher.matches(file)
    }
}

impl Parser for JsonParser {
    fn parse(&self, file: &FileInfo) -> Result<Value, RefError> {
        let text = utf8(file)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|e| parse_error(file, e))
    }
}

/// YAML 1.2, which also accepts JSON.
#[derive(Debug, Clone)]
pub struct YamlParser {
    matcher: Matcher,
}

impl Default for YamlParser {
    fn default() -> Self {
        Self {
            matcher: Matcher::extensions(&[".yaml", ".yml", ".json"]),
        }
    }
}

impl Plugin for YamlParser {
    fn name(&self) -> &str {
        "yaml"
    }

    fn order(&self) -> i32 {
        200
    }

    fn handles(&self, file: &FileInfo) -> bool {
        self.matcher.matches(file)
    }
}

impl Parser for YamlParser {
    fn parse(&self, file: &FileInfo) -> Result<Value, RefError> {
        let text = utf8(file)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_yaml::from_str(text).map_err(|e| parse_error(file, e))
    }
}

/// Plain text documents, returned as a JSON string.
#[derive(Debug, Clone)]
pub struct TextParser {
    matcher: Matcher,
}

impl TextParser {
    /// Text parser for a custom set of URLs.
    pub fn with_pattern(pattern: Regex) -> Self {
        Self {
            matcher: Matcher::Pattern(pattern),
        }
    }
}

impl Default for TextParser {
    fn default() -> Self {
        Self {
            matcher: Matcher::extensions(&[
                ".txt", ".htm", ".html", ".md", ".xml", ".js", ".min", ".map", ".css", ".scss",
                ".less", ".svg",
            ]),
        }
    }
}

impl Plugin for TextParser {
    fn name(&self) -> &str {
        "text"
    }

    fn order(&self) -> i32 {
        300
    }

    fn handles(&self, file: &FileInfo) -> bool {
        self.matcher.matches(file)
    }
}

impl Parser for TextParser {
    fn parse(&self, file: &FileInfo) -> Result<Value, RefError> {
        Ok(Value::String(utf8(file)?.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(name: &str, data: &str) -> FileInfo {
        let mut info = FileInfo::new(url::Url::parse(&format!("file:///specs/{}", name)).unwrap());
        info.data = Some(data.as_bytes().to_vec());
        info
    }

    #[test]
    fn json_parser_valid() {
        let value = JsonParser::default().parse(&file("a.json", r#"{"type": "object"}"#)).unwrap();
        assert_eq!(value["type"], "object");
    }

    #[test]
    fn json_parser_invalid() {
        let result = JsonParser::default().parse(&file("a.json", "not valid json"));
        assert!(matches!(result, Err(RefError::ParseError { .. })));
    }

    #[test]
    fn blank_documents_parse_to_null() {
        assert_eq!(JsonParser::default().parse(&file("a.json", "  \n")).unwrap(), Value::Null);
        assert_eq!(YamlParser::default().parse(&file("a.yaml", "")).unwrap(), Value::Null);
    }

    #[test]
    fn yaml_parser_reads_yaml_and_json() {
        let yaml = "openapi: 3.0.0\ninfo:\n  title: Pets\n  version: '1'\n";
        let value = YamlParser::default().parse(&file("api.yaml", yaml)).unwrap();
        assert_eq!(value, json!({"openapi": "3.0.0", "info": {"title": "Pets", "version": "1"}}));

        let value = YamlParser::default().parse(&file("a.json", r#"{"a": [1, 2]}"#)).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn text_parser_returns_string() {
        let value = TextParser::default().parse(&file("README.md", "# Title\n")).unwrap();
        assert_eq!(value, json!("# Title\n"));
        assert!(TextParser::default().handles(&file("notes.txt", "")));
        assert!(!TextParser::default().handles(&file("a.json", "")));
    }

    #[test]
    fn text_parser_with_pattern() {
        let parser = TextParser::with_pattern(Regex::new(r"\.graphql$").unwrap());
        assert!(parser.handles(&file("schema.graphql", "")));
    }

    #[test]
    fn empty_values() {
        assert!(is_empty(&json!(null)));
        assert!(is_empty(&json!({})));
        assert!(is_empty(&json!([])));
        assert!(is_empty(&json!("   ")));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
        assert!(!is_empty(&json!({"a": 1})));
    }
}
