//! Tokens-as-code: the YAML/JSON document used for bulk export and import.
//!
//! The schema is explicitly versioned so that a future breaking change can
//! be detected and rejected instead of silently misread.

use serde::{Deserialize, Serialize};

use super::token::{TokenDraft, TokenRecord};

pub const DOCUMENT_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDocument {
    /// Schema version, currently "1". Must be "1" to import.
    pub version: String,
    #[serde(default)]
    pub tokens: Vec<TokenDraft>,
}

impl TokenDocument {
    pub fn from_records(records: Vec<TokenRecord>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            tokens: records.into_iter().map(TokenDraft::from).collect(),
        }
    }

    /// Parse a document. JSON is attempted when the hint says so, YAML
    /// otherwise (JSON is valid YAML, so YAML is the safe default).
    pub fn parse(bytes: &[u8], content_type: &str) -> Result<Self, String> {
        let doc: TokenDocument = if content_type.contains("json") {
            serde_json::from_slice(bytes).map_err(|e| format!("JSON parse error: {}", e))?
        } else {
            serde_yaml::from_slice(bytes).map_err(|e| format!("YAML parse error: {}", e))?
        };

        if doc.version != DOCUMENT_VERSION {
            return Err(format!("unsupported document version: {}", doc.version));
        }
        Ok(doc)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Counts reported back from an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub tokens_created: usize,
    pub tokens_updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
version: "1"
tokens:
  - name: CompanyName
    value: Acme Corporation
  - name: Greeting
    value: Hej
    languageCode: sv
    description: Swedish greeting
"#;
        let doc = TokenDocument::parse(yaml.as_bytes(), "application/yaml").unwrap();
        assert_eq!(doc.tokens.len(), 2);
        assert_eq!(doc.tokens[1].language_code.as_deref(), Some("sv"));
        assert_eq!(doc.tokens[1].description.as_deref(), Some("Swedish greeting"));
    }

    #[test]
    fn test_parse_json_document() {
        let json = r#"{"version":"1","tokens":[{"name":"A","value":"x"}]}"#;
        let doc = TokenDocument::parse(json.as_bytes(), "application/json").unwrap();
        assert_eq!(doc.tokens[0].name, "A");
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = TokenDocument::parse(b"version: \"2\"\ntokens: []\n", "").unwrap_err();
        assert!(err.contains("unsupported document version"));
    }
}
