// Token model: the single persistent entity.
// Stores never build these from caller input directly; callers hand a
// `TokenDraft` to `TokenStore::save` and get the stamped record back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored token value for one (name, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: Uuid,
    /// Marker identifier, written as `{{Name}}` in content.
    pub name: String,
    pub value: String,
    /// `None` means the record applies to every language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_neutral(&self) -> bool {
        self.language_code.is_none()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Caller-supplied fields of a record. Timestamps are always the store's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TokenDraft {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Trims the name and folds blank language codes / descriptions into `None`.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.language_code = normalize_language(self.language_code.as_deref());
        self.description = self
            .description
            .filter(|d| !d.trim().is_empty());
        self
    }

    /// Stamp the draft into a record. `previous_created` keeps the original
    /// creation time when the draft updates an existing record.
    pub fn into_record(
        self,
        id: Uuid,
        previous_created: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> TokenRecord {
        TokenRecord {
            id,
            name: self.name,
            value: self.value,
            language_code: normalize_language(self.language_code.as_deref()),
            description: self.description,
            created_at: previous_created.unwrap_or(now),
            modified_at: now,
        }
    }
}

impl From<TokenRecord> for TokenDraft {
    fn from(r: TokenRecord) -> Self {
        Self {
            id: Some(r.id),
            name: r.name,
            value: r.value,
            language_code: r.language_code,
            description: r.description,
        }
    }
}

/// Empty or whitespace-only language codes mean "no language".
pub fn normalize_language(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_language_is_neutral() {
        assert_eq!(normalize_language(Some("  ")), None);
        assert_eq!(normalize_language(Some("")), None);
        assert_eq!(normalize_language(None), None);
        assert_eq!(normalize_language(Some(" sv ")), Some("sv".to_string()));
    }

    #[test]
    fn test_into_record_keeps_created_at() {
        let created = Utc::now() - chrono::Duration::days(3);
        let now = Utc::now();
        let id = Uuid::new_v4();
        let record = TokenDraft::new("Greeting", "Hello").into_record(id, Some(created), now);
        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.modified_at, now);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let now = Utc::now();
        let record = TokenDraft::new("Greeting", "Hej")
            .with_language("sv")
            .into_record(Uuid::new_v4(), None, now);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["languageCode"], "sv");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("modifiedAt").is_some());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_draft_accepts_missing_fields() {
        let draft: TokenDraft = serde_json::from_str(r#"{"name":"CompanyName"}"#).unwrap();
        assert_eq!(draft.name, "CompanyName");
        assert_eq!(draft.value, "");
        assert!(draft.id.is_none());
    }
}
