//! Token resolution: picks the single effective record for a name and a
//! requested language, and orders records for listing.
//!
//! Selection rules:
//!   1. exact language match, if a language was requested
//!   2. the language-neutral record
//!   3. nothing (not-found is a normal outcome, never an error)
//!
//! Duplicates within one tier are broken by most recent `modified_at`,
//! then by id, so a given snapshot always yields the same winner.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::models::token::{normalize_language, TokenRecord};
use crate::store::{StoreError, TokenStore};

/// Choose the winning record for `name` among `records`.
pub fn select<'a>(
    records: &'a [TokenRecord],
    name: &str,
    language: Option<&str>,
) -> Option<&'a TokenRecord> {
    let language = normalize_language(language);
    let named = || records.iter().filter(|r| r.matches_name(name));

    if let Some(lang) = language.as_deref() {
        let specific = named()
            .filter(|r| r.language_code.as_deref() == Some(lang))
            .max_by(|a, b| newest_first(b, a));
        if specific.is_some() {
            return specific;
        }
    }

    named()
        .filter(|r| r.is_neutral())
        .max_by(|a, b| newest_first(b, a))
}

/// Sort (and, with a language, filter) records for display.
///
/// Without a language: every record, by name, neutral before named
/// languages, named languages ascending.
/// With a language: only neutral records and records for that language,
/// by name, the language-specific record ahead of the neutral one.
pub fn order_for_listing(mut records: Vec<TokenRecord>, language: Option<&str>) -> Vec<TokenRecord> {
    match normalize_language(language) {
        None => {
            records.sort_by(|a, b| {
                by_name(a, b)
                    .then_with(|| a.language_code.cmp(&b.language_code))
                    .then_with(|| newest_first(a, b))
            });
        }
        Some(lang) => {
            records.retain(|r| r.is_neutral() || r.language_code.as_deref() == Some(lang.as_str()));
            records.sort_by(|a, b| {
                by_name(a, b)
                    .then_with(|| a.is_neutral().cmp(&b.is_neutral()))
                    .then_with(|| newest_first(a, b))
            });
        }
    }
    records
}

fn by_name(a: &TokenRecord, b: &TokenRecord) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

/// `Less` when `a` should win over `b`.
fn newest_first(a: &TokenRecord, b: &TokenRecord) -> Ordering {
    b.modified_at
        .cmp(&a.modified_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Store-backed resolver. Holds no state beyond the store handle, so one
/// instance is shared across every request.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn TokenStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub async fn resolve(
        &self,
        name: &str,
        language: Option<&str>,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let candidates = self.store.find_by_name(name).await?;
        Ok(select(&candidates, name, language).cloned())
    }

    pub async fn list(&self, language: Option<&str>) -> Result<Vec<TokenRecord>, StoreError> {
        let all = self.store.list_all().await?;
        Ok(order_for_listing(all, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::TokenDraft;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn record(name: &str, value: &str, lang: Option<&str>) -> TokenRecord {
        let mut draft = TokenDraft::new(name, value);
        draft.language_code = lang.map(String::from);
        draft.into_record(Uuid::new_v4(), None, Utc::now())
    }

    #[test]
    fn test_language_match_beats_neutral() {
        let records = vec![
            record("Greeting", "Hi", None),
            record("Greeting", "Hej", Some("sv")),
        ];
        assert_eq!(select(&records, "Greeting", Some("sv")).unwrap().value, "Hej");
        assert_eq!(select(&records, "Greeting", Some("de")).unwrap().value, "Hi");
        assert_eq!(select(&records, "Greeting", None).unwrap().value, "Hi");
    }

    #[test]
    fn test_blank_language_behaves_as_none() {
        let records = vec![
            record("Greeting", "Hi", None),
            record("Greeting", "Hej", Some("sv")),
        ];
        assert_eq!(select(&records, "Greeting", Some("")).unwrap().value, "Hi");
    }

    #[test]
    fn test_no_neutral_no_match_is_none() {
        let records = vec![
            record("Greeting", "Hello", Some("en")),
            record("Greeting", "Hej", Some("sv")),
        ];
        assert!(select(&records, "Greeting", Some("de")).is_none());
        assert!(select(&records, "Greeting", None).is_none());
    }

    #[test]
    fn test_name_match_ignores_case() {
        let records = vec![record("CompanyName", "Acme", None)];
        assert_eq!(select(&records, "companyname", None).unwrap().value, "Acme");
        assert!(select(&records, "Company", None).is_none());
    }

    #[test]
    fn test_language_code_match_is_exact() {
        let records = vec![record("Greeting", "Hello", Some("en"))];
        assert!(select(&records, "Greeting", Some("EN")).is_none());
        assert!(select(&records, "Greeting", Some("en-US")).is_none());
    }

    #[test]
    fn test_duplicate_tie_break_prefers_most_recent() {
        let mut older = record("Dup", "old", None);
        older.modified_at = Utc::now() - Duration::hours(1);
        let newer = record("Dup", "new", None);
        let records = vec![newer.clone(), older.clone()];
        assert_eq!(select(&records, "Dup", None).unwrap().value, "new");

        let reversed = vec![older, newer];
        assert_eq!(select(&reversed, "Dup", None).unwrap().value, "new");
    }

    #[test]
    fn test_duplicate_tie_break_is_stable_on_equal_timestamps() {
        let now = Utc::now();
        let a = TokenDraft::new("Dup", "a").into_record(Uuid::from_u128(1), None, now);
        let b = TokenDraft::new("Dup", "b").into_record(Uuid::from_u128(2), None, now);
        let first = select(&[a.clone(), b.clone()], "Dup", None).unwrap().value.clone();
        let second = select(&[b, a], "Dup", None).unwrap().value.clone();
        assert_eq!(first, second);
        assert_eq!(first, "b");
    }

    #[test]
    fn test_listing_without_language_puts_neutral_first() {
        let records = vec![
            record("Beta", "b-sv", Some("sv")),
            record("Alpha", "a-sv", Some("sv")),
            record("Beta", "b", None),
            record("Alpha", "a-en", Some("en")),
            record("Alpha", "a", None),
        ];
        let values: Vec<_> = order_for_listing(records, None)
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["a", "a-en", "a-sv", "b", "b-sv"]);
    }

    #[test]
    fn test_listing_with_language_filters_and_prefers_specific() {
        let records = vec![
            record("Beta", "b", None),
            record("Alpha", "a", None),
            record("Alpha", "a-sv", Some("sv")),
            record("Alpha", "a-en", Some("en")),
            record("Gamma", "g-en", Some("en")),
        ];
        let values: Vec<_> = order_for_listing(records, Some("sv"))
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["a-sv", "a", "b"]);
    }
}
