//! Free-text normalization and feature-string assembly for product records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));

/// Strips every character that is neither a word character nor whitespace and lowercases the rest.
///
/// Missing or empty input yields an empty string.
pub fn clean_text(text: Option<&str>) -> String {
    match text {
        Some(raw) if !raw.is_empty() => NON_WORD.replace_all(raw, "").to_lowercase(),
        _ => String::new(),
    }
}

/// Space-joins review comments, treating missing comments as empty strings.
pub fn join_comments<I, S>(comments: I) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    comments
        .into_iter()
        .map(|comment| {
            comment
                .as_ref()
                .map(|c| c.as_ref().to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Raw textual fields of a product before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    /// Product display name.
    pub title: String,
    /// Long-form description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Category label (identifier or name, depending on the source).
    #[serde(default)]
    pub category: Option<String>,
    /// Review comments already joined with spaces.
    #[serde(default)]
    pub comments: String,
}

/// Builds the single feature string consumed by the vectorizer.
///
/// Field order only affects term positions; the vectorizer is bag-of-words.
pub fn combine_features(fields: &ProductFields) -> String {
    [
        clean_text(Some(&fields.title)),
        clean_text(fields.description.as_deref()),
        clean_text(fields.category.as_deref()),
        clean_text(Some(&fields.comments)),
    ]
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        assert_eq!(
            clean_text(Some("Sony 65\" OLED-TV, Bravia XR!")),
            "sony 65 oledtv bravia xr"
        );
    }

    #[test]
    fn keeps_underscores_and_unicode_letters() {
        assert_eq!(clean_text(Some("Café_Crème #1")), "café_crème 1");
    }

    #[test]
    fn missing_or_empty_input_is_empty() {
        assert_eq!(clean_text(None), "");
        assert_eq!(clean_text(Some("")), "");
        assert_eq!(clean_text(Some("?!.")), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = clean_text(Some("5.5-Quart Air Fryer; Stainless STEEL"));
        let twice = clean_text(Some(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn joins_comments_with_missing_entries() {
        let joined = join_comments(vec![Some("great"), None, Some("loud fan")]);
        assert_eq!(joined, "great  loud fan");
        assert_eq!(join_comments(Vec::<Option<String>>::new()), "");
    }

    #[test]
    fn combines_fields_in_order() {
        let fields = ProductFields {
            title: "Dyson V15".into(),
            description: Some("Cordless vacuum!".into()),
            category: None,
            comments: "Works well.".into(),
        };
        assert_eq!(combine_features(&fields), "dyson v15 cordless vacuum  works well");
    }
}
