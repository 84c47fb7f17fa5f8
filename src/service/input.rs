//! Lenient request field parsing
//!
//! Web forms send numbers as strings and leave untouched inputs empty.
//! These helpers accept either shape and treat empty values as absent.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// `12`, `"12"`, `""` and `null` are all accepted; the last two give `None`
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("expected a number, got {text:?}")))
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// A single string or a list of strings; blanks are dropped
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    };

    Ok(values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect())
}

/// Trimmed text, `None` when blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_number")]
        price: Option<f64>,
        #[serde(default, deserialize_with = "string_list")]
        tags: Vec<String>,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn numbers_may_arrive_as_text() {
        assert_eq!(probe(r#"{"price": 1500}"#).price, Some(1500.0));
        assert_eq!(probe(r#"{"price": "1500.5"}"#).price, Some(1500.5));
        assert_eq!(probe(r#"{"price": ""}"#).price, None);
        assert_eq!(probe(r#"{"price": null}"#).price, None);
        assert_eq!(probe("{}").price, None);
        assert!(serde_json::from_str::<Probe>(r#"{"price": "cheap"}"#).is_err());
    }

    #[test]
    fn lists_accept_a_single_value() {
        assert_eq!(probe(r#"{"tags": "Gym"}"#).tags, vec!["Gym"]);
        assert_eq!(probe(r#"{"tags": ["Gym", " ", "Lift"]}"#).tags, vec!["Gym", "Lift"]);
        assert!(probe("{}").tags.is_empty());
    }

    #[test]
    fn blank_text_is_absent() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" Ludhiana ")), Some("Ludhiana"));
        assert_eq!(non_blank(None), None);
    }
}
