use lazy_regex::regex;
use serde_json::Value;

/// Some API fields come either as an object or as a one-element list of it.
pub(crate) fn first_or_self(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// First of `keys` present in `value` with a non-blank value.
pub(crate) fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !is_blank(v))
}

/// Flattens a scalar-ish value to text. Lists use their first element and
/// objects their `label`; anything unusable is empty.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items.first().map(text_of).unwrap_or_default(),
        Value::Object(map) => map.get("label").map(text_of).unwrap_or_default(),
    }
}

pub(crate) fn text(value: Option<&Value>) -> String {
    value.map(text_of).unwrap_or_default()
}

/// Cleans text scraped from rendered notices: non-breaking spaces, literal
/// `\n` sequences and runs of whitespace.
pub(crate) fn normalize_text(s: &str) -> String {
    let s = s.replace('\u{a0}', " ").replace("\\n", "");
    regex!(r"\s+").replace_all(&s, " ").trim().to_string()
}

pub(crate) fn is_publication_number(s: &str) -> bool {
    regex!(r"^\d+-\d+$").is_match(s)
}
