//! Defensive accessors over notices returned by the TED search API.
//!
//! Nothing here fails: a missing key or an unexpected shape resolves to an
//! empty string.

use crate::utils::{first_or_self, lookup, text_of};
use itertools::Itertools;
use serde_json::Value;

pub const PREFERRED_LANGUAGE: &str = "eng";

/// Candidate keys per logical field, in priority order. The API mixes
/// camelCase and hyphenated spellings between versions.
pub mod keys {
    pub const PUBLICATION_NUMBER: &[&str] = &["publication-number", "publicationNumber"];
    pub const NOTICE_TYPE: &[&str] = &["notice-type", "noticeType"];
    pub const BUSINESS_OPPORTUNITY: &[&str] = &["business-opportunity", "businessOpportunity"];
    pub const PUBLICATION_DATE: &[&str] = &["publication-date", "publicationDate"];
    pub const PROCEDURE_TYPE: &[&str] = &["procedure-type", "procedureType"];
    pub const CONTRACT_NATURE: &[&str] = &["contract-nature", "contractNature"];
    pub const DEADLINE: &[&str] = &["deadline-receipt-request", "deadline"];
    pub const CHANGE_VERSION: &[&str] = &["change-notice-version-identifier"];
    pub const BUYER_NAME: &[&str] = &["buyer-name", "buyerName"];
    pub const BUYER: &[&str] = &["buyer"];
    pub const BUYER_LEGAL_TYPE: &[&str] = &["buyer-legal-type", "legal-type", "legalType"];
    pub const BUYER_COUNTRY: &[&str] = &["buyer-country", "buyerCountry"];
    pub const NOTICE_TITLE: &[&str] = &["notice-title", "noticeTitle"];
    pub const LINKS: &[&str] = &["links"];
    pub const HTML_LINKS: &[&str] = &["html"];
    pub const CPV: &[&str] = &["cpv", "classification-cpv", "main-classification"];
    pub const CODE: &[&str] = &["code", "value"];
    pub const PLACE_OF_PERFORMANCE: &[&str] =
        &["place-of-performance", "placeOfPerformance", "place"];
    pub const ESTIMATED_VALUE: &[&str] = &["estimated-value", "estimatedValue", "value"];
    pub const LOTS: &[&str] = &["lots"];
    pub const AWARDS: &[&str] = &["awards", "award"];

    pub const LOT_IDENTIFIER: &[&str] = &["lotIdentifier", "lot-identifier", "id"];
    pub const LOT_TITLE: &[&str] = &["title", "lot-title", "lotTitle"];
    pub const PURPOSE: &[&str] = &["purpose"];
    pub const ESTIMATED_DURATION: &[&str] =
        &["estimatedDuration", "estimated-duration", "duration"];
    pub const DURATION: &[&str] = &["duration", "description"];

    pub const WINNER_SELECTION_STATUS: &[&str] =
        &["winnerSelectionStatus", "winner-selection-status"];
    pub const REASON_NO_WINNER: &[&str] = &["reasonNoWinner", "reason-no-winner"];
    pub const WINNER: &[&str] = &["winner", "winners"];
    pub const WINNER_NAME: &[&str] = &["officialName", "official-name", "name", "legalName"];
    pub const AWARD_VALUE: &[&str] = &["value", "tender-value"];
    pub const CONTRACT_DATE: &[&str] =
        &["contract-date", "contractDate", "contract-conclusion-date"];

    pub const AMOUNT: &[&str] = &["amount", "value"];
    pub const CURRENCY: &[&str] = &["currency"];
}

/// Resolves a multilingual text field.
///
/// The field is a mapping from language code to a list of strings. The
/// resolved value is the text under `preferred` (case-insensitive) when that
/// is non-empty, otherwise the first language in document order with a
/// non-empty text, otherwise `""`. A bare string or list resolves to itself.
/// Buyer names, titles and winner names all go through here.
pub fn multilingual(value: Option<&Value>, preferred: &str) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match value {
        Value::Object(languages) => languages
            .iter()
            .find(|(language, _)| language.eq_ignore_ascii_case(preferred))
            .map(|(_, texts)| first_text(texts))
            .filter(|text| !text.is_empty())
            .or_else(|| {
                languages
                    .values()
                    .map(first_text)
                    .find(|text| !text.is_empty())
            })
            .unwrap_or_default(),
        other => first_text(other),
    }
}

fn first_text(texts: &Value) -> String {
    match texts {
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default(),
        other => text_of(other),
    }
}

/// First candidate key of `value` whose multilingual text is non-empty.
pub fn first_multilingual(value: Option<&Value>, keys: &[&str], preferred: &str) -> String {
    let Some(value) = value else {
        return String::new();
    };
    keys.iter()
        .map(|key| multilingual(value.get(*key), preferred))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Comma-joined labels of a list of places; unlabelled places are skipped.
pub fn places(value: Option<&Value>) -> String {
    let places: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => vec![],
        Some(other) => vec![other],
    };

    places
        .into_iter()
        .map(place_label)
        .filter(|label| !label.is_empty())
        .join(", ")
}

fn place_label(place: &Value) -> String {
    match place {
        Value::Object(_) => lookup(place, &["label"])
            .or_else(|| lookup(place, &["country"]))
            .map(text_of)
            .unwrap_or_default(),
        other => text_of(other),
    }
}

/// Classification code of a (list of) CPV entries, e.g. `45000000`.
pub fn code(value: Option<&Value>) -> String {
    match value.and_then(first_or_self) {
        Some(entry @ Value::Object(_)) => lookup(entry, keys::CODE)
            .map(text_of)
            .unwrap_or_else(|| text_of(entry)),
        Some(other) => text_of(other),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    /// Reads `{"amount": .., "currency": {"label": ..}}`, bare or wrapped in
    /// a list. `value` stands in for a missing `amount`; a currency that is
    /// not an object is used as text.
    pub fn from_value(value: Option<&Value>) -> Money {
        let Some(value) = value.and_then(first_or_self) else {
            return Money::default();
        };
        if !value.is_object() {
            return Money {
                amount: text_of(value),
                currency: String::new(),
            };
        }

        let amount = lookup(value, keys::AMOUNT)
            .map(|amount| match amount {
                Value::Object(_) => lookup(amount, keys::AMOUNT).map(text_of).unwrap_or_default(),
                other => text_of(other),
            })
            .unwrap_or_default();
        let currency = match lookup(value, keys::CURRENCY) {
            Some(currency @ Value::Object(_)) => currency
                .get("label")
                .map(text_of)
                .unwrap_or_default(),
            Some(other) => text_of(other),
            None => String::new(),
        };

        Money { amount, currency }
    }
}
