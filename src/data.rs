use itertools::Itertools;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use tracing::debug;

/// Column names of the canonical tender table.
///
/// Notice-level and lot-level place, value and currency are distinct columns
/// (`notice_*` / `lot_*`).
pub mod columns {
    pub const NOTICE_NUMBER: &str = "notice_number";
    pub const NOTICE_TYPE: &str = "notice_type";
    pub const BUSINESS_OPPORTUNITY: &str = "business_opportunity";
    pub const PUBLICATION_DATE: &str = "publication_date";
    pub const PROCEDURE_TYPE: &str = "procedure_type";
    pub const CONTRACT_NATURE: &str = "contract_nature";
    pub const DEADLINE: &str = "deadline";
    pub const CHANGE_VERSION: &str = "change_version";
    pub const BUYER_NAME: &str = "buyer_name";
    pub const BUYER_LEGAL_TYPE: &str = "buyer_legal_type";
    pub const BUYER_COUNTRY: &str = "buyer_country";
    pub const TITLE: &str = "title";
    pub const LINK: &str = "link";
    pub const MAIN_CPV: &str = "main_cpv";
    pub const NOTICE_PLACE_OF_PERFORMANCE: &str = "notice_place_of_performance";
    pub const NOTICE_ESTIMATED_VALUE: &str = "notice_estimated_value";
    pub const NOTICE_ESTIMATED_CURRENCY: &str = "notice_estimated_currency";
    pub const LOT_IDENTIFIER: &str = "lot_identifier";
    pub const LOT_TITLE: &str = "lot_title";
    pub const LOT_CPV: &str = "lot_cpv";
    pub const LOT_PLACE_OF_PERFORMANCE: &str = "lot_place_of_performance";
    pub const LOT_ESTIMATED_VALUE: &str = "lot_estimated_value";
    pub const LOT_ESTIMATED_CURRENCY: &str = "lot_estimated_currency";
    pub const LOT_ESTIMATED_DURATION: &str = "lot_estimated_duration";
    pub const WINNER_SELECTION_STATUS: &str = "winner_selection_status";
    pub const REASON_NO_WINNER: &str = "reason_no_winner";
    pub const WINNER_NAME: &str = "winner_name";
    pub const WINNER_VALUE: &str = "winner_value";
    pub const WINNER_CURRENCY: &str = "winner_currency";
    pub const CONTRACT_DATE: &str = "contract_date";
    pub const LEGAL_BASIS: &str = "legal_basis";
    pub const COVERED_BY_GPA: &str = "covered_by_gpa";
    pub const SUBCONTRACTING_VALUE: &str = "subcontracting_value";
    pub const DETAIL_URL: &str = "detail_url";
}

use columns::*;

pub const TED_COLUMNS: &[&str] = &[
    NOTICE_NUMBER,
    NOTICE_TYPE,
    BUSINESS_OPPORTUNITY,
    PUBLICATION_DATE,
    PROCEDURE_TYPE,
    CONTRACT_NATURE,
    DEADLINE,
    CHANGE_VERSION,
    BUYER_NAME,
    BUYER_LEGAL_TYPE,
    BUYER_COUNTRY,
    TITLE,
    LINK,
    MAIN_CPV,
    NOTICE_PLACE_OF_PERFORMANCE,
    NOTICE_ESTIMATED_VALUE,
    NOTICE_ESTIMATED_CURRENCY,
    LOT_IDENTIFIER,
    LOT_TITLE,
    LOT_CPV,
    LOT_PLACE_OF_PERFORMANCE,
    LOT_ESTIMATED_VALUE,
    LOT_ESTIMATED_CURRENCY,
    LOT_ESTIMATED_DURATION,
    WINNER_SELECTION_STATUS,
    REASON_NO_WINNER,
    WINNER_NAME,
    WINNER_VALUE,
    WINNER_CURRENCY,
    CONTRACT_DATE,
    LEGAL_BASIS,
    COVERED_BY_GPA,
    SUBCONTRACTING_VALUE,
    DETAIL_URL,
];

lazy_static! {
    static ref TED_SCHEMA: Schema = Schema::new(TED_COLUMNS.iter().copied());
}

/// One flat output record, column name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, column: K, value: V) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Copies every column of `other` into `self`; `other` wins on collision.
    pub fn merge(&mut self, other: Row) {
        self.0.extend(other.0);
    }

    /// Keeps only the columns for which `keep` holds.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.0.retain(|column, _| keep(column.as_str()));
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// Fixed, ordered column list every written row is forced onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Builds a schema from `columns`. A repeated name keeps its first position.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema {
            columns: columns.into_iter().map(Into::into).unique().collect(),
        }
    }

    /// The canonical tender schema shared by the JSON and HTML extractors.
    pub fn ted() -> Self {
        TED_SCHEMA.clone()
    }

    pub fn with_extra<I, S>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::new(self.columns.into_iter().chain(extra.into_iter().map(Into::into)))
    }

    pub fn columns(&self) -> &[String] {
        self.columns.as_slice()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// A row holding every column of the schema with an empty value.
    pub fn blank_row(&self) -> Row {
        self.columns.iter().map(|c| (c.as_str(), "")).collect()
    }

    /// Values of `row` in schema order. Missing columns become empty,
    /// columns outside the schema are dropped.
    pub fn normalize(&self, row: &Row) -> Vec<String> {
        let dropped = row.columns().filter(|c| !self.contains(c)).join(", ");
        if !dropped.is_empty() {
            debug!("Drop columns outside the schema: {}", dropped);
        }

        self.columns
            .iter()
            .map(|c| row.get(c).unwrap_or_default().to_string())
            .collect()
    }

    pub fn assemble<'a, I>(&self, rows: I) -> Vec<Vec<String>>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        rows.into_iter().map(|row| self.normalize(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ted_schema_has_no_duplicate_columns() {
        let schema = Schema::ted();
        assert_eq!(schema.columns().len(), TED_COLUMNS.len());
        assert!(schema.contains(NOTICE_PLACE_OF_PERFORMANCE));
        assert!(schema.contains(LOT_PLACE_OF_PERFORMANCE));
        assert!(schema.contains(NOTICE_ESTIMATED_VALUE));
        assert!(schema.contains(LOT_ESTIMATED_VALUE));
    }

    #[test]
    fn test_new_keeps_first_position_of_repeated_column() {
        let schema = Schema::new(["a", "b", "a", "c"]);
        assert_eq!(schema.columns(), &["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_fills_missing_and_drops_extra() {
        let schema = Schema::new(["a", "b", "c"]);
        let row: Row = [("c", "3"), ("a", "1"), ("zzz", "ignored")]
            .into_iter()
            .collect();

        assert_eq!(schema.normalize(&row), vec!["1", "", "3"]);
    }

    #[test]
    fn test_assemble_produces_rectangular_table() {
        let schema = Schema::new(["a", "b"]);
        let rows = vec![
            Row::new(),
            [("a", "1")].into_iter().collect(),
            [("b", "2"), ("x", "9")].into_iter().collect(),
        ];

        let table = schema.assemble(&rows);
        assert_eq!(
            table,
            vec![
                vec!["".to_string(), "".to_string()],
                vec!["1".to_string(), "".to_string()],
                vec!["".to_string(), "2".to_string()],
            ]
        );
    }

    #[test]
    fn test_with_extra_appends_new_columns_only() {
        let schema = Schema::new(["a", "b"]).with_extra(["b", "scraped_at"]);
        assert_eq!(schema.columns(), &["a", "b", "scraped_at"]);
    }

    #[test]
    fn test_merge_right_side_wins() {
        let mut row: Row = [("a", "notice"), ("b", "kept")].into_iter().collect();
        row.merge([("a", "lot")].into_iter().collect());

        assert_eq!(row.get("a"), Some("lot"));
        assert_eq!(row.get("b"), Some("kept"));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_retain_drops_other_columns() {
        let mut row: Row = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        row.retain(|c| c != "b");

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_blank_row_has_every_column_empty() {
        let row = Schema::ted().blank_row();
        assert_eq!(row.len(), TED_COLUMNS.len());
        assert!(TED_COLUMNS.iter().all(|c| row.get(c) == Some("")));
    }
}
