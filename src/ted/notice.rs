use super::fields::{self, keys, Money, PREFERRED_LANGUAGE};
use crate::{
    columns::*,
    utils::{first_or_self, lookup, text, text_of},
    Extractor, Row, Schema,
};
use serde_json::Value;

static EMPTY: Value = Value::Null;

/// Read-only view over one notice of a search result page.
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    raw: &'a Value,
    language: &'a str,
}

/// Read-only view over one lot of a notice. A placeholder lot views `null`
/// and resolves every field to empty.
#[derive(Debug, Clone, Copy)]
pub struct Lot<'a> {
    raw: &'a Value,
    language: &'a str,
}

/// Outcome of a lot, or of a notice that is not divided into lots.
#[derive(Debug, Clone, Copy)]
pub struct Award<'a> {
    raw: &'a Value,
    language: &'a str,
}

impl<'a> Notice<'a> {
    pub fn new(raw: &'a Value, language: &'a str) -> Self {
        Notice { raw, language }
    }

    pub fn lots(&self) -> Vec<Lot<'a>> {
        let lots: Vec<&Value> = match lookup(self.raw, keys::LOTS) {
            Some(Value::Array(lots)) => lots.iter().collect(),
            Some(lot @ Value::Object(_)) => vec![lot],
            _ => vec![],
        };
        lots.into_iter()
            .map(|raw| Lot::new(raw, self.language))
            .collect()
    }

    /// Notice-level award, used when the notice has no lots.
    pub fn award(&self) -> Award<'a> {
        Award::new(
            lookup(self.raw, keys::AWARDS)
                .and_then(first_or_self)
                .unwrap_or(&EMPTY),
            self.language,
        )
    }

    fn buyer_name(&self) -> String {
        let name = fields::multilingual(lookup(self.raw, keys::BUYER_NAME), self.language);
        if !name.is_empty() {
            return name;
        }
        fields::first_multilingual(
            lookup(self.raw, keys::BUYER).and_then(first_or_self),
            keys::WINNER_NAME,
            self.language,
        )
    }

    fn buyer_legal_type(&self) -> String {
        lookup(self.raw, keys::BUYER_LEGAL_TYPE)
            .or_else(|| {
                lookup(self.raw, keys::BUYER)
                    .and_then(first_or_self)
                    .and_then(|buyer| lookup(buyer, keys::BUYER_LEGAL_TYPE))
            })
            .map(text_of)
            .unwrap_or_default()
    }

    fn link(&self) -> String {
        let html = lookup(self.raw, keys::LINKS).and_then(|links| lookup(links, keys::HTML_LINKS));
        fields::multilingual(html, self.language)
    }

    pub fn fields(&self) -> Row {
        let raw = self.raw;
        let estimated = Money::from_value(lookup(raw, keys::ESTIMATED_VALUE));

        let mut row = Row::new();
        row.set(NOTICE_NUMBER, text(lookup(raw, keys::PUBLICATION_NUMBER)));
        row.set(NOTICE_TYPE, text(lookup(raw, keys::NOTICE_TYPE)));
        row.set(BUSINESS_OPPORTUNITY, text(lookup(raw, keys::BUSINESS_OPPORTUNITY)));
        row.set(PUBLICATION_DATE, text(lookup(raw, keys::PUBLICATION_DATE)));
        row.set(PROCEDURE_TYPE, text(lookup(raw, keys::PROCEDURE_TYPE)));
        row.set(CONTRACT_NATURE, text(lookup(raw, keys::CONTRACT_NATURE)));
        row.set(DEADLINE, text(lookup(raw, keys::DEADLINE)));
        row.set(CHANGE_VERSION, text(lookup(raw, keys::CHANGE_VERSION)));
        row.set(BUYER_NAME, self.buyer_name());
        row.set(BUYER_LEGAL_TYPE, self.buyer_legal_type());
        row.set(BUYER_COUNTRY, fields::places(lookup(raw, keys::BUYER_COUNTRY)));
        row.set(TITLE, fields::multilingual(lookup(raw, keys::NOTICE_TITLE), self.language));
        row.set(LINK, self.link());
        row.set(MAIN_CPV, fields::code(lookup(raw, keys::CPV)));
        row.set(
            NOTICE_PLACE_OF_PERFORMANCE,
            fields::places(lookup(raw, keys::PLACE_OF_PERFORMANCE)),
        );
        row.set(NOTICE_ESTIMATED_VALUE, estimated.amount);
        row.set(NOTICE_ESTIMATED_CURRENCY, estimated.currency);
        row
    }
}

impl<'a> Lot<'a> {
    pub fn new(raw: &'a Value, language: &'a str) -> Self {
        Lot { raw, language }
    }

    pub fn placeholder(language: &'a str) -> Self {
        Lot::new(&EMPTY, language)
    }

    pub fn award(&self) -> Award<'a> {
        Award::new(
            lookup(self.raw, keys::AWARDS)
                .and_then(first_or_self)
                .unwrap_or(&EMPTY),
            self.language,
        )
    }

    fn cpv(&self) -> String {
        let purpose_cpv = lookup(self.raw, keys::PURPOSE)
            .and_then(first_or_self)
            .and_then(|purpose| lookup(purpose, keys::CPV));
        fields::code(purpose_cpv.or_else(|| lookup(self.raw, keys::CPV)))
    }

    fn duration(&self) -> String {
        match lookup(self.raw, keys::ESTIMATED_DURATION).and_then(first_or_self) {
            Some(duration @ Value::Object(_)) => text(lookup(duration, keys::DURATION)),
            other => text(other),
        }
    }

    pub fn fields(&self) -> Row {
        let raw = self.raw;
        let estimated = Money::from_value(lookup(raw, keys::ESTIMATED_VALUE));

        let mut row = Row::new();
        row.set(LOT_IDENTIFIER, text(lookup(raw, keys::LOT_IDENTIFIER)));
        row.set(
            LOT_TITLE,
            fields::multilingual(lookup(raw, keys::LOT_TITLE), self.language),
        );
        row.set(LOT_CPV, self.cpv());
        row.set(
            LOT_PLACE_OF_PERFORMANCE,
            fields::places(lookup(raw, keys::PLACE_OF_PERFORMANCE)),
        );
        row.set(LOT_ESTIMATED_VALUE, estimated.amount);
        row.set(LOT_ESTIMATED_CURRENCY, estimated.currency);
        row.set(LOT_ESTIMATED_DURATION, self.duration());
        row
    }
}

impl<'a> Award<'a> {
    pub fn new(raw: &'a Value, language: &'a str) -> Self {
        Award { raw, language }
    }

    pub fn winner_name(&self) -> String {
        fields::first_multilingual(
            lookup(self.raw, keys::WINNER).and_then(first_or_self),
            keys::WINNER_NAME,
            self.language,
        )
    }

    pub fn fields(&self) -> Row {
        let raw = self.raw;
        let value = Money::from_value(lookup(raw, keys::AWARD_VALUE));

        let mut row = Row::new();
        row.set(
            WINNER_SELECTION_STATUS,
            text(lookup(raw, keys::WINNER_SELECTION_STATUS)),
        );
        row.set(REASON_NO_WINNER, text(lookup(raw, keys::REASON_NO_WINNER)));
        row.set(WINNER_NAME, self.winner_name());
        row.set(WINNER_VALUE, value.amount);
        row.set(WINNER_CURRENCY, value.currency);
        row.set(CONTRACT_DATE, text(lookup(raw, keys::CONTRACT_DATE)));
        row
    }
}

/// Flattens search API notices: one row per lot, or a single row when the
/// notice has no lots.
#[derive(Debug, Clone)]
pub struct NoticeExtractor {
    language: String,
    schema: Schema,
}

impl Default for NoticeExtractor {
    fn default() -> Self {
        NoticeExtractor::new(PREFERRED_LANGUAGE)
    }
}

impl NoticeExtractor {
    pub fn new<S: Into<String>>(language: S) -> Self {
        NoticeExtractor {
            language: language.into(),
            schema: Schema::ted(),
        }
    }

    /// Restricts the rows to `schema`: its columns not filled by a notice
    /// stay empty, other notice fields are left out.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }
}

impl Extractor for NoticeExtractor {
    type Document = Value;

    fn extract(&self, doc: &Value) -> Vec<Row> {
        let notice = Notice::new(doc, &self.language);
        let mut base = self.schema.blank_row();
        base.merge(notice.fields());

        let lots = notice.lots();
        let mut rows: Vec<Row> = if lots.is_empty() {
            let mut row = base;
            row.merge(Lot::placeholder(&self.language).fields());
            row.merge(notice.award().fields());
            vec![row]
        } else {
            lots.iter()
                .map(|lot| {
                    let mut row = base.clone();
                    row.merge(lot.fields());
                    row.merge(lot.award().fields());
                    row
                })
                .collect()
        };

        for row in &mut rows {
            row.retain(|column| self.schema.contains(column));
        }
        rows
    }
}
