use crate::{columns::*, utils::normalize_text, Extractor, Row, Schema};
use scraper::{ElementRef, Html};
use tracing::debug;

pub const DETAIL_URL_PREFIX: &str = "https://ted.europa.eu/en/notice/-/detail/";

/// Labels looked up on a rendered notice and the column each one fills.
pub const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("Official name", BUYER_NAME),
    ("Legal type of the buyer", BUYER_LEGAL_TYPE),
    ("Country", BUYER_COUNTRY),
    ("Legal basis", LEGAL_BASIS),
    ("Estimated value excluding VAT", NOTICE_ESTIMATED_VALUE),
    ("Main classification", MAIN_CPV),
    ("Duration", LOT_ESTIMATED_DURATION),
    (
        "The procurement is covered by the Government Procurement Agreement (GPA)",
        COVERED_BY_GPA,
    ),
    ("Winner selection status", WINNER_SELECTION_STATUS),
    ("Value of subcontracting", SUBCONTRACTING_VALUE),
    ("Date of the conclusion of the contract", CONTRACT_DATE),
    ("Publication date", PUBLICATION_DATE),
];

pub fn detail_url(notice_id: &str) -> String {
    format!("{}{}", DETAIL_URL_PREFIX, notice_id)
}

/// A rendered notice page together with the notice it was rendered for.
#[derive(Debug)]
pub struct DetailPage {
    pub notice_id: String,
    pub html: Html,
}

impl DetailPage {
    pub fn parse<S: Into<String>>(notice_id: S, html: &str) -> Self {
        DetailPage {
            notice_id: notice_id.into(),
            html: Html::parse_document(html),
        }
    }
}

/// Value printed next to `label` on a rendered notice.
///
/// The first element whose own text is `label` is located, then its closest
/// `div` ancestor. That container reads `label: value`. When the value part
/// is empty, the first `span` of the next sibling `div` holds it instead.
pub fn labelled_value(html: &Html, label: &str) -> Option<String> {
    let element = find_label(html, label)?;
    let container = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;

    let text = container.text().collect::<String>();
    let value = text
        .split_once(": ")
        .map(|(_, value)| normalize_text(value))
        .unwrap_or_default();
    if !value.is_empty() {
        return Some(value);
    }

    sibling_value(container)
}

fn find_label<'a>(html: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    html.root_element()
        .descendants()
        .filter(|node| matches!(node.value().as_text(), Some(text) if text.trim() == label))
        .find_map(|node| node.parent().and_then(ElementRef::wrap))
}

fn sibling_value(container: ElementRef) -> Option<String> {
    let sibling = container
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;
    let span = sibling
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "span")?;
    let text = span
        .children()
        .find_map(|node| node.value().as_text().map(|text| normalize_text(text)))?;

    Some(text).filter(|text| !text.is_empty())
}

/// Reads a rendered notice page by label, one row per page.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    fields: Vec<(String, String)>,
    schema: Schema,
}

impl Default for DetailExtractor {
    fn default() -> Self {
        DetailExtractor::new(DETAIL_FIELDS.iter().copied())
    }
}

impl DetailExtractor {
    /// `fields` pairs a label on the page with the column it fills.
    pub fn new<I, L, C>(fields: I) -> Self
    where
        I: IntoIterator<Item = (L, C)>,
        L: Into<String>,
        C: Into<String>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(label, column)| (label.into(), column.into()))
            .collect();
        let schema = Schema::ted().with_extra(fields.iter().map(|(_, column)| column.clone()));
        DetailExtractor { fields, schema }
    }
}

impl Extractor for DetailExtractor {
    type Document = DetailPage;

    fn extract(&self, page: &DetailPage) -> Vec<Row> {
        let mut row = self.schema.blank_row();
        row.set(NOTICE_NUMBER, page.notice_id.as_str());
        row.set(DETAIL_URL, detail_url(&page.notice_id));

        for (label, column) in &self.fields {
            match labelled_value(&page.html, label) {
                Some(value) => row.set(column.as_str(), value),
                None => debug!("[{}] No value for `{}`", page.notice_id, label),
            }
        }

        vec![row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> DetailPage {
        DetailPage::parse("123456-2024", &format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn test_value_after_separator() {
        let page = page(
            r#"<div><span class="label">Official name</span><span>: </span><span>Stadt Wien</span></div>"#,
        );
        assert_eq!(
            labelled_value(&page.html, "Official name"),
            Some("Stadt Wien".to_string())
        );
    }

    #[test]
    fn test_value_is_cleaned() {
        let page = page(
            "<div><span>Estimated value excluding VAT</span>: 1\u{a0}500\u{a0}000,00 EUR\\n</div>",
        );
        assert_eq!(
            labelled_value(&page.html, "Estimated value excluding VAT"),
            Some("1 500 000,00 EUR".to_string())
        );
    }

    #[test]
    fn test_value_from_sibling_container() {
        let page = page(
            r#"<section>
                <div><span>Winner selection status</span>: </div>
                <p>ignored</p>
                <div><span>At least one winner was chosen.</span><span>not this</span></div>
            </section>"#,
        );
        assert_eq!(
            labelled_value(&page.html, "Winner selection status"),
            Some("At least one winner was chosen.".to_string())
        );
    }

    #[test]
    fn test_first_matching_label_wins() {
        let page = page(
            r#"<div><span>Country</span>: Austria</div>
               <div><span>Country</span>: Germany</div>"#,
        );
        assert_eq!(labelled_value(&page.html, "Country"), Some("Austria".to_string()));
    }

    #[test]
    fn test_label_must_match_exactly() {
        let page = page(r#"<div><span>Country code</span>: AT</div>"#);
        assert_eq!(labelled_value(&page.html, "Country"), None);
    }

    #[test]
    fn test_extract_fills_every_field() {
        let page = page(
            r#"<div><span>Official name</span>: Stadt Wien</div>
               <div><span>Legal basis</span>: Directive 2014/24/EU</div>"#,
        );
        let rows = DetailExtractor::default().extract(&page);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.get(NOTICE_NUMBER), Some("123456-2024"));
        assert_eq!(
            row.get(DETAIL_URL),
            Some("https://ted.europa.eu/en/notice/-/detail/123456-2024")
        );
        assert_eq!(row.get(BUYER_NAME), Some("Stadt Wien"));
        assert_eq!(row.get(LEGAL_BASIS), Some("Directive 2014/24/EU"));
        assert_eq!(row.get(CONTRACT_DATE), Some(""));
        assert_eq!(row.get(LOT_IDENTIFIER), Some(""));
        assert!(row.columns().eq(Schema::ted().blank_row().columns()));
    }

    #[test]
    fn test_custom_fields_widen_the_schema() {
        let page = page(r#"<div><span>Type of procedure</span>: Open</div>"#);
        let extractor = DetailExtractor::new([("Type of procedure", "procedure_kind")]);
        let row = &extractor.extract(&page)[0];

        assert_eq!(row.get("procedure_kind"), Some("Open"));
        assert_eq!(row.len(), Schema::ted().columns().len() + 1);
    }
}
