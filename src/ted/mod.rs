//! Extraction of TED procurement notices, from search API pages (JSON) and
//! from rendered notice pages (HTML).

use crate::utils::is_publication_number;
use serde_json::Value;

mod client;
mod detail;
mod fields;
mod notice;

pub use client::{TedClient, DEFAULT_QUERY, SEARCH_FIELDS, TED_API_URL};
pub use detail::{detail_url, labelled_value, DetailExtractor, DetailPage, DETAIL_FIELDS};
pub use fields::{keys, multilingual, Money, PREFERRED_LANGUAGE};
pub use notice::{Award, Lot, Notice, NoticeExtractor};

/// The `notices` list of a search page, `None` when the page has none
/// (e.g. an error object).
pub fn notice_list(page: &Value) -> Option<&[Value]> {
    page.get("notices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// Notices of a search page; anything but a list under `notices` is empty.
pub fn notices(page: &Value) -> &[Value] {
    notice_list(page).unwrap_or_default()
}

pub fn total_notice_count(page: &Value) -> Option<u64> {
    page.get("totalNoticeCount").and_then(Value::as_u64)
}

/// Publication numbers of a search page, split into usable ids and
/// rejected ones. Ids end up in a request path, so only `digits-digits`
/// passes. A notice without an id is rejected as `""`.
pub fn publication_numbers(page: &Value) -> (Vec<String>, Vec<String>) {
    notices(page)
        .iter()
        .map(|notice| {
            keys::PUBLICATION_NUMBER
                .iter()
                .find_map(|key| notice.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        })
        .partition(|id| is_publication_number(id))
}
