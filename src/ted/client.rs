use crate::{NoticeSource, ScraperError};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const TED_API_URL: &str = "https://tedweb.api.ted.europa.eu";
pub const DEFAULT_QUERY: &str =
    "(classification-cpv IN (44000000 45000000))  SORT BY publication-number DESC";

const SEARCH_PATH: &str = "/private-search/api/v1/notices/search";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";
const MAX_ERROR_BODY: usize = 500;

/// Fields requested from the search API for every notice.
pub const SEARCH_FIELDS: &[&str] = &[
    "publication-number",
    "notice-type",
    "buyer-name",
    "buyer-country",
    "buyer-legal-type",
    "contract-nature",
    "publication-date",
    "notice-title",
    "links",
    "business-opportunity",
    "cpv",
    "place-of-performance",
    "estimated-value",
    "awards",
    "lots",
    "procedure-type",
    "deadline-receipt-request",
    "change-notice-version-identifier",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    page: u32,
    limit: u32,
    fields: &'a [&'a str],
    validation: bool,
    scope: &'a str,
    language: &'a str,
    only_latest_versions: bool,
    facets: Value,
}

impl<'a> SearchRequest<'a> {
    fn new(query: &'a str, page: u32, limit: u32) -> Self {
        SearchRequest {
            query,
            page,
            limit,
            fields: SEARCH_FIELDS,
            validation: false,
            scope: "ALL",
            language: "EN",
            only_latest_versions: true,
            facets: json!({
                "business-opportunity": [],
                "cpv": [],
                "contract-nature": [],
                "place-of-performance": [],
                "procedure-type": [],
                "publication-date": [],
                "buyer-country": []
            }),
        }
    }
}

/// Client for the TED search and notice rendering endpoints.
#[derive(Debug, Clone)]
pub struct TedClient {
    base_url: String,
    query: String,
    http: reqwest::Client,
}

impl TedClient {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_base_url(TED_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://ted.europa.eu"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://ted.europa.eu/"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(TedClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            query: DEFAULT_QUERY.to_string(),
            http,
        })
    }

    /// Replaces the expert search query sent with every page request.
    pub fn with_query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = query.into();
        self
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ScraperError::HttpStatus {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}

#[async_trait::async_trait]
impl NoticeSource for TedClient {
    async fn search_page(&self, page: u32, limit: u32) -> Result<Value, ScraperError> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        debug!("Search page {} ({} per page)", page, limit);

        let response = self
            .http
            .post(&url)
            .json(&SearchRequest::new(&self.query, page, limit))
            .send()
            .await?;
        Ok(check_status(response).await?.json::<Value>().await?)
    }

    async fn notice_html(&self, notice_id: &str) -> Result<String, ScraperError> {
        let url = format!("{}/viewer/api/v1/render/{}/html", self.base_url, notice_id);
        debug!("Render notice {}", notice_id);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", "notice-type"),
                ("language", "EN"),
                ("termsToHighlight", ""),
            ])
            .send()
            .await?;
        let body = check_status(response).await?.json::<Value>().await?;

        body.get("noticeAsHtml")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or(ScraperError::MissingField("noticeAsHtml"))
    }
}
