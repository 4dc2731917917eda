//! World Bank indicator API connector.
//!
//! The API serves paged JSON: each response body is a two-element array
//! `[metadata, records]`, and `metadata.page` / `metadata.pages` drive
//! pagination. This module provides:
//!
//! - [`PageSource`]: the transport seam (one page per call)
//! - [`Pages`]: a lazy iterator, one request per `next()`
//! - [`WorldBankConnector`]: client + query state, with restart semantics

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::QuerySpec;
use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Fixed per-request timeout. Timeouts are fatal for the fetch; there is no
/// retry or backoff.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One record as returned by the API, flat or nested.
pub type RawRecord = Map<String, Value>;

/// Page-level metadata, the first element of every response.
///
/// Only `page` and `pages` drive control flow; the remaining fields are
/// carried through for diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub sourceid: Option<String>,
    #[serde(default)]
    pub lastupdated: Option<String>,
}

impl PageInfo {
    /// `lastupdated` parsed as a calendar date, when present and well-formed.
    pub fn last_updated(&self) -> Option<NaiveDate> {
        self.lastupdated
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }
}

/// A parsed `[metadata, records]` response.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub info: PageInfo,
    pub records: Vec<RawRecord>,
}

/// The mutable request state shared across fetches of one query.
///
/// Starts at page 1. Kept as its own struct rather than hidden in the HTTP
/// client's default parameters, so ownership of the mutation is visible at
/// the call site.
#[derive(Debug)]
pub struct PageCursor {
    page: u32,
}

impl PageCursor {
    pub fn new() -> Self {
        Self { page: 1 }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Return to page 1 so the same cursor can drive a fresh drain.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    fn advance(&mut self) {
        self.page += 1;
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport seam for fetching one page of a query.
///
/// The production implementation is [`HttpPageSource`]; tests substitute
/// canned pages here instead of standing up an HTTP server.
pub trait PageSource {
    fn fetch_page(&self, page: u32) -> Result<PageResponse, AppError>;
}

/// HTTP implementation of [`PageSource`] over the blocking reqwest client.
pub struct HttpPageSource<'a> {
    client: &'a Client,
    url: String,
    date: String,
}

impl<'a> HttpPageSource<'a> {
    pub fn new(client: &'a Client, url: String, date: String) -> Self {
        Self { client, url, date }
    }
}

impl PageSource for HttpPageSource<'_> {
    fn fetch_page(&self, page: u32) -> Result<PageResponse, AppError> {
        debug!(page, url = %self.url, "requesting page");

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "json"),
                ("date", self.date.as_str()),
                ("page", page.to_string().as_str()),
            ])
            .send()
            .map_err(|e| AppError::Transport {
                page,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::TransportStatus {
                page,
                status: status.as_u16(),
            });
        }

        let body: Value = resp.json().map_err(|e| AppError::MalformedResponse {
            page,
            message: format!("body is not JSON: {e}"),
        })?;

        parse_page(page, body)
    }
}

/// Parse a response body into `[metadata, records]`.
pub fn parse_page(page: u32, body: Value) -> Result<PageResponse, AppError> {
    let malformed = |message: String| AppError::MalformedResponse { page, message };

    let Value::Array(parts) = body else {
        return Err(malformed("body is not a JSON array".into()));
    };
    if parts.len() != 2 {
        return Err(malformed(format!(
            "expected a two-element [metadata, records] array, got {} elements",
            parts.len()
        )));
    }

    let mut parts = parts.into_iter();
    let info_value = parts.next().unwrap_or(Value::Null);
    let records_value = parts.next().unwrap_or(Value::Null);

    let info: PageInfo = serde_json::from_value(info_value)
        .map_err(|e| malformed(format!("invalid page metadata: {e}")))?;
    let records: Vec<RawRecord> = serde_json::from_value(records_value)
        .map_err(|e| malformed(format!("invalid records element: {e}")))?;

    Ok(PageResponse { info, records })
}

/// Lazy, finite page iterator.
///
/// Each `next()` fetches the cursor's current page. The sequence is terminal
/// once the reported page reaches the reported page count; otherwise the
/// cursor advances. A fetch error is yielded once and fuses the iterator, so
/// no further requests are issued.
pub struct Pages<'a, S: PageSource> {
    source: &'a S,
    cursor: &'a mut PageCursor,
    done: bool,
}

impl<'a, S: PageSource> Pages<'a, S> {
    pub fn new(source: &'a S, cursor: &'a mut PageCursor) -> Self {
        Self {
            source,
            cursor,
            done: false,
        }
    }
}

impl<S: PageSource> Iterator for Pages<'_, S> {
    type Item = Result<Vec<RawRecord>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let response = match self.source.fetch_page(self.cursor.page()) {
            Ok(response) => response,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let info = &response.info;
        debug!(
            page = info.page,
            pages = info.pages,
            total = info.total,
            last_updated = ?info.last_updated(),
            records = response.records.len(),
            "received page"
        );

        if info.page >= info.pages {
            self.done = true;
        } else {
            self.cursor.advance();
        }

        Some(Ok(response.records))
    }
}

/// Collect every page from `source` in page order.
///
/// The first error aborts the drain; nothing collected so far is returned.
pub fn drain<S: PageSource>(
    source: &S,
    cursor: &mut PageCursor,
) -> Result<Vec<RawRecord>, AppError> {
    let mut records = Vec::new();
    for batch in Pages::new(source, cursor) {
        records.extend(batch?);
    }
    Ok(records)
}

/// Connector owning the HTTP client and the request state for one query.
pub struct WorldBankConnector {
    client: Client,
    base_url: String,
    spec: QuerySpec,
    cursor: PageCursor,
}

impl WorldBankConnector {
    pub fn new(spec: QuerySpec) -> Result<Self, AppError> {
        Self::with_base_url(spec, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(spec: QuerySpec, base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Transport {
                page: 0,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            spec,
            cursor: PageCursor::new(),
        })
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Drain every page of the query into one ordered record list.
    ///
    /// The cursor is reset first, so calling this twice on the same connector
    /// performs two full fetches of the same query.
    pub fn fetch_all(&mut self) -> Result<Vec<RawRecord>, AppError> {
        self.cursor.reset();
        let source = HttpPageSource::new(
            &self.client,
            self.spec.url(&self.base_url),
            self.spec.dates.param(),
        );
        drain(&source, &mut self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn can_page() -> Value {
        json!([
            {
                "page": 1,
                "pages": 2,
                "per_page": 1,
                "total": 2,
                "sourceid": "2",
                "lastupdated": "2024-05-30"
            },
            [
                {
                    "indicator": {"id": "SP.POP.TOTL", "value": "Population, total"},
                    "country": {"id": "CA", "value": "Canada"},
                    "countryiso3code": "CAN",
                    "date": "2000",
                    "value": 30685730,
                    "unit": "",
                    "obs_status": "",
                    "decimal": 0
                }
            ]
        ])
    }

    fn usa_page() -> Value {
        json!([
            {
                "page": 2,
                "pages": 2,
                "per_page": 1,
                "total": 2,
                "sourceid": "2",
                "lastupdated": "2024-05-30"
            },
            [
                {
                    "indicator": {"id": "SP.POP.TOTL", "value": "Population, total"},
                    "country": {"id": "US", "value": "United States"},
                    "countryiso3code": "USA",
                    "date": "2000",
                    "value": 282162411,
                    "unit": "",
                    "obs_status": "",
                    "decimal": 0
                }
            ]
        ])
    }

    /// Serves canned page bodies, standing in for the HTTP transport.
    struct FixtureSource {
        pages: Vec<Value>,
    }

    impl PageSource for FixtureSource {
        fn fetch_page(&self, page: u32) -> Result<PageResponse, AppError> {
            let idx = (page - 1) as usize;
            let body = self.pages.get(idx).cloned().ok_or(AppError::TransportStatus {
                page,
                status: 404,
            })?;
            parse_page(page, body)
        }
    }

    /// Fails for every page past the first.
    struct FailingSource;

    impl PageSource for FailingSource {
        fn fetch_page(&self, page: u32) -> Result<PageResponse, AppError> {
            if page == 1 {
                parse_page(page, can_page())
            } else {
                Err(AppError::TransportStatus { page, status: 502 })
            }
        }
    }

    #[test]
    fn drains_all_pages_in_order() {
        let source = FixtureSource {
            pages: vec![can_page(), usa_page()],
        };
        let mut cursor = PageCursor::new();

        let records = drain(&source, &mut cursor).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["countryiso3code"], json!("CAN"));
        assert_eq!(records[1]["countryiso3code"], json!("USA"));
        // Counter ends at the reported page count.
        assert_eq!(cursor.page(), 2);
    }

    #[test]
    fn single_page_yields_one_batch() {
        let body = json!([
            {"page": 1, "pages": 1, "per_page": 50, "total": 1},
            [{"date": "2000", "value": 1}]
        ]);
        let source = FixtureSource { pages: vec![body] };
        let mut cursor = PageCursor::new();

        let batches: Vec<_> = Pages::new(&source, &mut cursor).collect();

        assert_eq!(batches.len(), 1);
        assert_eq!(cursor.page(), 1);
    }

    #[test]
    fn first_page_reporting_past_the_end_terminates_immediately() {
        // Metadata already at/over the page count: exactly one batch.
        let body = json!([
            {"page": 3, "pages": 2, "per_page": 50, "total": 0},
            []
        ]);
        let source = FixtureSource { pages: vec![body] };
        let mut cursor = PageCursor::new();

        let records = drain(&source, &mut cursor).unwrap();

        assert!(records.is_empty());
        assert_eq!(cursor.page(), 1);
    }

    #[test]
    fn transport_error_aborts_the_drain() {
        let mut cursor = PageCursor::new();
        let result = drain(&FailingSource, &mut cursor);
        assert_matches!(
            result,
            Err(AppError::TransportStatus { page: 2, status: 502 })
        );
    }

    #[test]
    fn error_fuses_the_iterator() {
        let mut cursor = PageCursor::new();
        let mut pages = Pages::new(&FailingSource, &mut cursor);

        assert_matches!(pages.next(), Some(Ok(_)));
        assert_matches!(pages.next(), Some(Err(_)));
        assert_matches!(pages.next(), None);
    }

    #[test]
    fn reset_makes_a_drain_repeatable() {
        let source = FixtureSource {
            pages: vec![can_page(), usa_page()],
        };
        let mut cursor = PageCursor::new();

        let first = drain(&source, &mut cursor).unwrap();
        cursor.reset();
        let second = drain(&source, &mut cursor).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn parse_page_rejects_non_pair_bodies() {
        assert_matches!(
            parse_page(1, json!({"page": 1})),
            Err(AppError::MalformedResponse { page: 1, .. })
        );
        assert_matches!(
            parse_page(1, json!([{"page": 1, "pages": 1}])),
            Err(AppError::MalformedResponse { .. })
        );
        assert_matches!(
            parse_page(1, json!([{"page": 1, "pages": 1}, [], []])),
            Err(AppError::MalformedResponse { .. })
        );
        // Records element must be an array of objects.
        assert_matches!(
            parse_page(1, json!([{"page": 1, "pages": 1}, "rows"])),
            Err(AppError::MalformedResponse { .. })
        );
    }

    #[test]
    fn page_info_carries_passthrough_fields() {
        let response = parse_page(1, can_page()).unwrap();
        let info = response.info;
        assert_eq!(info.page, 1);
        assert_eq!(info.pages, 2);
        assert_eq!(info.per_page, Some(1));
        assert_eq!(info.total, Some(2));
        assert_eq!(info.sourceid.as_deref(), Some("2"));
        assert_eq!(
            info.last_updated(),
            NaiveDate::from_ymd_opt(2024, 5, 30)
        );
    }
}
