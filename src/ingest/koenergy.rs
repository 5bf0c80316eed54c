//! KOEN generation-data portal client.
//!
//! The portal hands out CSV through a two-step dance: a GET on the
//! download page establishes session state (a server-issued cookie), then
//! a form-encoded POST against the CSV endpoint, presenting the page URL
//! as Referer, returns the data. Both steps carry the same filter fields
//! and window bounds. One client, with its cookie store, is shared across
//! every window of a run; losing the session mid-run is a fatal
//! transport failure.

use std::time::Duration;

use crate::config::CollectorConfig;
use crate::model::{CollectError, DateWindow, FetchFilters, RawResponse};

pub const DEFAULT_BASE_URL: &str = "https://www.koenergy.kr";

/// Menu code of the generation-data download page.
pub const DEFAULT_MENU_CD: &str = "FN0912020217";

const DOWNLOAD_PAGE_PATH: &str = "/kosep/gv/nf/dt/nfdt21/main.do";
const CSV_DOWNLOAD_PATH: &str = "/kosep/gv/nf/dt/nfdt21/csvDown.do";

/// The portal rejects non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0";

// ---------------------------------------------------------------------------
// Fetch abstraction
// ---------------------------------------------------------------------------

/// Per-window fetch seam. The collection loop is written against this
/// trait so tests can drive it with a scripted fetcher instead of the
/// live portal.
pub trait WindowFetcher {
    fn fetch_window(
        &mut self,
        filters: &FetchFilters,
        window: &DateWindow,
    ) -> Result<RawResponse, CollectError>;
}

// ---------------------------------------------------------------------------
// Portal client
// ---------------------------------------------------------------------------

pub struct KoenergyClient {
    http: reqwest::blocking::Client,
    base_url: String,
    menu_cd: String,
    data_timeout: Duration,
}

impl KoenergyClient {
    /// Builds the client with the session cookie store enabled. The
    /// client-level timeout covers the priming request; the data request
    /// gets its own, longer timeout per call.
    pub fn new(cfg: &CollectorConfig) -> Result<Self, CollectError> {
        let http = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.prime_timeout_secs))
            .build()
            .map_err(|e| CollectError::Io(format!("failed to build HTTP client: {}", e)))?;

        Ok(KoenergyClient {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            menu_cd: cfg.menu_cd.clone(),
            data_timeout: Duration::from_secs(cfg.data_timeout_secs),
        })
    }

    /// Download-page URL carrying the filter fields and window bounds.
    /// Doubles as the Referer of the data request, matching what the
    /// portal sees from a real browser.
    pub fn page_url(&self, filters: &FetchFilters, window: &DateWindow) -> String {
        format!(
            "{}{}?pageIndex={}&menuCd={}&xmlText=&strOrgNo={}&strHokiS={}&strHokiE={}&strDateS={}&strDateE={}",
            self.base_url,
            DOWNLOAD_PAGE_PATH,
            filters.page_index,
            self.menu_cd,
            filters.org_value(),
            filters.hoki_s_value(),
            filters.hoki_e_value(),
            window.start.format("%Y%m%d"),
            window.end.format("%Y%m%d"),
        )
    }

    fn csv_url(&self) -> String {
        format!("{}{}", self.base_url, CSV_DOWNLOAD_PATH)
    }

    fn transport(window: &DateWindow, detail: String) -> CollectError {
        CollectError::Transport {
            window: *window,
            detail,
        }
    }
}

impl WindowFetcher for KoenergyClient {
    fn fetch_window(
        &mut self,
        filters: &FetchFilters,
        window: &DateWindow,
    ) -> Result<RawResponse, CollectError> {
        let page_url = self.page_url(filters, window);

        // Priming request. The response body is irrelevant; the point is
        // the Set-Cookie the portal attaches, which the cookie store
        // re-presents on the data request.
        let prime = self
            .http
            .get(&page_url)
            .send()
            .map_err(|e| Self::transport(window, format!("priming request failed: {}", e)))?;
        if !prime.status().is_success() {
            return Err(Self::transport(
                window,
                format!("HTTP {} from priming request", prime.status()),
            ));
        }

        let date_s = window.start.format("%Y%m%d").to_string();
        let date_e = window.end.format("%Y%m%d").to_string();
        let form: [(&str, &str); 9] = [
            ("pageIndex", filters.page_index.as_str()),
            ("menuCd", self.menu_cd.as_str()),
            ("xmlText", ""),
            ("strOrgNo", filters.org_value()),
            ("strHokiS", filters.hoki_s_value()),
            ("strHokiE", filters.hoki_e_value()),
            ("strDateS", date_s.as_str()),
            ("strDateE", date_e.as_str()),
            // The browser leaves this blank; the portal accepts it blank.
            ("ptSignature", ""),
        ];

        let response = self
            .http
            .post(self.csv_url())
            .header("Origin", &self.base_url)
            .header("Referer", &page_url)
            .timeout(self.data_timeout)
            .form(&form)
            .send()
            .map_err(|e| Self::transport(window, format!("data request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Self::transport(
                window,
                format!("HTTP {} from data request", response.status()),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .bytes()
            .map_err(|e| Self::transport(window, format!("failed to read response body: {}", e)))?
            .to_vec();

        Ok(RawResponse { body, content_type })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        DateWindow {
            start: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
        }
    }

    fn client() -> KoenergyClient {
        KoenergyClient::new(&CollectorConfig::default()).expect("client should build")
    }

    #[test]
    fn test_page_url_carries_window_and_empty_all_filters() {
        let url = client().page_url(&FetchFilters::all(), &window());
        assert!(url.starts_with("https://www.koenergy.kr/kosep/gv/nf/dt/nfdt21/main.do?"));
        assert!(url.contains("strOrgNo=&"), "all-sentinel must serialize as empty");
        assert!(url.contains("strDateS=20251101"));
        assert!(url.contains("strDateE=20251130"));
        assert!(url.contains(&format!("menuCd={}", DEFAULT_MENU_CD)));
    }

    #[test]
    fn test_page_url_carries_concrete_filters() {
        let mut filters = FetchFilters::for_plant("84S1");
        filters.hoki_s = Some("1".to_string());
        filters.hoki_e = Some("2".to_string());
        let url = client().page_url(&filters, &window());
        assert!(url.contains("strOrgNo=84S1"));
        assert!(url.contains("strHokiS=1"));
        assert!(url.contains("strHokiE=2"));
    }

    #[test]
    fn test_trailing_slash_in_base_url_is_tolerated() {
        let cfg = CollectorConfig {
            base_url: "https://www.koenergy.kr/".to_string(),
            ..CollectorConfig::default()
        };
        let client = KoenergyClient::new(&cfg).unwrap();
        let url = client.page_url(&FetchFilters::all(), &window());
        assert!(!url.contains(".kr//"), "no doubled slash in {}", url);
    }
}
