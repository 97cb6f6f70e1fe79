use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, REFERER,
    USER_AGENT,
};
use reqwest::StatusCode;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, StoreConfig, ENV_COOKIE};
use crate::review::{SortOrder, StarRating};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("session cookie rejected with status {0}; copy a fresh cookie from the browser")]
    SessionExpired(u16),
    #[error("request failed with status {0}")]
    Status(u16),
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid header {name}: {message}")]
    Header { name: String, message: String },
}

/// Anything that can return one page of reviews for a sort/rating pair.
pub trait ReviewSource {
    fn fetch(&self, sort: SortOrder, rating: StarRating, limit: u32) -> Result<Value, FetchError>;
}

/// Splits a `Cookie` header copied from the browser into name/value pairs.
/// Pairs without `=` are dropped; values keep any further `=` characters.
pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .map(str::trim)
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim().to_string()))
            }
        })
        .collect()
}

/// Refuses to start a run without cookie pairs or with a session whose
/// recorded expiry has passed.
pub fn check_session(session: &SessionConfig, now: DateTime<Utc>) -> anyhow::Result<()> {
    if parse_cookie_header(&session.cookie).is_empty() {
        bail!("No session cookie; set [session].cookie, {ENV_COOKIE} or --cookie");
    }
    match session.expires {
        Some(_) if session.is_expired(now) => {
            bail!("Session cookie expired; copy a fresh one from the browser")
        }
        Some(expires) => info!(%expires, "using pasted session cookie"),
        None => warn!("cookie expiry unknown; requests fail once the session lapses"),
    }
    Ok(())
}

fn join_cookies(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|e| FetchError::Header {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// The header set the App Store Connect web UI sends with its XHRs.
pub fn build_headers(store: &StoreConfig, session: &SessionConfig) -> Result<HeaderMap, FetchError> {
    let referer = format!(
        "https://appstoreconnect.apple.com/apps/{}/distribution/ratings/{}",
        store.app_id, store.platform
    );
    let cookies = parse_cookie_header(&session.cookie);

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.api+json, application/json, text/csv"),
    );
    headers.insert(ACCEPT_LANGUAGE, header_value("accept-language", &store.accept_language)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(REFERER, header_value("referer", &referer)?);
    headers.insert(USER_AGENT, header_value("user-agent", &store.user_agent)?);
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        header_value("sec-ch-ua", &store.sec_ch_ua)?,
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        header_value("sec-ch-ua-platform", &store.sec_ch_ua_platform)?,
    );
    for (name, value) in [
        ("sec-ch-ua-mobile", "?0"),
        ("priority", "u=1, i"),
        ("sec-fetch-dest", "empty"),
        ("sec-fetch-mode", "cors"),
        ("sec-fetch-site", "same-origin"),
        ("x-csrf-itc", "[asc-ui]"),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if !cookies.is_empty() {
        headers.insert(COOKIE, header_value("cookie", &join_cookies(&cookies))?);
    }
    Ok(headers)
}

pub fn reviews_url(store: &StoreConfig, sort: SortOrder, rating: StarRating, limit: u32) -> String {
    format!(
        "{}/apps/{}/platforms/{}/reviews?limit={}&sort={}&rating={}",
        store.base_url.trim_end_matches('/'),
        store.app_id,
        store.platform,
        limit,
        sort.api_name(),
        rating.api_name()
    )
}

/// 401/403 mean the pasted session is no longer accepted.
pub fn check_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::SessionExpired(status.as_u16()))
        }
        status => Err(FetchError::Status(status.as_u16())),
    }
}

pub struct StoreClient {
    client: Client,
    store: StoreConfig,
}

impl StoreClient {
    pub fn new(store: &StoreConfig, session: &SessionConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .default_headers(build_headers(store, session)?)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(StoreClient {
            client,
            store: store.clone(),
        })
    }
}

impl ReviewSource for StoreClient {
    fn fetch(&self, sort: SortOrder, rating: StarRating, limit: u32) -> Result<Value, FetchError> {
        let url = reviews_url(&self.store, sort, rating, limit);
        debug!(%url, "requesting reviews");

        let response = self.client.get(&url).send()?;
        check_status(response.status())?;
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}
