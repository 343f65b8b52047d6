//! Test requests -- URL normalization and validation.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;
use thiserror::Error;

/// Reasons a submission never becomes a [`TestRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no URL specified")]
    MissingUrl,

    /// Carries the normalized text that failed to parse.
    #[error("Could not parse URL: {0}")]
    InvalidUrl(String),
}

fn scheme_prefix() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("static regex"))
}

/// A normalized URL to test, plus the optional address to notify.
///
/// Only [`TestRequest::parse`] builds one, so every instance has a scheme and
/// a non-empty host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    target: String,
    url: Url,
    email: Option<String>,
}

impl TestRequest {
    /// Validate and normalize a raw submission.
    ///
    /// A target without a `scheme://` prefix is treated as `http://<target>`.
    pub fn parse(raw_url: &str, raw_email: Option<&str>) -> Result<Self, RequestError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(RequestError::MissingUrl);
        }

        let target = if scheme_prefix().is_match(raw_url) {
            raw_url.to_string()
        } else {
            format!("http://{raw_url}")
        };

        let url = match Url::parse(&target) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => url,
            _ => return Err(RequestError::InvalidUrl(target)),
        };

        let email = raw_email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(Self { target, url, email })
    }

    /// The normalized URL as submitted, used in responses, tool arguments and emails.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The parsed form; two requests are duplicates when these are equal.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_duplicate_of(&self, other: &TestRequest) -> bool {
        self.url == other.url
    }
}

impl fmt::Display for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} (notify {})", self.target, email),
            None => write!(f, "{}", self.target),
        }
    }
}
