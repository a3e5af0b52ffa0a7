//! Registry page fetcher
//!
//! The registry exposes a single consultation form. A lookup is one
//! form-encoded POST to `consultar.asp` carrying the masked identifier and
//! the fixed fields the form framework expects. The raw response body is
//! returned; parsing happens elsewhere.

use crate::config::FetcherConfig;
use crate::identifier::SubjectKey;
use crate::retry::RetryPolicy;
use reqwest::{header, redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while fetching a registry page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("registry returned an empty page for {subject_key}")]
    ScrapeFailed { subject_key: String },

    #[error("invalid registry URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

impl FetchError {
    /// Whether another attempt could succeed
    ///
    /// Transport errors, non-success statuses and empty pages are retried.
    /// Configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::ScrapeFailed { .. }
        )
    }
}

/// URLs and headers derived from the configured base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    /// Form target
    pub consult: Url,

    /// Page the form lives on, sent as Referer
    pub referer: Url,

    /// Scheme, host and port of the registry, sent as Origin
    pub origin: String,
}

impl RegistryEndpoints {
    pub fn from_base(base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            consult: base.join("consultar.asp")?,
            referer: base.join("default.html")?,
            origin: base.origin().ascii_serialization(),
        })
    }
}

/// Builds an HTTP client with the configured user agent and timeout
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Form fields for a lookup of the given masked identifier
pub fn form_payload(masked: &str) -> Vec<(&'static str, String)> {
    vec![
        ("rTipoDoc", "2".to_string()),
        ("tDoc", masked.to_string()),
        ("tCCE", String::new()),
        ("tCNPJ", masked.to_string()),
        ("tCPF", String::new()),
        ("btCGC", "Consultar".to_string()),
        ("zion.SystemAction", "consultarSintegra()".to_string()),
        ("zion.OnSubmited", String::new()),
        ("zion.FormElementPosted", "zionFormID_1".to_string()),
        ("zionPostMethod", String::new()),
        ("zionRichValidator", "true".to_string()),
    ]
}

/// Fetches registry pages with retry
#[derive(Debug, Clone)]
pub struct RegistryFetcher {
    client: Client,
    endpoints: RegistryEndpoints,
    policy: RetryPolicy,
}

impl RegistryFetcher {
    /// Creates a fetcher using the standard retry policy
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let base = Url::parse(&config.base_url)?;
        let endpoints = RegistryEndpoints::from_base(&base)?;
        let client = build_http_client(config).map_err(FetchError::Client)?;

        Ok(Self {
            client,
            endpoints,
            policy: RetryPolicy::standard(),
        })
    }

    /// Replaces the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches the result page for `subject`, retrying transient failures
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The raw, non-empty response body
    /// * `Err(FetchError)` - The last error once the attempt budget is spent
    pub async fn fetch_page(&self, subject: &SubjectKey) -> Result<String, FetchError> {
        self.policy
            .run(
                "fetch registry page",
                move |attempt| {
                    tracing::debug!(subject_key = %subject, attempt, "Requesting registry page");
                    self.fetch_once(subject)
                },
                FetchError::is_retryable,
            )
            .await
    }

    async fn fetch_once(&self, subject: &SubjectKey) -> Result<String, FetchError> {
        let url = self.endpoints.consult.as_str();
        let payload = form_payload(&subject.masked());

        let response = self
            .client
            .post(self.endpoints.consult.clone())
            .header(header::ORIGIN, self.endpoints.origin.as_str())
            .header(header::REFERER, self.endpoints.referer.as_str())
            .form(&payload)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        if body.trim().is_empty() {
            return Err(FetchError::ScrapeFailed {
                subject_key: subject.to_string(),
            });
        }

        Ok(body)
    }
}
