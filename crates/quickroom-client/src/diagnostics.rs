//! Error reporting to a Sentry-compatible ingestion endpoint
//!
//! Reports are queued on a channel and posted by a background task, so
//! callers never wait on the network. Panics are forwarded too once
//! `install_panic_hook` has run.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::network::post_json;
use crate::state::{ConfigError, TelemetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
    Fatal,
}

/// One report: an exception (type + message) or a plain message
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub level: Level,
    pub kind: String,
    pub message: String,
    pub tags: Vec<(String, String)>,
}

impl Report {
    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            kind: kind.into(),
            message: message.into(),
            tags: Vec::new(),
        }
    }

    /// A user-submitted bug report is sent as an error carrying the typed text
    pub fn bug_report(message: impl Into<String>) -> Self {
        Self::exception("Error", message).with_tag("source", "bug-report")
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }
}

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn send(&self, report: &Report) -> Result<()>;
}

/// Parsed `https://<key>@<host>/<project>` DSN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub public_key: String,
    pub store_url: String,
}

impl Dsn {
    pub fn parse(dsn: &str) -> std::result::Result<Self, ConfigError> {
        let url = reqwest::Url::parse(dsn).map_err(|e| ConfigError::InvalidDsn(e.to_string()))?;
        let public_key = url.username();
        if public_key.is_empty() {
            return Err(ConfigError::InvalidDsn("missing public key".to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidDsn("missing host".to_string()))?;
        let project = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::InvalidDsn("missing project id".to_string()))?;

        let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        Ok(Self {
            public_key: public_key.to_string(),
            store_url: format!("{}://{}{}/api/{}/store/", url.scheme(), host, port, project),
        })
    }

    fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version=7, sentry_key={}, sentry_client=quickroom/{}",
            self.public_key,
            env!("CARGO_PKG_VERSION")
        )
    }
}

#[derive(Serialize)]
struct ExceptionValue<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct ExceptionList<'a> {
    values: Vec<ExceptionValue<'a>>,
}

#[derive(Serialize)]
struct Event<'a> {
    event_id: String,
    timestamp: String,
    level: Level,
    platform: &'static str,
    logger: &'static str,
    release: &'static str,
    exception: ExceptionList<'a>,
    tags: std::collections::BTreeMap<&'a str, &'a str>,
}

pub struct TelemetryClient {
    http: reqwest::Client,
    dsn: Dsn,
    sample_rate: f64,
}

impl TelemetryClient {
    pub fn new(dsn: Dsn, sample_rate: f64) -> Self {
        Self {
            http: reqwest::Client::new(),
            dsn,
            // NaN would make gen_bool panic; treat it as "send everything"
            sample_rate: if sample_rate.is_nan() { 1.0 } else { sample_rate.clamp(0.0, 1.0) },
        }
    }

    /// `None` when no DSN is configured
    pub fn from_config(config: &TelemetryConfig) -> std::result::Result<Option<Self>, ConfigError> {
        config
            .dsn
            .as_deref()
            .map(|dsn| Ok(Self::new(Dsn::parse(dsn)?, config.sample_rate)))
            .transpose()
    }

    fn sampled(&self) -> bool {
        self.sample_rate >= 1.0 || rand::thread_rng().gen_bool(self.sample_rate)
    }
}

#[async_trait]
impl Reporter for TelemetryClient {
    async fn send(&self, report: &Report) -> Result<()> {
        if !self.sampled() {
            tracing::debug!("Report dropped by sample rate");
            return Ok(());
        }

        let event = Event {
            event_id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            level: report.level,
            platform: "other",
            logger: "quickroom",
            release: env!("CARGO_PKG_VERSION"),
            exception: ExceptionList {
                values: vec![ExceptionValue {
                    kind: &report.kind,
                    value: &report.message,
                }],
            },
            tags: report
                .tags
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        };

        post_json(
            &self.http,
            &self.dsn.store_url,
            &event,
            &[("X-Sentry-Auth", self.dsn.auth_header())],
        )
        .await
        .map_err(|e| ClientError::Telemetry(e.to_string()))
    }
}

/// Cheap handle for queueing reports
#[derive(Clone)]
pub struct DiagnosticsHandle {
    tx: mpsc::UnboundedSender<Report>,
}

impl DiagnosticsHandle {
    pub fn report(&self, report: Report) {
        if self.tx.send(report).is_err() {
            tracing::warn!("Diagnostics task is gone; report dropped");
        }
    }

    /// A handle whose reports go nowhere, for running without telemetry
    pub fn disabled() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }
}

pub struct Diagnostics;

impl Diagnostics {
    /// Spawn the forwarding task. Must be called inside a Tokio runtime.
    pub fn start(reporter: Arc<dyn Reporter>) -> DiagnosticsHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<Report>();
        tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                tracing::debug!("Forwarding report: {}", report.message);
                if let Err(e) = reporter.send(&report).await {
                    tracing::error!("Failed to send report: {}", e);
                }
            }
        });
        DiagnosticsHandle { tx }
    }

    /// Forward panics as fatal reports, then run the previous hook
    pub fn install_panic_hook(handle: DiagnosticsHandle) {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();

            let mut report = Report::exception("panic", message).with_tag("location", &location);
            report.level = Level::Fatal;
            handle.report(report);

            previous(info);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingReporter;
    use std::time::Duration;

    #[test]
    fn test_dsn_parse() {
        let dsn = Dsn::parse("https://2351e4c72ca04c22@sentry.io/276620").unwrap();
        assert_eq!(dsn.public_key, "2351e4c72ca04c22");
        assert_eq!(dsn.store_url, "https://sentry.io/api/276620/store/");

        let dsn = Dsn::parse("http://key@localhost:9000/3").unwrap();
        assert_eq!(dsn.store_url, "http://localhost:9000/api/3/store/");
    }

    #[test]
    fn test_dsn_rejects_incomplete() {
        assert!(Dsn::parse("https://sentry.io/276620").is_err());
        assert!(Dsn::parse("https://key@sentry.io/").is_err());
        assert!(Dsn::parse("not a url").is_err());
    }

    #[test]
    fn test_sample_rate_is_clamped() {
        let dsn = || Dsn::parse("https://key@sentry.io/1").unwrap();

        let client = TelemetryClient::new(dsn(), f64::NAN);
        assert_eq!(client.sample_rate, 1.0);
        assert!(client.sampled());

        let client = TelemetryClient::new(dsn(), 7.5);
        assert_eq!(client.sample_rate, 1.0);

        let client = TelemetryClient::new(dsn(), -1.0);
        assert_eq!(client.sample_rate, 0.0);
        assert!(!client.sampled());
    }

    #[test]
    fn test_no_dsn_no_client() {
        let client = TelemetryClient::from_config(&TelemetryConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[tokio::test]
    async fn test_reports_are_forwarded_in_order() {
        let reporter = Arc::new(RecordingReporter::default());
        let handle = Diagnostics::start(reporter.clone());
        handle.report(Report::bug_report("first"));
        handle.report(Report::exception("Error", "second"));

        tokio::time::timeout(Duration::from_secs(1), async {
            while reporter.reports().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reports forwarded");

        let reports = reporter.reports();
        assert_eq!(reports[0].message, "first");
        assert_eq!(reports[0].tags, vec![("source".to_string(), "bug-report".to_string())]);
        assert_eq!(reports[1].message, "second");
    }

    #[test]
    fn test_disabled_handle_does_not_panic() {
        DiagnosticsHandle::disabled().report(Report::exception("Error", "ignored"));
    }
}
