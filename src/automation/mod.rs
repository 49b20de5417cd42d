//! Simulated opt-out form automation.
//!
//! Nothing here drives a real browser. The engine checks the target against
//! the broker allow-list, sanitizes the payload, waits out a simulated
//! fill-and-submit phase and draws an outcome. Delays and random draws go
//! through [`AutomationRuntime`] so callers can make both deterministic.

pub mod forms;
pub mod guard;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

pub use forms::FormField;

pub type FormData = BTreeMap<String, String>;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TIMEOUT_MS: u64 = 120_000;
pub const MAX_USER_AGENT_LEN: usize = 512;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const FILL_BASE_MS: RangeInclusive<u64> = 2_000..=4_000;
const FILL_PER_FIELD_MS: u64 = 300;
const SUBMIT_PHASE_MS: u64 = 1_000;

/// 1x1 transparent PNG standing in for a page capture.
pub const SCREENSHOT_PLACEHOLDER: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub const FAILURE_MESSAGES: [&str; 5] = [
    "Could not find the submit button on the opt-out form",
    "Form validation failed: the broker rejected one or more fields",
    "A CAPTCHA challenge blocked the submission",
    "The broker's page timed out while submitting the form",
    "The broker's bot detection flagged the session",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AutomationResult {
    fn succeeded(message: String) -> Self {
        Self {
            success: true,
            message,
            screenshot: Some(SCREENSHOT_PLACEHOLDER.to_string()),
            timestamp: Utc::now(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            screenshot: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    pub headless: bool,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Unvalidated configuration overrides, e.g. from `config.json` or CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub headless: Option<bool>,
    pub timeout_ms: Option<i64>,
    pub user_agent: Option<String>,
}

impl ConfigPatch {
    /// Fields set in `other` win.
    pub fn overlay(mut self, other: ConfigPatch) -> Self {
        if other.headless.is_some() {
            self.headless = other.headless;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        self
    }
}

impl AutomationConfig {
    /// Merge the valid parts of `patch`. Out-of-range values are dropped with
    /// a warning. Returns the number of fields applied.
    pub fn apply(&mut self, patch: ConfigPatch) -> usize {
        let mut applied = 0;

        if let Some(headless) = patch.headless {
            self.headless = headless;
            applied += 1;
        }

        if let Some(timeout) = patch.timeout_ms {
            match u64::try_from(timeout) {
                Ok(ms) if (1..=MAX_TIMEOUT_MS).contains(&ms) => {
                    self.timeout_ms = ms;
                    applied += 1;
                }
                _ => tracing::warn!("Ignoring automation timeout {timeout} ms (allowed 1-{MAX_TIMEOUT_MS})"),
            }
        }

        if let Some(user_agent) = patch.user_agent {
            let len = user_agent.trim().chars().count();
            if (1..=MAX_USER_AGENT_LEN).contains(&len) {
                self.user_agent = user_agent.trim().to_string();
                applied += 1;
            } else {
                tracing::warn!("Ignoring user agent of length {len} (allowed 1-{MAX_USER_AGENT_LEN})");
            }
        }

        applied
    }
}

/// Source of delays and randomness for simulated submissions.
#[async_trait]
pub trait AutomationRuntime: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn roll(&self) -> f64;
    /// Uniform index in `[0, upper)`.
    fn pick(&self, upper: usize) -> usize;
    fn jitter_ms(&self, range: RangeInclusive<u64>) -> u64;
    async fn pause(&self, duration: Duration);
}

/// Thread-local RNG and real tokio sleeps.
pub struct LiveRuntime;

#[async_trait]
impl AutomationRuntime for LiveRuntime {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn pick(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }

    fn jitter_ms(&self, range: RangeInclusive<u64>) -> u64 {
        rand::thread_rng().gen_range(range)
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Chance a submission with `field_count` fields goes through.
pub fn success_probability(field_count: usize) -> f64 {
    (0.8 + 0.03 * field_count as f64).min(0.95)
}

pub struct AutomationEngine {
    config: AutomationConfig,
    allowed_domains: Vec<String>,
    runtime: Box<dyn AutomationRuntime>,
}

impl AutomationEngine {
    pub fn new(config: AutomationConfig, runtime: Box<dyn AutomationRuntime>) -> Self {
        Self {
            config,
            allowed_domains: guard::default_allowed_domains(),
            runtime,
        }
    }

    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for domain in domains {
            let domain = domain.into().trim().to_ascii_lowercase();
            if !domain.is_empty() && !self.allowed_domains.contains(&domain) {
                self.allowed_domains.push(domain);
            }
        }
        self
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn configure(&mut self, patch: ConfigPatch) -> usize {
        self.config.apply(patch)
    }

    /// Fields the opt-out form at `url` is expected to have. Disallowed URLs
    /// yield no fields.
    pub fn detect_form_fields(&self, url: &str) -> Vec<FormField> {
        match guard::check_url(url, &self.allowed_domains) {
            Ok(target) => forms::fields_for_host(target.host_str().unwrap_or_default()),
            Err(e) => {
                tracing::warn!("Not inspecting form: {e}");
                Vec::new()
            }
        }
    }

    /// Simulate filling and submitting the opt-out form at `url`.
    ///
    /// Never returns an error: rejections, simulated failures and timeouts
    /// all come back as a result with `success == false`.
    pub async fn send_request(&self, url: &str, form_data: &FormData) -> AutomationResult {
        let target = match guard::check_url(url, &self.allowed_domains) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Refusing automation target: {e}");
                return AutomationResult::failed(e.to_string());
            }
        };

        let fields = guard::sanitize_form_data(form_data);
        let limit = Duration::from_millis(self.config.timeout_ms);

        match tokio::time::timeout(limit, self.simulate(&target, &fields)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Automation against {target} exceeded {} ms", self.config.timeout_ms);
                AutomationResult::failed(format!(
                    "Automation timed out after {} ms",
                    self.config.timeout_ms
                ))
            }
        }
    }

    async fn simulate(&self, target: &Url, fields: &FormData) -> AutomationResult {
        let host = target.host_str().unwrap_or_default();
        let fill_ms =
            self.runtime.jitter_ms(FILL_BASE_MS) + FILL_PER_FIELD_MS * fields.len() as u64;
        tracing::debug!(
            "Filling {} field(s) on {host} (headless={}, ua={} chars, ~{fill_ms} ms)",
            fields.len(),
            self.config.headless,
            self.config.user_agent.len()
        );
        self.runtime.pause(Duration::from_millis(fill_ms)).await;
        self.runtime
            .pause(Duration::from_millis(SUBMIT_PHASE_MS))
            .await;

        if self.runtime.roll() < success_probability(fields.len()) {
            tracing::info!("Opt-out form submitted on {host}");
            AutomationResult::succeeded(format!("Opt-out request submitted to {host}"))
        } else {
            let message = FAILURE_MESSAGES[self.runtime.pick(FAILURE_MESSAGES.len())];
            tracing::info!("Opt-out submission on {host} failed: {message}");
            AutomationResult::failed(message)
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Deterministic runtime: fixed draws, no real waiting.
    pub struct ScriptedRuntime {
        pub roll: f64,
        pub pick: usize,
        pub stall: bool,
        pub pauses: Mutex<Vec<Duration>>,
    }

    impl ScriptedRuntime {
        pub fn succeeding() -> Self {
            Self {
                roll: 0.0,
                pick: 0,
                stall: false,
                pauses: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(pick: usize) -> Self {
            Self {
                roll: 0.999,
                pick,
                ..Self::succeeding()
            }
        }

        /// Never finishes the fill phase.
        pub fn stalled() -> Self {
            Self {
                stall: true,
                ..Self::succeeding()
            }
        }
    }

    #[async_trait]
    impl AutomationRuntime for ScriptedRuntime {
        fn roll(&self) -> f64 {
            self.roll
        }

        fn pick(&self, upper: usize) -> usize {
            self.pick % upper
        }

        fn jitter_ms(&self, range: RangeInclusive<u64>) -> u64 {
            *range.start()
        }

        async fn pause(&self, duration: Duration) {
            self.pauses.lock().unwrap().push(duration);
            if self.stall {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn engine(runtime: ScriptedRuntime) -> AutomationEngine {
        AutomationEngine::new(AutomationConfig::default(), Box::new(runtime))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::{ScriptedRuntime, engine};
    use super::*;

    /// Lets a test inspect the runtime after handing it to the engine.
    struct Shared(Arc<ScriptedRuntime>);

    #[async_trait]
    impl AutomationRuntime for Shared {
        fn roll(&self) -> f64 {
            self.0.roll()
        }
        fn pick(&self, upper: usize) -> usize {
            self.0.pick(upper)
        }
        fn jitter_ms(&self, range: RangeInclusive<u64>) -> u64 {
            self.0.jitter_ms(range)
        }
        async fn pause(&self, duration: Duration) {
            self.0.pause(duration).await
        }
    }

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_success_probability() {
        assert!((success_probability(0) - 0.8).abs() < 1e-9);
        assert!((success_probability(4) - 0.92).abs() < 1e-9);
        assert!((success_probability(5) - 0.95).abs() < 1e-9);
        assert!((success_probability(40) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_config_patch_validation() {
        let mut config = AutomationConfig::default();
        let applied = config.apply(ConfigPatch {
            headless: Some(false),
            timeout_ms: Some(0),
            user_agent: Some("x".repeat(MAX_USER_AGENT_LEN + 1)),
        });
        assert_eq!(applied, 1);
        assert!(!config.headless);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);

        let applied = config.apply(ConfigPatch {
            headless: None,
            timeout_ms: Some(120_000),
            user_agent: Some("data-breaker/0.1".into()),
        });
        assert_eq!(applied, 2);
        assert_eq!(config.timeout_ms, 120_000);
        assert_eq!(config.user_agent, "data-breaker/0.1");

        assert_eq!(
            config.apply(ConfigPatch {
                timeout_ms: Some(120_001),
                ..Default::default()
            }),
            0
        );
        assert_eq!(
            config.apply(ConfigPatch {
                timeout_ms: Some(-5),
                ..Default::default()
            }),
            0
        );
    }

    #[test]
    fn test_patch_overlay() {
        let file = ConfigPatch {
            headless: Some(true),
            timeout_ms: Some(5_000),
            user_agent: None,
        };
        let flags = ConfigPatch {
            timeout_ms: Some(9_000),
            ..Default::default()
        };
        let merged = file.overlay(flags);
        assert_eq!(merged.headless, Some(true));
        assert_eq!(merged.timeout_ms, Some(9_000));
    }

    #[tokio::test]
    async fn test_rejects_disallowed_domain_without_submitting() {
        let runtime = Arc::new(ScriptedRuntime::succeeding());
        let engine = AutomationEngine::new(
            AutomationConfig::default(),
            Box::new(Shared(runtime.clone())),
        );

        let result = engine
            .send_request("https://evil.example.com/x", &FormData::new())
            .await;
        assert!(!result.success);
        assert!(result.message.contains("not an allowed broker domain"));

        let result = engine.send_request("ftp://acxiom.com", &FormData::new()).await;
        assert!(!result.success);
        assert!(result.message.contains("protocol"));

        assert!(runtime.pauses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let runtime = Arc::new(ScriptedRuntime::succeeding());
        let engine = AutomationEngine::new(
            AutomationConfig::default(),
            Box::new(Shared(runtime.clone())),
        );
        let data = form(&[("email", "jane@gmail.com"), ("<script>", "x"), ("name", "Jane")]);

        let result = engine
            .send_request("https://www.spokeo.com/optout", &data)
            .await;
        assert!(result.success);
        assert_eq!(result.screenshot.as_deref(), Some(SCREENSHOT_PLACEHOLDER));
        assert!(result.message.contains("www.spokeo.com"));

        // two sanitized fields: 2000 + 2 * 300, then the submit phase
        let pauses = runtime.pauses.lock().unwrap().clone();
        assert_eq!(
            pauses,
            vec![Duration::from_millis(2_600), Duration::from_millis(1_000)]
        );
    }

    #[tokio::test]
    async fn test_failure_uses_fixed_messages() {
        for pick in 0..FAILURE_MESSAGES.len() {
            let engine = engine(ScriptedRuntime::failing(pick));
            let result = engine
                .send_request("https://www.whitepages.com/suppression-requests", &FormData::new())
                .await;
            assert!(!result.success);
            assert_eq!(result.message, FAILURE_MESSAGES[pick]);
            assert!(result.screenshot.is_none());
        }
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_failure() {
        let mut engine = engine(ScriptedRuntime::stalled());
        engine.configure(ConfigPatch {
            timeout_ms: Some(10),
            ..Default::default()
        });
        let result = engine
            .send_request("https://www.spokeo.com/optout", &FormData::new())
            .await;
        assert!(!result.success);
        assert!(result.message.contains("timed out after 10 ms"));
    }

    #[test]
    fn test_detect_form_fields() {
        let engine = engine(ScriptedRuntime::succeeding());
        let fields = engine.detect_form_fields("https://www.spokeo.com/optout");
        assert_eq!(fields.len(), 2);

        let generic = engine.detect_form_fields("https://www.truthfinder.com/opt-out");
        assert_eq!(generic.len(), 5);

        assert!(engine.detect_form_fields("https://evil.example.com").is_empty());
        assert!(engine.detect_form_fields("ftp://spokeo.com").is_empty());
    }

    #[test]
    fn test_extra_allowed_domains() {
        let engine = engine(ScriptedRuntime::succeeding()).with_allowed_domains(["Example.org"]);
        assert!(!engine.detect_form_fields("https://optout.example.org/").is_empty());
    }
}
