use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use super::progress::ProgressTracker;
use crate::automation::forms::field_name;
use crate::automation::{AutomationEngine, AutomationResult, FormData};
use crate::db::Repository;
use crate::db::models::{
    NewRequest, OptOutMethod, RemovalRequest, RequestMetadata, RequestStatus, RequestUpdate,
};
use crate::error::{AppError, AppResult};

pub const REQUEST_TYPE: &str = "Delete my personal information";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub fn validate_email(email: &str) -> AppResult<&str> {
    let email = email.trim();
    if EMAIL_RE.is_match(email) {
        Ok(email)
    } else {
        Err(AppError::Validation(format!("invalid email address '{email}'")))
    }
}

/// Best-effort display name from an email's local part:
/// `jane.doe42@example.com` becomes `Jane Doe`.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local
        .split(['.', '_', '-', '+'])
        .map(|part| part.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Payload submitted on the requester's behalf.
pub fn build_form_data(email: &str) -> FormData {
    let mut data = FormData::new();
    data.insert("email".into(), email.to_string());
    data.insert("name".into(), name_from_email(email));
    data.insert("request_type".into(), REQUEST_TYPE.into());
    data.insert("consent".into(), "true".into());
    data
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Requests an automation attempt was made for.
    pub processed: usize,
    pub successes: usize,
    pub failures: usize,
    /// Pending requests without an opt-out URL, or whose broker does not take
    /// form submissions; not attempted.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub broker_name: String,
    pub email: String,
    pub automate: bool,
    pub detect_fields: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub request: RemovalRequest,
    pub automation: Option<AutomationResult>,
}

pub struct RequestOrchestrator {
    repo: Arc<dyn Repository>,
    engine: Arc<AutomationEngine>,
    tracker: ProgressTracker,
}

impl RequestOrchestrator {
    pub fn new(repo: Arc<dyn Repository>, engine: Arc<AutomationEngine>) -> Self {
        let tracker = ProgressTracker::new(repo.clone());
        Self {
            repo,
            engine,
            tracker,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Submit every pending request, one at a time. A failure on one request
    /// is counted and does not stop the batch. Requests for brokers that only
    /// accept email, API or manual opt-outs stay pending.
    pub async fn process_pending_requests(&self) -> AppResult<BatchSummary> {
        let pending: Vec<RemovalRequest> = self
            .repo
            .get_requests()?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        tracing::info!("Processing {} pending request(s)", pending.len());

        let mut summary = BatchSummary::default();
        for request in &pending {
            let Some(url) = request.metadata.opt_out_url.clone() else {
                tracing::warn!(
                    "Request {} for {} has no opt-out URL, skipping",
                    request.id,
                    request.broker_name
                );
                summary.skipped += 1;
                continue;
            };
            match self.repo.get_broker_by_name(&request.broker_name) {
                Ok(Some(broker)) if broker.opt_out_method != OptOutMethod::Form => {
                    tracing::info!(
                        "Request {} for {} needs a {} opt-out, skipping",
                        request.id,
                        broker.name,
                        broker.opt_out_method
                    );
                    summary.skipped += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Error looking up broker for request {}: {e}", request.id);
                    summary.processed += 1;
                    summary.failures += 1;
                    continue;
                }
            }

            summary.processed += 1;
            let form = build_form_data(&request.email);
            match self.submit(request, &url, &form).await {
                Ok(result) if result.success => summary.successes += 1,
                Ok(_) => summary.failures += 1,
                Err(e) => {
                    tracing::error!("Error processing request {}: {e}", request.id);
                    summary.failures += 1;
                }
            }
        }

        tracing::info!(
            "Batch done: {} processed, {} succeeded, {} failed, {} skipped",
            summary.processed,
            summary.successes,
            summary.failures,
            summary.skipped
        );
        Ok(summary)
    }

    /// Run one automation attempt for `request` and record its outcome.
    async fn submit(
        &self,
        request: &RemovalRequest,
        url: &str,
        form: &FormData,
    ) -> AppResult<AutomationResult> {
        let result = self.engine.send_request(url, form).await;
        let attempts = request.metadata.attempts.unwrap_or(0) + 1;

        let update = if result.success {
            RequestUpdate {
                status: Some(RequestStatus::Sent),
                response: Some(result.message.clone()),
                metadata: Some(RequestMetadata {
                    processed_at: Some(result.timestamp),
                    screenshot: result.screenshot.clone(),
                    attempts: Some(attempts),
                    ..Default::default()
                }),
            }
        } else {
            RequestUpdate {
                metadata: Some(RequestMetadata {
                    attempts: Some(attempts),
                    last_error: Some(result.message.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }
        };

        self.repo
            .update_request(&request.id, update)?
            .ok_or_else(|| AppError::request_not_found(&request.id))?;

        if result.success {
            self.tracker.track_progress(&request.id)?;
        }
        Ok(result)
    }

    /// Create a request for one broker and, when asked, submit it right away.
    pub async fn create_request_with_automation(
        &self,
        submission: Submission,
    ) -> AppResult<SubmissionOutcome> {
        let email = validate_email(&submission.email)?.to_string();
        let broker = self
            .repo
            .get_broker_by_name(&submission.broker_name)?
            .ok_or_else(|| AppError::broker_not_found(&submission.broker_name))?;

        let mut new = NewRequest::pending(&broker.name, &email);
        new.metadata.opt_out_url = broker.opt_out_url.clone();
        new.metadata.broker_category = Some(broker.category);
        let request = self.repo.create_request(new)?;
        tracing::info!("Created request {} for {}", request.id, broker.name);

        let automatable = broker.opt_out_method == OptOutMethod::Form;
        let url = match broker.opt_out_url.clone() {
            Some(url) if submission.automate && automatable => url,
            _ => {
                if submission.automate {
                    tracing::info!(
                        "{} cannot be automated ({} opt-out); request left pending",
                        broker.name,
                        broker.opt_out_method
                    );
                }
                self.tracker.track_progress(&request.id)?;
                return self.outcome(&request.id, None);
            }
        };

        let mut form = build_form_data(&email);
        if submission.detect_fields {
            let fields = self.engine.detect_form_fields(&url);
            let selectors: Vec<String> = fields.iter().map(|f| f.selector.clone()).collect();
            for f in &fields {
                if let Some(name) = field_name(&f.selector) {
                    form.entry(name.to_string())
                        .or_insert_with(|| default_value(name, &email));
                }
            }
            self.repo.update_request(
                &request.id,
                RequestUpdate {
                    metadata: Some(RequestMetadata {
                        form_fields: Some(selectors),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )?;
        }

        let current = self
            .repo
            .get_request_by_id(&request.id)?
            .ok_or_else(|| AppError::request_not_found(&request.id))?;
        let result = self.submit(&current, &url, &form).await?;
        if !result.success {
            self.tracker.track_progress(&request.id)?;
        }
        self.outcome(&request.id, Some(result))
    }

    fn outcome(
        &self,
        request_id: &str,
        automation: Option<AutomationResult>,
    ) -> AppResult<SubmissionOutcome> {
        let request = self
            .repo
            .get_request_by_id(request_id)?
            .ok_or_else(|| AppError::request_not_found(request_id))?;
        Ok(SubmissionOutcome {
            request,
            automation,
        })
    }

    /// Turn every likely match for `email` into a pending request, skipping
    /// brokers that already have a request for this email.
    pub fn queue_matches(&self, email: &str) -> AppResult<Vec<RemovalRequest>> {
        let email = validate_email(email)?;
        let existing = self.repo.get_requests()?;
        let mut created = Vec::new();

        for m in self.repo.find_brokers_for_email(email)? {
            if !m.has_user_data {
                continue;
            }
            let duplicate = existing.iter().any(|r| {
                r.broker_name.eq_ignore_ascii_case(&m.broker.name)
                    && r.email.eq_ignore_ascii_case(email)
            });
            if duplicate {
                tracing::debug!("{} already has a request for {email}", m.broker.name);
                continue;
            }

            let mut new = NewRequest::pending(&m.broker.name, email);
            new.metadata.opt_out_url = m.broker.opt_out_url.clone();
            new.metadata.broker_category = Some(m.broker.category);
            new.metadata
                .extra
                .insert("matchScore".into(), serde_json::Value::from(m.score));
            created.push(self.repo.create_request(new)?);
        }

        tracing::info!("Queued {} request(s) for {email}", created.len());
        Ok(created)
    }

    /// Manual status change. Any status may be set; see
    /// [`RequestStatus::is_forward_to`].
    pub fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        response: Option<String>,
    ) -> AppResult<RemovalRequest> {
        self.repo
            .update_request(
                request_id,
                RequestUpdate {
                    status: Some(status),
                    response,
                    metadata: None,
                },
            )?
            .ok_or_else(|| AppError::request_not_found(request_id))?;
        self.tracker.track_progress(request_id)?;
        self.repo
            .get_request_by_id(request_id)?
            .ok_or_else(|| AppError::request_not_found(request_id))
    }
}

/// Value for a detected field the standard payload does not cover.
fn default_value(field: &str, email: &str) -> String {
    match field {
        "full_name" => name_from_email(email),
        "first_name" => name_from_email(email)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        "last_name" => name_from_email(email)
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string(),
        "terms" | "confirm" => "true".into(),
        "reason" => "privacy".into(),
        _ => String::new(),
    }
}
