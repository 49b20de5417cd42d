use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::db::models::{
    BrokerCategory, Difficulty, ProgressStep, RemovalProgress, RequestMetadata, RequestStatus,
    RequestUpdate, StepId, StepStatus,
};
use crate::error::{AppError, AppResult};

/// Typical days until a broker of `category` finishes a removal.
pub fn base_days(category: BrokerCategory) -> f64 {
    match category {
        BrokerCategory::PeopleSearch => 14.0,
        BrokerCategory::CreditReporting => 30.0,
        BrokerCategory::Marketing => 21.0,
        BrokerCategory::BackgroundCheck => 25.0,
        BrokerCategory::SocialMedia => 10.0,
        _ => 21.0,
    }
}

pub fn difficulty_factor(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.7,
        Difficulty::Medium => 1.0,
        Difficulty::Hard => 1.5,
    }
}

pub fn estimate_completion(
    created_at: DateTime<Utc>,
    category: BrokerCategory,
    difficulty: Difficulty,
) -> DateTime<Utc> {
    let days = (base_days(category) * difficulty_factor(difficulty)).round() as i64;
    created_at + Duration::days(days)
}

fn pending_step(id: StepId) -> ProgressStep {
    ProgressStep {
        id,
        status: StepStatus::Pending,
        started_at: None,
        completed_at: None,
    }
}

fn initial_progress(created_at: DateTime<Utc>, now: DateTime<Utc>) -> RemovalProgress {
    let steps = StepId::ORDER
        .iter()
        .map(|&id| {
            if id == StepId::RequestCreation {
                ProgressStep {
                    id,
                    status: StepStatus::Completed,
                    started_at: Some(created_at),
                    completed_at: Some(created_at),
                }
            } else {
                pending_step(id)
            }
        })
        .collect();

    RemovalProgress {
        steps,
        overall_status: StepStatus::InProgress,
        last_updated: now,
        estimated_completion: None,
    }
}

/// Put the four steps in canonical order, adding any a stored record lacks.
fn normalize_steps(progress: &mut RemovalProgress) {
    let mut stored = std::mem::take(&mut progress.steps);
    progress.steps = StepId::ORDER
        .iter()
        .map(|&id| match stored.iter().position(|s| s.id == id) {
            Some(idx) => stored.swap_remove(idx),
            None => pending_step(id),
        })
        .collect();
}

fn step_mut(progress: &mut RemovalProgress, id: StepId) -> &mut ProgressStep {
    let idx = StepId::ORDER
        .iter()
        .position(|&s| s == id)
        .unwrap_or_default();
    &mut progress.steps[idx]
}

fn complete(step: &mut ProgressStep, now: DateTime<Utc>) {
    if step.status != StepStatus::Completed {
        step.status = StepStatus::Completed;
        step.started_at.get_or_insert(now);
        step.completed_at = Some(now);
    }
}

/// Only a pending step can start, so a later call never regresses it.
fn start(step: &mut ProgressStep, now: DateTime<Utc>) {
    if step.status == StepStatus::Pending {
        step.status = StepStatus::InProgress;
        step.started_at = Some(now);
    }
}

/// Move steps forward to match `status`. Completed steps are never touched.
pub fn advance(progress: &mut RemovalProgress, status: RequestStatus, now: DateTime<Utc>) {
    match status {
        RequestStatus::Pending => {}
        RequestStatus::Sent => {
            complete(step_mut(progress, StepId::Validation), now);
            start(step_mut(progress, StepId::BrokerCommunication), now);
        }
        RequestStatus::Responded => {
            complete(step_mut(progress, StepId::Validation), now);
            complete(step_mut(progress, StepId::BrokerCommunication), now);
            start(step_mut(progress, StepId::Confirmation), now);
        }
        RequestStatus::Completed => {
            for step in &mut progress.steps {
                complete(step, now);
            }
        }
    }
    progress.overall_status = overall_status(&progress.steps);
}

fn overall_status(steps: &[ProgressStep]) -> StepStatus {
    if steps.iter().all(|s| s.status == StepStatus::Completed) {
        StepStatus::Completed
    } else if steps.iter().any(|s| s.status == StepStatus::Failed) {
        StepStatus::Failed
    } else if steps.iter().any(|s| s.status != StepStatus::Pending) {
        StepStatus::InProgress
    } else {
        StepStatus::Pending
    }
}

pub struct ProgressTracker {
    repo: Arc<dyn Repository>,
}

impl ProgressTracker {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Bring the stored removal progress of `request_id` in line with the
    /// request's status, persist it and return it.
    pub fn track_progress(&self, request_id: &str) -> AppResult<RemovalProgress> {
        let request = self
            .repo
            .get_request_by_id(request_id)?
            .ok_or_else(|| AppError::request_not_found(request_id))?;
        let now = Utc::now();

        let mut progress = match request.metadata.progress.clone() {
            Some(mut stored) => {
                normalize_steps(&mut stored);
                stored
            }
            None => initial_progress(request.created_at, now),
        };

        if progress.estimated_completion.is_none() {
            let broker = self.repo.get_broker_by_name(&request.broker_name)?;
            let category = broker
                .as_ref()
                .map(|b| b.category)
                .or(request.metadata.broker_category)
                .unwrap_or(BrokerCategory::Other);
            let difficulty = broker.map_or(Difficulty::Medium, |b| b.difficulty);
            progress.estimated_completion =
                Some(estimate_completion(request.created_at, category, difficulty));
        }

        advance(&mut progress, request.status, now);
        progress.last_updated = now;

        let patch = RequestMetadata {
            progress: Some(progress.clone()),
            ..Default::default()
        };
        self.repo
            .update_request(
                request_id,
                RequestUpdate {
                    metadata: Some(patch),
                    ..Default::default()
                },
            )?
            .ok_or_else(|| AppError::request_not_found(request_id))?;

        tracing::debug!(
            "Request {request_id} progress: {}",
            progress.overall_status.as_str()
        );
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;
    use crate::broker::catalog;
    use crate::db::Database;
    use crate::db::models::NewRequest;

    fn setup() -> (Arc<Database>, ProgressTracker) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        catalog::seed(&db).unwrap();
        let tracker = ProgressTracker::new(db.clone());
        (db, tracker)
    }

    fn request_with_status(db: &Database, broker: &str, status: RequestStatus) -> String {
        let mut new = NewRequest::pending(broker, "jane@gmail.com");
        new.status = status;
        db.create_request(new).unwrap().id
    }

    #[test]
    fn test_estimate_completion() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // 14 * 0.7 = 9.8 -> 10
        assert_eq!(
            estimate_completion(created, BrokerCategory::PeopleSearch, Difficulty::Easy),
            created + Duration::days(10)
        );
        // 21 * 1.5 = 31.5 -> 32
        assert_eq!(
            estimate_completion(created, BrokerCategory::Financial, Difficulty::Hard),
            created + Duration::days(32)
        );
        assert_eq!(
            estimate_completion(created, BrokerCategory::CreditReporting, Difficulty::Medium),
            created + Duration::days(30)
        );
    }

    #[test]
    fn test_new_pending_request() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Spokeo", RequestStatus::Pending);
        let request = db.get_request_by_id(&id).unwrap().unwrap();

        let progress = tracker.track_progress(&id).unwrap();
        assert_eq!(progress.steps.len(), 4);
        let creation = progress.step(StepId::RequestCreation).unwrap();
        assert_eq!(creation.status, StepStatus::Completed);
        assert_eq!(creation.completed_at, Some(request.created_at));
        assert_eq!(
            progress.step(StepId::Validation).unwrap().status,
            StepStatus::Pending
        );
        // Spokeo: people-search, easy
        assert_eq!(
            progress.estimated_completion,
            Some(request.created_at + Duration::days(10))
        );

        let stored = db.get_request_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.metadata.progress, Some(progress));
    }

    #[test]
    fn test_sent_and_responded_advance_steps() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Acxiom", RequestStatus::Sent);

        let progress = tracker.track_progress(&id).unwrap();
        assert_eq!(
            progress.step(StepId::Validation).unwrap().status,
            StepStatus::Completed
        );
        assert_eq!(
            progress.step(StepId::BrokerCommunication).unwrap().status,
            StepStatus::InProgress
        );
        assert_eq!(progress.overall_status, StepStatus::InProgress);

        db.update_request(
            &id,
            RequestUpdate {
                status: Some(RequestStatus::Responded),
                ..Default::default()
            },
        )
        .unwrap();
        let progress = tracker.track_progress(&id).unwrap();
        assert_eq!(
            progress.step(StepId::BrokerCommunication).unwrap().status,
            StepStatus::Completed
        );
        assert_eq!(
            progress.step(StepId::Confirmation).unwrap().status,
            StepStatus::InProgress
        );
    }

    #[test]
    fn test_completed_request_completes_everything() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Whitepages", RequestStatus::Completed);
        let progress = tracker.track_progress(&id).unwrap();
        assert!(
            progress
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Completed && s.completed_at.is_some())
        );
        assert_eq!(progress.overall_status, StepStatus::Completed);
    }

    #[test]
    fn test_tracking_is_idempotent() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Spokeo", RequestStatus::Sent);

        let first = tracker.track_progress(&id).unwrap();
        let mut second = tracker.track_progress(&id).unwrap();
        assert!(second.last_updated >= first.last_updated);
        second.last_updated = first.last_updated;
        assert_eq!(first, second);
    }

    #[test]
    fn test_regressed_status_keeps_completed_steps() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Spokeo", RequestStatus::Responded);
        tracker.track_progress(&id).unwrap();

        db.update_request(
            &id,
            RequestUpdate {
                status: Some(RequestStatus::Sent),
                ..Default::default()
            },
        )
        .unwrap();
        let progress = tracker.track_progress(&id).unwrap();
        assert_eq!(
            progress.step(StepId::BrokerCommunication).unwrap().status,
            StepStatus::Completed
        );
    }

    #[test]
    fn test_estimate_is_cached() {
        let (db, tracker) = setup();
        let id = request_with_status(&db, "Spokeo", RequestStatus::Pending);
        let first = tracker.track_progress(&id).unwrap();

        // Deleting the broker would change the fallback estimate.
        let spokeo = db.get_broker_by_name("Spokeo").unwrap().unwrap();
        db.delete_broker(&spokeo.id).unwrap();

        let second = tracker.track_progress(&id).unwrap();
        assert_eq!(first.estimated_completion, second.estimated_completion);
    }

    #[test]
    fn test_unknown_broker_uses_metadata_category() {
        let (db, tracker) = setup();
        let mut new = NewRequest::pending("Gone Broker", "jane@gmail.com");
        new.metadata.broker_category = Some(BrokerCategory::SocialMedia);
        let request = db.create_request(new).unwrap();

        let progress = tracker.track_progress(&request.id).unwrap();
        assert_eq!(
            progress.estimated_completion,
            Some(request.created_at + Duration::days(10))
        );
    }

    #[test]
    fn test_other_metadata_is_preserved() {
        let (db, tracker) = setup();
        let mut new = NewRequest::pending("Spokeo", "jane@gmail.com");
        new.metadata.opt_out_url = Some("https://www.spokeo.com/optout".into());
        new.metadata.extra.insert("source".into(), Value::from("import"));
        let request = db.create_request(new).unwrap();

        tracker.track_progress(&request.id).unwrap();
        let stored = db.get_request_by_id(&request.id).unwrap().unwrap();
        assert_eq!(
            stored.metadata.opt_out_url.as_deref(),
            Some("https://www.spokeo.com/optout")
        );
        assert_eq!(stored.metadata.extra.get("source"), Some(&Value::from("import")));
        assert!(stored.metadata.progress.is_some());
    }

    #[test]
    fn test_missing_request() {
        let (_db, tracker) = setup();
        assert!(matches!(
            tracker.track_progress("nope"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_partial_stored_progress_is_normalized() {
        let now = Utc::now();
        let mut progress = RemovalProgress {
            steps: vec![ProgressStep {
                id: StepId::Confirmation,
                status: StepStatus::InProgress,
                started_at: Some(now),
                completed_at: None,
            }],
            overall_status: StepStatus::InProgress,
            last_updated: now,
            estimated_completion: None,
        };
        normalize_steps(&mut progress);
        let ids: Vec<_> = progress.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, StepId::ORDER.to_vec());
        assert_eq!(progress.steps[3].status, StepStatus::InProgress);
    }
}
