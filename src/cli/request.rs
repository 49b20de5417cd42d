use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};

use super::short_id;
use crate::db::models::{RemovalRequest, RequestStatus};
use crate::db::{Database, Repository};
use crate::removal::{RequestOrchestrator, Submission};

fn stamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

fn requests_table(requests: &[RemovalRequest]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Broker", "Email", "Status", "Updated", "Response"]);
    for r in requests {
        table.add_row(vec![
            Cell::new(short_id(&r.id)),
            Cell::new(&r.broker_name),
            Cell::new(&r.email),
            Cell::new(r.status),
            Cell::new(r.updated_at.format("%Y-%m-%d %H:%M")),
            Cell::new(r.response.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn list_requests(db: &Database, status: Option<RequestStatus>) -> anyhow::Result<()> {
    let requests: Vec<_> = db
        .get_requests()?
        .into_iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect();

    if requests.is_empty() {
        println!("No removal requests found.");
        return Ok(());
    }

    println!("{}", requests_table(&requests));
    Ok(())
}

pub async fn create_request(
    orchestrator: &RequestOrchestrator,
    submission: Submission,
) -> anyhow::Result<()> {
    let outcome = orchestrator.create_request_with_automation(submission).await?;
    let request = &outcome.request;

    println!(
        "Created request {} for {} ({})",
        request.id, request.broker_name, request.status
    );
    match &outcome.automation {
        Some(result) if result.success => println!("  Submitted: {}", result.message),
        Some(result) => println!("  Submission failed: {}", result.message),
        None => {
            if let Some(url) = &request.metadata.opt_out_url {
                println!("  Opt out manually at {url}");
            }
        }
    }
    if let Some(fields) = &request.metadata.form_fields {
        println!("  Detected {} form field(s)", fields.len());
    }
    Ok(())
}

pub fn update_request(
    orchestrator: &RequestOrchestrator,
    id: &str,
    status: RequestStatus,
    response: Option<String>,
) -> anyhow::Result<()> {
    let request = orchestrator.update_status(id, status, response)?;
    println!("Request {} is now {}", request.id, request.status);
    Ok(())
}

pub fn delete_request(db: &Database, id: &str) -> anyhow::Result<()> {
    if !db.delete_request(id)? {
        anyhow::bail!("Request '{}' not found", id);
    }
    println!("Deleted request {id}");
    Ok(())
}

pub fn track_request(orchestrator: &RequestOrchestrator, id: &str) -> anyhow::Result<()> {
    let progress = orchestrator.tracker().track_progress(id)?;

    let mut table = Table::new();
    table.set_header(vec!["Step", "Status", "Started", "Completed"]);
    for step in &progress.steps {
        table.add_row(vec![
            Cell::new(step.id.as_str()),
            Cell::new(step.status.as_str()),
            Cell::new(stamp(step.started_at)),
            Cell::new(stamp(step.completed_at)),
        ]);
    }
    println!("{table}");
    println!("Overall:              {}", progress.overall_status.as_str());
    if let Some(eta) = progress.estimated_completion {
        println!("Estimated completion: {}", eta.format("%Y-%m-%d"));
    }
    Ok(())
}

pub fn queue_requests(orchestrator: &RequestOrchestrator, email: &str) -> anyhow::Result<()> {
    let created = orchestrator.queue_matches(email)?;
    if created.is_empty() {
        println!("No new requests queued; every likely broker already has one.");
        return Ok(());
    }

    println!("{}", requests_table(&created));
    println!(
        "Queued {} request(s). Run `data-breaker process` to submit them.",
        created.len()
    );
    Ok(())
}
