pub mod json;
pub mod terminal;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::db::models::{BrokerCategory, RemovalRequest, RequestStatus};
use crate::db::{Database, Repository};

pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub requests: Vec<RemovalRequest>,
    pub summary: ReportSummary,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub total_brokers: usize,
    pub total_requests: usize,
    /// Requests per status, every status listed.
    pub by_status: BTreeMap<String, usize>,
    /// Requests per broker category; only categories with requests appear.
    pub by_category: BTreeMap<String, usize>,
    /// Share of requests that reached `completed`, 0-100.
    pub completion_rate: u8,
}

impl Report {
    pub fn build(db: &Database) -> anyhow::Result<Self> {
        let brokers = db.get_brokers()?;
        let requests = db.get_requests()?;

        let categories: HashMap<String, BrokerCategory> = brokers
            .iter()
            .map(|b| (b.name.to_lowercase(), b.category))
            .collect();

        let mut by_status: BTreeMap<String, usize> = RequestStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut by_category = BTreeMap::new();

        for r in &requests {
            *by_status.entry(r.status.as_str().to_string()).or_default() += 1;
            let category = categories
                .get(&r.broker_name.to_lowercase())
                .copied()
                .or(r.metadata.broker_category)
                .unwrap_or(BrokerCategory::Other);
            *by_category.entry(category.as_str().to_string()).or_default() += 1;
        }

        let completed = requests
            .iter()
            .filter(|r| r.status == RequestStatus::Completed)
            .count();
        let completion_rate = if requests.is_empty() {
            0
        } else {
            (completed * 100 / requests.len()) as u8
        };

        let summary = ReportSummary {
            total_brokers: brokers.len(),
            total_requests: requests.len(),
            by_status,
            by_category,
            completion_rate,
        };

        Ok(Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            requests,
            summary,
        })
    }

    pub fn render(&self, format: ReportFormat) -> anyhow::Result<String> {
        match format {
            ReportFormat::Terminal => terminal::render(self),
            ReportFormat::Json => json::render(self),
        }
    }
}
