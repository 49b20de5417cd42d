//! Whole-dataset export, import and wipe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{Broker, RemovalRequest};
use super::queries::{broker_name_taken, insert_broker, upsert_request};
use super::{Database, Repository};
use crate::error::{AppError, AppResult};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct DataExport {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub data: ExportData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub brokers: Vec<Broker>,
    #[serde(default)]
    pub requests: Vec<RemovalRequest>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub brokers_added: usize,
    pub brokers_skipped: usize,
    pub requests_written: usize,
}

impl Database {
    pub fn export_data(&self) -> AppResult<DataExport> {
        Ok(DataExport {
            version: EXPORT_VERSION.to_string(),
            timestamp: Utc::now(),
            data: ExportData {
                brokers: self.get_brokers()?,
                requests: self.get_requests()?,
            },
        })
    }

    /// Brokers whose name is already in the catalog are skipped; requests are
    /// upserted by id. Everything is applied in one transaction.
    pub fn import_data(&self, export: DataExport) -> AppResult<ImportSummary> {
        let major = export.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(AppError::Validation(format!(
                "unsupported export version '{}'",
                export.version
            )));
        }

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for broker in &export.data.brokers {
            if broker_name_taken(&tx, &broker.name)? {
                summary.brokers_skipped += 1;
                continue;
            }
            insert_broker(&tx, broker)?;
            summary.brokers_added += 1;
        }

        for request in &export.data.requests {
            upsert_request(&tx, request)?;
            summary.requests_written += 1;
        }

        tx.commit()?;
        tracing::info!(
            "Imported {} broker(s), skipped {}, wrote {} request(s)",
            summary.brokers_added,
            summary.brokers_skipped,
            summary.requests_written
        );
        Ok(summary)
    }

    /// Remove every broker and request. Registry metadata is kept.
    pub fn wipe(&self) -> AppResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            "BEGIN;
             DELETE FROM removal_requests;
             DELETE FROM brokers;
             COMMIT;",
        )?;
        tracing::warn!("All brokers and removal requests deleted");
        Ok(())
    }
}
