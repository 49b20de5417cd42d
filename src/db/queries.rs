use std::str::FromStr;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

use super::models::{
    Broker, NewBroker, NewRequest, RemovalRequest, RequestMetadata, RequestUpdate,
};
use super::{Database, Repository};
use crate::error::{AppError, AppResult};

const BROKER_COLUMNS: &str = "id, name, opt_out_url, category, opt_out_method, data_types, \
     difficulty, response_time, regions, laws, premium, created_at";

const REQUEST_COLUMNS: &str =
    "id, broker_name, status, email, response, metadata, created_at, updated_at";

fn text_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = AppError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_broker_row(row: &Row) -> rusqlite::Result<Broker> {
    Ok(Broker {
        id: row.get(0)?,
        name: row.get(1)?,
        opt_out_url: row.get(2)?,
        category: text_enum(row, 3)?,
        opt_out_method: text_enum(row, 4)?,
        data_types: json_column(row, 5)?,
        difficulty: text_enum(row, 6)?,
        response_time: row.get(7)?,
        regions: json_column(row, 8)?,
        laws: json_column(row, 9)?,
        premium: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn map_request_row(row: &Row) -> rusqlite::Result<RemovalRequest> {
    let metadata: Option<String> = row.get(5)?;
    Ok(RemovalRequest {
        id: row.get(0)?,
        broker_name: row.get(1)?,
        status: text_enum(row, 2)?,
        email: row.get(3)?,
        response: row.get(4)?,
        metadata: RequestMetadata::parse(metadata.as_deref()),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn select_request(conn: &Connection, id: &str) -> rusqlite::Result<Option<RemovalRequest>> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM removal_requests WHERE id = ?1"),
        params![id],
        map_request_row,
    )
    .optional()
}

/// Write every column of `broker`. Used for both catalog additions and imports.
pub(super) fn insert_broker(conn: &Connection, broker: &Broker) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO brokers ({BROKER_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            broker.id,
            broker.name,
            broker.opt_out_url,
            broker.category.as_str(),
            broker.opt_out_method.as_str(),
            serde_json::to_string(&broker.data_types)?,
            broker.difficulty.as_str(),
            broker.response_time,
            serde_json::to_string(&broker.regions)?,
            serde_json::to_string(&broker.laws)?,
            broker.premium,
            broker.created_at,
        ],
    )?;
    Ok(())
}

/// Insert or overwrite a request row by id.
pub(super) fn upsert_request(conn: &Connection, req: &RemovalRequest) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO removal_requests ({REQUEST_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                broker_name = excluded.broker_name,
                status = excluded.status,
                email = excluded.email,
                response = excluded.response,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at"
        ),
        params![
            req.id,
            req.broker_name,
            req.status.as_str(),
            req.email,
            req.response,
            req.metadata.to_json()?,
            req.created_at,
            req.updated_at,
        ],
    )?;
    Ok(())
}

pub(super) fn broker_name_taken(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM brokers WHERE LOWER(name) = LOWER(?1))",
        params![name],
        |row| row.get(0),
    )
}

impl Repository for Database {
    // --- Brokers ---

    fn get_brokers(&self) -> AppResult<Vec<Broker>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BROKER_COLUMNS} FROM brokers ORDER BY rowid"
        ))?;
        let brokers = stmt
            .query_map([], map_broker_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(brokers)
    }

    fn get_broker_by_name(&self, name: &str) -> AppResult<Option<Broker>> {
        let conn = self.conn();
        let broker = conn
            .query_row(
                &format!("SELECT {BROKER_COLUMNS} FROM brokers WHERE LOWER(name) = LOWER(?1)"),
                params![name.trim()],
                map_broker_row,
            )
            .optional()?;
        Ok(broker)
    }

    fn add_broker(&self, data: NewBroker) -> AppResult<Broker> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("broker name must not be empty".into()));
        }

        let conn = self.conn();
        if broker_name_taken(&conn, name)? {
            return Err(AppError::Validation(format!(
                "a broker named '{name}' already exists"
            )));
        }

        let broker = Broker {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            opt_out_url: data.opt_out_url,
            category: data.category,
            opt_out_method: data.opt_out_method,
            data_types: data.data_types,
            difficulty: data.difficulty,
            response_time: data.response_time,
            regions: data.regions,
            laws: data.laws,
            premium: data.premium,
            created_at: Utc::now(),
        };
        insert_broker(&conn, &broker)?;
        tracing::debug!("Added broker {} ({})", broker.name, broker.id);
        Ok(broker)
    }

    fn delete_broker(&self, id: &str) -> AppResult<bool> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM brokers WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // --- Removal Requests ---

    fn get_requests(&self) -> AppResult<Vec<RemovalRequest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM removal_requests ORDER BY rowid"
        ))?;
        let requests = stmt
            .query_map([], map_request_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    fn get_request_by_id(&self, id: &str) -> AppResult<Option<RemovalRequest>> {
        let conn = self.conn();
        Ok(select_request(&conn, id)?)
    }

    fn create_request(&self, data: NewRequest) -> AppResult<RemovalRequest> {
        if data.broker_name.trim().is_empty() || data.email.trim().is_empty() {
            return Err(AppError::Validation(
                "a request needs both a broker name and an email".into(),
            ));
        }

        let now = Utc::now();
        let request = RemovalRequest {
            id: uuid::Uuid::new_v4().to_string(),
            broker_name: data.broker_name.trim().to_string(),
            status: data.status,
            created_at: now,
            updated_at: now,
            email: data.email.trim().to_string(),
            response: data.response,
            metadata: data.metadata,
        };

        let conn = self.conn();
        upsert_request(&conn, &request)?;
        Ok(request)
    }

    fn update_request(
        &self,
        id: &str,
        update: RequestUpdate,
    ) -> AppResult<Option<RemovalRequest>> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let Some(mut request) = select_request(&tx, id)? else {
            return Ok(None);
        };

        if let Some(status) = update.status {
            if !request.status.is_forward_to(status) {
                tracing::warn!(
                    "Request {} moved backwards: {} -> {}",
                    request.id,
                    request.status,
                    status
                );
            }
            request.status = status;
        }
        if let Some(response) = update.response {
            request.response = Some(response);
        }
        if let Some(patch) = update.metadata {
            request.metadata.merge(patch);
        }
        request.updated_at = Utc::now();

        tx.execute(
            "UPDATE removal_requests SET status = ?2, response = ?3, metadata = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                request.id,
                request.status.as_str(),
                request.response,
                request.metadata.to_json()?,
                request.updated_at,
            ],
        )?;
        tx.commit()?;

        Ok(Some(request))
    }

    fn delete_request(&self, id: &str) -> AppResult<bool> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM removal_requests WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

impl Database {
    // --- Registry Meta ---

    pub fn set_registry_meta(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO registry_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_registry_meta(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM registry_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
