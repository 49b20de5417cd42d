use serde_json::Value;

use crate::db::models::NewBroker;
use crate::db::{Database, Repository};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySync {
    pub fetched: usize,
    pub added: usize,
    pub invalid: usize,
}

/// Parse registry entries one at a time so a single malformed broker does not
/// reject the whole document.
pub fn parse_registry(entries: Vec<Value>) -> (Vec<NewBroker>, usize) {
    let mut brokers = Vec::with_capacity(entries.len());
    let mut invalid = 0;
    for entry in entries {
        match serde_json::from_value::<NewBroker>(entry) {
            Ok(broker) => brokers.push(broker),
            Err(e) => {
                tracing::warn!("Skipping malformed registry entry: {e}");
                invalid += 1;
            }
        }
    }
    (brokers, invalid)
}

/// Fetch the broker registry from `url`.
pub async fn fetch_registry(url: &str, user_agent: &str) -> AppResult<(Vec<NewBroker>, usize)> {
    let client = reqwest::Client::new();
    let resp = client
        .get(url)
        .header("User-Agent", user_agent)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(AppError::Registry(format!(
            "failed to fetch registry: HTTP {}",
            resp.status()
        )));
    }

    let entries: Vec<Value> = resp.json().await?;
    Ok(parse_registry(entries))
}

/// Add every fetched broker whose name is not yet in the catalog.
pub fn merge_into(db: &Database, brokers: Vec<NewBroker>) -> AppResult<usize> {
    let mut added = 0;
    for broker in brokers {
        if db.get_broker_by_name(&broker.name)?.is_some() {
            tracing::debug!("Registry broker {} already known", broker.name);
            continue;
        }
        db.add_broker(broker)?;
        added += 1;
    }
    Ok(added)
}

pub async fn sync_registry(
    db: &Database,
    url: &str,
    user_agent: &str,
) -> AppResult<RegistrySync> {
    let (brokers, invalid) = fetch_registry(url, user_agent).await?;
    let fetched = brokers.len();
    let added = merge_into(db, brokers)?;

    db.set_registry_meta("last_fetched_at", &chrono::Utc::now().to_rfc3339())?;
    db.set_registry_meta("source_url", url)?;

    Ok(RegistrySync {
        fetched,
        added,
        invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BrokerCategory;

    #[test]
    fn test_parse_registry_skips_bad_entries() {
        let doc = serde_json::json!([
            {
                "name": "Spokeo",
                "optOutUrl": "https://www.spokeo.com/optout",
                "category": "people-search",
                "optOutMethod": "form",
                "dataTypes": ["name", "address"],
                "difficulty": "easy"
            },
            {
                "name": "Mystery",
                "category": "astrology",
                "optOutMethod": "form",
                "difficulty": "easy"
            }
        ]);
        let Value::Array(entries) = doc else {
            unreachable!()
        };
        let (brokers, invalid) = parse_registry(entries);
        assert_eq!(brokers.len(), 1);
        assert_eq!(invalid, 1);
        assert_eq!(brokers[0].category, BrokerCategory::PeopleSearch);
        assert!(brokers[0].data_types.contains("address"));
        assert!(!brokers[0].premium);
    }

    #[test]
    fn test_merge_into_skips_known_names() {
        let db = Database::open_in_memory().unwrap();
        crate::broker::catalog::seed(&db).unwrap();
        let doc = serde_json::json!([
            {"name": "spokeo", "category": "people-search", "optOutMethod": "form", "difficulty": "easy"},
            {"name": "NewCo", "category": "marketing", "optOutMethod": "email", "difficulty": "hard"}
        ]);
        let Value::Array(entries) = doc else {
            unreachable!()
        };
        let (brokers, _) = parse_registry(entries);
        assert_eq!(merge_into(&db, brokers).unwrap(), 1);
        assert!(db.get_broker_by_name("NewCo").unwrap().is_some());
    }
}
