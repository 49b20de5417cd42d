use crate::broker::{catalog, registry};
use crate::db::{Database, Repository};

pub fn seed(db: &Database) -> anyhow::Result<()> {
    let added = catalog::seed(db)?;
    println!(
        "Built-in catalog loaded: {added} new broker(s), {} total.",
        db.get_brokers()?.len()
    );
    Ok(())
}

pub async fn update_registry(db: &Database, url: &str, user_agent: &str) -> anyhow::Result<()> {
    println!("Fetching broker registry...");
    let sync = registry::sync_registry(db, url, user_agent).await?;

    println!(
        "Registry updated: {} broker(s) fetched, {} new.",
        sync.fetched, sync.added
    );
    if sync.invalid > 0 {
        println!("Skipped {} malformed registry entries.", sync.invalid);
    }
    Ok(())
}

pub fn registry_info(db: &Database) -> anyhow::Result<()> {
    let last_fetched = db.get_registry_meta("last_fetched_at")?;
    let source = db.get_registry_meta("source_url")?;
    let broker_count = db.get_brokers()?.len();

    match last_fetched {
        Some(ts) => println!("Last updated:  {ts}"),
        None => println!("Last updated:  never (run `data-breaker registry update`)"),
    }
    if let Some(url) = source {
        println!("Source:        {url}");
    }
    println!("Brokers known: {broker_count}");
    Ok(())
}
