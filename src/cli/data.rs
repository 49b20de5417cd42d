use std::path::Path;

use crate::db::Database;
use crate::db::transfer::DataExport;

pub fn export(db: &Database, output: Option<&str>) -> anyhow::Result<()> {
    let export = db.export_data()?;
    let rendered = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!(
                "Exported {} broker(s) and {} request(s) to {path}",
                export.data.brokers.len(),
                export.data.requests.len()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub fn import(db: &Database, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let export: DataExport = serde_json::from_str(&raw)?;
    let summary = db.import_data(export)?;

    println!(
        "Imported {} broker(s) ({} already known) and {} request(s).",
        summary.brokers_added, summary.brokers_skipped, summary.requests_written
    );
    Ok(())
}

pub fn wipe(db: &Database, confirmed: bool) -> anyhow::Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to wipe without --yes");
    }
    db.wipe()?;
    println!("All brokers and requests deleted.");
    Ok(())
}
