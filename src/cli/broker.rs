use comfy_table::{Cell, Table};

use crate::db::models::{BrokerCategory, NewBroker};
use crate::db::{Database, Repository};
use crate::removal::orchestrator::validate_email;

pub fn list_brokers(db: &Database, category: Option<BrokerCategory>) -> anyhow::Result<()> {
    let brokers: Vec<_> = db
        .get_brokers()?
        .into_iter()
        .filter(|b| category.is_none_or(|c| b.category == c))
        .collect();

    if brokers.is_empty() {
        println!(
            "No brokers found. Run `data-breaker registry seed` to load the built-in catalog."
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Category", "Method", "Difficulty"]);

    for b in &brokers {
        table.add_row(vec![
            Cell::new(super::short_id(&b.id)),
            Cell::new(&b.name),
            Cell::new(b.category),
            Cell::new(b.opt_out_method),
            Cell::new(b.difficulty),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub fn broker_info(db: &Database, name: &str) -> anyhow::Result<()> {
    let Some(b) = db.get_broker_by_name(name)? else {
        anyhow::bail!("Broker '{}' not found", name);
    };

    println!("ID:            {}", b.id);
    println!("Name:          {}", b.name);
    if let Some(url) = &b.opt_out_url {
        println!("Opt-out URL:   {url}");
    }
    println!("Category:      {}", b.category);
    println!("Method:        {}", b.opt_out_method);
    println!("Difficulty:    {}", b.difficulty);
    if let Some(rt) = &b.response_time {
        println!("Response time: {rt}");
    }
    if !b.data_types.is_empty() {
        let types: Vec<&str> = b.data_types.iter().map(String::as_str).collect();
        println!("Data held:     {}", types.join(", "));
    }
    if !b.regions.is_empty() {
        println!("Regions:       {}", b.regions.join(", "));
    }
    if !b.laws.is_empty() {
        println!("Laws:          {}", b.laws.join(", "));
    }
    if b.premium {
        println!("Premium:       yes");
    }
    println!("Added:         {}", b.created_at.to_rfc3339());
    Ok(())
}

pub fn add_broker(db: &Database, data: NewBroker) -> anyhow::Result<()> {
    let broker = db.add_broker(data)?;
    println!("Added broker {} ({})", broker.name, broker.id);
    Ok(())
}

pub fn delete_broker(db: &Database, id: &str) -> anyhow::Result<()> {
    if !db.delete_broker(id)? {
        anyhow::bail!("Broker '{}' not found", id);
    }
    println!("Deleted broker {id}");
    Ok(())
}

pub fn search(db: &Database, email: &str, json: bool) -> anyhow::Result<()> {
    let email = validate_email(email)?;
    let matches = db.find_brokers_for_email(email)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No brokers in the catalog. Run `data-breaker registry seed` first.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Broker", "Category", "Score", "Likely Has Data"]);
    for m in &matches {
        table.add_row(vec![
            Cell::new(&m.broker.name),
            Cell::new(m.broker.category),
            Cell::new(m.score),
            Cell::new(if m.has_user_data { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");

    let likely = matches.iter().filter(|m| m.has_user_data).count();
    println!(
        "{likely} broker(s) likely hold data for {email}. Run `data-breaker request queue {email}` to request removal."
    );
    Ok(())
}
