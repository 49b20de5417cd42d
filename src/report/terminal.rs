use comfy_table::{Cell, Table};

use super::Report;
use crate::cli::short_id;

pub fn render(report: &Report) -> anyhow::Result<String> {
    let mut output = String::new();

    output.push_str(&format!(
        "=== Data Breaker Report ({}) ===\n\n",
        report.generated_at
    ));

    // Summary
    output.push_str("--- Summary ---\n");
    output.push_str(&format!(
        "Brokers tracked:      {}\n",
        report.summary.total_brokers
    ));
    output.push_str(&format!(
        "Removal requests:     {}\n",
        report.summary.total_requests
    ));
    for (status, count) in &report.summary.by_status {
        output.push_str(&format!("  {:<20}{count}\n", format!("{status}:")));
    }
    output.push_str(&format!(
        "Completion rate:      {}%\n",
        report.summary.completion_rate
    ));

    if !report.summary.by_category.is_empty() {
        output.push_str("\n--- Requests by Category ---\n");
        let mut table = Table::new();
        table.set_header(vec!["Category", "Requests"]);
        for (category, count) in &report.summary.by_category {
            table.add_row(vec![Cell::new(category), Cell::new(count)]);
        }
        output.push_str(&table.to_string());
        output.push('\n');
    }

    if !report.requests.is_empty() {
        output.push_str("\n--- Removal Requests ---\n");
        let mut table = Table::new();
        table.set_header(vec!["ID", "Broker", "Email", "Status", "Progress", "Est. Completion"]);
        for req in &report.requests {
            let progress = req.metadata.progress.as_ref();
            table.add_row(vec![
                Cell::new(short_id(&req.id)),
                Cell::new(&req.broker_name),
                Cell::new(&req.email),
                Cell::new(req.status),
                Cell::new(progress.map_or("-", |p| p.overall_status.as_str())),
                Cell::new(
                    progress
                        .and_then(|p| p.estimated_completion)
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".into()),
                ),
            ]);
        }
        output.push_str(&table.to_string());
        output.push('\n');
    }

    Ok(output)
}
