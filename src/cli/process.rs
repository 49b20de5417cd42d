use crate::removal::RequestOrchestrator;

pub async fn process(orchestrator: &RequestOrchestrator) -> anyhow::Result<()> {
    println!("Processing pending removal requests...");
    let summary = orchestrator.process_pending_requests().await?;

    if summary.processed == 0 && summary.skipped == 0 {
        println!("Nothing to do: no pending requests.");
        return Ok(());
    }

    println!(
        "Processed {} request(s): {} submitted, {} failed.",
        summary.processed, summary.successes, summary.failures
    );
    if summary.skipped > 0 {
        println!(
            "Skipped {} request(s) without an opt-out URL; these need a manual opt-out.",
            summary.skipped
        );
    }
    if summary.failures > 0 {
        println!("Failed requests stay pending and will be retried on the next run.");
    }
    Ok(())
}
