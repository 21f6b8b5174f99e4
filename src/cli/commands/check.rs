use crate::state::SharedState;

pub async fn cmd_check(state: &SharedState) -> anyhow::Result<()> {
    let Some(result) = state.monitor.run_once().await else {
        println!("A reconciliation cycle is already running.");
        return Ok(());
    };
    let report = result?;

    println!("Checked {} active download(s)", report.checked);
    println!(
        "  matched: {} | progressed: {} | imported: {} | failed: {} | waiting: {}",
        report.matched, report.progressed, report.imported, report.failed, report.waiting
    );
    if report.errors > 0 {
        println!("  {} download(s) hit errors and will be retried", report.errors);
    }

    Ok(())
}
