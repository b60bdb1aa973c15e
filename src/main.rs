use anyhow::Result;
use tracing::info;

use perf_health_reporter::{
    build_slack_payload, default_plan_tiers, load_budget_registry, load_config, load_plan_tiers,
    send_to_slack, write_report, BudgetRegistry, ReportAssembler, SnapshotStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!(
        "results = {}, threshold level = {}",
        cfg.results_dir.display(),
        cfg.threshold_level
    );

    let registry = match &cfg.budgets_path {
        Some(path) => load_budget_registry(path)?,
        None => BudgetRegistry::defaults(),
    };
    let plans = match &cfg.plans_path {
        Some(path) => load_plan_tiers(path)?,
        None => default_plan_tiers(),
    };

    let store = SnapshotStore::new(&cfg.results_dir, cfg.trend_window);
    let test_cases = store.load_test_cases()?;
    let resources = store.load_resources()?;

    let report = ReportAssembler::from_config(&cfg, &registry, &plans).assemble(&test_cases, &resources);
    write_report(&report, &cfg.report_path)?;
    info!("Report written to {}", cfg.report_path.display());

    let summary = &report.summary;
    info!(
        "Health score {}/100: {} violations, {} warnings, {} degrading trends",
        report.health_score, summary.total_violations, summary.total_warnings, summary.degrading_trends
    );
    for rec in &report.recommendations {
        info!("Recommendation: {}", rec);
    }

    // Notify only if there are issues
    match &cfg.slack_webhook_url {
        Some(url) if report.has_issues() => {
            info!("Issues detected, sending notification to Slack");
            let payload = build_slack_payload(&cfg, &report);
            send_to_slack(url, &payload).await?;
        }
        Some(_) => info!("No issues detected, skipping Slack notification"),
        None => {}
    }

    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
