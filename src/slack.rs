use anyhow::{anyhow, Context, Result};
use tracing::error;

use crate::report::Report;
use crate::types::{Config, SlackPayload, Status};

fn section(title: &str, lines: Vec<String>, empty: &str) -> serde_json::Value {
    let body = if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    };
    serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": format!("*{}*\n{}", title, body)}
    })
}

pub fn build_slack_payload(cfg: &Config, report: &Report) -> SlackPayload {
    let mut blocks: Vec<serde_json::Value> = Vec::new();
    let title = match &cfg.project_name {
        Some(p) => format!("Performance Report - {}", p),
        None => "Performance Report".to_string(),
    };
    blocks.push(serde_json::json!({
        "type": "header",
        "text": {"type": "plain_text", "text": title}
    }));

    let summary = &report.summary;
    let overview = format!(
        "Health score: {}/100\nThreshold level: {}\nTests: {} ({} passed, {} warned, {} failed)\nViolations: {} | Warnings: {} | Degrading trends: {}",
        report.health_score,
        report.threshold_level,
        summary.total_tests,
        summary.passed,
        summary.warned,
        summary.failed,
        summary.total_violations,
        summary.total_warnings,
        summary.degrading_trends,
    );
    blocks.push(serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": overview}
    }));

    // Budget violations and warnings
    let mut violation_lines: Vec<String> = Vec::new();
    let mut warning_lines: Vec<String> = Vec::new();
    for r in &report.test_case_results {
        for o in &r.outcomes {
            let threshold = o
                .threshold_used
                .map(|t| format!("{}", t))
                .unwrap_or_else(|| "-".to_string());
            let line = format!("• `{}` {} = {} (budget {})", r.name, o.metric, o.observed, threshold);
            match o.status {
                Status::Fail => violation_lines.push(line),
                Status::Warning => warning_lines.push(line),
                _ => {}
            }
        }
    }
    blocks.push(section("Budget violations", violation_lines, "No budget violations."));
    blocks.push(section("Budget warnings", warning_lines, "No metrics approaching budget."));

    // Flagged trends
    let trend_lines: Vec<String> = report
        .trends
        .iter()
        .map(|t| {
            format!(
                "• `{}` {} {} ({:+.1}%, R² {:.2}, {} confidence)",
                t.test_case,
                t.metric,
                t.presented_direction,
                t.trend.percent_change,
                t.trend.r_squared,
                t.trend.confidence
            )
        })
        .collect();
    blocks.push(section("Trends", trend_lines, "No significant trends."));

    // Capacity
    let mut capacity_lines: Vec<String> = report
        .capacity
        .projections
        .iter()
        .map(|p| {
            format!(
                "• `{}` {:.2} -> {:.2} in {:.0}d ({:+.3}/day)",
                p.resource, p.current_value, p.projected_value, p.horizon_days, p.growth_per_day
            )
        })
        .collect();
    if let Some(sel) = &report.capacity.selection {
        let fit = if sel.fits { "" } else { " (exceeds plan limits)" };
        capacity_lines.push(format!(
            "Plan: `{}` ${:.2}/month{}",
            sel.chosen.name,
            sel.total_monthly_cost(),
            fit
        ));
    }
    blocks.push(section("Capacity", capacity_lines, "No resource usage data."));

    let rec_lines: Vec<String> = report
        .recommendations
        .iter()
        .map(|r| format!("• {}", r))
        .collect();
    blocks.push(section("Recommendations", rec_lines, "No recommendations."));

    SlackPayload { text: None, blocks }
}

pub async fn send_to_slack(webhook_url: &str, payload: &SlackPayload) -> Result<()> {
    let client = reqwest::Client::new();
    let res = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .context("Failed to send Slack request")?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Slack webhook failed: {} - {}", status, body);
        return Err(anyhow!("Slack webhook returned non-success status"));
    }
    Ok(())
}
