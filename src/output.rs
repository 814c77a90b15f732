//! Structured output writer supporting JSON and human-readable modes.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use tether_core_monitor::{
    AggregateHealthSummary, HealthLevel, HealthReport, IntegrationMetrics, IntegrationStatus,
};
use tether_core_resilience::{CircuitSnapshot, CircuitState};

use crate::error::TetherError;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Status command payload: attempt log summary plus the live circuit
#[derive(Debug, Serialize)]
pub struct StatusView<'a> {
    pub status: &'a IntegrationStatus,
    pub circuit: &'a CircuitSnapshot,
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    pub fn status(&self, view: &StatusView<'_>) {
        match self.mode {
            OutputMode::Json => print_json(view),
            OutputMode::Human => println!("{}", status_table(view.status, view.circuit)),
        }
    }

    pub fn metrics(&self, metrics: &IntegrationMetrics) {
        match self.mode {
            OutputMode::Json => print_json(metrics),
            OutputMode::Human => println!("{}", metrics_table(metrics)),
        }
    }

    pub fn health(&self, report: &HealthReport) {
        match self.mode {
            OutputMode::Json => print_json(report),
            OutputMode::Human => {
                println!("{}", summary_table(std::slice::from_ref(report)));
                for recommendation in &report.recommendations {
                    println!("  - {}", recommendation);
                }
            }
        }
    }

    pub fn summary(&self, summary: &AggregateHealthSummary) {
        match self.mode {
            OutputMode::Json => print_json(summary),
            OutputMode::Human => print_summary(summary),
        }
    }

    /// One `watch` sweep; JSON mode emits one compact line per sweep
    pub fn sweep(&self, summary: &AggregateHealthSummary) {
        match self.mode {
            OutputMode::Json => match sweep_line(summary) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("Error: failed to serialize output: {}", e),
            },
            OutputMode::Human => print_summary(summary),
        }
    }

    /// Print an error message
    pub fn error(&self, err: &TetherError) {
        match self.mode {
            OutputMode::Json => eprintln!("{}", error_payload(err)),
            OutputMode::Human => {
                eprintln!("Error: {}", sanitize_error(&err.to_string()));
            }
        }
    }

    /// Print an info message (suppressed in JSON mode)
    pub fn info(&self, msg: &str) {
        if !self.is_json() {
            println!("{}", msg);
        }
    }
}

fn print_summary(summary: &AggregateHealthSummary) {
    println!(
        "{} integration(s): {} healthy, {} degraded, {} unhealthy",
        summary.total, summary.healthy, summary.degraded, summary.unhealthy
    );
    if !summary.integrations.is_empty() {
        println!("{}", summary_table(&summary.integrations));
    }
    for failed in &summary.failed {
        eprintln!(
            "  check failed for {}: {}",
            failed.integration_id,
            sanitize_error(&failed.error)
        );
    }
}

fn sweep_line(summary: &AggregateHealthSummary) -> serde_json::Result<String> {
    serde_json::to_string(summary)
}

fn error_payload(err: &TetherError) -> serde_json::Value {
    serde_json::json!({
        "error": sanitize_error(&err.to_string()),
        "category": err.category().to_string(),
        "exit_code": err.exit_code(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize output: {}", e),
    }
}

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn health_cell(level: HealthLevel) -> Cell {
    let color = match level {
        HealthLevel::Healthy => Color::Green,
        HealthLevel::Degraded => Color::Yellow,
        HealthLevel::Unhealthy => Color::Red,
    };
    Cell::new(level.to_string()).fg(color).add_attribute(Attribute::Bold)
}

fn state_cell(state: CircuitState) -> Cell {
    let color = match state {
        CircuitState::Closed => Color::Green,
        CircuitState::HalfOpen => Color::Yellow,
        CircuitState::Open => Color::Red,
    };
    Cell::new(state.to_string()).fg(color)
}

/// Two-column table for one integration's status and circuit
pub fn status_table(status: &IntegrationStatus, circuit: &CircuitSnapshot) -> Table {
    let mut table = create_table();
    table.set_header(header(&[status.integration_id.as_str(), ""]));

    table.add_row(vec![
        Cell::new("Attempts (window)"),
        Cell::new(status.total_attempts.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Succeeded"),
        Cell::new(status.success_count.to_string()).fg(Color::Green),
    ]);
    if status.failure_count > 0 {
        table.add_row(vec![
            Cell::new("Failed"),
            Cell::new(status.failure_count.to_string()).fg(Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("Success Rate"),
        Cell::new(format!("{:.1}%", status.success_rate)).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Last Attempt"),
        Cell::new(
            status
                .last_attempt
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        ),
    ]);
    if let Some(error) = &status.last_error {
        table.add_row(vec![
            Cell::new("Last Error"),
            Cell::new(sanitize_error(error)).fg(Color::DarkGrey),
        ]);
    }
    table.add_row(vec![Cell::new("Circuit"), state_cell(circuit.state)]);
    if circuit.failure_count > 0 {
        table.add_row(vec![
            Cell::new("Circuit Failures"),
            Cell::new(circuit.failure_count.to_string()),
        ]);
    }

    table
}

/// One row per UTC day, oldest first
pub fn metrics_table(metrics: &IntegrationMetrics) -> Table {
    let mut table = create_table();
    table.set_header(header(&["Day", "Attempts", "Succeeded", "Failed", "Errors"]));

    for (day, daily) in &metrics.daily {
        let distinct: std::collections::BTreeSet<&str> =
            daily.errors.iter().map(String::as_str).collect();
        table.add_row(vec![
            Cell::new(day.to_string()),
            Cell::new(daily.attempts.to_string()),
            Cell::new(daily.successes.to_string()).fg(Color::Green),
            Cell::new(daily.failures.to_string()).fg(if daily.failures > 0 {
                Color::Red
            } else {
                Color::Reset
            }),
            Cell::new(distinct.into_iter().collect::<Vec<_>>().join("; ")).fg(Color::DarkGrey),
        ]);
    }

    table.add_row(vec![
        Cell::new(format!("{} days", metrics.window_days)).add_attribute(Attribute::Bold),
        Cell::new(metrics.total_attempts.to_string()).add_attribute(Attribute::Bold),
        Cell::new(format!("{:.1}%", metrics.success_rate)).add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
    ]);

    table
}

/// One row per health report
pub fn summary_table(reports: &[HealthReport]) -> Table {
    let mut table = create_table();
    table.set_header(header(&["Integration", "Health", "Success Rate", "Attempts", "Last Error"]));

    for report in reports {
        table.add_row(vec![
            Cell::new(&report.integration_id),
            health_cell(report.health),
            Cell::new(format!("{:.1}%", report.status.success_rate)),
            Cell::new(report.status.total_attempts.to_string()),
            Cell::new(
                report
                    .status
                    .last_error
                    .as_deref()
                    .map(sanitize_error)
                    .unwrap_or_default(),
            )
            .fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}
