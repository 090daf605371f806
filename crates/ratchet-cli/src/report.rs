use anyhow::Result;
use ratchet_config::AppConfig;
use ratchet_db::{MigrationFile, MigrationState, RunReport, StatusEntry};

const WIDTH: usize = 70;

/// Print the summary box for a finished run.
pub fn print_run(report: &RunReport, config: &AppConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for line in run_summary(report, config) {
        println!("{line}");
    }
    Ok(())
}

pub fn print_plan(plan: &[MigrationFile], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }
    if plan.is_empty() {
        println!("Nothing to apply.");
        return Ok(());
    }
    println!("Would apply {} migration(s):", plan.len());
    for file in plan {
        println!("  {:>6}  {}", file.id, file.file_name);
    }
    Ok(())
}

pub fn print_status(entries: &[StatusEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No migrations found.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "  {:<8} {:>6}  {}",
            state_label(entry.state),
            entry.id,
            entry.file_name
        );
    }
    let skipped = entries
        .iter()
        .filter(|e| e.state == MigrationState::Skipped)
        .count();
    if skipped > 0 {
        println!();
        println!(
            "{skipped} migration(s) sit below the high-water mark without being recorded and will never run."
        );
    }
    Ok(())
}

fn state_label(state: MigrationState) -> &'static str {
    match state {
        MigrationState::Applied => "applied",
        MigrationState::Pending => "pending",
        MigrationState::Skipped => "skipped",
    }
}

fn mark(value: Option<i64>) -> String {
    value.map_or_else(|| "none".to_string(), |id| id.to_string())
}

fn run_summary(report: &RunReport, config: &AppConfig) -> Vec<String> {
    let title = format!("ratchet v{}", env!("CARGO_PKG_VERSION"));
    let title_dashes = WIDTH - 2 - title.len() - 5;
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(WIDTH - 2));
    let inner = WIDTH - 4;
    let row = |text: &str| format!("│ {text:<inner$} │");

    let mut lines = vec![top, row("")];
    lines.push(row(&format!(
        "Database      {}",
        config.database.path.display()
    )));
    lines.push(row(&format!(
        "Migrations    {}",
        config.migrations.directory.display()
    )));
    lines.push(row(&format!(
        "High-water    {} -> {}",
        mark(report.previous_high_water_mark),
        mark(report.high_water_mark())
    )));
    lines.push(row(&"─".repeat(inner)));

    if report.applied.is_empty() {
        lines.push(row("Up to date, nothing applied."));
    } else {
        lines.push(row(&format!(
            "Applied {} migration(s) in {} ms",
            report.applied.len(),
            report.elapsed_ms
        )));
        for record in &report.applied {
            let mut text = format!("  {:>6}  {}", record.id, record.file);
            if text.chars().count() > inner {
                text = text.chars().take(inner - 1).collect::<String>() + "…";
            }
            lines.push(row(&text));
        }
    }

    lines.push(row(""));
    lines.push(bottom);
    lines
}
