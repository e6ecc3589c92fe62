//! Terminal rendering of migrator data

use console::style;
use elif_migrator::{
    ApplyReport, RunSummary, UnitInfo, UnitState, UnitStatus, VersionLogEntry,
};

pub fn heading(text: &str) {
    println!("{}", style(text).bold().cyan());
}

pub fn success(text: &str) {
    println!("{} {}", style("✓").green(), text);
}

pub fn warning(text: &str) {
    println!("{} {}", style("!").yellow(), text);
}

/// Plain left-aligned table; the header row is bold
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| console::measure_text_width(cell))
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn render(&self) -> Vec<String> {
        let widths = self.widths();
        let mut lines = vec![render_line(&self.headers, &widths)];
        for row in &self.rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            lines.push(render_line(&cells, &widths));
        }
        lines
    }

    fn print(&self) {
        for (i, line) in self.render().into_iter().enumerate() {
            if i == 0 {
                println!("{}", style(line).bold());
            } else {
                println!("{}", line);
            }
        }
    }
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| console::pad_str(cell, *width, console::Alignment::Left, None).into_owned())
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn status_cell(status: UnitStatus) -> String {
    let text = status.as_str();
    match status {
        UnitStatus::Processed => style(text).green().to_string(),
        UnitStatus::Skipped => style(text).yellow().to_string(),
        UnitStatus::Error => style(text).red().to_string(),
        UnitStatus::NotNeeded => style(text).dim().to_string(),
    }
}

pub fn pending_table(units: &[UnitInfo]) {
    let mut table = Table::new(vec!["VERSION", "DESCRIPTION", "AUTHOR"]);
    for unit in units {
        table.row(vec![
            unit.version.to_string(),
            unit.description.clone(),
            unit.author.clone(),
        ]);
    }
    table.print();
}

/// `applied` is the label shown for units that are no longer pending
pub fn status_table(states: &[UnitState], applied: UnitStatus) {
    let mut table = Table::new(vec!["VERSION", "STATE", "DESCRIPTION", "SOURCE"]);
    for state in states {
        let label = if state.pending {
            style("pending").yellow().to_string()
        } else {
            status_cell(applied)
        };
        table.row(vec![
            state.info.version.to_string(),
            label,
            state.info.description.clone(),
            state.info.source_path.clone(),
        ]);
    }
    table.print();
}

pub fn history_table(entries: &[VersionLogEntry]) {
    let mut table = Table::new(vec!["ID", "VERSION", "ACTION", "TIMESTAMP", "PATH"]);
    for entry in entries {
        table.row(vec![
            entry.id.to_string(),
            entry.version.to_string(),
            entry.action.to_string(),
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            entry.path.clone(),
        ]);
    }
    table.print();
}

pub fn run_summary(summary: &RunSummary) {
    for unit in &summary.processed {
        print_messages(&unit.info.version.to_string(), &unit.feedback, &unit.errors);
    }

    println!();
    let mut table = Table::new(vec!["VERSION", "STATUS", "DESCRIPTION", "TIME"]);
    for unit in &summary.processed {
        table.row(vec![
            unit.info.version.to_string(),
            status_cell(unit.status),
            unit.info.description.clone(),
            unit.timestamp.format("%H:%M:%S").to_string(),
        ]);
    }
    table.print();

    println!();
    println!(
        "{} processed, {} skipped, {} failed{}",
        summary.count(UnitStatus::Processed),
        summary.count(UnitStatus::Skipped),
        summary.count(UnitStatus::Error),
        if summary.aborted { " (run stopped early)" } else { "" }
    );
}

pub fn apply_report(report: &ApplyReport) {
    if report.outcomes.is_empty() {
        warning("No migrations matched");
        return;
    }

    for outcome in &report.outcomes {
        print_messages(&outcome.version.to_string(), &outcome.feedback, &outcome.errors);
        if outcome.irreversible {
            warning(&format!("Migration {} cannot be reverted", outcome.version));
        } else if outcome.is_success() {
            success(&format!("{} {}", report.direction, outcome.version));
        }
    }
}

fn print_messages(version: &str, feedback: &[String], errors: &[String]) {
    for line in feedback {
        println!("  {} {}", style(version).dim(), line);
    }
    for line in errors {
        println!("  {} {}", style(version).dim(), style(line).red());
    }
}
