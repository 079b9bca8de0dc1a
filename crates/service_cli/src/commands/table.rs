//! Box-drawn tables for run reports.

use bias_kernel::{Estimate, RunReport};

const LABEL: usize = 14;
const CELL: usize = 14;

fn border(left: char, mid: char, right: char, cells: usize) -> String {
    let mut line = String::new();
    line.push(left);
    line.push_str(&"─".repeat(LABEL + 2));
    for _ in 0..cells {
        line.push(mid);
        line.push_str(&"─".repeat(CELL + 2));
    }
    line.push(right);
    line
}

fn row(label: &str, cells: &[String]) -> String {
    let mut line = format!("│ {:<width$} ", label, width = LABEL);
    for cell in cells {
        line.push_str(&format!("│ {:>width$} ", cell, width = CELL));
    }
    line.push('│');
    line
}

/// Lays out `rows` under `header` in a box-drawn table.
pub fn render(header: &[&str], rows: &[(String, Vec<String>)]) -> String {
    let cells = header.len().saturating_sub(1);
    let mut lines = vec![border('┌', '┬', '┐', cells)];
    let first = header.first().copied().unwrap_or("");
    let rest = header.get(1..).unwrap_or(&[]);
    lines.push(row(
        first,
        &rest.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    ));
    lines.push(border('├', '┼', '┤', cells));
    for (label, values) in rows {
        lines.push(row(label, values));
    }
    lines.push(border('└', '┴', '┘', cells));
    lines.join("\n")
}

/// Formats a number for a table cell.
pub fn number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if (1e-3..1e4).contains(&value.abs()) {
        format!("{:.6}", value)
    } else {
        format!("{:.4e}", value)
    }
}

fn estimate_row(label: &str, estimate: &Estimate) -> (String, Vec<String>) {
    (
        label.to_string(),
        vec![
            number(estimate.mean),
            number(estimate.std_error),
            format!("{:.2}%", 100.0 * estimate.relative_error()),
        ],
    )
}

/// Tally table of one run.
pub fn tallies(report: &RunReport) -> String {
    render(
        &["Tally", "Mean", "Std error", "Rel. error"],
        &[
            estimate_row("Transmission", &report.tally.transmission),
            estimate_row("Deposit (MeV)", &report.tally.deposit),
            estimate_row("Detector", &report.tally.detector),
        ],
    )
}

/// Counter table of one run: kernel counters then, when biased, the
/// engine counters that are non-zero.
pub fn counters(report: &RunReport) -> String {
    let kernel = &report.kernel;
    let mut rows: Vec<(String, u64)> = vec![
        ("Histories".into(), report.tally.histories),
        ("Events".into(), kernel.events),
        ("Skipped events".into(), kernel.skipped_events),
        ("Tracks".into(), kernel.tracks),
        ("Steps".into(), kernel.steps),
        ("Postponements".into(), kernel.postponements),
        ("Forced tracks".into(), kernel.forced_trackings),
        ("Stuck tracks".into(), kernel.stuck_tracks),
    ];
    if let Some(summary) = &report.biasing {
        let stats = &summary.stats;
        rows.extend(
            [
                ("Clones", stats.clones),
                ("Forced", stats.forced_interactions),
                ("Free flights", stats.free_flights_restored),
                ("Threshold kills", stats.threshold_kills),
                ("Splits", stats.split_interactions),
                ("Split replays", stats.split_replays),
                ("Roulette kills", stats.roulette_kills),
                ("Roulette lives", stats.roulette_survivals),
                ("Vertices", stats.vertices_recorded),
                ("Vertex replays", stats.vertex_replays),
                ("Gate trials", stats.acceptance_trials),
                ("Gate rejects", stats.acceptance_rejections),
                ("Gate exhausted", stats.acceptance_exhaustions),
                ("Violations", stats.invariant_violations),
            ]
            .into_iter()
            .filter(|(_, value)| *value > 0)
            .map(|(label, value)| (label.to_string(), value)),
        );
    }
    render(
        &["Counter", "Value"],
        &rows
            .into_iter()
            .map(|(label, value)| (label, vec![value.to_string()]))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_aligns_rows() {
        let table = render(
            &["Tally", "Mean"],
            &[("Deposit".to_string(), vec!["0.5".to_string()])],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert!(lines[3].contains("Deposit"));
        assert!(lines[0].starts_with('┌'));
        assert!(lines[4].ends_with('┘'));
    }

    #[test]
    fn test_number_format() {
        assert_eq!(number(0.0), "0");
        assert_eq!(number(0.5), "0.500000");
        assert_eq!(number(2.5e-6), "2.5000e-6");
    }
}
