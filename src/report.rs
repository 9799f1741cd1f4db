use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CodeSummary, DateRange, DriverReport};
use crate::risk::Evaluation;

pub const NO_EVENTS_MESSAGE: &str = "No events found in the data for the selected period.";
const BAR_WIDTH: usize = 30;

pub fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let width = (count * BAR_WIDTH).div_ceil(max).max(1);
    "#".repeat(width)
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

pub fn build_report(range: DateRange, evaluation: &Evaluation) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Driver Risk Assessment");
    let _ = writeln!(
        output,
        "Events from {} to {}",
        display_date(range.start),
        display_date(range.end)
    );
    let _ = writeln!(output);

    let (drivers_scored, reports) = match evaluation {
        Evaluation::NoEventsFound => {
            let _ = writeln!(output, "{NO_EVENTS_MESSAGE}");
            return output;
        }
        Evaluation::Ranked {
            drivers_scored,
            reports,
        } => (drivers_scored, reports),
    };

    let _ = writeln!(
        output,
        "## Drivers Analyzed ({} of {})",
        reports.len(),
        drivers_scored
    );

    for report in reports {
        let _ = writeln!(output);
        write_driver(&mut output, report);
    }

    output
}

fn write_driver(output: &mut String, report: &DriverReport) {
    let _ = writeln!(output, "### Driver {}", report.driver_id);
    let _ = writeln!(output, "Total score: {:.2}", report.total_score);
    let _ = writeln!(output);
    let _ = writeln!(output, "#### Events per day");
    let _ = writeln!(output, "```");

    let max = report
        .daily_series
        .iter()
        .map(|day| day.count)
        .max()
        .unwrap_or(0);
    for day in &report.daily_series {
        let _ = writeln!(
            output,
            "{} | {:<width$} {}",
            display_date(day.date),
            bar(day.count, max),
            day.count,
            width = BAR_WIDTH
        );
    }
    let _ = writeln!(output, "```");

    if report.event_breakdown.is_empty() {
        return;
    }

    let total: usize = report.event_breakdown.iter().map(|entry| entry.count).sum();
    let _ = writeln!(output);
    let _ = writeln!(output, "#### Event distribution");
    let _ = writeln!(output, "| Event | Count | Share |");
    let _ = writeln!(output, "|---|---:|---:|");
    for entry in &report.event_breakdown {
        let _ = writeln!(
            output,
            "| {} | {} | {:.1}% |",
            entry.event_name,
            entry.count,
            share(entry.count, total)
        );
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    range: DateRange,
    status: &'static str,
    drivers_scored: usize,
    drivers: &'a [DriverReport],
}

pub fn build_json_report(range: DateRange, evaluation: &Evaluation) -> serde_json::Result<String> {
    let body = match evaluation {
        Evaluation::NoEventsFound => JsonReport {
            range,
            status: "no_events_found",
            drivers_scored: 0,
            drivers: &[],
        },
        Evaluation::Ranked {
            drivers_scored,
            reports,
        } => JsonReport {
            range,
            status: "ranked",
            drivers_scored: *drivers_scored,
            drivers: reports,
        },
    };
    serde_json::to_string_pretty(&body)
}

/// Plain listing of the codes a run can be weighted on.
pub fn build_code_listing(range: Option<DateRange>, summaries: &[CodeSummary]) -> String {
    let mut output = String::new();

    match range {
        Some(range) => {
            let _ = writeln!(
                output,
                "Period: {} to {}",
                display_date(range.start),
                display_date(range.end)
            );
        }
        None => {
            let _ = writeln!(output, "The dataset is empty.");
            return output;
        }
    }

    let _ = writeln!(output, "Event codes in the data:");
    for summary in summaries {
        let label = match (&summary.event_name, summary.weightable) {
            (Some(name), true) => name.as_str(),
            _ => "(not catalogued, not weightable)",
        };
        let _ = writeln!(
            output,
            "- {:>3} {} ({} events)",
            summary.event_code, label, summary.count
        );
    }

    output
}
