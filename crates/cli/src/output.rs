//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use dashcheck_e2e::{AssertionStatus, ExecutionResult, Outcome, SuiteReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => match serde_yaml::to_string(value) {
            Ok(s) => print!("{s}"),
            Err(e) => print_error(&format!("failed to render YAML: {e}")),
        },
        _ => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => print_error(&format!("failed to render JSON: {e}")),
        },
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(items, format),
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No scenarios found.");
                return;
            }
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                for (header, value) in T::headers().iter().zip(item.row()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

fn outcome_color(outcome: Outcome) -> Color {
    match outcome {
        Outcome::Passed => Color::Green,
        Outcome::Failed => Color::Yellow,
        Outcome::Errored => Color::Red,
    }
}

fn assertion_summary(result: &ExecutionResult) -> String {
    let held = result.assertions.count(AssertionStatus::Held);
    let skipped = result.assertions.count(AssertionStatus::Skipped);
    if skipped > 0 {
        format!("{}/{} ({} skipped)", held, result.assertions.len(), skipped)
    } else {
        format!("{}/{}", held, result.assertions.len())
    }
}

/// First line explaining why a run did not pass
fn headline(result: &ExecutionResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    if let Some(step) = result.failed_steps().next() {
        if let Some(failure) = &step.error {
            return format!("step {} ({}): {}", step.index, step.label, failure.message);
        }
    }
    result
        .assertion_failures()
        .next()
        .map(|f| f.to_string())
        .unwrap_or_default()
}

/// Print a suite report
pub fn print_report(report: &SuiteReport, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            print_structured(report, format);
            return;
        }
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Scenario", "Outcome", "Steps", "Assertions", "Duration", "Detail"]);
            for result in &report.results {
                table.add_row(vec![
                    Cell::new(&result.scenario),
                    Cell::new(result.outcome).fg(outcome_color(result.outcome)),
                    Cell::new(format!("{}/{}", result.steps.len(), result.steps_total)),
                    Cell::new(assertion_summary(result)),
                    Cell::new(format!("{} ms", result.duration_ms)),
                    Cell::new(headline(result)),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            for result in &report.results {
                println!("{} {}", result.outcome, result.scenario);
                for failed in result.failed_steps() {
                    if let Some(failure) = &failed.error {
                        println!("  step {} ({}): {}", failed.index, failed.label, failure.message);
                    }
                }
                for failure in result.assertion_failures() {
                    println!("  {}", failure);
                }
                if let Some(error) = &result.error {
                    println!("  {}", error);
                }
            }
        }
    }

    let summary = format!(
        "{} passed, {} failed, {} errored in {} ms",
        report.passed,
        report.failed,
        report.errored,
        report.duration_ms()
    );
    if report.all_passed() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "·".blue(), message);
}
