//! Terminal output utilities

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pgext_harness::{PairOutcome, TestVerdict};
use tabled::{settings::Style, Table, Tabled};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Create a spinner
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[derive(Tabled)]
struct PairRow {
    first: String,
    second: String,
    #[tabled(rename = "first tests")]
    first_test: String,
    #[tabled(rename = "second tests")]
    second_test: String,
    benchmarks: String,
    compatible: String,
}

impl From<&PairOutcome> for PairRow {
    fn from(outcome: &PairOutcome) -> Self {
        let bench = |result: Option<bool>| match result {
            Some(true) => "pass",
            Some(false) => "fail",
            None => "-",
        };
        let benchmarks = if outcome.provisioning_error.is_some() {
            "not provisioned".to_string()
        } else {
            format!(
                "{} / {}",
                bench(outcome.forward_bench),
                bench(outcome.backward_bench)
            )
        };

        Self {
            first: outcome.first.clone(),
            second: outcome.second.clone(),
            first_test: verdict(outcome.first_test).to_string(),
            second_test: verdict(outcome.second_test).to_string(),
            benchmarks,
            compatible: if outcome.is_compatible() { "yes" } else { "no" }.to_string(),
        }
    }
}

fn verdict(verdict: TestVerdict) -> &'static str {
    match verdict {
        TestVerdict::NotDeclared => "none",
        TestVerdict::Passed => "pass",
        TestVerdict::Failed => "fail",
    }
}

/// Render pair outcomes as a table
pub fn pair_table(outcomes: &[PairOutcome]) -> String {
    let rows: Vec<PairRow> = outcomes.iter().map(PairRow::from).collect();
    Table::new(rows).with(Style::sharp()).to_string()
}
