//! `vmcycle plan` command

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use vmcycle_core::plan::MAX_CYCLES;
use vmcycle_core::{Config, Plan, Step};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "STEP")]
    step: String,
    #[tabled(rename = "RUNS AFTER ABORT")]
    after_abort: &'static str,
}

/// Print the steps a run would execute.
pub fn plan(cycles: Option<usize>) -> Result<()> {
    let cycles = match cycles {
        Some(n) => n,
        None => Config::load().context("Failed to load configuration")?.cycles,
    };
    if cycles > MAX_CYCLES {
        bail!("cycles must be at most {}, got {}", MAX_CYCLES, cycles);
    }
    let plan = Plan::new(cycles);

    let rows: Vec<StepRow> = plan
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| StepRow {
            index: i + 1,
            step: step.to_string(),
            after_abort: match step {
                Step::Load => "yes",
                Step::Start | Step::Stop => "no (skipped)",
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);
    println!(
        "{} steps ({} cycles), plus {} before and {} after",
        plan.len().to_string().bold(),
        plan.cycles(),
        "create".cyan(),
        "delete".cyan()
    );

    Ok(())
}
