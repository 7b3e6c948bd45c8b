//! `vmcycle run` command

use crate::{OutputFormat, RunArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use vmcycle_core::harness::{default_alias, CycleTest, ProvisionOptions};
use vmcycle_core::{init_observability, run_cycle_test, Config, FacadeFactory};

/// Provision, cycle, and tear down a VM. Returns whether every assertion passed.
pub async fn run(args: RunArgs) -> Result<bool> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    init_observability(&config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let image_uuid = args.image.clone().or_else(|| config.image_uuid.clone()).context(
        "No image given. Pass --image, set VMCYCLE_IMAGE, or set image_uuid in the config file",
    )?;

    let facade = FacadeFactory::create(&config.facade_config())
        .with_context(|| format!("Failed to initialize '{}' backend", config.backend))?;

    let test = CycleTest {
        name: format!("{} start/stop cycles on {}", config.cycles, config.brand),
        image_uuid,
        cycles: config.cycles,
        brand: config.brand.clone(),
        timeout: config.timeout(),
        cleanup_timeout: config.cleanup_timeout(),
        provision: ProvisionOptions {
            autoboot: args.autoboot,
            do_not_inventory: true,
            alias: args.alias.clone().unwrap_or_else(default_alias),
            keep_vm: args.keep,
        },
    };

    let run = run_cycle_test(facade.as_ref(), &test).await;

    match args.format {
        OutputFormat::Tap => print!("{}", run.report.to_tap()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run.report)?),
    }

    let summary = format!(
        "{} passed, {} failed, {} skipped",
        run.report.passed(),
        run.report.failed(),
        run.report.skipped
    );
    if run.report.is_success() {
        eprintln!("{} {}", "✓".green(), summary);
    } else {
        eprintln!("{} {}", "✗".red(), summary.red());
        if run.timed_out {
            eprintln!("  {}", format!("run exceeded {} ms", config.timeout_ms).yellow());
        }
        if let Some(uuid) = &run.state.uuid {
            eprintln!("  VM {} was left behind", uuid.bold());
        }
    }

    Ok(run.report.is_success())
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(cycles) = args.cycles {
        config.cycles = cycles;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(backend) = &args.backend {
        config.backend = backend.clone();
    }
    if let Some(brand) = &args.brand {
        config.brand = brand.clone();
    }
}
