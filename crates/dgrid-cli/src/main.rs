use anyhow::{bail, Result};
use clap::Parser;
use std::io;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use dgrid_core::Grid;
use dgrid_io::{export_topology, import_topology, read_topology, validate};

mod cli;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // diagnostics go to stderr so stdout stays parseable (e.g. `check --json`)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Stats { grid_dir } => run_stats(grid_dir),
        Commands::Check { grid_dir, json } => run_check(grid_dir, *json),
        Commands::Switch {
            grid_dir,
            id,
            open,
            close: _,
            out,
        } => run_switch(grid_dir, id, *open, out.as_deref()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_stats(grid_dir: &Path) -> Result<()> {
    let (topology, report) = import_topology(grid_dir)?;
    info!("imported {report}");

    println!("{}", topology.stats());
    if let Some(mv) = topology.mv_grid() {
        print_grid(&mv);
    }
    for lv in topology.lv_grids() {
        print_grid(&lv);
    }
    Ok(())
}

fn print_grid(grid: &Grid) {
    println!(
        "{}: {:.1} kV, generation {:.3} MW, peak load {:.3} MW",
        grid.name(),
        grid.nominal_voltage().value(),
        grid.peak_generation_capacity().value(),
        grid.p_set().value()
    );
}

fn run_check(grid_dir: &Path, json: bool) -> Result<()> {
    let (topology, report) = read_topology(grid_dir)?;
    info!("loaded {report}");

    let diagnostics = validate(&topology);
    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        print!("{diagnostics}");
    }

    let errors = diagnostics.error_count();
    if errors > 0 {
        bail!(
            "{} integrity error{} found",
            errors,
            if errors == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn run_switch(grid_dir: &Path, id: &str, open: bool, out: Option<&Path>) -> Result<()> {
    let (mut topology, _) = import_topology(grid_dir)?;

    let mut switch = topology.switch(id)?;
    if open {
        switch.open()?;
    } else {
        switch.close()?;
    }
    let state = switch.state()?;
    info!("switch {id} is now {state}");

    let target = out.unwrap_or(grid_dir);
    export_topology(&topology, target)?;
    println!("switch {id} {state}; topology written to {}", target.display());
    Ok(())
}
