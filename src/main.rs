//! Fourterm - controlled-source netlist solver
//!
//! Solves the operating point of a netlist and prints net voltages.
//!
//! # Usage
//!
//! ```bash
//! fourterm buffer.net --set VIN=1.5 -v
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use fourterm::{
    dsl,
    error::Result,
    netlist::validate_netlist,
    solver::{DEFAULT_GMIN, DEFAULT_MAX_ITERATIONS, DEFAULT_RESIDUAL_TOLERANCE, DEFAULT_TOLERANCE},
    Netlist, Simulator, SimulatorConfig,
};
use log::LevelFilter;

/// Controlled-source netlist solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Maximum Newton-Raphson iterations per solve
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Convergence tolerance in volts
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Convergence tolerance on current-limited sources, relative to CURLIM
    #[arg(long, default_value_t = DEFAULT_RESIDUAL_TOLERANCE)]
    residual_tolerance: f64,

    /// Minimum conductance from every free net to ground, in siemens
    #[arg(long, default_value_t = DEFAULT_GMIN)]
    gmin: f64,

    /// Override a rail voltage after reset (repeatable)
    #[arg(long = "set", value_name = "NET=V", value_parser = parse_assignment)]
    set: Vec<(String, f64)>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_assignment(s: &str) -> std::result::Result<(String, f64), String> {
    let (net, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NET=V, got '{}'", s))?;
    let value = dsl::parse_value(value).ok_or_else(|| format!("invalid voltage '{}'", value))?;
    Ok((net.trim().to_string(), value))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Parse and build the netlist
    let ast = dsl::parse_file(&args.netlist)?;
    let netlist = Netlist::from_ast(&ast)?;
    validate_netlist(&netlist)?;

    let config = SimulatorConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_tolerance(args.tolerance)
        .with_residual_tolerance(args.residual_tolerance)
        .with_gmin(args.gmin);
    let mut simulator = Simulator::with_config(netlist, config);

    simulator.reset()?;
    for (net, voltage) in &args.set {
        simulator.set_rail(net, *voltage)?;
    }
    simulator.step()?;

    let netlist = simulator.netlist();
    let nets = netlist.nets();
    let ids: Vec<_> = if netlist.probes().is_empty() {
        nets.iter()
            .filter(|(id, _)| !id.is_ground())
            .map(|(id, _)| id)
            .collect()
    } else {
        netlist.probes().to_vec()
    };

    for id in ids {
        let net = nets.get(id);
        println!("{:<16} {:>14.6}", net.name, net.voltage());
    }

    Ok(())
}
