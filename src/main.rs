//! Kirchhoff - per-frame circuit solver
//!
//! Drives a series RC or RL circuit frame by frame and prints a CSV trace
//! of the reactive element.
//!
//! # Usage
//!
//! ```bash
//! kirchhoff rc --voltage 9 --resistance 10 --capacitance 0.01 --frames 120 > rc.csv
//! kirchhoff -v rl --voltage 5 --resistance 2 --inductance 1
//! ```

use clap::{Parser, Subcommand};
use kirchhoff_core::{
    error::Result,
    report::{TraceRow, TraceWriter},
    Battery, Capacitor, CircuitSolver, Element, ElementRef, Inductor, NodeId, Resistor,
    SolverConfig, DEFAULT_FRAME_DT,
};

/// Per-frame circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    circuit: CircuitKind,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 60, global = true)]
    frames: usize,

    /// Frame length in seconds
    #[arg(long, default_value_t = DEFAULT_FRAME_DT, global = true)]
    dt: f64,

    /// Sub-step error threshold
    #[arg(long, global = true)]
    error_threshold: Option<f64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum CircuitKind {
    /// Battery charging a capacitor through a resistor
    Rc {
        /// Battery voltage in volts
        #[arg(long, default_value_t = 9.0)]
        voltage: f64,
        /// Series resistance in ohms
        #[arg(long, default_value_t = 10.0)]
        resistance: f64,
        /// Capacitance in farads
        #[arg(long, default_value_t = 0.01)]
        capacitance: f64,
    },
    /// Battery driving current into an inductor through a resistor
    Rl {
        /// Battery voltage in volts
        #[arg(long, default_value_t = 9.0)]
        voltage: f64,
        /// Series resistance in ohms
        #[arg(long, default_value_t = 10.0)]
        resistance: f64,
        /// Inductance in henries
        #[arg(long, default_value_t = 1.0)]
        inductance: f64,
    },
}

impl CircuitKind {
    /// Battery 0 -> 1, resistor 1 -> 2, reactive element 2 -> 0.
    fn elements(&self) -> Vec<Element> {
        let (voltage, resistance, reactive): (f64, f64, Element) = match *self {
            CircuitKind::Rc {
                voltage,
                resistance,
                capacitance,
            } => (voltage, resistance, Capacitor::new([NodeId(2), NodeId(0)], capacitance).into()),
            CircuitKind::Rl {
                voltage,
                resistance,
                inductance,
            } => (voltage, resistance, Inductor::new([NodeId(2), NodeId(0)], inductance).into()),
        };
        vec![
            Battery::new([NodeId(0), NodeId(1)], voltage).into(),
            Resistor::new([NodeId(1), NodeId(2)], resistance).into(),
            reactive,
        ]
    }

    fn probe(&self) -> ElementRef {
        match self {
            CircuitKind::Rc { .. } => ElementRef::Capacitor(0),
            CircuitKind::Rl { .. } => ElementRef::Inductor(0),
        }
    }
}

/// Level forced by `-v` flags; `None` leaves `RUST_LOG` in charge.
fn verbosity(count: u8) -> Option<log::LevelFilter> {
    match count {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

/// Log at warn unless `RUST_LOG` or `-v` says otherwise.
fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Warn);
    builder.parse_default_env();
    if let Some(level) = verbosity(verbose) {
        builder.filter_level(level);
    }
    builder.init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let mut config = SolverConfig::new();
    if let Some(threshold) = args.error_threshold {
        config = config.with_error_threshold(threshold);
    }
    let mut solver = CircuitSolver::with_config(config)?;

    let mut elements = args.circuit.elements();
    let probe = args.circuit.probe();
    let mut writer = TraceWriter::stdout();

    log::info!("simulating {:?} for {} frames of {}s", args.circuit, args.frames, args.dt);

    for frame in 1..=args.frames {
        let result = solver.step(&mut elements, args.dt)?;
        writer.write_row(&TraceRow {
            time: frame as f64 * args.dt,
            current: result.result.time_average(probe),
            voltage: result.result.instantaneous_voltage(probe),
            substeps: result.result.substeps(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
