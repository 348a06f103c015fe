//! # Kirchhoff Core
//!
//! A per-frame transient solver for battery, resistor, capacitor and
//! inductor networks.
//!
//! This library provides:
//! - Modified Nodal Analysis (MNA) over purely resistive networks
//! - Trapezoidal companion models for capacitors and inductors
//! - Adaptive step-doubling sub-division of each frame
//! - Per-frame readouts (instantaneous and time-averaged) written back onto
//!   caller-owned elements
//!
//! ## Architecture
//!
//! - [`components`] - Caller-owned element models
//! - [`circuit`] - Node identifiers, validation and loop topology
//! - [`solver`] - MNA assembly, companion models and the adaptive integrator
//! - [`adapter`] - Translation between caller elements and solver elements
//! - [`report`] - CSV trace output (CLI only)
//!
//! ## Usage
//!
//! ```no_run
//! use kirchhoff_core::{Battery, CircuitSolver, Element, NodeId, Resistor};
//!
//! let mut elements: Vec<Element> = vec![
//!     Battery::new([NodeId(0), NodeId(1)], 9.0).into(),
//!     Resistor::new([NodeId(1), NodeId(0)], 3.0).into(),
//! ];
//! let mut solver = CircuitSolver::new();
//! solver.step(&mut elements, 1.0 / 60.0)?;
//! assert!((elements[1].current() - 3.0).abs() < 1e-9);
//! # Ok::<(), kirchhoff_core::CircuitError>(())
//! ```
//!
//! ## Solution Method
//!
//! For each frame of length dt:
//!
//! 1. Keep only the elements that lie on a closed loop
//! 2. Replace every capacitor and inductor with its companion network
//! 3. Solve Ax = z for node voltages and branch currents
//! 4. Compare one full step against two half steps and subdivide until they
//!    agree, then report the final and time-averaged values

pub mod adapter;
pub mod circuit;
pub mod components;
pub mod error;
pub mod solver;

#[cfg(feature = "cli")]
pub mod report;

// Re-export main types for convenience
pub use circuit::{ElementRef, NodeId};
pub use components::{Battery, Capacitor, DynamicElementState, Element, Inductor, Resistor, ResistorKind};
pub use error::{CircuitError, Result};
pub use solver::{CircuitResult, CircuitSolver, DynamicCircuit, SolverConfig, TimestepSubdivisions};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuit;

/// Default frame length in seconds (60 frames per second).
pub const DEFAULT_FRAME_DT: f64 = 1.0 / 60.0;
