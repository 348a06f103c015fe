//! WASM bindings for Kirchhoff Core.
//!
//! This module provides JavaScript-friendly bindings for driving the solver
//! from a browser animation loop.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuit } from 'kirchhoff_core';
//!
//! await init();
//!
//! const circuit = new WasmCircuit();
//! circuit.add_battery(0, 1, 9.0, 0.0);
//! const r = circuit.add_resistor(1, 2, 10.0);
//! circuit.add_capacitor(2, 0, 0.01);
//!
//! // In requestAnimationFrame():
//! circuit.step(1 / 60);
//! const amps = circuit.current(r);
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::NodeId;
use crate::components::{Battery, Capacitor, Element, Inductor, Resistor};
use crate::error::CircuitError;
use crate::solver::{CircuitSolver, SolverConfig};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(err: CircuitError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// WASM-compatible circuit owning its elements and solver.
#[wasm_bindgen]
pub struct WasmCircuit {
    elements: Vec<Element>,
    solver: CircuitSolver,
}

#[wasm_bindgen]
impl WasmCircuit {
    /// Create an empty circuit with default solver settings.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmCircuit {
        WasmCircuit {
            elements: Vec::new(),
            solver: CircuitSolver::new(),
        }
    }

    /// Create an empty circuit with a custom sub-step error threshold.
    #[wasm_bindgen]
    pub fn with_error_threshold(error_threshold: f64) -> Result<WasmCircuit, JsValue> {
        let config = SolverConfig::new().with_error_threshold(error_threshold);
        let solver = CircuitSolver::with_config(config).map_err(to_js)?;
        Ok(WasmCircuit {
            elements: Vec::new(),
            solver,
        })
    }

    /// Add a battery from `a` to `b`; returns its element index.
    #[wasm_bindgen]
    pub fn add_battery(&mut self, a: usize, b: usize, voltage: f64, internal_resistance: f64) -> usize {
        let battery = Battery::new([NodeId(a), NodeId(b)], voltage)
            .with_internal_resistance(internal_resistance);
        self.push(battery.into())
    }

    /// Add a resistor; a resistance of zero makes it a wire.
    #[wasm_bindgen]
    pub fn add_resistor(&mut self, a: usize, b: usize, resistance: f64) -> usize {
        self.push(Resistor::new([NodeId(a), NodeId(b)], resistance).into())
    }

    /// Add an uncharged capacitor.
    #[wasm_bindgen]
    pub fn add_capacitor(&mut self, a: usize, b: usize, capacitance: f64) -> usize {
        self.push(Capacitor::new([NodeId(a), NodeId(b)], capacitance).into())
    }

    /// Add an inductor carrying no current.
    #[wasm_bindgen]
    pub fn add_inductor(&mut self, a: usize, b: usize, inductance: f64) -> usize {
        self.push(Inductor::new([NodeId(a), NodeId(b)], inductance).into())
    }

    /// Advance one frame; returns the number of accepted sub-steps.
    #[wasm_bindgen]
    pub fn step(&mut self, dt: f64) -> Result<usize, JsValue> {
        let frame = self.solver.step(&mut self.elements, dt).map_err(to_js)?;
        Ok(frame.result.substeps())
    }

    /// Time-averaged current of an element over the last frame.
    #[wasm_bindgen]
    pub fn current(&self, index: usize) -> Result<f64, JsValue> {
        self.elements
            .get(index)
            .map(Element::current)
            .ok_or_else(|| {
                to_js(CircuitError::Wasm {
                    message: format!("no element #{}", index),
                })
            })
    }

    /// Voltage at a node after the last frame, or `undefined` if unknown.
    #[wasm_bindgen]
    pub fn node_voltage(&self, node: usize) -> Option<f64> {
        self.solver.node_voltage(NodeId(node))
    }

    /// Number of elements in the circuit.
    #[wasm_bindgen(getter)]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    fn push(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }
}

impl Default for WasmCircuit {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
