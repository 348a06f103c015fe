//! Circuit element models as supplied by the caller.
//!
//! This module provides the caller-owned elements the solver reads each
//! frame and writes results back onto:
//! - Sources: Battery (with internal resistance)
//! - Linear: Resistor-like elements, Capacitor, Inductor
//!
//! Wires, switches, fuses, ammeters and light bulbs are all resistor-like
//! and distinguished by [`ResistorKind`].

mod linear;
mod sources;

pub use linear::{Capacitor, DynamicElementState, Inductor, Resistor, ResistorKind};
pub use sources::Battery;

use crate::circuit::NodeId;

/// Base resistance of a real bulb at zero volts.
pub const LIGHT_BULB_BASE_RESISTANCE: f64 = 10.0;

/// Voltage-dependent resistance of a real (non-ohmic) light bulb.
///
/// Empirically tuned calibration; `voltage` is the magnitude across the bulb.
pub fn real_bulb_resistance(voltage: f64) -> f64 {
    const COEFFICIENT: f64 = 3.0;
    const BASE: f64 = 2.0;
    let v = voltage.abs();
    LIGHT_BULB_BASE_RESISTANCE + COEFFICIENT * v / (v + BASE).log(BASE)
}

/// A circuit element in one frame snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Battery(Battery),
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
}

impl Element {
    /// The element's two terminals.
    pub fn nodes(&self) -> [NodeId; 2] {
        match self {
            Element::Battery(b) => b.nodes,
            Element::Resistor(r) => r.nodes,
            Element::Capacitor(c) => c.nodes,
            Element::Inductor(l) => l.nodes,
        }
    }

    /// Whether the element can carry current.
    pub fn conducts(&self) -> bool {
        match self {
            Element::Resistor(r) => r.conducts(),
            _ => true,
        }
    }

    /// V(b) - V(a) when no current flows through the element, or `None`
    /// when the element imposes no constraint (open switch, tripped fuse).
    pub fn idle_voltage_drop(&self) -> Option<f64> {
        match self {
            Element::Battery(b) => Some(b.voltage),
            Element::Resistor(r) if r.conducts() => Some(0.0),
            Element::Resistor(_) => None,
            Element::Capacitor(c) => Some(c.state.voltage),
            Element::Inductor(l) => Some(l.state.voltage),
        }
    }

    /// The reported current (a -> b).
    pub fn current(&self) -> f64 {
        match self {
            Element::Battery(b) => b.current,
            Element::Resistor(r) => r.current,
            Element::Capacitor(c) => c.current,
            Element::Inductor(l) => l.current,
        }
    }

    /// Overwrite the reported current.
    pub fn set_current(&mut self, current: f64) {
        match self {
            Element::Battery(b) => b.current = current,
            Element::Resistor(r) => r.current = current,
            Element::Capacitor(c) => c.current = current,
            Element::Inductor(l) => l.current = current,
        }
    }
}

impl From<Battery> for Element {
    fn from(b: Battery) -> Self {
        Element::Battery(b)
    }
}

impl From<Resistor> for Element {
    fn from(r: Resistor) -> Self {
        Element::Resistor(r)
    }
}

impl From<Capacitor> for Element {
    fn from(c: Capacitor) -> Self {
        Element::Capacitor(c)
    }
}

impl From<Inductor> for Element {
    fn from(l: Inductor) -> Self {
        Element::Inductor(l)
    }
}
