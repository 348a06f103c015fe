//! Adapters between caller-owned elements and the dynamic circuit.
//!
//! Each frame the caller's snapshot is classified once: every element on a
//! closed loop is translated into its [`DynamicCircuit`] primitive and paired
//! with an [`ElementAdapter`]. After the solve the adapters write the
//! readouts back onto the caller's elements by index, so solver objects are
//! never aliased with caller objects.

use crate::circuit::ElementRef;
use crate::components::{DynamicElementState, Element};
use crate::solver::{
    CircuitResult, DynamicCapacitor, DynamicCircuit, DynamicInductor, DynamicResistor,
    ResistiveBattery,
};

/// Pairs a caller element (by slice index) with its solver element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementAdapter {
    /// Index into the caller's element slice
    pub index: usize,
    /// Element in the dynamic circuit
    pub element: ElementRef,
}

impl ElementAdapter {
    /// Write the frame's readouts onto the caller's element.
    ///
    /// The reported current is the time average over the frame. Capacitors
    /// and inductors also receive the instantaneous end-of-frame state that
    /// seeds the next frame.
    pub fn apply_solution(&self, result: &CircuitResult, target: &mut Element) {
        target.set_current(result.time_average(self.element));
        let Some(state) = result.dynamic_state(self.element) else {
            return;
        };
        match target {
            Element::Capacitor(c) => c.state = state,
            Element::Inductor(l) => l.state = state,
            Element::Battery(_) | Element::Resistor(_) => {}
        }
    }
}

/// Translate the loop elements of a snapshot into a dynamic circuit.
///
/// Elements with `in_loop[i] == false` are left out. Within each kind,
/// solver indices follow snapshot order.
pub fn classify(elements: &[Element], in_loop: &[bool]) -> (DynamicCircuit, Vec<ElementAdapter>) {
    debug_assert_eq!(elements.len(), in_loop.len());

    let mut circuit = DynamicCircuit::new();
    let mut adapters = Vec::new();

    for (index, element) in elements.iter().enumerate() {
        if !in_loop[index] {
            continue;
        }
        let [node_a, node_b] = element.nodes();
        let element = match element {
            Element::Battery(b) => circuit.add_battery(ResistiveBattery {
                node_a,
                node_b,
                voltage: b.voltage,
                internal_resistance: b.internal_resistance,
            }),
            Element::Resistor(r) => circuit.add_resistor(DynamicResistor {
                node_a,
                node_b,
                resistance: r.resistance,
            }),
            Element::Capacitor(c) => circuit.add_capacitor(DynamicCapacitor {
                node_a,
                node_b,
                capacitance: c.capacitance,
                state: c.state,
            }),
            Element::Inductor(l) => circuit.add_inductor(DynamicInductor {
                node_a,
                node_b,
                inductance: l.inductance,
                state: l.state,
            }),
        };
        adapters.push(ElementAdapter { index, element });
    }

    (circuit, adapters)
}

/// Zero the current of an element that is not on any loop.
///
/// Dynamic elements keep their stored voltage; their stored current drops
/// to zero since nothing can flow.
pub fn clear_out_of_loop(target: &mut Element) {
    target.set_current(0.0);
    match target {
        Element::Capacitor(c) => c.state = DynamicElementState::new(c.state.voltage, 0.0),
        Element::Inductor(l) => l.state = DynamicElementState::new(l.state.voltage, 0.0),
        Element::Battery(_) | Element::Resistor(_) => {}
    }
}
