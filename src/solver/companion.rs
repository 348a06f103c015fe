//! Companion models for capacitors and inductors.
//!
//! For one sub-step of size dt every dynamic element is replaced by an
//! ideal battery and series resistance derived from the trapezoidal rule:
//!
//! ```text
//! capacitor:  a --[Veq]-- m1 --[dt/2C]-- m2 --[leak]-- b
//!             Veq = v_prev - Req * i_prev
//!
//! inductor:   a --[Veq]-- m --[2L/dt]-- b
//!             Veq = -v_prev + Req * i_prev
//! ```
//!
//! Element voltages are V(b) - V(a) and currents flow a -> b. The resulting
//! network is purely resistive and solved with [`MnaCircuit`].

use crate::circuit::{ElementRef, NodeAllocator, NodeId};
use crate::components::DynamicElementState;

use super::mna::{MnaCircuit, MnaSolution};
use super::CAPACITOR_LEAKAGE_RESISTANCE;

/// A battery with series internal resistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResistiveBattery {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub voltage: f64,
    pub internal_resistance: f64,
}

/// A resistance between two nodes. Zero ohms is a wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicResistor {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub resistance: f64,
}

/// A capacitor with the state it carries into the next sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicCapacitor {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub capacitance: f64,
    pub state: DynamicElementState,
}

impl DynamicCapacitor {
    /// Trapezoidal companion resistance dt/(2C).
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        dt / (2.0 * self.capacitance)
    }

    /// Trapezoidal companion source voltage.
    pub fn companion_voltage(&self, dt: f64) -> f64 {
        self.state.voltage - self.companion_resistance(dt) * self.state.current
    }
}

/// An inductor with the state it carries into the next sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicInductor {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub inductance: f64,
    pub state: DynamicElementState,
}

impl DynamicInductor {
    /// Trapezoidal companion resistance 2L/dt.
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        2.0 * self.inductance / dt
    }

    /// Trapezoidal companion source voltage.
    pub fn companion_voltage(&self, dt: f64) -> f64 {
        -self.state.voltage + self.companion_resistance(dt) * self.state.current
    }
}

/// Reads a dynamic element's true branch quantities off its companion.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CurrentCompanion {
    /// MNA index of the companion resistor carrying the element current
    resistor: usize,
    /// The element's voltage is V(to) - V(from)
    from: NodeId,
    to: NodeId,
}

impl CurrentCompanion {
    fn state(&self, solution: &MnaSolution) -> DynamicElementState {
        DynamicElementState {
            voltage: solution.voltage(self.to) - solution.voltage(self.from),
            current: solution.current(self.resistor),
        }
    }
}

/// The all-resistive stand-in for a [`DynamicCircuit`] over one sub-step.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionNetwork {
    circuit: MnaCircuit,
    /// MNA indices of each battery's ideal source and series resistor
    batteries: Vec<(usize, usize)>,
    resistors: Vec<usize>,
    capacitors: Vec<CurrentCompanion>,
    inductors: Vec<CurrentCompanion>,
}

impl CompanionNetwork {
    /// The resistive network handed to the linear solver.
    pub fn circuit(&self) -> &MnaCircuit {
        &self.circuit
    }
}

/// A network of batteries, resistors, capacitors and inductors.
///
/// Immutable during a solve: [`DynamicCircuit::update_circuit`] returns a new
/// circuit carrying the advanced capacitor and inductor states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicCircuit {
    pub batteries: Vec<ResistiveBattery>,
    pub resistors: Vec<DynamicResistor>,
    pub capacitors: Vec<DynamicCapacitor>,
    pub inductors: Vec<DynamicInductor>,
}

impl DynamicCircuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a battery with internal resistance.
    pub fn add_battery(&mut self, battery: ResistiveBattery) -> ElementRef {
        self.batteries.push(battery);
        ElementRef::Battery(self.batteries.len() - 1)
    }

    /// Add a resistor.
    pub fn add_resistor(&mut self, resistor: DynamicResistor) -> ElementRef {
        self.resistors.push(resistor);
        ElementRef::Resistor(self.resistors.len() - 1)
    }

    /// Add a capacitor.
    pub fn add_capacitor(&mut self, capacitor: DynamicCapacitor) -> ElementRef {
        self.capacitors.push(capacitor);
        ElementRef::Capacitor(self.capacitors.len() - 1)
    }

    /// Add an inductor.
    pub fn add_inductor(&mut self, inductor: DynamicInductor) -> ElementRef {
        self.inductors.push(inductor);
        ElementRef::Inductor(self.inductors.len() - 1)
    }

    /// Terminals of an element.
    pub fn nodes(&self, element: ElementRef) -> (NodeId, NodeId) {
        match element {
            ElementRef::Battery(i) => (self.batteries[i].node_a, self.batteries[i].node_b),
            ElementRef::Resistor(i) => (self.resistors[i].node_a, self.resistors[i].node_b),
            ElementRef::Capacitor(i) => (self.capacitors[i].node_a, self.capacitors[i].node_b),
            ElementRef::Inductor(i) => (self.inductors[i].node_a, self.inductors[i].node_b),
        }
    }

    /// Every caller-assigned node.
    fn external_nodes(&self) -> Vec<NodeId> {
        let b = self.batteries.iter().flat_map(|e| [e.node_a, e.node_b]);
        let r = self.resistors.iter().flat_map(|e| [e.node_a, e.node_b]);
        let c = self.capacitors.iter().flat_map(|e| [e.node_a, e.node_b]);
        let l = self.inductors.iter().flat_map(|e| [e.node_a, e.node_b]);
        b.chain(r).chain(c).chain(l).collect()
    }

    /// Build the resistive companion network for a sub-step of size `dt`.
    ///
    /// Synthetic nodes are minted in a fixed order (batteries, capacitors,
    /// inductors) so repeated builds of the same circuit are identical.
    pub fn companion(&self, dt: f64) -> CompanionNetwork {
        debug_assert!(dt > 0.0 && dt.is_finite(), "sub-step must be positive");

        let mut nodes = NodeAllocator::above(self.external_nodes().iter());
        let mut circuit = MnaCircuit::new();

        let batteries = self
            .batteries
            .iter()
            .map(|b| {
                let mid = nodes.allocate();
                let source = circuit.add_battery(b.node_a, mid, b.voltage);
                let series = circuit.add_resistor(mid, b.node_b, b.internal_resistance);
                (source, series)
            })
            .collect();

        let resistors = self
            .resistors
            .iter()
            .map(|r| circuit.add_resistor(r.node_a, r.node_b, r.resistance))
            .collect();

        let capacitors = self
            .capacitors
            .iter()
            .map(|c| {
                let m1 = nodes.allocate();
                let m2 = nodes.allocate();
                circuit.add_battery(c.node_a, m1, c.companion_voltage(dt));
                let resistor = circuit.add_resistor(m1, m2, c.companion_resistance(dt));
                circuit.add_resistor(m2, c.node_b, CAPACITOR_LEAKAGE_RESISTANCE);
                CurrentCompanion {
                    resistor,
                    from: c.node_a,
                    to: m2,
                }
            })
            .collect();

        let inductors = self
            .inductors
            .iter()
            .map(|l| {
                let mid = nodes.allocate();
                circuit.add_battery(l.node_a, mid, l.companion_voltage(dt));
                let resistor = circuit.add_resistor(mid, l.node_b, l.companion_resistance(dt));
                CurrentCompanion {
                    resistor,
                    from: l.node_a,
                    to: l.node_b,
                }
            })
            .collect();

        CompanionNetwork {
            circuit,
            batteries,
            resistors,
            capacitors,
            inductors,
        }
    }

    /// Build and solve the companion network for one sub-step.
    pub fn solve_substep(&self, dt: f64) -> DynamicSolution {
        let network = self.companion(dt);
        let solution = network.circuit.solve();
        DynamicSolution { network, solution }
    }

    /// Derive the circuit for the next sub-step from a solved one.
    ///
    /// Returns a new circuit; `self` is left untouched.
    pub fn update_circuit(&self, solution: &DynamicSolution) -> DynamicCircuit {
        let capacitors = self
            .capacitors
            .iter()
            .enumerate()
            .map(|(i, c)| DynamicCapacitor {
                state: solution.companion_state(&solution.network.capacitors[i]),
                ..*c
            })
            .collect();

        let inductors = self
            .inductors
            .iter()
            .enumerate()
            .map(|(i, l)| DynamicInductor {
                state: solution.companion_state(&solution.network.inductors[i]),
                ..*l
            })
            .collect();

        DynamicCircuit {
            batteries: self.batteries.clone(),
            resistors: self.resistors.clone(),
            capacitors,
            inductors,
        }
    }
}

/// A solved companion network with readouts for the original elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicSolution {
    network: CompanionNetwork,
    solution: MnaSolution,
}

impl DynamicSolution {
    /// Voltage at a node.
    pub fn node_voltage(&self, node: NodeId) -> f64 {
        self.solution.voltage(node)
    }

    /// The underlying linear-system solution.
    pub fn mna(&self) -> &MnaSolution {
        &self.solution
    }

    /// The companion network this solution belongs to.
    pub fn network(&self) -> &CompanionNetwork {
        &self.network
    }

    /// Current through an element (a -> b).
    pub fn current(&self, element: ElementRef) -> f64 {
        match element {
            ElementRef::Battery(i) => self.solution.current(self.network.batteries[i].0),
            ElementRef::Resistor(i) => self.solution.current(self.network.resistors[i]),
            ElementRef::Capacitor(i) => self.companion_state(&self.network.capacitors[i]).current,
            ElementRef::Inductor(i) => self.companion_state(&self.network.inductors[i]).current,
        }
    }

    /// Voltage across an element, V(b) - V(a).
    ///
    /// For capacitors this is the stored voltage, excluding the drop across
    /// the fixed leakage resistance.
    pub fn voltage(&self, element: ElementRef) -> f64 {
        match element {
            ElementRef::Battery(i) => {
                let (source, series) = self.network.batteries[i];
                let elements = self.solution.elements();
                self.solution.voltage(elements[series].node_b)
                    - self.solution.voltage(elements[source].node_a)
            }
            ElementRef::Resistor(i) => {
                let r = self.solution.elements()[self.network.resistors[i]];
                self.solution.voltage_across(&r)
            }
            ElementRef::Capacitor(i) => self.companion_state(&self.network.capacitors[i]).voltage,
            ElementRef::Inductor(i) => self.companion_state(&self.network.inductors[i]).voltage,
        }
    }

    /// Solved state of a capacitor or inductor, `None` for other elements.
    pub fn dynamic_state(&self, element: ElementRef) -> Option<DynamicElementState> {
        match element {
            ElementRef::Capacitor(i) => Some(self.companion_state(&self.network.capacitors[i])),
            ElementRef::Inductor(i) => Some(self.companion_state(&self.network.inductors[i])),
            ElementRef::Battery(_) | ElementRef::Resistor(_) => None,
        }
    }

    fn companion_state(&self, companion: &CurrentCompanion) -> DynamicElementState {
        companion.state(&self.solution)
    }

    /// Branch currents of every capacitor, then every inductor.
    pub fn characteristic(&self) -> Vec<f64> {
        self.network
            .capacitors
            .iter()
            .chain(&self.network.inductors)
            .map(|c| self.solution.current(c.resistor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn n(id: usize) -> NodeId {
        NodeId(id)
    }

    fn battery(a: usize, b: usize, voltage: f64) -> ResistiveBattery {
        ResistiveBattery {
            node_a: n(a),
            node_b: n(b),
            voltage,
            internal_resistance: 0.0,
        }
    }

    fn resistor(a: usize, b: usize, resistance: f64) -> DynamicResistor {
        DynamicResistor {
            node_a: n(a),
            node_b: n(b),
            resistance,
        }
    }

    #[test]
    fn test_companion_constants() {
        let c = DynamicCapacitor {
            node_a: n(0),
            node_b: n(1),
            capacitance: 0.5,
            state: DynamicElementState::new(2.0, 4.0),
        };
        assert_abs_diff_eq!(c.companion_resistance(0.1), 0.1);
        assert_abs_diff_eq!(c.companion_voltage(0.1), 2.0 - 0.4, epsilon = 1e-12);

        let l = DynamicInductor {
            node_a: n(0),
            node_b: n(1),
            inductance: 0.5,
            state: DynamicElementState::new(2.0, 4.0),
        };
        assert_abs_diff_eq!(l.companion_resistance(0.1), 10.0);
        assert_abs_diff_eq!(l.companion_voltage(0.1), -2.0 + 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_synthetic_nodes_are_deterministic() {
        let mut circuit = DynamicCircuit::new();
        circuit.add_battery(battery(0, 1, 5.0));
        circuit.add_resistor(resistor(1, 2, 10.0));
        circuit.add_capacitor(DynamicCapacitor {
            node_a: n(2),
            node_b: n(0),
            capacitance: 1e-3,
            state: DynamicElementState::default(),
        });
        let a = circuit.companion(1e-3);
        let b = circuit.companion(1e-3);
        assert_eq!(a, b);

        // Battery gets node 3, the capacitor 4 and 5.
        let nodes = a.circuit().nodes();
        assert_eq!(nodes.iter().max(), Some(&n(5)));
        assert_eq!(nodes.len(), 6);
    }

    #[test]
    fn test_battery_internal_resistance() {
        let mut circuit = DynamicCircuit::new();
        let b = circuit.add_battery(ResistiveBattery {
            internal_resistance: 1.0,
            ..battery(0, 1, 10.0)
        });
        let r = circuit.add_resistor(resistor(1, 0, 4.0));
        let solution = circuit.solve_substep(1e-3);

        assert_abs_diff_eq!(solution.current(b), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.current(r), 2.0, epsilon = 1e-12);
        // Terminal voltage sags by I * r_internal
        assert_abs_diff_eq!(solution.voltage(b), 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.voltage(r), -8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_update_circuit_is_functional() {
        let mut circuit = DynamicCircuit::new();
        circuit.add_battery(battery(0, 1, 10.0));
        circuit.add_resistor(resistor(1, 2, 10.0));
        let c = circuit.add_capacitor(DynamicCapacitor {
            node_a: n(2),
            node_b: n(0),
            capacitance: 1.0,
            state: DynamicElementState::default(),
        });

        let solution = circuit.solve_substep(0.01);
        let next = circuit.update_circuit(&solution);

        assert_eq!(circuit.capacitors[0].state, DynamicElementState::default());
        assert_eq!(Some(next.capacitors[0].state), solution.dynamic_state(c));
        // Uncharged capacitor: nearly the full battery current flows a -> b.
        assert_abs_diff_eq!(solution.current(c), 1.0, epsilon = 1e-3);
        assert_eq!(solution.characteristic(), vec![solution.current(c)]);
    }

    #[test]
    fn test_inductor_blocks_initial_current() {
        let mut circuit = DynamicCircuit::new();
        circuit.add_battery(battery(0, 1, 5.0));
        let r = circuit.add_resistor(resistor(1, 2, 10.0));
        let l = circuit.add_inductor(DynamicInductor {
            node_a: n(2),
            node_b: n(0),
            inductance: 1.0,
            state: DynamicElementState::default(),
        });
        let solution = circuit.solve_substep(1e-4);

        // Req = 2e4 dominates the 10 ohm resistor.
        assert!(solution.current(r).abs() < 5.0 / 2e4 * 1.01);
        assert_abs_diff_eq!(solution.current(l), solution.current(r), epsilon = 1e-12);
        assert_abs_diff_eq!(solution.voltage(l), -5.0, epsilon = 1e-2);
    }

    #[test]
    fn test_static_elements_have_no_dynamic_state() {
        let mut circuit = DynamicCircuit::new();
        let b = circuit.add_battery(battery(0, 1, 1.0));
        let r = circuit.add_resistor(resistor(1, 0, 1.0));
        let solution = circuit.solve_substep(1e-3);
        assert_eq!(solution.dynamic_state(b), None);
        assert_eq!(solution.dynamic_state(r), None);
    }
}
