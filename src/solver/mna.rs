//! MNA system assembly and solving.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::circuit::NodeId;
use crate::error::{CircuitError, Result};

use super::SINGULAR_PIVOT;

/// Dense MNA matrix system Ax = z.
#[derive(Debug)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    /// Create a zeroed system of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if !(max_val >= SINGULAR_PIVOT) {
                return Err(CircuitError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < SINGULAR_PIVOT {
                return Err(CircuitError::SingularMatrix);
            }
            self.x[i] /= diag;
        }

        if self.x.iter().any(|v| !v.is_finite()) {
            return Err(CircuitError::SingularMatrix);
        }

        Ok(())
    }
}

/// What an [`MnaElement`] contributes to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    /// Ideal voltage source, `value` in volts: V(b) - V(a) = value
    Battery,
    /// Resistance in ohms; zero ohms behaves as a wire with an unknown current
    Resistor,
    /// Ideal current source, `value` in amperes flowing a -> b
    CurrentSource,
}

/// One primitive of a resistive network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MnaElement {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub role: ElementRole,
    pub value: f64,
}

impl MnaElement {
    fn new(node_a: NodeId, node_b: NodeId, role: ElementRole, value: f64) -> Self {
        debug_assert!(node_a != node_b, "element endpoints must differ ({})", node_a);
        debug_assert!(value.is_finite(), "element value must be finite");
        Self {
            node_a,
            node_b,
            role,
            value,
        }
    }

    /// Whether this element's current is a system unknown.
    fn has_unknown_current(&self) -> bool {
        match self.role {
            ElementRole::Battery => true,
            ElementRole::Resistor => self.value == 0.0,
            ElementRole::CurrentSource => false,
        }
    }
}

/// A variable of the linear system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Unknown {
    Voltage(NodeId),
    /// Branch current of the element at this index
    Current(usize),
}

/// One row of the system: sum(coefficient * unknown) = rhs.
#[derive(Debug, Default)]
struct Equation {
    rhs: f64,
    terms: Vec<(f64, Unknown)>,
}

impl Equation {
    fn term(mut self, coefficient: f64, unknown: Unknown) -> Self {
        self.terms.push((coefficient, unknown));
        self
    }

    fn equals(mut self, rhs: f64) -> Self {
        self.rhs = rhs;
        self
    }
}

/// A resistive network with ideal batteries and current sources.
///
/// Elements are stored in one arena; the index returned by the `add_*`
/// methods keys the element's current in the resulting [`MnaSolution`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MnaCircuit {
    elements: Vec<MnaElement>,
}

impl MnaCircuit {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ideal battery enforcing V(b) - V(a) = voltage.
    pub fn add_battery(&mut self, node_a: NodeId, node_b: NodeId, voltage: f64) -> usize {
        self.push(MnaElement::new(node_a, node_b, ElementRole::Battery, voltage))
    }

    /// Add a resistor. Zero resistance is allowed.
    pub fn add_resistor(&mut self, node_a: NodeId, node_b: NodeId, resistance: f64) -> usize {
        debug_assert!(resistance >= 0.0, "resistance must be non-negative");
        self.push(MnaElement::new(node_a, node_b, ElementRole::Resistor, resistance))
    }

    /// Add an ideal current source driving `current` from a to b.
    pub fn add_current_source(&mut self, node_a: NodeId, node_b: NodeId, current: f64) -> usize {
        self.push(MnaElement::new(node_a, node_b, ElementRole::CurrentSource, current))
    }

    fn push(&mut self, element: MnaElement) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    /// All elements in insertion order.
    pub fn elements(&self) -> &[MnaElement] {
        &self.elements
    }

    /// Every node touched by an element, in ascending order.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.elements
            .iter()
            .flat_map(|e| [e.node_a, e.node_b])
            .collect()
    }

    /// One reference node per connected component: the first node reached
    /// when scanning nodes in ascending order.
    pub fn reference_nodes(&self) -> Vec<NodeId> {
        let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for e in &self.elements {
            adjacency.entry(e.node_a).or_default().push(e.node_b);
            adjacency.entry(e.node_b).or_default().push(e.node_a);
        }

        let mut visited = BTreeSet::new();
        let mut references = Vec::new();
        for &start in adjacency.keys() {
            if !visited.insert(start) {
                continue;
            }
            references.push(start);

            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for &next in &adjacency[&node] {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        references
    }

    /// Unknowns in column order: node voltages, then unknown branch currents.
    fn unknowns(&self) -> Vec<Unknown> {
        let voltages = self.nodes().into_iter().map(Unknown::Voltage);
        let currents = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.has_unknown_current())
            .map(|(i, _)| Unknown::Current(i));
        voltages.chain(currents).collect()
    }

    fn equations(&self) -> Vec<Equation> {
        let references = self.reference_nodes();
        let mut equations = Vec::new();

        for &node in &references {
            equations.push(Equation::default().term(1.0, Unknown::Voltage(node)));
        }

        // KCL: currents leaving the node through elements sum to zero.
        let mut kcl: BTreeMap<NodeId, Equation> = self
            .nodes()
            .into_iter()
            .filter(|n| !references.contains(n))
            .map(|n| (n, Equation::default()))
            .collect();

        for (index, e) in self.elements.iter().enumerate() {
            let (a, b) = (e.node_a, e.node_b);
            match e.role {
                _ if e.has_unknown_current() => {
                    if let Some(eq) = kcl.get_mut(&a) {
                        eq.terms.push((1.0, Unknown::Current(index)));
                    }
                    if let Some(eq) = kcl.get_mut(&b) {
                        eq.terms.push((-1.0, Unknown::Current(index)));
                    }
                }
                ElementRole::Resistor => {
                    let g = 1.0 / e.value;
                    if let Some(eq) = kcl.get_mut(&a) {
                        eq.terms.push((g, Unknown::Voltage(a)));
                        eq.terms.push((-g, Unknown::Voltage(b)));
                    }
                    if let Some(eq) = kcl.get_mut(&b) {
                        eq.terms.push((g, Unknown::Voltage(b)));
                        eq.terms.push((-g, Unknown::Voltage(a)));
                    }
                }
                ElementRole::CurrentSource => {
                    if let Some(eq) = kcl.get_mut(&a) {
                        eq.rhs -= e.value;
                    }
                    if let Some(eq) = kcl.get_mut(&b) {
                        eq.rhs += e.value;
                    }
                }
                ElementRole::Battery => unreachable!("batteries always carry an unknown current"),
            }
        }
        equations.extend(kcl.into_values());

        for e in &self.elements {
            match e.role {
                ElementRole::Battery => equations.push(
                    Equation::default()
                        .term(1.0, Unknown::Voltage(e.node_b))
                        .term(-1.0, Unknown::Voltage(e.node_a))
                        .equals(e.value),
                ),
                ElementRole::Resistor if e.value == 0.0 => equations.push(
                    Equation::default()
                        .term(1.0, Unknown::Voltage(e.node_a))
                        .term(-1.0, Unknown::Voltage(e.node_b)),
                ),
                _ => {}
            }
        }

        equations
    }

    /// Solve the network, or fail if the system is singular.
    pub fn try_solve(&self) -> Result<MnaSolution> {
        let unknowns = self.unknowns();
        let equations = self.equations();
        debug_assert_eq!(equations.len(), unknowns.len(), "MNA system must be square");

        let columns: HashMap<Unknown, usize> = unknowns
            .iter()
            .enumerate()
            .map(|(col, &u)| (u, col))
            .collect();

        let mut matrix = MnaMatrix::new(unknowns.len());
        for (row, eq) in equations.iter().enumerate() {
            for &(coefficient, unknown) in &eq.terms {
                matrix.add(row, columns[&unknown], coefficient);
            }
            matrix.add_source(row, eq.rhs);
        }

        matrix.factor()?;
        matrix.solve()?;

        let mut voltages = BTreeMap::new();
        for (col, unknown) in unknowns.iter().enumerate() {
            if let Unknown::Voltage(node) = unknown {
                voltages.insert(*node, matrix.x[col]);
            }
        }

        let currents = self
            .elements
            .iter()
            .enumerate()
            .map(|(index, e)| match e.role {
                _ if e.has_unknown_current() => matrix.x[columns[&Unknown::Current(index)]],
                ElementRole::Resistor => (voltages[&e.node_a] - voltages[&e.node_b]) / e.value,
                _ => e.value,
            })
            .collect();

        Ok(MnaSolution {
            voltages,
            currents,
            elements: self.elements.clone(),
            fallback: false,
        })
    }

    /// Solve the network.
    ///
    /// A singular system yields an all-zero solution for this call instead of
    /// an error, so one degenerate frame cannot halt a running simulation.
    pub fn solve(&self) -> MnaSolution {
        match self.try_solve() {
            Ok(solution) => solution,
            Err(err) => {
                log::warn!(
                    "{} ({} elements, {} nodes); substituting zero solution",
                    err,
                    self.elements.len(),
                    self.nodes().len()
                );
                MnaSolution::zero(self)
            }
        }
    }
}

/// Node voltages and element currents of a solved [`MnaCircuit`].
#[derive(Debug, Clone, PartialEq)]
pub struct MnaSolution {
    voltages: BTreeMap<NodeId, f64>,
    currents: Vec<f64>,
    elements: Vec<MnaElement>,
    fallback: bool,
}

impl MnaSolution {
    /// The fallback solution: every voltage and current is zero.
    pub fn zero(circuit: &MnaCircuit) -> Self {
        Self {
            voltages: circuit.nodes().into_iter().map(|n| (n, 0.0)).collect(),
            currents: vec![0.0; circuit.elements.len()],
            elements: circuit.elements.clone(),
            fallback: true,
        }
    }

    /// Whether this is the zero solution substituted for a singular system.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Voltage at a node relative to its component's reference node.
    /// Nodes that are not part of the network read as 0 V.
    pub fn voltage(&self, node: NodeId) -> f64 {
        self.voltages.get(&node).copied().unwrap_or(0.0)
    }

    /// All solved node voltages.
    pub fn voltages(&self) -> &BTreeMap<NodeId, f64> {
        &self.voltages
    }

    /// V(b) - V(a) for an element.
    pub fn voltage_across(&self, element: &MnaElement) -> f64 {
        self.voltage(element.node_b) - self.voltage(element.node_a)
    }

    /// Current from a to b through the element at `index`.
    pub fn current(&self, index: usize) -> f64 {
        self.currents[index]
    }

    /// Ohm's-law current from a to b through a positive resistance.
    pub fn current_through_resistor(&self, element: &MnaElement) -> f64 {
        debug_assert!(
            element.role == ElementRole::Resistor && element.value > 0.0,
            "Ohm's law readout requires a positive resistance"
        );
        -self.voltage_across(element) / element.value
    }

    /// The elements this solution was computed for, with matching indices.
    pub fn elements(&self) -> &[MnaElement] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn n(id: usize) -> NodeId {
        NodeId(id)
    }

    #[test]
    fn test_battery_resistor_loop() {
        let mut circuit = MnaCircuit::new();
        let battery = circuit.add_battery(n(0), n(1), 4.0);
        let resistor = circuit.add_resistor(n(1), n(0), 4.0);
        let solution = circuit.solve();

        assert_abs_diff_eq!(solution.current(resistor), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.current(battery), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.voltage(n(1)) - solution.voltage(n(0)), 4.0, epsilon = 1e-12);
        let r = solution.elements()[resistor];
        assert_abs_diff_eq!(solution.current_through_resistor(&r), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reference_choice_does_not_change_answer() {
        // Same two-resistor divider labelled two ways; the lowest id (the
        // reference) lands on a different physical node each time.
        let build = |top: usize, mid: usize, bottom: usize| {
            let mut c = MnaCircuit::new();
            c.add_battery(n(bottom), n(top), 12.0);
            c.add_resistor(n(top), n(mid), 2.0);
            c.add_resistor(n(mid), n(bottom), 4.0);
            c
        };
        let first = build(1, 2, 3);
        let second = build(3, 1, 2);
        // Node 1 is the top rail in the first circuit and the midpoint in the second.
        assert_eq!(first.reference_nodes(), vec![n(1)]);
        assert_eq!(second.reference_nodes(), vec![n(1)]);

        let s1 = first.solve();
        let s2 = second.solve();
        for i in 0..3 {
            assert_abs_diff_eq!(s1.current(i), s2.current(i), epsilon = 1e-12);
            assert_abs_diff_eq!(
                s1.voltage_across(&first.elements()[i]),
                s2.voltage_across(&second.elements()[i]),
                epsilon = 1e-12
            );
        }
        assert_abs_diff_eq!(s1.current(1), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_resistance_matches_merged_nodes() {
        let mut with_wire = MnaCircuit::new();
        with_wire.add_battery(n(0), n(1), 9.0);
        let wire = with_wire.add_resistor(n(1), n(2), 0.0);
        with_wire.add_resistor(n(2), n(3), 3.0);
        with_wire.add_resistor(n(3), n(0), 6.0);

        let mut merged = MnaCircuit::new();
        merged.add_battery(n(0), n(1), 9.0);
        merged.add_resistor(n(1), n(3), 3.0);
        merged.add_resistor(n(3), n(0), 6.0);

        let a = with_wire.solve();
        let b = merged.solve();

        assert_abs_diff_eq!(a.current(wire), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.current(0), b.current(0), epsilon = 1e-12);
        assert_abs_diff_eq!(a.current(2), b.current(1), epsilon = 1e-12);
        assert_abs_diff_eq!(a.voltage(n(2)), a.voltage(n(1)), epsilon = 1e-12);
        assert_abs_diff_eq!(a.voltage(n(3)), b.voltage(n(3)), epsilon = 1e-12);
    }

    #[test]
    fn test_current_source_into_resistor() {
        let mut circuit = MnaCircuit::new();
        circuit.add_current_source(n(0), n(1), 2.0);
        let r = circuit.add_resistor(n(1), n(0), 5.0);
        let solution = circuit.solve();

        assert_abs_diff_eq!(solution.voltage(n(1)), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.current(r), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.current(0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disconnected_components_each_get_a_reference() {
        let mut circuit = MnaCircuit::new();
        circuit.add_battery(n(0), n(1), 1.0);
        circuit.add_resistor(n(1), n(0), 1.0);
        circuit.add_battery(n(5), n(6), 2.0);
        circuit.add_resistor(n(6), n(5), 1.0);

        assert_eq!(circuit.reference_nodes(), vec![n(0), n(5)]);
        let solution = circuit.solve();
        assert_abs_diff_eq!(solution.voltage(n(5)), 0.0);
        assert_abs_diff_eq!(solution.voltage(n(6)), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.current(3), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_system_is_square() {
        let mut circuit = MnaCircuit::new();
        circuit.add_battery(n(0), n(1), 1.0);
        circuit.add_resistor(n(1), n(2), 0.0);
        circuit.add_resistor(n(2), n(0), 1.0);
        circuit.add_current_source(n(2), n(0), 0.5);
        assert_eq!(circuit.unknowns().len(), 3 + 2);
        assert_eq!(circuit.equations().len(), circuit.unknowns().len());
    }

    #[test]
    fn test_singular_system_yields_zero_solution() {
        // Two ideal batteries in parallel with different voltages.
        let mut circuit = MnaCircuit::new();
        circuit.add_battery(n(0), n(1), 1.0);
        circuit.add_battery(n(0), n(1), 2.0);
        assert!(matches!(circuit.try_solve(), Err(CircuitError::SingularMatrix)));

        let solution = circuit.solve();
        assert_eq!(solution.current(0), 0.0);
        assert_eq!(solution.current(1), 0.0);
        assert_eq!(solution.voltage(n(1)), 0.0);
        assert!(solution.is_fallback());
        assert!(!MnaCircuit::new().solve().is_fallback());
    }

    #[test]
    fn test_floating_current_source_is_singular() {
        let mut circuit = MnaCircuit::new();
        circuit.add_current_source(n(0), n(1), 1.0);
        assert!(circuit.try_solve().is_err());
        assert_eq!(circuit.solve().current(0), 0.0);
    }

    #[test]
    fn test_solve_is_deterministic() {
        let mut circuit = MnaCircuit::new();
        circuit.add_battery(n(0), n(1), 9.0);
        circuit.add_resistor(n(1), n(2), 3.3);
        circuit.add_resistor(n(2), n(0), 4.7);
        circuit.add_resistor(n(1), n(0), 1.1);
        circuit.add_current_source(n(2), n(1), 0.25);

        let a = circuit.solve();
        let b = circuit.solve();
        for i in 0..circuit.elements().len() {
            assert_eq!(a.current(i).to_bits(), b.current(i).to_bits());
        }
        for (node, v) in a.voltages() {
            assert_eq!(v.to_bits(), b.voltage(*node).to_bits());
        }
    }

    #[test]
    fn test_lu_factor_and_solve() {
        let mut m = MnaMatrix::new(2);
        m.add(0, 0, 2.0);
        m.add(0, 1, 1.0);
        m.add(1, 0, 1.0);
        m.add(1, 1, 3.0);
        m.add_source(0, 3.0);
        m.add_source(1, 5.0);
        m.factor().unwrap();
        m.solve().unwrap();
        assert_abs_diff_eq!(m.x[0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(m.x[1], 1.4, epsilon = 1e-12);
        assert_abs_diff_eq!(m.get(1, 1), 3.0);
    }
}
