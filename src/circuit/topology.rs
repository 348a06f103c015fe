//! Loop detection and out-of-loop voltage propagation.
//!
//! Only elements lying on a closed conducting loop take part in the linear
//! solve. Everything else carries no current, so its node voltages follow
//! from the solved nodes by walking the element graph and applying each
//! element's idle voltage drop.

use std::collections::{BTreeMap, BTreeSet};

use crate::components::Element;

use super::NodeId;

/// Adjacency lists over conducting elements: node -> [(element, other node)].
fn adjacency(elements: &[Element], include: impl Fn(usize) -> bool) -> BTreeMap<NodeId, Vec<(usize, NodeId)>> {
    let mut adjacency: BTreeMap<NodeId, Vec<(usize, NodeId)>> = BTreeMap::new();
    for (index, element) in elements.iter().enumerate() {
        if !element.conducts() || !include(index) {
            continue;
        }
        let [a, b] = element.nodes();
        adjacency.entry(a).or_default().push((index, b));
        adjacency.entry(b).or_default().push((index, a));
    }
    adjacency
}

/// Whether `to` is reachable from `from` without crossing element `skip`.
fn connected_without(
    adjacency: &BTreeMap<NodeId, Vec<(usize, NodeId)>>,
    from: NodeId,
    to: NodeId,
    skip: usize,
) -> bool {
    let mut visited = BTreeSet::from([from]);
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        for &(index, next) in adjacency.get(&node).into_iter().flatten() {
            if index != skip && visited.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}

/// Flags every element that lies on a closed conducting loop.
///
/// An element is in a loop when its terminals stay connected after the
/// element itself is removed. Non-conducting elements never are.
pub fn loop_elements(elements: &[Element]) -> Vec<bool> {
    let adjacency = adjacency(elements, |_| true);
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let [a, b] = element.nodes();
            element.conducts() && connected_without(&adjacency, a, b, index)
        })
        .collect()
}

/// Group solved nodes by the loop component they were solved in.
///
/// Each group shares one reference potential in the solve.
fn solved_components(
    elements: &[Element],
    in_loop: &[bool],
    solved: &BTreeMap<NodeId, f64>,
) -> Vec<Vec<NodeId>> {
    let adjacency = adjacency(elements, |i| in_loop[i]);
    let mut visited = BTreeSet::new();
    let mut components = Vec::new();
    for &start in solved.keys() {
        if !visited.insert(start) {
            continue;
        }
        let mut members = vec![start];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &(_, next) in adjacency.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    members.push(next);
                    stack.push(next);
                }
            }
        }
        members.retain(|n| solved.contains_key(n));
        components.push(members);
    }
    components
}

/// Extend solved node voltages to every node of the snapshot.
///
/// Traverses out-of-loop elements depth first, using V(b) = V(a) + idle
/// drop. A solved loop component reached this way is shifted as a whole
/// so every conducting connected component shares one reference. The
/// component holding the lowest solved node keeps its solved values, and
/// components with no solved node are seeded at 0 V on their lowest node.
/// Nodes separated only by open switches keep independent potentials.
pub fn propagate_voltages(
    elements: &[Element],
    in_loop: &[bool],
    solved: &BTreeMap<NodeId, f64>,
) -> BTreeMap<NodeId, f64> {
    let adjacency = adjacency(elements, |i| !in_loop[i]);
    let components = solved_components(elements, in_loop, solved);
    let component_of: BTreeMap<NodeId, usize> = components
        .iter()
        .enumerate()
        .flat_map(|(c, members)| members.iter().map(move |&n| (n, c)))
        .collect();

    let mut voltages = BTreeMap::new();
    let mut stack = Vec::new();

    // Anchor the component containing `node` so that `node` reads `voltage`.
    let place = |node: NodeId,
                 voltage: f64,
                 voltages: &mut BTreeMap<NodeId, f64>,
                 stack: &mut Vec<NodeId>| {
        match component_of.get(&node) {
            Some(&c) => {
                let offset = voltage - solved[&node];
                for &member in &components[c] {
                    voltages.insert(member, solved[&member] + offset);
                    stack.push(member);
                }
            }
            None => {
                voltages.insert(node, voltage);
                stack.push(node);
            }
        }
    };

    let all_nodes: BTreeSet<NodeId> = elements.iter().flat_map(|e| e.nodes()).collect();
    let seeds: Vec<NodeId> = solved
        .keys()
        .copied()
        .chain(all_nodes.iter().copied())
        .collect();

    for seed in seeds {
        if voltages.contains_key(&seed) {
            continue;
        }
        let initial = solved.get(&seed).copied().unwrap_or(0.0);
        place(seed, initial, &mut voltages, &mut stack);

        while let Some(node) = stack.pop() {
            let v = voltages[&node];
            for &(index, next) in adjacency.get(&node).into_iter().flatten() {
                if voltages.contains_key(&next) {
                    continue;
                }
                let element = &elements[index];
                let Some(drop) = element.idle_voltage_drop() else {
                    continue;
                };
                let [a, _] = element.nodes();
                let next_voltage = if node == a { v + drop } else { v - drop };
                place(next, next_voltage, &mut voltages, &mut stack);
            }
        }
    }

    voltages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Battery, Capacitor, DynamicElementState, Resistor, ResistorKind};
    use approx::assert_abs_diff_eq;

    fn n(id: usize) -> NodeId {
        NodeId(id)
    }

    #[test]
    fn test_simple_loop_and_dangling_wire() {
        let elements: Vec<Element> = vec![
            Battery::new([n(0), n(1)], 9.0).into(),
            Resistor::new([n(1), n(0)], 3.0).into(),
            Resistor::wire([n(1), n(2)]).into(),
        ];
        assert_eq!(loop_elements(&elements), vec![true, true, false]);
    }

    #[test]
    fn test_open_switch_breaks_loop() {
        let elements: Vec<Element> = vec![
            Battery::new([n(0), n(1)], 9.0).into(),
            Resistor::with_kind([n(1), n(2)], 0.0, ResistorKind::Switch { closed: false }).into(),
            Resistor::new([n(2), n(0)], 3.0).into(),
        ];
        assert_eq!(loop_elements(&elements), vec![false, false, false]);
    }

    #[test]
    fn test_parallel_elements_are_a_loop() {
        let elements: Vec<Element> = vec![
            Resistor::new([n(4), n(5)], 1.0).into(),
            Resistor::new([n(4), n(5)], 2.0).into(),
        ];
        assert_eq!(loop_elements(&elements), vec![true, true]);
    }

    #[test]
    fn test_propagation_through_out_of_loop_elements() {
        let cap = Capacitor::new([n(3), n(4)], 1.0).with_state(DynamicElementState::new(2.0, 0.0));
        let elements: Vec<Element> = vec![
            Battery::new([n(0), n(1)], 9.0).into(),
            Resistor::new([n(1), n(0)], 3.0).into(),
            Resistor::wire([n(1), n(2)]).into(),
            Battery::new([n(3), n(2)], 1.5).into(),
            cap.into(),
            Resistor::with_kind([n(4), n(5)], 0.0, ResistorKind::Switch { closed: false }).into(),
        ];
        let in_loop = loop_elements(&elements);
        let solved = BTreeMap::from([(n(0), 0.0), (n(1), 9.0)]);
        let voltages = propagate_voltages(&elements, &in_loop, &solved);

        assert_abs_diff_eq!(voltages[&n(2)], 9.0);
        assert_abs_diff_eq!(voltages[&n(3)], 7.5);
        assert_abs_diff_eq!(voltages[&n(4)], 9.5);
        // Behind an open switch: independent potential, seeded at 0 V.
        assert_abs_diff_eq!(voltages[&n(5)], 0.0);
        assert_eq!(voltages.len(), 6);
    }

    #[test]
    fn test_bridged_loops_share_one_reference() {
        let elements: Vec<Element> = vec![
            Battery::new([n(0), n(1)], 9.0).into(),
            Resistor::new([n(1), n(0)], 3.0).into(),
            Battery::new([n(2), n(3)], 5.0).into(),
            Resistor::new([n(3), n(2)], 5.0).into(),
            Resistor::wire([n(1), n(2)]).into(),
        ];
        let in_loop = loop_elements(&elements);
        assert_eq!(in_loop, vec![true, true, true, true, false]);

        // Each loop was solved against its own 0 V reference.
        let solved = BTreeMap::from([(n(0), 0.0), (n(1), 9.0), (n(2), 0.0), (n(3), 5.0)]);
        let voltages = propagate_voltages(&elements, &in_loop, &solved);

        assert_abs_diff_eq!(voltages[&n(0)], 0.0);
        assert_abs_diff_eq!(voltages[&n(1)], 9.0);
        assert_abs_diff_eq!(voltages[&n(2)], 9.0);
        assert_abs_diff_eq!(voltages[&n(3)], 14.0);
    }

    #[test]
    fn test_open_switch_keeps_loops_independent() {
        let open = ResistorKind::Switch { closed: false };
        let elements: Vec<Element> = vec![
            Battery::new([n(0), n(1)], 9.0).into(),
            Resistor::new([n(1), n(0)], 3.0).into(),
            Battery::new([n(2), n(3)], 5.0).into(),
            Resistor::new([n(3), n(2)], 5.0).into(),
            Resistor::with_kind([n(1), n(2)], 0.0, open).into(),
        ];
        let in_loop = loop_elements(&elements);
        let solved = BTreeMap::from([(n(0), 0.0), (n(1), 9.0), (n(2), 0.0), (n(3), 5.0)]);
        let voltages = propagate_voltages(&elements, &in_loop, &solved);

        assert_abs_diff_eq!(voltages[&n(2)], 0.0);
        assert_abs_diff_eq!(voltages[&n(3)], 5.0);
    }
}
