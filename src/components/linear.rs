//! Linear passive elements: Resistor, Capacitor, Inductor.

use crate::circuit::NodeId;

/// Persisted memory of a capacitor or inductor between frames.
///
/// `voltage` is V(b) - V(a) across the element and `current` flows from a to
/// b. A new value is produced every frame; the previous one is never edited.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DynamicElementState {
    pub voltage: f64,
    pub current: f64,
}

impl DynamicElementState {
    /// Create a state from a voltage and current.
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }
}

/// What a resistor-like element represents.
///
/// Every variant reduces to a plain resistance in the solve; the kind only
/// affects whether the element conducts and whether a re-solve adjusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResistorKind {
    #[default]
    Plain,
    Wire,
    Ammeter,
    /// A switch conducts only while closed
    Switch { closed: bool },
    /// A tripped fuse no longer conducts
    Fuse { tripped: bool },
    /// Real bulbs have a voltage-dependent resistance
    LightBulb { real: bool },
}

/// A resistor-like element.
#[derive(Debug, Clone, PartialEq)]
pub struct Resistor {
    pub nodes: [NodeId; 2],
    pub resistance: f64,
    pub kind: ResistorKind,
    /// Time-averaged current from the last frame (a -> b)
    pub current: f64,
}

impl Resistor {
    /// Create a plain resistor.
    pub fn new(nodes: [NodeId; 2], resistance: f64) -> Self {
        Self::with_kind(nodes, resistance, ResistorKind::Plain)
    }

    /// Create a resistor-like element of the given kind.
    pub fn with_kind(nodes: [NodeId; 2], resistance: f64, kind: ResistorKind) -> Self {
        Self {
            nodes,
            resistance,
            kind,
            current: 0.0,
        }
    }

    /// Create an ideal wire.
    pub fn wire(nodes: [NodeId; 2]) -> Self {
        Self::with_kind(nodes, 0.0, ResistorKind::Wire)
    }

    /// Whether current can flow through the element at all.
    pub fn conducts(&self) -> bool {
        match self.kind {
            ResistorKind::Switch { closed } => closed,
            ResistorKind::Fuse { tripped } => !tripped,
            _ => true,
        }
    }

    /// Whether the element's resistance depends on the voltage across it.
    pub fn is_real_bulb(&self) -> bool {
        matches!(self.kind, ResistorKind::LightBulb { real: true })
    }
}

/// A capacitor and its persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct Capacitor {
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
    pub state: DynamicElementState,
    /// Time-averaged current from the last frame (a -> b)
    pub current: f64,
}

impl Capacitor {
    /// Create an uncharged capacitor.
    pub fn new(nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            nodes,
            capacitance,
            state: DynamicElementState::default(),
            current: 0.0,
        }
    }

    /// Start from a previously persisted state.
    pub fn with_state(mut self, state: DynamicElementState) -> Self {
        self.state = state;
        self
    }
}

/// An inductor and its persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct Inductor {
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub state: DynamicElementState,
    /// Time-averaged current from the last frame (a -> b)
    pub current: f64,
}

impl Inductor {
    /// Create an inductor carrying no current.
    pub fn new(nodes: [NodeId; 2], inductance: f64) -> Self {
        Self {
            nodes,
            inductance,
            state: DynamicElementState::default(),
            current: 0.0,
        }
    }

    /// Start from a previously persisted state.
    pub fn with_state(mut self, state: DynamicElementState) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_and_fuse_conduction() {
        let nodes = [NodeId(0), NodeId(1)];
        assert!(Resistor::wire(nodes).conducts());
        assert!(!Resistor::with_kind(nodes, 0.0, ResistorKind::Switch { closed: false }).conducts());
        assert!(Resistor::with_kind(nodes, 0.0, ResistorKind::Switch { closed: true }).conducts());
        assert!(!Resistor::with_kind(nodes, 1.0, ResistorKind::Fuse { tripped: true }).conducts());
    }

    #[test]
    fn test_real_bulb_flag() {
        let nodes = [NodeId(0), NodeId(1)];
        assert!(Resistor::with_kind(nodes, 10.0, ResistorKind::LightBulb { real: true }).is_real_bulb());
        assert!(!Resistor::with_kind(nodes, 10.0, ResistorKind::LightBulb { real: false }).is_real_bulb());
    }

    #[test]
    fn test_capacitor_with_state() {
        let c = Capacitor::new([NodeId(1), NodeId(2)], 1e-3)
            .with_state(DynamicElementState::new(2.0, 0.5));
        assert_eq!(c.state.voltage, 2.0);
        assert_eq!(c.state.current, 0.5);
    }
}
