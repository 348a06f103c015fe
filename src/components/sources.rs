//! Battery source.

use crate::circuit::NodeId;

/// A battery with optional internal resistance.
///
/// The source enforces V(b) - V(a) = voltage across its ideal part; the
/// internal resistance sits in series on the b side.
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    pub nodes: [NodeId; 2], // [negative, positive]
    pub voltage: f64,
    pub internal_resistance: f64,
    /// Time-averaged current from the last frame (a -> b through the battery)
    pub current: f64,
}

impl Battery {
    /// Create an ideal battery.
    pub fn new(nodes: [NodeId; 2], voltage: f64) -> Self {
        Self {
            nodes,
            voltage,
            internal_resistance: 0.0,
            current: 0.0,
        }
    }

    /// Set the internal resistance.
    pub fn with_internal_resistance(mut self, resistance: f64) -> Self {
        self.internal_resistance = resistance;
        self
    }
}
