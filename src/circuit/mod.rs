//! Circuit identifiers, snapshot validation and loop topology.
//!
//! The solver never sees the caller's full element graph: this module
//! decides which elements sit on a closed loop, validates their parameters,
//! and fills in node voltages for the parts of the graph outside any loop.

pub mod topology;
mod types;
mod validate;

pub use topology::{loop_elements, propagate_voltages};
pub use types::*;
pub use validate::validate_elements;
