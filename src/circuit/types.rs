//! Core identifier types for circuit representation.

use std::fmt;

/// Identifier for a point of common potential.
///
/// Ids below the synthetic threshold of a network are assigned by the caller.
/// Companion networks mint additional ids above every caller id for the
/// internal series nodes they introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Stable reference to one element of a dynamic circuit.
///
/// The index points into the per-kind element list of the circuit the
/// reference was produced for. Resolved once when a frame snapshot is
/// classified; the solver never re-inspects element kinds afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Battery(usize),
    Resistor(usize),
    Capacitor(usize),
    Inductor(usize),
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Battery(i) => write!(f, "B{}", i),
            ElementRef::Resistor(i) => write!(f, "R{}", i),
            ElementRef::Capacitor(i) => write!(f, "C{}", i),
            ElementRef::Inductor(i) => write!(f, "L{}", i),
        }
    }
}

/// Hands out fresh node ids for companion-model series nodes.
///
/// Owned by one companion build; ids are handed out in call order, so the
/// same element-processing order always yields the same ids.
#[derive(Debug, Clone)]
pub struct NodeAllocator {
    next: usize,
}

impl NodeAllocator {
    /// Create an allocator whose first id is one past the largest id in use.
    pub fn above<'a>(nodes: impl IntoIterator<Item = &'a NodeId>) -> Self {
        let next = nodes.into_iter().map(|n| n.0 + 1).max().unwrap_or(0);
        Self { next }
    }

    /// Mint the next synthetic node.
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_starts_above_existing_nodes() {
        let nodes = [NodeId(3), NodeId(7), NodeId(1)];
        let mut alloc = NodeAllocator::above(nodes.iter());
        assert_eq!(alloc.allocate(), NodeId(8));
        assert_eq!(alloc.allocate(), NodeId(9));
    }

    #[test]
    fn test_allocator_empty() {
        let mut alloc = NodeAllocator::above(std::iter::empty());
        assert_eq!(alloc.allocate(), NodeId(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeId(4).to_string(), "N4");
        assert_eq!(ElementRef::Capacitor(2).to_string(), "C2");
    }
}
