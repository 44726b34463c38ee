//! Simulation component.

/// Identifier of simulation component.
///
/// Identifiers are assigned sequentially by [`Simulation::create_context`](crate::Simulation::create_context) in
/// the order of component registration and are never reused within a simulation.
pub type Id = u32;
