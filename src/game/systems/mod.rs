//! Simulation systems that operate on the authoritative world state.

pub mod arena;
pub mod bot;
pub mod combat;
