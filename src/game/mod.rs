//! Authoritative game simulation.
//!
//! `state` owns the entities and registry invariants, `systems` advance
//! them each tick, `schedule` carries deferred transitions on the tick
//! clock, and `tuning` holds every gameplay constant.

pub mod schedule;
pub mod state;
pub mod systems;
pub mod tuning;
