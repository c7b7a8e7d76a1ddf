//! Derby Arena Server Library
//!
//! An authoritative real-time server for a vehicular combat arena, played
//! over WebTransport. The server owns the world: clients report movement,
//! the server resolves damage, eliminations, the arena bot, and broadcasts
//! the resulting state every tick.

pub mod config;
pub mod util;
pub mod game;
pub mod net;
