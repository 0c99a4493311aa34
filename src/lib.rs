//! Derby - Horse race engine
//!
//! Runs a field of competitors on concurrent workers, records the finish
//! order, and applies the reward and upgrade economy afterwards. Rendering,
//! sound and persistence belong to the hosting application; it drives the
//! engine through [`RaceServer`] or the lower level [`run_race`].

pub mod game_server;

pub use game_server::*;
