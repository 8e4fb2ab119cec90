//! Data models for the roster backend.
//!
//! People, the master table that holds them, and roster snapshots.

mod person;
mod roster;
mod table;

pub use person::*;
pub use roster::*;
pub use table::*;
