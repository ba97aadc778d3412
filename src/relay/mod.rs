//! Read relay: local streaming and forwarding to the owning node

pub mod engine;
pub mod race;

pub use engine::{Collaborators, EngineConfig, ReadFailure, ReadRequest, RelayEngine};
pub use race::{copy_or_cancel, RaceOutcome};
