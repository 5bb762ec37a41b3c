//! Consensus core: fan-out to oracle clients, tally, decide.

pub mod consensus;
pub mod tally;

pub use consensus::ConsensusEngine;
