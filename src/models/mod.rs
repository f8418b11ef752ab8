// Core data models for prostation
// These structs represent the domain entities

pub mod ledger;
pub mod scan;
pub mod stage;

pub use ledger::*;
pub use scan::*;
pub use stage::*;
