pub mod ledger;
pub mod scan;
pub mod stage;
pub mod station;

pub use ledger::*;
pub use scan::*;
pub use stage::*;
pub use station::*;
