//! Slot acquisition engine: parse the listing, match the watch-list,
//! claim one slot per cycle.

pub mod parser;
pub mod matcher;
pub mod claimer;
pub mod session;

pub use matcher::SecuredSet;
pub use session::Session;
