pub mod consolidate;
pub mod error;
pub mod gap;
pub mod partition;
pub mod rows;
