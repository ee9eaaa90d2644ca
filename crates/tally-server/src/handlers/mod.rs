//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod budgets;
pub mod health;
pub mod ledger;
pub mod messages;
pub mod queries;
pub mod transfers;

// Re-export all handlers for use in router
pub use budgets::*;
pub use health::*;
pub use ledger::*;
pub use messages::*;
pub use queries::*;
pub use transfers::*;
