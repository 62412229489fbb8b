//! Command implementations for the Tuition CLI
//!
//! This module contains the individual command implementations, each in their own file
//! for better organization and maintainability.

pub mod fee;
pub mod list;
pub mod record_payment;
pub mod schedule;
pub mod select_plan;
pub mod set_status;
pub mod status;
pub mod submit;

// Re-export command execution functions for easy access
pub use fee::execute as execute_fee;
pub use list::execute as execute_list;
pub use record_payment::execute as execute_record_payment;
pub use schedule::execute as execute_schedule;
pub use select_plan::execute as execute_select_plan;
pub use set_status::execute as execute_set_status;
pub use status::execute as execute_status;
pub use submit::execute as execute_submit;
