#![forbid(unsafe_code)]

pub mod activity;
pub mod common;
pub mod records;
pub mod stats;
pub mod status;
pub mod view_state;

pub use common::{ContractViolation, SchemaVersion, Validate};
