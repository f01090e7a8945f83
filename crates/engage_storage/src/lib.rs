#![forbid(unsafe_code)]

pub mod event_store;
pub mod local_storage;
pub mod signals;
pub mod view_state;
