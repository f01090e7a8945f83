#![forbid(unsafe_code)]

pub mod activity_feed;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod mount;
