#![forbid(unsafe_code)]

pub mod adapters;
pub mod http;
pub mod identity;
pub mod normalize;
pub mod relative_time;
pub mod stats;
