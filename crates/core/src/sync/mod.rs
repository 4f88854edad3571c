//! Read-transform-write sync run

pub mod chunker;
pub mod pipeline;
pub mod ports;
pub mod report;
pub mod transform;
