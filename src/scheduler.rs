//! Scheduling core: the anticipated-window model plus the worker and reputer
//! polling loops, one instance per topic.

pub mod reputer;
pub mod window;
pub mod worker;
