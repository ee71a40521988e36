//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the process.
//!
//! # Tasks
//! - Disk sweep: removes expired entries from the disk tier at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
