//! Background Tasks Module
//!
//! Contains background tasks that run periodically inside a backend.
//!
//! # Tasks
//! - Reaper: physically deletes documents past their `expireAt`

mod reaper;

pub use reaper::spawn_reaper_task;
