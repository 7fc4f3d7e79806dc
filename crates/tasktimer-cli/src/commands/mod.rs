pub mod algorithm;
pub mod config;
pub mod task;
pub mod timer;
