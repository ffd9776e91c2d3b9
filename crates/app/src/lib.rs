pub mod config;
pub mod recorder;
pub mod runtime;
pub mod trigger;
