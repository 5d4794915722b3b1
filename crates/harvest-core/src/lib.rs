pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod logging;
pub mod manifest;
pub mod output;

// Orchestration engine
pub mod monitor;
pub mod orchestrator;
pub mod primer;
pub mod runner;
pub mod scheduler;
pub mod summary;
