//! Core business logic module
//!
//! Configuration, the episode catalog, the downloader and merger wrappers
//! around the external tools, and the orchestration tying them together.

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod dl_options;
pub mod downloader;
pub mod merger;
pub mod models;
pub mod orchestrator;

#[cfg(test)]
mod test_support;


// Re-export commonly used types
pub use config::AppConfig;
pub use orchestrator::Orchestrator;
