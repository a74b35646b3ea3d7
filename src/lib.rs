pub mod config;
pub mod error;
pub mod iteration;
pub mod llm;
pub mod patch;
pub mod platform;
pub mod queue;
pub mod review;
pub mod server;
pub mod shutdown;
pub mod webhook;
pub mod workflow;
pub mod workspace;
