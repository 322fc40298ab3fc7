pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod properties;
pub mod segments;
pub mod shell;
pub mod shell_exec;
pub mod sync;
pub mod utils;
