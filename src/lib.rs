pub mod checks;
pub mod cli;
pub mod config;
pub mod core;
pub mod dump;
pub mod engine;
pub mod exit;
pub mod stats;
pub mod ui;
