//! CLI support
//!
//! Configuration loading for the wireline binary.

pub mod config;
