//! Biochar explorer - client for exploring biochar field-trial sensor data
//!
//! This library exposes the core modules for testing and reuse.

pub mod backend;
pub mod catalog;
pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod render;
pub mod selection;
pub mod services;
pub mod summary;
