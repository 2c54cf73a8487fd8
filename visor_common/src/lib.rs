//! VISOR Common Library
//!
//! This crate provides the shared leaf types and configuration loading
//! utilities for all VISOR workspace crates.
//!
//! # Module Structure
//!
//! - [`detection`] - Per-frame detection records (bounding box, label, confidence)
//! - [`policy`] - Priority policy and per-frame decision fusion
//! - [`actuation`] - Label-to-code actuation table
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Workspace-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use visor_common::prelude::*;
//! ```

pub mod actuation;
pub mod config;
pub mod consts;
pub mod detection;
pub mod policy;
pub mod prelude;
