//! Foundation module - Core utilities and types
//!
//! - Handle-based collections used by every resource manager
//! - Logging utilities

pub mod collections;
pub mod logging;
