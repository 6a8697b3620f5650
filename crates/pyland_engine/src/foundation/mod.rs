//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and projection helpers
//! - Broadcast callbacks with scoped lifelines
//! - Frame timing
//! - Logging utilities

pub mod callbacks;
pub mod logging;
pub mod math;
pub mod time;
