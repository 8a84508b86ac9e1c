//! Session auth types shared across Ednova crates.
//!
//! Provides tenant-scoped JWT issue/validation, the session cookie builders,
//! and the `SessionUser` extractor.

pub mod cookie;
pub mod identity;
pub mod token;
