//! Domain types shared across Ednova crates.
//!
//! This crate contains only pure types and rules with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; infra code converts to and from them.

pub mod badge;
pub mod pagination;
pub mod tenant;
pub mod user;
pub mod xp;
