//! Arena Population Server Library
//!
//! Authoritative world state for an agar-style arena: a transactional table store,
//! the world schema, and the recurring job that keeps food at its target density.

pub mod config;
pub mod db;
pub mod game;
pub mod metrics;
pub mod util;
