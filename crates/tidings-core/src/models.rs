//! Domain models for Tidings.

pub mod account;
pub mod activity;
pub mod role;
