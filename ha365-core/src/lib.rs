//! Core types for ha365-sync.
//!
//! This crate holds everything that does not talk to the network:
//! - `event` types for source and destination events
//! - `marker` title prefixes and the hidden uid marker
//! - `reconcile` the plan computation and its application
//! - `cycle` one fetch–diff–apply pass over the `adapter` traits

pub mod adapter;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod error;
pub mod event;
pub mod marker;
pub mod reconcile;
pub mod retry;
#[cfg(test)]
mod testing;
pub mod window;

pub use event::*;
