//! `asylum-rate` library crate.
//!
//! The binary (`asylum`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the HTTP router can be driven directly from integration tests
//! - the prediction facade is reusable outside the server

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod encode;
pub mod error;
pub mod eval;
pub mod io;
pub mod models;
pub mod predict;
pub mod report;
pub mod server;
