//! oxsftp-server: the binary front-end and local-filesystem backend for the
//! oxsftp engine.

pub mod backend;
pub mod cli;
pub mod service;

pub use cli::Cli;
