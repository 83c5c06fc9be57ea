//! HTTP surface of Inkwell.

pub mod config;
pub mod server;
