//! Storage for Inkwell and the engines that run on top of it.
//!
//! [`store::Store`] is the storage collaborator: every method is one atomic
//! read-modify-write against a single backend. [`client::DbClient`] layers
//! validation, id generation and ownership rules on top of it.

pub mod client;
mod record;
pub mod store;
