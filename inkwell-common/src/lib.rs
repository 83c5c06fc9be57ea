//! Domain model shared by the storage and HTTP layers of Inkwell.

pub mod model;
pub mod snowflake;
pub mod util;
