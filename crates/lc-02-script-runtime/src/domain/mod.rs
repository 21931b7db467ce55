//! Domain layer: the values a script invocation is built from.

pub mod constants;
pub mod limits;
pub mod partitions;
pub mod scope;
pub mod script;
