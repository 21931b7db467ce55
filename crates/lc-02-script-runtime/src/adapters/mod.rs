//! Adapters implementing the outbound ports.

pub mod scoped_tables;

pub use scoped_tables::ScopedTables;
