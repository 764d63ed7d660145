// ABOUTME: Library root for table-replicator
// ABOUTME: Exposes the incremental copy pipeline modules

pub mod commands;
pub mod config;
pub mod copier;
pub mod postgres;
pub mod relation;
pub mod schema;
pub mod watermark;

pub use relation::{Column, Relation};
