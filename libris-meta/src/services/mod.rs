//! Services for libris-meta

pub mod metadata_service;

pub use metadata_service::{ManualValue, MetadataService};
