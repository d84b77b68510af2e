//! Database initialisation

pub mod init;

pub use init::*;
