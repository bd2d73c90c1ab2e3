//! Mod-list store behind the `mcman` binary.
//!
//! [`store::ModStore`] owns the three compact files in the data directory;
//! [`catalog`] holds the remote catalog's response types and turns a
//! catalog file into a stored record.

pub mod catalog;
pub mod config;
pub mod store;

pub use config::StoreConfig;
pub use store::ModStore;
