//! Compact binary layouts for mod records, query state and version catalogs.
//!
//! Every layout is an ordered sequence of [`bitstream::BitBuffer`] fields
//! with no header, magic or record count. Files are decoded until the
//! buffer runs out.
//!
//! ```text
//! +-----------------------------------------------------------+
//! | modlist   ModEntry ModEntry ModEntry ...             <eof> |
//! +-----------------------------------------------------------+
//! | config    QueryState | VersionCatalog (GroupCount)         |
//! +-----------------------------------------------------------+
//! | versions  VersionCatalog (ParityFlag)                <eof> |
//! +-----------------------------------------------------------+
//! ```
//!
//! Field widths live in [`format`]; the catalog grouping is described in
//! [`catalog`].

pub mod catalog;
mod error;
pub mod format;
mod loader;
mod query;
mod record;
mod version;

pub use catalog::{CatalogLayout, VersionCatalog, LEGACY_VERSIONS, NEXT_MAJOR};
pub use error::CodecError;
pub use format::{DownloadField, LoaderWidth, RecordLayout};
pub use loader::ModLoader;
pub use query::QueryState;
pub use record::{decode_mod_list, encode_mod_list, ModEntry};
pub use version::GameVersion;
