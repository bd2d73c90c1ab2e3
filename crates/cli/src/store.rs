//! On-disk mod list, query state and version catalog.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use bitstream::{BitBuffer, BitError};
use chrono::{DateTime, Utc};
use records::{
    decode_mod_list, encode_mod_list, CatalogLayout, GameVersion, ModEntry, QueryState,
    VersionCatalog, LEGACY_VERSIONS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{mod_entry_from_file, CfFile};
use crate::config::StoreConfig;

/// Reads `path` into a buffer; a missing file yields `None`.
fn read_optional(path: &Path) -> Result<Option<BitBuffer>> {
    match BitBuffer::open(path) {
        Ok(buf) => Ok(Some(buf)),
        Err(BitError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// The mod-manager state backed by three files in the data directory.
///
/// # Files
///
/// - `modlist`: every installed [`ModEntry`], back to back.
/// - `config`: the [`QueryState`] followed by the catalog of versions newer
///   than the legacy list.
/// - `versions`: older standalone catalog, read only when `config` has none.
///
/// # Recovery
///
/// [`ModStore::open`] never fails on missing files: an absent mod list is
/// empty, an absent query is the default one, and an absent catalog is just
/// the legacy list. A truncated or corrupt trailing record is dropped with a
/// warning, and so is a corrupt catalog at the end of `config`.
#[derive(Debug)]
pub struct ModStore {
    config: StoreConfig,
    mods: Vec<ModEntry>,
    query: QueryState,
    /// Full catalog, legacy versions included.
    catalog: VersionCatalog,
}

impl ModStore {
    /// Loads every file under `config.data_dir`, creating the directory if it
    /// does not exist.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating {}", config.data_dir.display()))?;

        let mods = match read_optional(&config.modlist_path())? {
            Some(buf) => decode_mod_list(&buf, &config.records),
            None => Vec::new(),
        };
        let (query, catalog) = Self::load_config(&config)?;

        info!(
            dir = %config.data_dir.display(),
            mods = mods.len(),
            versions = catalog.len(),
            "store loaded"
        );
        Ok(Self {
            config,
            mods,
            query,
            catalog: catalog.with_legacy(),
        })
    }

    fn load_config(config: &StoreConfig) -> Result<(QueryState, VersionCatalog)> {
        let path = config.config_path();
        let Some(buf) = read_optional(&path)? else {
            return Ok((QueryState::default(), Self::load_versions_file(config)?));
        };

        let mut cursor = 0;
        let query = match QueryState::decode(&buf, &mut cursor, &config.records) {
            Ok(q) => q,
            Err(e) if e.is_end_of_stream() => {
                warn!(path = %path.display(), "config holds no query, using defaults");
                return Ok((QueryState::default(), Self::load_versions_file(config)?));
            }
            Err(e) => return Err(e).with_context(|| format!("decoding {}", path.display())),
        };

        match VersionCatalog::decode(&buf, &mut cursor, CatalogLayout::GroupCount) {
            Ok(catalog) => Ok((query, catalog)),
            Err(e) if e.is_end_of_stream() => {
                debug!(path = %path.display(), "config carries no catalog");
                Ok((query, Self::load_versions_file(config)?))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt catalog in config, ignoring it");
                Ok((query, Self::load_versions_file(config)?))
            }
        }
    }

    fn load_versions_file(config: &StoreConfig) -> Result<VersionCatalog> {
        let path = config.versions_path();
        let Some(buf) = read_optional(&path)? else {
            return Ok(VersionCatalog::default());
        };
        let mut cursor = 0;
        match VersionCatalog::decode(&buf, &mut cursor, CatalogLayout::ParityFlag) {
            Ok(catalog) => Ok(catalog),
            Err(e) if e.is_end_of_stream() => Ok(VersionCatalog::default()),
            Err(e) => Err(e).with_context(|| format!("decoding {}", path.display())),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn mods(&self) -> &[ModEntry] {
        &self.mods
    }

    pub fn get(&self, id: u32) -> Option<&ModEntry> {
        self.mods.iter().find(|m| m.id == id)
    }

    /// Mods whose name contains `needle`, ignoring case, with their index.
    pub fn search<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = (usize, &'a ModEntry)> {
        let needle = needle.to_lowercase();
        self.mods
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.name.to_lowercase().contains(&needle))
    }

    /// Adds `entry` unless a mod with the same id is already installed.
    /// Returns whether it was added.
    pub fn add_entry(&mut self, entry: ModEntry) -> bool {
        if self.get(entry.id).is_some() {
            debug!(id = entry.id, "mod already installed");
            return false;
        }
        self.mods.push(entry);
        true
    }

    /// Records catalog file `file` as the installed version of mod `id`,
    /// tagged with the current query.
    pub fn add_from_file(&mut self, id: u32, file: &CfFile) -> bool {
        self.add_entry(mod_entry_from_file(id, &self.query, file))
    }

    /// Removes mod `id`. Returns the removed entry.
    pub fn remove(&mut self, id: u32) -> Option<ModEntry> {
        let idx = self.mods.iter().position(|m| m.id == id)?;
        Some(self.mods.remove(idx))
    }

    pub fn query(&self) -> QueryState {
        self.query
    }

    pub fn set_query(&mut self, query: QueryState) {
        self.query = query;
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// Merges a newest-first list of version strings from the remote
    /// catalog. Strings that are not release versions are skipped.
    pub fn update_versions<I, S>(&mut self, reported: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = reported.into_iter().filter_map(|s| {
            let s = s.as_ref();
            match s.parse::<GameVersion>() {
                Ok(v) => Some(v),
                Err(_) => {
                    debug!(version = s, "skipping non-release version");
                    None
                }
            }
        });
        let added = self.catalog.merge_newer(parsed);
        info!(added, total = self.catalog.len(), "version catalog updated");
        added
    }

    /// Writes the mod list and the config file.
    pub fn save(&self) -> Result<()> {
        self.save_mods()?;
        self.save_config()
    }

    /// Encodes every mod, then replaces `modlist`. Nothing is written if any
    /// record fails to encode.
    pub fn save_mods(&self) -> Result<()> {
        let path = self.config.modlist_path();
        let buf = encode_mod_list(&self.mods, &self.config.records)
            .context("encoding mod list")?;
        buf.save_to_disk(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), mods = self.mods.len(), bytes = buf.as_bytes().len(), "mod list saved");
        Ok(())
    }

    /// Writes the query followed by the versions newer than the legacy list.
    pub fn save_config(&self) -> Result<()> {
        let path = self.config.config_path();
        let mut buf = BitBuffer::new();
        self.query
            .encode(&mut buf, &self.config.records)
            .context("encoding query")?;
        self.catalog
            .newer_than(LEGACY_VERSIONS[0])
            .encode(&mut buf, CatalogLayout::GroupCount)
            .context("encoding version catalog")?;
        buf.save_to_disk(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bits = buf.bit_position(), "config saved");
        Ok(())
    }

    /// Writes the mod list as JSON. Returns the number of mods written.
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let exported: Vec<ExportedMod<'_>> = self.mods.iter().map(ExportedMod::from).collect();
        let json = serde_json::to_vec_pretty(&exported).context("serialising mods")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), mods = exported.len(), "exported");
        Ok(exported.len())
    }

    /// Reads the mod ids from an `[{"id": ...}]` file. Resolving them
    /// against the remote catalog is up to the caller.
    pub fn import_ids<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
        let path = path.as_ref();
        let body = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mods: Vec<ImportedMod> = serde_json::from_slice(&body)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(mods.into_iter().map(|m| m.id).collect())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedMod<'a> {
    id: u32,
    mod_loader: u8,
    game_version: String,
    name: &'a str,
    download_url: &'a str,
    deps: &'a [u32],
    uploaded: DateTime<Utc>,
}

impl<'a> From<&'a ModEntry> for ExportedMod<'a> {
    fn from(m: &'a ModEntry) -> Self {
        Self {
            id: m.id,
            mod_loader: m.loader.into(),
            game_version: m.game_version.to_string(),
            name: &m.name,
            download_url: &m.download_url,
            deps: &m.deps,
            uploaded: m.uploaded,
        }
    }
}

#[derive(Deserialize)]
struct ImportedMod {
    id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use records::{DownloadField, ModLoader, RecordLayout};
    use std::fs;
    use tempfile::tempdir;

    // ---------------------- Helpers ----------------------

    fn entry(id: u32, name: &str) -> ModEntry {
        ModEntry {
            id,
            loader: ModLoader::Forge,
            game_version: GameVersion::new(20, 1),
            deps: vec![],
            name: name.to_string(),
            download_url: format!("https://edge.forgecdn.net/files/4587/014/{name}"),
            uploaded: DateTime::from_timestamp(1_689_000_000, 0).unwrap(),
        }
    }

    fn open(dir: &Path) -> Result<ModStore> {
        ModStore::open(StoreConfig::new(dir))
    }

    // ---------------------- Fresh start ----------------------

    #[test]
    fn empty_dir_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = open(dir.path())?;
        assert!(store.mods().is_empty());
        assert_eq!(store.query(), QueryState::default());
        assert_eq!(store.catalog().versions(), LEGACY_VERSIONS);
        Ok(())
    }

    #[test]
    fn creates_missing_data_dir() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("a").join("b");
        let mut store = open(&nested)?;
        store.add_entry(entry(1, "One"));
        store.save()?;
        assert!(nested.join("modlist").exists());
        Ok(())
    }

    // ---------------------- Save / load ----------------------

    #[test]
    fn save_and_reopen() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        let mut zeta = entry(2, "Zeta");
        zeta.deps = vec![1];
        assert!(store.add_entry(entry(1, "Quark")));
        assert!(store.add_entry(zeta.clone()));
        store.set_query(QueryState {
            loader: ModLoader::Fabric,
            game_version: GameVersion::new(20, 4),
        });
        store.update_versions(["1.20.4", "1.20.3", "1.20.2", "1.20.1", "1.20", "1.19.4"]);
        store.save()?;

        let reopened = open(dir.path())?;
        assert_eq!(reopened.mods(), &[entry(1, "Quark"), zeta]);
        assert_eq!(reopened.query().loader, ModLoader::Fabric);
        assert_eq!(reopened.query().game_version.to_string(), "1.20.4");
        assert_eq!(reopened.catalog().len(), 5 + LEGACY_VERSIONS.len());
        assert_eq!(reopened.catalog().versions()[5], LEGACY_VERSIONS[0]);
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_ignored() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        assert!(store.add_entry(entry(7, "Quark")));
        assert!(!store.add_entry(entry(7, "Other")));
        assert_eq!(store.mods().len(), 1);
        assert_eq!(store.get(7).unwrap().name, "Quark");
        Ok(())
    }

    #[test]
    fn remove_and_search() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.add_entry(entry(1, "Quark"));
        store.add_entry(entry(2, "Zeta"));
        store.add_entry(entry(3, "Quark Oddities"));

        let hits: Vec<usize> = store.search("quark").map(|(i, _)| i).collect();
        assert_eq!(hits, vec![0, 2]);

        assert_eq!(store.remove(1).map(|m| m.name), Some("Quark".to_string()));
        assert!(store.remove(1).is_none());
        assert_eq!(store.mods().len(), 2);
        Ok(())
    }

    #[test]
    fn truncated_modlist_keeps_complete_records() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.add_entry(entry(1, "Quark"));
        store.add_entry(entry(2, "Zeta"));
        store.save_mods()?;

        let path = dir.path().join("modlist");
        let bytes = fs::read(&path)?;
        fs::write(&path, &bytes[..bytes.len() - 3])?;

        let reopened = open(dir.path())?;
        assert_eq!(reopened.mods(), &[entry(1, "Quark")]);
        Ok(())
    }

    #[test]
    fn corrupt_last_record_keeps_earlier_mods() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.add_entry(entry(1, "Quark"));
        store.add_entry(entry(2, "Zeta"));
        store.save_mods()?;

        let path = dir.path().join("modlist");
        let first = encode_mod_list(&[entry(1, "Quark")], &RecordLayout::default())?;
        let mut buf = BitBuffer::open(&path)?;
        // loader value 7 in the second record
        buf.set_bits(7, first.as_bytes().len() * 8 + 24, 3)?;
        buf.save_to_disk(&path)?;

        let reopened = open(dir.path())?;
        assert_eq!(reopened.mods(), &[entry(1, "Quark")]);
        Ok(())
    }

    #[test]
    fn failed_encode_leaves_file_untouched() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.add_entry(entry(1, "Quark"));
        store.save_mods()?;
        let before = fs::read(dir.path().join("modlist"))?;

        store.add_entry(entry(2, &"x".repeat(300)));
        assert!(store.save_mods().is_err());
        assert_eq!(fs::read(dir.path().join("modlist"))?, before);
        Ok(())
    }

    #[test]
    fn strict_layout_rejects_wide_ids() -> Result<()> {
        let dir = tempdir()?;
        let mut store = ModStore::open(StoreConfig::new(dir.path()).strict(true))?;
        store.add_entry(entry(1 << 24, "Huge"));
        assert!(store.save_mods().is_err());
        assert!(!dir.path().join("modlist").exists());
        Ok(())
    }

    #[test]
    fn cdn_layout_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let mut config = StoreConfig::new(dir.path());
        config.records = RecordLayout {
            download: DownloadField::CdnPath,
            ..RecordLayout::default()
        };
        let mut store = ModStore::open(config.clone())?;
        store.add_entry(entry(1, "Quark"));
        store.save_mods()?;

        assert_eq!(ModStore::open(config)?.mods(), &[entry(1, "Quark")]);
        Ok(())
    }

    // ---------------------- Config / versions ----------------------

    #[test]
    fn falls_back_to_standalone_versions_file() -> Result<()> {
        let dir = tempdir()?;
        let mut buf = BitBuffer::new();
        VersionCatalog::parse(["1.20.1", "1.20"])?.encode(&mut buf, CatalogLayout::ParityFlag)?;
        buf.save_to_disk(dir.path().join("versions"))?;

        let mut query_only = BitBuffer::new();
        QueryState::default().encode(&mut query_only, &RecordLayout::default())?;
        query_only.save_to_disk(dir.path().join("config"))?;

        let store = open(dir.path())?;
        let shown: Vec<String> = store.catalog().iter().take(3).map(ToString::to_string).collect();
        assert_eq!(shown, ["1.20.1", "1.20", "1.19.4"]);
        Ok(())
    }

    #[test]
    fn empty_config_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("config"), b"")?;
        let store = open(dir.path())?;
        assert_eq!(store.query(), QueryState::default());
        Ok(())
    }

    #[test]
    fn corrupt_config_catalog_falls_back() -> Result<()> {
        let dir = tempdir()?;
        let mut buf = BitBuffer::new();
        QueryState::default().encode(&mut buf, &RecordLayout::default())?;
        // 255 groups run past the largest major
        buf.write_bits(255, 8);
        for _ in 0..255 {
            buf.write_bits(0, 4);
        }
        buf.save_to_disk(dir.path().join("config"))?;

        let store = open(dir.path())?;
        assert_eq!(store.query(), QueryState::default());
        assert_eq!(store.catalog().versions(), LEGACY_VERSIONS);
        Ok(())
    }

    #[test]
    fn corrupt_query_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        // loader value 7 does not exist
        fs::write(dir.path().join("config"), [0b1110_0000u8, 0])?;
        assert!(open(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn update_versions_skips_non_releases() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        let added = store.update_versions(["1.20.1", "Forge", "1.20-Snapshot", "1.20", "1.19.4", "1.21"]);
        assert_eq!(added, 2);
        assert_eq!(store.catalog().newest(), Some(GameVersion::new(20, 1)));
        assert_eq!(store.update_versions(["1.20.1"]), 0);
        Ok(())
    }

    #[test]
    fn gap_in_catalog_aborts_config_save() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.update_versions(["1.20.3", "1.20.1", "1.20"]);
        assert!(store.save_config().is_err());
        assert!(!dir.path().join("config").exists());
        Ok(())
    }

    // ---------------------- JSON ----------------------

    #[test]
    fn export_then_import_ids() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        store.add_entry(entry(12345, "Quark"));
        store.add_entry(entry(678, "Zeta"));

        let out = dir.path().join("mods.json");
        assert_eq!(store.export_json(&out)?, 2);

        let json: serde_json::Value = serde_json::from_slice(&fs::read(&out)?)?;
        assert_eq!(json[0]["id"], 12345);
        assert_eq!(json[0]["modLoader"], 1);
        assert_eq!(json[0]["gameVersion"], "1.20.1");
        assert_eq!(json[1]["name"], "Zeta");

        assert_eq!(ModStore::import_ids(&out)?, vec![12345, 678]);
        Ok(())
    }

    #[test]
    fn import_rejects_malformed_json() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"[{"name": "no id"}]"#)?;
        assert!(ModStore::import_ids(&path).is_err());
        Ok(())
    }

    #[test]
    fn add_from_catalog_file() -> Result<()> {
        let dir = tempdir()?;
        let mut store = open(dir.path())?;
        let file: CfFile = serde_json::from_str(
            r#"{"id": 4587014, "fileName": "Quark.jar", "downloadUrl": "https://x/q.jar",
                "fileDate": "2023-06-18T11:45:03Z",
                "dependencies": [{"modId": 9, "relationType": 3}]}"#,
        )?;
        assert!(store.add_from_file(243121, &file));
        let added = store.get(243121).unwrap();
        assert_eq!(added.deps, vec![9]);
        assert_eq!(added.loader, store.query().loader);
        Ok(())
    }
}
