//! Remote mod-catalog response types and their conversion into stored records.
//!
//! Only the fields the store needs are modelled; unknown fields are ignored.

use chrono::{DateTime, SubsecRound, Utc};
use records::format::{cdn_segments, cdn_url};
use records::{ModEntry, QueryState};
use serde::Deserialize;
use tracing::warn;

/// Envelope of every catalog response.
#[derive(Debug, Clone, Deserialize)]
pub struct CfResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfMod {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub latest_files: Vec<CfFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfFile {
    pub id: u32,
    pub file_name: String,
    #[serde(default)]
    pub file_length: u64,
    /// Absent when the author disabled third-party distribution.
    pub download_url: Option<String>,
    pub file_date: DateTime<Utc>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub release_type: ReleaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub mod_id: u32,
    pub relation_type: FileRelation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfGameVersion {
    pub version_string: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum FileRelation {
    EmbeddedLibrary = 1,
    OptionalDependency = 2,
    RequiredDependency = 3,
    Tool = 4,
    Incompatible = 5,
    Include = 6,
}

impl TryFrom<u8> for FileRelation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => FileRelation::EmbeddedLibrary,
            2 => FileRelation::OptionalDependency,
            3 => FileRelation::RequiredDependency,
            4 => FileRelation::Tool,
            5 => FileRelation::Incompatible,
            6 => FileRelation::Include,
            other => return Err(format!("unknown relation type {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum ReleaseType {
    #[default]
    Release = 1,
    Beta = 2,
    Alpha = 3,
}

impl TryFrom<u8> for ReleaseType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ReleaseType::Release),
            2 => Ok(ReleaseType::Beta),
            3 => Ok(ReleaseType::Alpha),
            other => Err(format!("unknown release type {other}")),
        }
    }
}

/// Builds the record stored for mod `id` when `file` is installed under
/// `query`.
///
/// Only required dependencies are kept. A missing download URL is replaced
/// by the CDN location derived from the file id.
pub fn mod_entry_from_file(id: u32, query: &QueryState, file: &CfFile) -> ModEntry {
    let deps = file
        .dependencies
        .iter()
        .filter(|d| d.relation_type == FileRelation::RequiredDependency)
        .map(|d| d.mod_id)
        .collect();

    ModEntry {
        id,
        loader: query.loader,
        game_version: query.game_version,
        deps,
        name: file.file_name.clone(),
        download_url: download_url(file),
        uploaded: file.file_date.trunc_subsecs(0),
    }
}

fn download_url(file: &CfFile) -> String {
    match &file.download_url {
        Some(url) => url.clone(),
        None => {
            let (high, low) = cdn_segments(file.id);
            let guess = cdn_url(high, low, &file.file_name);
            warn!(file_id = file.id, name = %file.file_name, url = %guess, "missing download url, guessing");
            guess
        }
    }
}
