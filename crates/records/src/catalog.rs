//! Version catalog grouping.
//!
//! Every release newer than [`LEGACY_VERSIONS`] belongs to a major starting
//! at [`NEXT_MAJOR`], and each major's point releases are dense. A catalog is
//! therefore stored as one 4-bit field per major, oldest major first, holding
//! that major's highest minor:
//!
//! ```text
//! 1.21.1 1.21 1.20.2 1.20.1 1.20   ->   2 (major 20), 1 (major 21)
//! ```
//!
//! ```text
//! ParityFlag  even_groups(1) | top_minor(4) * groups ... <eof>
//! GroupCount  groups(8) | top_minor(4) * groups
//! ```
//!
//! `ParityFlag` reads groups until the stream ends. When the byte padding
//! leaves room for one more nibble, it decodes as an extra zero group; the
//! flag tells the decoder to drop it.

use bitstream::BitBuffer;
use tracing::debug;

use crate::format::MINOR_BITS;
use crate::{CodecError, GameVersion};

/// Major of the oldest stored group. Everything older is in
/// [`LEGACY_VERSIONS`].
pub const NEXT_MAJOR: u8 = 20;

const GROUP_COUNT_BITS: u8 = 8;
const MAX_MINOR: u8 = (1 << MINOR_BITS) - 1;

const fn v(major: u8, minor: u8) -> GameVersion {
    GameVersion::new(major, minor)
}

/// Releases older than anything the catalog ever stores, newest first.
/// They are appended after decoding rather than persisted.
#[rustfmt::skip]
pub const LEGACY_VERSIONS: &[GameVersion] = &[
    v(19, 4), v(19, 3), v(19, 2), v(19, 1), v(19, 0), v(18, 2), v(18, 1), v(18, 0), v(17, 1),
    v(17, 0), v(16, 5), v(16, 4), v(16, 3), v(16, 2), v(16, 1), v(16, 0), v(15, 2), v(15, 1),
    v(15, 0), v(14, 4), v(14, 3), v(14, 2), v(14, 1), v(14, 0), v(13, 2), v(13, 1), v(13, 0),
    v(12, 2), v(12, 1), v(12, 0), v(11, 2), v(11, 1), v(11, 0), v(10, 2), v(10, 1), v(10, 0),
    v(9, 4), v(9, 3), v(9, 2), v(9, 1), v(9, 0), v(8, 9), v(8, 8), v(8, 7), v(8, 6), v(8, 5),
    v(8, 4), v(8, 3), v(8, 2), v(8, 1), v(8, 0), v(7, 10), v(7, 9), v(7, 8), v(7, 7), v(7, 6),
    v(7, 5), v(7, 4), v(7, 3), v(7, 2), v(6, 4), v(6, 2), v(6, 1), v(5, 2), v(5, 1), v(4, 7),
    v(4, 6), v(4, 5), v(4, 4), v(4, 2), v(3, 2), v(3, 1), v(2, 5), v(2, 4), v(2, 3), v(2, 2),
    v(2, 1), v(1, 0), v(0, 0),
];

/// On-disk shape of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogLayout {
    /// Standalone `versions` file: a parity bit resolves the padding nibble.
    ParityFlag,
    /// Embedded in `config`: an explicit group count up front.
    #[default]
    GroupCount,
}

fn shape(msg: String) -> CodecError {
    CodecError::CatalogShape(msg)
}

/// Newest-first list of game versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    versions: Vec<GameVersion>,
}

impl VersionCatalog {
    pub fn new(versions: Vec<GameVersion>) -> Self {
        Self { versions }
    }

    /// Parses version strings in the given order.
    pub fn parse<I, S>(items: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let versions = items
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { versions })
    }

    pub fn versions(&self) -> &[GameVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GameVersion> {
        self.versions.iter()
    }

    pub fn newest(&self) -> Option<GameVersion> {
        self.versions.first().copied()
    }

    pub fn contains(&self, version: GameVersion) -> bool {
        self.versions.contains(&version)
    }

    /// The entries strictly newer than `floor`, order preserved.
    pub fn newer_than(&self, floor: GameVersion) -> Self {
        Self {
            versions: self.versions.iter().copied().filter(|v| *v > floor).collect(),
        }
    }

    /// Appends the legacy releases older than the current oldest entry.
    pub fn with_legacy(mut self) -> Self {
        let oldest = self.versions.last().copied();
        self.versions.extend(
            LEGACY_VERSIONS
                .iter()
                .copied()
                .filter(|v| oldest.map_or(true, |o| *v < o)),
        );
        self
    }

    /// Prepends versions from a newest-first remote listing.
    ///
    /// Consumption stops at the first version that is not newer than the
    /// newest legacy release. Versions not newer than the current head are
    /// ignored. Returns how many versions were added.
    pub fn merge_newer<I>(&mut self, reported: I) -> usize
    where
        I: IntoIterator<Item = GameVersion>,
    {
        let head = self.newest();
        let mut fresh: Vec<GameVersion> = reported
            .into_iter()
            .take_while(|v| *v > LEGACY_VERSIONS[0])
            .filter(|v| head.map_or(true, |h| *v > h))
            .collect();
        fresh.sort_unstable_by(|a, b| b.cmp(a));
        fresh.dedup();

        let added = fresh.len();
        fresh.append(&mut self.versions);
        self.versions = fresh;
        added
    }

    /// Highest minor per major, oldest major first.
    fn groups(&self) -> Result<Vec<u8>, CodecError> {
        let mut groups: Vec<u8> = Vec::new();
        let mut prev: Option<GameVersion> = None;
        for &ver in self.versions.iter().rev() {
            if ver.minor > MAX_MINOR {
                return Err(shape(format!("{ver} has a minor above {MAX_MINOR}")));
            }
            match prev {
                None if ver == GameVersion::new(NEXT_MAJOR, 0) => groups.push(0),
                None => {
                    return Err(shape(format!(
                        "oldest version is {ver}, expected 1.{NEXT_MAJOR}"
                    )))
                }
                Some(p) if ver.major == p.major && p.minor.checked_add(1) == Some(ver.minor) => {
                    if let Some(top) = groups.last_mut() {
                        *top = ver.minor;
                    }
                }
                Some(p) if ver.minor == 0 && p.major.checked_add(1) == Some(ver.major) => {
                    groups.push(0)
                }
                Some(p) => return Err(shape(format!("{ver} cannot precede {p}"))),
            }
            prev = Some(ver);
        }
        Ok(groups)
    }

    /// Appends the catalog to `buf`.
    ///
    /// # Errors
    ///
    /// [`CatalogShape`](CodecError::CatalogShape) when the list is not
    /// newest-first, does not bottom out at `1.20`, skips a major, has a
    /// hole inside a major, or has a minor above 15.
    pub fn encode(&self, buf: &mut BitBuffer, layout: CatalogLayout) -> Result<(), CodecError> {
        let groups = self.groups()?;
        match layout {
            CatalogLayout::ParityFlag => {
                buf.write_bits(u32::from(groups.len() % 2 == 0), 1);
            }
            CatalogLayout::GroupCount => {
                let count = u8::try_from(groups.len())
                    .map_err(|_| shape(format!("{} groups do not fit a count byte", groups.len())))?;
                buf.write_bits(u32::from(count), GROUP_COUNT_BITS);
            }
        }
        for top_minor in &groups {
            buf.write_bits(u32::from(*top_minor), MINOR_BITS);
        }
        Ok(())
    }

    /// Reads a catalog at `*cursor`.
    ///
    /// [`CatalogLayout::ParityFlag`] consumes the rest of the buffer.
    pub fn decode(
        buf: &BitBuffer,
        cursor: &mut usize,
        layout: CatalogLayout,
    ) -> Result<Self, CodecError> {
        let groups = match layout {
            CatalogLayout::ParityFlag => {
                let even = buf.read_bits(cursor, 1)? == 1;
                let mut groups = Vec::new();
                loop {
                    match buf.read_bits(cursor, MINOR_BITS) {
                        Ok(top_minor) => groups.push(top_minor as u8),
                        Err(e) if e.is_end_of_stream() => break,
                        Err(e) => return Err(e.into()),
                    }
                }

                if even != (groups.len() % 2 == 0) {
                    match groups.last() {
                        Some(0) if even => {
                            groups.pop();
                        }
                        _ => {
                            return Err(shape(format!(
                                "parity flag disagrees with {} decoded groups",
                                groups.len()
                            )))
                        }
                    }
                }
                groups
            }
            CatalogLayout::GroupCount => {
                let count = buf.read_bits(cursor, GROUP_COUNT_BITS)?;
                (0..count)
                    .map(|_| buf.read_bits(cursor, MINOR_BITS).map(|m| m as u8))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let versions = expand(&groups)?;
        debug!(groups = groups.len(), count = versions.len(), ?layout, "decoded version catalog");
        Ok(Self { versions })
    }
}

/// Newest-first versions for groups stored oldest major first.
fn expand(groups: &[u8]) -> Result<Vec<GameVersion>, CodecError> {
    let mut versions = Vec::new();
    for (i, top_minor) in groups.iter().enumerate().rev() {
        let major = u8::try_from(i)
            .ok()
            .and_then(|i| NEXT_MAJOR.checked_add(i))
            .ok_or_else(|| shape(format!("{} groups overflow the major number", groups.len())))?;
        versions.extend((0..=*top_minor).rev().map(|minor| GameVersion::new(major, minor)));
    }
    Ok(versions)
}

impl<'a> IntoIterator for &'a VersionCatalog {
    type Item = &'a GameVersion;
    type IntoIter = std::slice::Iter<'a, GameVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}
