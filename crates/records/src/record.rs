use bitstream::BitBuffer;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::format::{
    cdn_url, parse_cdn_url, put_field, DownloadField, RecordLayout, CDN_HIGH_BITS, CDN_LOW_BITS,
    DEP_COUNT_BITS, MAX_DEPS, MOD_ID_BITS, TIMESTAMP_BITS,
};
use crate::{CodecError, GameVersion, ModLoader};

/// One installed mod as persisted in the mod-list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub id: u32,
    pub loader: ModLoader,
    pub game_version: GameVersion,
    /// Ids of required dependencies, in the order the catalog listed them.
    pub deps: Vec<u32>,
    /// File name of the downloaded jar.
    pub name: String,
    pub download_url: String,
    /// Upload time, whole seconds.
    pub uploaded: DateTime<Utc>,
}

impl ModEntry {
    /// Appends this record to `buf` using `layout`.
    ///
    /// # Errors
    ///
    /// Any failure leaves `buf` with a partial record; callers discard the
    /// buffer instead of saving it.
    pub fn encode(&self, buf: &mut BitBuffer, layout: &RecordLayout) -> Result<(), CodecError> {
        let strict = layout.strict;
        put_field(buf, u64::from(self.id), MOD_ID_BITS, strict)?;
        put_field(
            buf,
            u64::from(u8::from(self.loader)),
            layout.loader_width.bits(),
            strict,
        )?;
        self.game_version.encode(buf, strict)?;

        if strict && self.deps.len() > MAX_DEPS {
            return Err(bitstream::BitError::ValueTooLarge {
                value: self.deps.len() as u64,
                width: DEP_COUNT_BITS,
            }
            .into());
        }
        if self.deps.len() > MAX_DEPS {
            warn!(
                mod_id = self.id,
                deps = self.deps.len(),
                "only the first {MAX_DEPS} dependencies are persisted"
            );
        }
        let count = buf.reserve(DEP_COUNT_BITS);
        let mut written = 0u64;
        for dep in self.deps.iter().take(MAX_DEPS) {
            put_field(buf, u64::from(*dep), MOD_ID_BITS, strict)?;
            written += 1;
        }
        buf.fill(count, written)?;

        buf.write_pascal_string(&self.name)?;

        match layout.download {
            DownloadField::Url => buf.write_pascal_string(&self.download_url)?,
            DownloadField::CdnPath => {
                let (high, low) = parse_cdn_url(&self.download_url)?;
                put_field(buf, u64::from(high), CDN_HIGH_BITS, strict)?;
                put_field(buf, u64::from(low), CDN_LOW_BITS, strict)?;
            }
        }

        buf.write_bits64(self.uploaded.timestamp() as u64, TIMESTAMP_BITS);
        Ok(())
    }

    /// Reads one record at `*cursor`.
    pub fn decode(
        buf: &BitBuffer,
        cursor: &mut usize,
        layout: &RecordLayout,
    ) -> Result<Self, CodecError> {
        let id = buf.read_bits(cursor, MOD_ID_BITS)?;
        let loader = ModLoader::try_from(buf.read_bits(cursor, layout.loader_width.bits())? as u8)?;
        let game_version = GameVersion::decode(buf, cursor)?;

        let dep_count = buf.read_bits(cursor, DEP_COUNT_BITS)? as usize;
        let deps = (0..dep_count)
            .map(|_| buf.read_bits(cursor, MOD_ID_BITS))
            .collect::<Result<Vec<_>, _>>()?;

        let name = buf.read_pascal_string(cursor)?;
        let download_url = match layout.download {
            DownloadField::Url => buf.read_pascal_string(cursor)?,
            DownloadField::CdnPath => {
                let high = buf.read_bits(cursor, CDN_HIGH_BITS)?;
                let low = buf.read_bits(cursor, CDN_LOW_BITS)?;
                cdn_url(high, low, &name)
            }
        };

        let secs = buf.read_bits64(cursor, TIMESTAMP_BITS)? as i64;
        let uploaded = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| CodecError::MalformedNumericField(format!("timestamp {secs}")))?;

        Ok(Self {
            id,
            loader,
            game_version,
            deps,
            name,
            download_url,
            uploaded,
        })
    }
}

/// Encodes a whole mod list into a fresh buffer.
///
/// Nothing is returned on error, so a failed save never reaches the disk.
pub fn encode_mod_list(entries: &[ModEntry], layout: &RecordLayout) -> Result<BitBuffer, CodecError> {
    let mut buf = BitBuffer::with_capacity(entries.len() * 96);
    for entry in entries {
        entry.encode(&mut buf, layout)?;
    }
    Ok(buf)
}

/// Decodes records until the buffer runs out.
///
/// Running off the end is the normal terminator. A trailing record that is
/// cut short or fails to decode (unknown loader, bad timestamp) ends the
/// list with a warning, and every complete record before it is returned.
pub fn decode_mod_list(buf: &BitBuffer, layout: &RecordLayout) -> Vec<ModEntry> {
    let mut entries = Vec::new();
    let mut cursor = 0;
    loop {
        let start = cursor;
        match ModEntry::decode(buf, &mut cursor, layout) {
            Ok(entry) => entries.push(entry),
            Err(e) if e.is_end_of_stream() => {
                if start < buf.len_bits() {
                    warn!(
                        at_bit = start,
                        len_bits = buf.len_bits(),
                        "discarding truncated trailing mod record"
                    );
                }
                break;
            }
            Err(e) => {
                warn!(
                    at_bit = start,
                    kept = entries.len(),
                    error = %e,
                    "discarding corrupt mod record and everything after it"
                );
                break;
            }
        }
    }
    debug!(count = entries.len(), "decoded mod list");
    entries
}
