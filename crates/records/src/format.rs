//! Field widths and layout switches shared by every record type.
//!
//! ```text
//! ModEntry   id(24) | loader(3|4) | major(5) | minor(4) | dep_count(4) | dep_id(24) * dep_count
//!            | <align> name_len(8) name | download | uploaded(64)
//! download   Url:     <align> url_len(8) url
//!            CdnPath: segment_hi(14) | segment_lo(10)
//! QueryState loader(3|4) | major(5) | minor(4)
//! ```

use bitstream::BitBuffer;

use crate::CodecError;

/// Mod ids are stored in 24 bits (up to 16,777,215).
pub const MOD_ID_BITS: u8 = 24;
pub const MAJOR_BITS: u8 = 5;
pub const MINOR_BITS: u8 = 4;
pub const DEP_COUNT_BITS: u8 = 4;
/// Most dependencies a single record can carry (`2^DEP_COUNT_BITS - 1`).
pub const MAX_DEPS: usize = (1 << DEP_COUNT_BITS) - 1;
pub const TIMESTAMP_BITS: u8 = 64;

/// Upper CDN path segment (`file_id / 1000`).
pub const CDN_HIGH_BITS: u8 = 14;
/// Lower CDN path segment (`file_id % 1000`).
pub const CDN_LOW_BITS: u8 = 10;
pub const CDN_URL_PREFIX: &str = "https://edge.forgecdn.net/files/";

/// Width of the loader field; older mod lists use three bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderWidth {
    #[default]
    Narrow,
    Wide,
}

impl LoaderWidth {
    pub fn bits(self) -> u8 {
        match self {
            LoaderWidth::Narrow => 3,
            LoaderWidth::Wide => 4,
        }
    }
}

/// How a record stores its download location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadField {
    /// The full URL as a Pascal string.
    #[default]
    Url,
    /// Two numeric CDN path segments; the URL is rebuilt from them and the
    /// mod name.
    CdnPath,
}

/// Selects the variant of the record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordLayout {
    pub loader_width: LoaderWidth,
    pub download: DownloadField,
    /// Reject out-of-range numbers instead of truncating them to their width.
    pub strict: bool,
}

impl RecordLayout {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Writes `value` into a `width`-bit field, truncating or (when `strict`)
/// failing on overflow.
pub(crate) fn put_field(
    buf: &mut BitBuffer,
    value: u64,
    width: u8,
    strict: bool,
) -> Result<(), CodecError> {
    if strict {
        buf.write_bits64_checked(value, width)?;
    } else {
        buf.write_bits64(value, width);
    }
    Ok(())
}

/// Splits a CDN file id into its two path segments.
pub fn cdn_segments(file_id: u32) -> (u32, u32) {
    (file_id / 1000, file_id % 1000)
}

/// Builds the CDN download URL for a file.
///
/// The file name is query-escaped: spaces become `+`, and every byte outside
/// `A-Za-z0-9-_.~` is percent-encoded.
pub fn cdn_url(high: u32, low: u32, file_name: &str) -> String {
    format!(
        "{CDN_URL_PREFIX}{high}/{low:03}/{}",
        urlencoding::encode(file_name).replace("%20", "+")
    )
}

/// Extracts the two numeric segments from a CDN download URL.
///
/// # Errors
///
/// [`CodecError::MalformedNumericField`] if the URL does not start with
/// [`CDN_URL_PREFIX`] or its first two segments are not numbers.
pub fn parse_cdn_url(url: &str) -> Result<(u32, u32), CodecError> {
    let malformed = || CodecError::MalformedNumericField(format!("not a CDN url: {url:?}"));
    let rest = url.strip_prefix(CDN_URL_PREFIX).ok_or_else(malformed)?;
    let mut parts = rest.splitn(3, '/');
    let high = parse_digits(parts.next().ok_or_else(malformed)?).ok_or_else(malformed)?;
    let low = parse_digits(parts.next().ok_or_else(malformed)?).ok_or_else(malformed)?;
    Ok((high, low))
}

/// Parses a non-empty run of ASCII digits. Signs and whitespace are rejected.
pub(crate) fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdn_url_roundtrip() {
        let (high, low) = cdn_segments(4_587_014);
        assert_eq!((high, low), (4587, 14));
        let url = cdn_url(high, low, "quark-1.20.1.jar");
        assert_eq!(
            url,
            "https://edge.forgecdn.net/files/4587/014/quark-1.20.1.jar"
        );
        assert_eq!(parse_cdn_url(&url).unwrap(), (4587, 14));
    }

    #[test]
    fn cdn_url_escapes_name() {
        let url = cdn_url(1, 2, "My Mod+1.jar");
        assert_eq!(url, "https://edge.forgecdn.net/files/1/002/My+Mod%2B1.jar");
    }

    #[test]
    fn parse_cdn_url_rejects_foreign_urls() {
        assert!(matches!(
            parse_cdn_url("https://example.com/files/1/2/x.jar"),
            Err(CodecError::MalformedNumericField(_))
        ));
        assert!(parse_cdn_url("https://edge.forgecdn.net/files/abc/002/x.jar").is_err());
        assert!(parse_cdn_url("https://edge.forgecdn.net/files/12").is_err());
    }

    #[test]
    fn parse_digits_rejects_signs() {
        assert_eq!(parse_digits::<u8>("20"), Some(20));
        assert_eq!(parse_digits::<u8>("+20"), None);
        assert_eq!(parse_digits::<u8>(""), None);
        assert_eq!(parse_digits::<u8>("300"), None);
    }

    #[test]
    fn loader_widths() {
        assert_eq!(LoaderWidth::default().bits(), 3);
        assert_eq!(LoaderWidth::Wide.bits(), 4);
    }
}
