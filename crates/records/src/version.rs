use std::fmt;
use std::str::FromStr;

use bitstream::BitBuffer;

use crate::format::{parse_digits, put_field, MAJOR_BITS, MINOR_BITS};
use crate::CodecError;

/// A `1.<major>[.<minor>]` game version.
///
/// `minor == 0` means the version has no minor component (`1.20`), so
/// `1.20.0` and `1.20` are the same value. Ordering is by `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameVersion {
    pub major: u8,
    pub minor: u8,
}

impl GameVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Writes `major(5) | minor(4)`.
    pub fn encode(&self, buf: &mut BitBuffer, strict: bool) -> Result<(), CodecError> {
        put_field(buf, u64::from(self.major), MAJOR_BITS, strict)?;
        put_field(buf, u64::from(self.minor), MINOR_BITS, strict)
    }

    pub fn decode(buf: &BitBuffer, cursor: &mut usize) -> Result<Self, CodecError> {
        let major = buf.read_bits(cursor, MAJOR_BITS)? as u8;
        let minor = buf.read_bits(cursor, MINOR_BITS)? as u8;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "1.{}", self.major)
        } else {
            write!(f, "1.{}.{}", self.major, self.minor)
        }
    }
}

impl FromStr for GameVersion {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CodecError::MalformedNumericField(format!("game version {s:?}"));
        let rest = s.strip_prefix("1.").ok_or_else(malformed)?;
        let (major, minor) = match rest.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (rest, None),
        };

        let major = parse_digits(major).ok_or_else(malformed)?;
        let minor = match minor {
            Some(m) => parse_digits(m).ok_or_else(malformed)?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}
