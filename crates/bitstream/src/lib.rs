//! # Bitstream
//!
//! An append-only, growable byte buffer addressed in **bits**.
//!
//! Writers append fields of any width from 1 to 64 bits at the buffer's own
//! write cursor. Readers decode with a cursor they own (a plain `usize`), so
//! a buffer can be walked by any number of independent read passes without
//! touching writer state.
//!
//! ## Bit order
//!
//! Bits are packed **most-significant-bit first** within each byte. A field
//! of width `W` occupies exactly `W` consecutive bits starting at the cursor
//! and may straddle byte boundaries:
//!
//! ```text
//! write_bits(0b101, 3); write_bits(0b11110, 5); write_bits(0b1, 1)
//!
//! byte 0: 1 0 1 1 1 1 1 0    byte 1: 1 0 0 0 0 0 0 0
//!         └─3─┘ └───5───┘            └1┘ (unused, zero)
//! ```
//!
//! ## Pascal strings
//!
//! [`BitBuffer::write_pascal_string`] always starts on a byte boundary: the
//! remainder of a partially filled byte is skipped (left zero) before the
//! one-byte length prefix and the raw bytes are appended.
//!
//! ## Back-patching
//!
//! [`BitBuffer::reserve`] writes a zeroed placeholder and returns a
//! single-use [`Bookmark`]; [`BitBuffer::fill`] consumes it once the value is
//! known. [`BitBuffer::set_bits`] and [`BitBuffer::set_bit`] patch arbitrary
//! already-written bits.

use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::fs::{remove_file, rename, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

/// Longest string [`BitBuffer::write_pascal_string`] accepts (one length byte).
pub const MAX_PASCAL_LEN: usize = u8::MAX as usize;

#[derive(Debug, Error)]
pub enum BitError {
    /// A read wanted more bits than the buffer holds.
    #[error("end of stream: {wanted} bits requested at bit {pos}, buffer holds {len}")]
    EndOfStream { pos: usize, wanted: usize, len: usize },
    /// A patch touched bits outside the written extent.
    #[error("bits {pos}+{width} out of bounds for a buffer of {len} bits")]
    OutOfBounds { pos: usize, width: u8, len: usize },
    #[error("value {value} does not fit in {width} bits")]
    ValueTooLarge { value: u64, width: u8 },
    /// A field width above what the call can carry.
    #[error("bit width {width} exceeds {max}")]
    InvalidWidth { width: u8, max: u8 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl BitError {
    /// Returns `true` for [`BitError::EndOfStream`], the expected terminator
    /// of record-stream decode loops.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, BitError::EndOfStream { .. })
    }
}

/// Masks `value` to its low `width` bits.
#[inline]
fn low_bits(value: u64, width: u8) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

/// Position of a reserved placeholder field, handed out by
/// [`BitBuffer::reserve`].
///
/// A bookmark is neither `Clone` nor `Copy`: [`BitBuffer::fill`] takes it by
/// value, so each placeholder is filled at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reserved field stays zero unless the bookmark is filled"]
pub struct Bookmark {
    pos: usize,
    width: u8,
}

impl Bookmark {
    /// Absolute bit offset of the placeholder.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn width(&self) -> u8 {
        self.width
    }
}

/// Growable byte buffer with a bit-granular write cursor.
///
/// Invariants:
/// - `buf.len() == ceil(cursor / 8)`: the last byte holds the partially
///   written bits, and its unused low bits are zero.
/// - `cursor` never decreases and `buf` never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    buf: Vec<u8>,
    cursor: usize,
}

impl BitBuffer {
    /// Creates an empty buffer for an encode pass.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            cursor: 0,
        }
    }

    /// Wraps existing bytes (typically a file read from disk).
    ///
    /// The write cursor is placed at the full bit length, so the buffer is
    /// ready for decoding or for further appends.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let cursor = bytes.len() * 8;
        Self { buf: bytes, cursor }
    }

    /// Reads a whole file into a buffer.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BitError> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    /// Current absolute write-cursor offset in bits.
    pub fn bit_position(&self) -> usize {
        self.cursor
    }

    /// Readable extent in bits: the byte length times eight.
    pub fn len_bits(&self) -> usize {
        self.buf.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -------------------- Writes --------------------

    /// Writes the low `width` bits of `value` (1..=32), MSB first.
    ///
    /// Bits above `width` are silently dropped. A `width` above 32 is clamped
    /// to 32 (debug builds panic); use
    /// [`write_bits_checked`](Self::write_bits_checked) to get an error.
    pub fn write_bits(&mut self, value: u32, width: u8) {
        debug_assert!(width <= 32, "write_bits width must be 1..=32, got {width}");
        self.write_bits64(u64::from(value), width.min(32));
    }

    /// Writes the low `width` bits of `value` (1..=64), MSB first.
    ///
    /// Bits above `width` are silently dropped. A width of 0 is a no-op, and
    /// one above 64 is clamped to 64 (debug builds panic).
    pub fn write_bits64(&mut self, value: u64, width: u8) {
        debug_assert!(width <= 64, "bit width must be 1..=64, got {width}");
        let width = width.min(64);
        if width == 0 {
            return;
        }
        let value = low_bits(value, width);

        // Whole bytes on a byte boundary: append big-endian directly.
        if self.cursor % 8 == 0 && width % 8 == 0 {
            let nbytes = usize::from(width / 8);
            let mut tmp = [0u8; 8];
            BigEndian::write_uint(&mut tmp, value, nbytes);
            self.buf.extend_from_slice(&tmp[..nbytes]);
            self.cursor += usize::from(width);
            return;
        }

        let mut remaining = width;
        while remaining > 0 {
            let used = (self.cursor % 8) as u8;
            if used == 0 {
                self.buf.push(0);
            }
            let free = 8 - used;
            let size = remaining.min(free);
            let chunk = low_bits(value >> (remaining - size), size) as u8;
            if let Some(byte) = self.buf.last_mut() {
                *byte |= chunk << (free - size);
            }
            self.cursor += usize::from(size);
            remaining -= size;
        }
    }

    /// Like [`write_bits`](Self::write_bits) but rejects values that do not
    /// fit in `width` bits instead of truncating them. Nothing is written on
    /// error.
    pub fn write_bits_checked(&mut self, value: u32, width: u8) -> Result<(), BitError> {
        if width > 32 {
            return Err(BitError::InvalidWidth { width, max: 32 });
        }
        self.write_bits64_checked(u64::from(value), width)
    }

    /// Like [`write_bits64`](Self::write_bits64) but rejects values that do
    /// not fit in `width` bits. Nothing is written on error.
    pub fn write_bits64_checked(&mut self, value: u64, width: u8) -> Result<(), BitError> {
        if width > 64 {
            return Err(BitError::InvalidWidth { width, max: 64 });
        }
        if low_bits(value, width) != value {
            return Err(BitError::ValueTooLarge { value, width });
        }
        self.write_bits64(value, width);
        Ok(())
    }

    /// Advances the write cursor to the next byte boundary. The skipped bits
    /// are already zero.
    pub fn align_to_byte(&mut self) {
        let used = self.cursor % 8;
        if used != 0 {
            self.cursor += 8 - used;
        }
    }

    /// Writes a byte-aligned, length-prefixed string.
    ///
    /// The cursor is first aligned to a byte boundary, then one length byte
    /// and the raw UTF-8 bytes are appended.
    ///
    /// # Errors
    ///
    /// [`BitError::ValueTooLarge`] if the string is longer than 255 bytes.
    /// The buffer is left untouched in that case.
    pub fn write_pascal_string(&mut self, s: &str) -> Result<(), BitError> {
        let len = s.len();
        if len > MAX_PASCAL_LEN {
            return Err(BitError::ValueTooLarge {
                value: len as u64,
                width: 8,
            });
        }

        self.align_to_byte();
        self.buf.push(len as u8);
        self.buf.extend_from_slice(s.as_bytes());
        self.cursor = self.buf.len() * 8;
        Ok(())
    }

    /// Writes a zeroed `width`-bit placeholder and returns its bookmark.
    pub fn reserve(&mut self, width: u8) -> Bookmark {
        let pos = self.cursor;
        self.write_bits64(0, width);
        Bookmark { pos, width }
    }

    /// Fills a placeholder written by [`reserve`](Self::reserve).
    ///
    /// # Errors
    ///
    /// [`BitError::ValueTooLarge`] if `value` does not fit the reserved
    /// width; the placeholder keeps its old contents.
    pub fn fill(&mut self, bookmark: Bookmark, value: u64) -> Result<(), BitError> {
        if low_bits(value, bookmark.width) != value {
            return Err(BitError::ValueTooLarge {
                value,
                width: bookmark.width,
            });
        }
        self.set_bits(value, bookmark.pos, bookmark.width)
    }

    // -------------------- Patches --------------------

    /// Sets or clears a single already-written bit.
    ///
    /// Bit `0` is the most significant bit of byte `0`, matching the write
    /// order.
    pub fn set_bit(&mut self, state: bool, pos: usize) -> Result<(), BitError> {
        let len = self.len_bits();
        let byte = self.buf.get_mut(pos / 8).ok_or(BitError::OutOfBounds {
            pos,
            width: 1,
            len,
        })?;
        let mask = 0x80u8 >> (pos % 8);
        if state {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        Ok(())
    }

    /// Overwrites `width` bits starting at absolute position `pos` with the
    /// low bits of `value`. Bits outside `[pos, pos + width)` are untouched
    /// and the buffer never grows.
    pub fn set_bits(&mut self, value: u64, pos: usize, width: u8) -> Result<(), BitError> {
        let len = self.len_bits();
        if width > 64 || pos + usize::from(width) > len {
            return Err(BitError::OutOfBounds { pos, width, len });
        }
        let value = low_bits(value, width);

        let mut at = pos;
        let mut remaining = width;
        while remaining > 0 {
            let used = (at % 8) as u8;
            let free = 8 - used;
            let size = remaining.min(free);
            let shift = free - size;
            let mask = (low_bits(u64::MAX, size) as u8) << shift;
            let chunk = (low_bits(value >> (remaining - size), size) as u8) << shift;

            let byte = &mut self.buf[at / 8];
            *byte = (*byte & !mask) | chunk;

            at += usize::from(size);
            remaining -= size;
        }
        Ok(())
    }

    // -------------------- Reads --------------------

    /// Reads a `width`-bit field (1..=32) at `*cursor` and advances the
    /// cursor past it.
    ///
    /// A `width` above 32 is [`BitError::InvalidWidth`]; use
    /// [`read_bits64`](Self::read_bits64) for wider fields.
    pub fn read_bits(&self, cursor: &mut usize, width: u8) -> Result<u32, BitError> {
        if width > 32 {
            return Err(BitError::InvalidWidth { width, max: 32 });
        }
        self.read_bits64(cursor, width).map(|v| v as u32)
    }

    /// Reads a `width`-bit field (1..=64) at `*cursor` and advances the
    /// cursor past it.
    ///
    /// # Errors
    ///
    /// [`BitError::EndOfStream`] when `*cursor + width` exceeds
    /// [`len_bits`](Self::len_bits), and [`BitError::InvalidWidth`] for a
    /// `width` above 64. The cursor is left unchanged.
    pub fn read_bits64(&self, cursor: &mut usize, width: u8) -> Result<u64, BitError> {
        if width > 64 {
            return Err(BitError::InvalidWidth { width, max: 64 });
        }
        let len = self.len_bits();
        let start = *cursor;
        if start + usize::from(width) > len {
            return Err(BitError::EndOfStream {
                pos: start,
                wanted: usize::from(width),
                len,
            });
        }

        if start % 8 == 0 && width % 8 == 0 && width > 0 {
            let nbytes = usize::from(width / 8);
            let first = start / 8;
            let value = BigEndian::read_uint(&self.buf[first..first + nbytes], nbytes);
            *cursor = start + usize::from(width);
            return Ok(value);
        }

        let mut value = 0u64;
        let mut at = start;
        let mut remaining = width;
        while remaining > 0 {
            let used = (at % 8) as u8;
            let free = 8 - used;
            let size = remaining.min(free);
            let byte = self.buf[at / 8];
            let chunk = low_bits(u64::from(byte >> (free - size)), size);
            value = (value << size) | chunk;

            at += usize::from(size);
            remaining -= size;
        }

        *cursor = at;
        Ok(value)
    }

    /// Reads a string written by [`write_pascal_string`](Self::write_pascal_string).
    ///
    /// The cursor is aligned up to the next byte boundary first (consuming
    /// the padding). On success it ends byte-aligned just past the string;
    /// on error it is left unchanged. Invalid UTF-8 is replaced lossily.
    pub fn read_pascal_string(&self, cursor: &mut usize) -> Result<String, BitError> {
        let len = self.len_bits();
        let first = cursor.div_ceil(8);
        let str_len = match self.buf.get(first) {
            Some(&l) => usize::from(l),
            None => {
                return Err(BitError::EndOfStream {
                    pos: *cursor,
                    wanted: 8,
                    len,
                })
            }
        };

        let start = first + 1;
        let end = start + str_len;
        if end > self.buf.len() {
            return Err(BitError::EndOfStream {
                pos: start * 8,
                wanted: str_len * 8,
                len,
            });
        }

        let s = String::from_utf8_lossy(&self.buf[start..end]).into_owned();
        *cursor = end * 8;
        Ok(s)
    }

    // -------------------- Persistence --------------------

    /// Writes the raw bytes verbatim to `path`.
    ///
    /// The bytes go to `path.tmp` first, are fsynced, and the temp file is
    /// then renamed over `path`, so a crash never leaves a half-written file
    /// in place. On failure the temp file is removed and `path` is left as
    /// it was.
    pub fn save_to_disk<P: AsRef<Path>>(&self, path: P) -> Result<(), BitError> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        if let Err(e) = self.write_synced(&tmp_path).and_then(|()| rename(&tmp_path, path)) {
            let _ = remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn write_synced(&self, tmp_path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;

        file.write_all(&self.buf)?;
        file.flush()?;
        file.sync_all()
    }

    /// Renders the bytes as space-separated 8-bit binary groups.
    pub fn to_debug_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.buf.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for BitBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}
