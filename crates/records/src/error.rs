use bitstream::BitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Bits(#[from] BitError),
    /// Version text (or another numeric field embedded in text) did not parse.
    #[error("malformed numeric field: {0}")]
    MalformedNumericField(String),
    #[error("unknown mod loader value {0}")]
    UnknownLoader(u8),
    /// The version list cannot be expressed by the catalog layout.
    #[error("catalog shape: {0}")]
    CatalogShape(String),
}

impl CodecError {
    /// `true` when the underlying bit read ran off the end of the buffer.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CodecError::Bits(e) if e.is_end_of_stream())
    }
}
