use bitstream::BitBuffer;

use crate::format::{put_field, RecordLayout};
use crate::{CodecError, GameVersion, ModLoader};

/// The loader and game version the user last searched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryState {
    pub loader: ModLoader,
    pub game_version: GameVersion,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            loader: ModLoader::Forge,
            game_version: GameVersion::new(20, 1),
        }
    }
}

impl QueryState {
    pub fn encode(&self, buf: &mut BitBuffer, layout: &RecordLayout) -> Result<(), CodecError> {
        put_field(
            buf,
            u64::from(u8::from(self.loader)),
            layout.loader_width.bits(),
            layout.strict,
        )?;
        self.game_version.encode(buf, layout.strict)
    }

    pub fn decode(
        buf: &BitBuffer,
        cursor: &mut usize,
        layout: &RecordLayout,
    ) -> Result<Self, CodecError> {
        let loader = ModLoader::try_from(buf.read_bits(cursor, layout.loader_width.bits())? as u8)?;
        let game_version = GameVersion::decode(buf, cursor)?;
        Ok(Self {
            loader,
            game_version,
        })
    }
}
