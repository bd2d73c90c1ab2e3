use std::fmt;
use std::str::FromStr;

use crate::CodecError;

/// Mod loader a record or query targets. The discriminant is the on-disk
/// value and matches the remote catalog's `modLoaderType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ModLoader {
    #[default]
    Any = 0,
    Forge = 1,
    Cauldron = 2,
    LiteLoader = 3,
    Fabric = 4,
    Quilt = 5,
    NeoForge = 6,
}

impl ModLoader {
    pub const ALL: [ModLoader; 7] = [
        ModLoader::Any,
        ModLoader::Forge,
        ModLoader::Cauldron,
        ModLoader::LiteLoader,
        ModLoader::Fabric,
        ModLoader::Quilt,
        ModLoader::NeoForge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModLoader::Any => "Any",
            ModLoader::Forge => "Forge",
            ModLoader::Cauldron => "Cauldron",
            ModLoader::LiteLoader => "LiteLoader",
            ModLoader::Fabric => "Fabric",
            ModLoader::Quilt => "Quilt",
            ModLoader::NeoForge => "NeoForge",
        }
    }
}

impl From<ModLoader> for u8 {
    fn from(loader: ModLoader) -> u8 {
        loader as u8
    }
}

impl TryFrom<u8> for ModLoader {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ModLoader::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(CodecError::UnknownLoader(value))
    }
}

impl fmt::Display for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the loader name (case-insensitive) or its numeric value.
impl FromStr for ModLoader {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(found) = ModLoader::ALL
            .iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
        {
            return Ok(*found);
        }
        let value: u8 = s
            .parse()
            .map_err(|_| CodecError::MalformedNumericField(format!("mod loader {s:?}")))?;
        ModLoader::try_from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_match_wire_values() {
        for (i, loader) in ModLoader::ALL.iter().enumerate() {
            assert_eq!(u8::from(*loader) as usize, i);
            assert_eq!(ModLoader::try_from(i as u8).unwrap(), *loader);
        }
    }

    #[test]
    fn unknown_value_rejected() {
        assert!(matches!(
            ModLoader::try_from(7),
            Err(CodecError::UnknownLoader(7))
        ));
    }

    #[test]
    fn parse_by_name_or_number() {
        assert_eq!("forge".parse::<ModLoader>().unwrap(), ModLoader::Forge);
        assert_eq!("NeoForge".parse::<ModLoader>().unwrap(), ModLoader::NeoForge);
        assert_eq!("4".parse::<ModLoader>().unwrap(), ModLoader::Fabric);
        assert!("rift".parse::<ModLoader>().is_err());
        assert!("9".parse::<ModLoader>().is_err());
    }
}
