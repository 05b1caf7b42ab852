//! The four-character code used to identify chunks, forms and lists.
use std::{fmt::Display, str::FromStr};

use crate::error::{RiffError, RiffResult};

/// Wrapper around a 4 byte buffer. Used for storing and displaying/debugging the identifier of a chunk,
/// and the form/list type of FORM and LIST chunks.
///
/// Equality is byte-for-byte. The string form drops trailing padding spaces, so `"fmt "` displays as `fmt`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC {
    identifier: [u8; 4],
}

impl FourCC {
    pub const fn new(identifier: [u8; 4]) -> Self {
        FourCC { identifier }
    }

    /// Creates a FourCC from a slice, which must be exactly 4 bytes long.
    pub fn from_slice(bytes: &[u8]) -> RiffResult<Self> {
        let identifier: [u8; 4] = bytes
            .try_into()
            .map_err(|_| RiffError::ParameterError("Invalid FOURCC bytes.".into()))?;
        Ok(FourCC { identifier })
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.identifier
    }

    /// The identifier interpreted as a big-endian integer, used as the registry lookup key.
    #[inline(always)]
    pub const fn key(&self) -> u32 {
        u32::from_be_bytes(self.identifier)
    }

    /// The identifier as a string, padding included.
    pub fn to_untrimmed_string(&self) -> String {
        self.identifier.iter().map(|&b| b as char).collect()
    }
}

impl FromStr for FourCC {
    type Err = RiffError;

    /// Pads the string with spaces up to 4 characters. Every character must fit in a single byte.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut identifier = [b' '; 4];
        for (i, c) in s.chars().enumerate() {
            if i >= 4 {
                return Err(RiffError::ParameterError(format!(
                    "The string {:?} is too long.",
                    s
                )));
            }
            let cp = c as u32;
            if cp > 0xFF {
                return Err(RiffError::ParameterError(format!(
                    "The string {:?} contains invalid codepoint U+{:04X}.",
                    s, cp
                )));
            }
            identifier[i] = cp as u8;
        }
        Ok(FourCC { identifier })
    }
}

impl TryFrom<&str> for FourCC {
    type Error = RiffError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(identifier: &[u8; 4]) -> Self {
        FourCC {
            identifier: *identifier,
        }
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(identifier: [u8; 4]) -> Self {
        FourCC { identifier }
    }
}

impl From<FourCC> for [u8; 4] {
    fn from(fourcc: FourCC) -> Self {
        fourcc.identifier
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let untrimmed = self.to_untrimmed_string();
        f.write_str(untrimmed.trim_end_matches(' '))
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC({:?})", self.to_untrimmed_string())
    }
}
