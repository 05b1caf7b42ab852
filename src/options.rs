//! Options carried through chunk and element (de)serialization.
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{RiffError, RiffResult};

/// Byte order of the chunk length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl Endianness {
    #[inline(always)]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        }
    }

    #[inline(always)]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        let mut buf = [0; 4];
        match self {
            Endianness::Little => LittleEndian::write_u32(&mut buf, value),
            Endianness::Big => BigEndian::write_u32(&mut buf, value),
        }
        buf
    }
}

impl TryFrom<u8> for Endianness {
    type Error = RiffError;

    fn try_from(value: u8) -> RiffResult<Self> {
        match value {
            0 => Ok(Endianness::Big),
            1 => Ok(Endianness::Little),
            _ => Err(RiffError::ParameterError(format!(
                "Invalid endianness: {}",
                value
            ))),
        }
    }
}

/// Word alignment and endianness settings for chunk and element (de)serialization.
///
/// When `word_aligned` is set, a single zero pad byte follows odd-length chunk data. The pad
/// byte is never counted in the chunk's length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecOptions {
    pub word_aligned: bool,
    pub endianness: Endianness,
}

impl CodecOptions {
    /// Little-endian, word aligned. Used by RIFF (WAV, AVI, WebP).
    pub const GENERIC: CodecOptions = CodecOptions {
        word_aligned: true,
        endianness: Endianness::Little,
    };

    /// Big-endian, unaligned. Used by MIDI-style IFF files.
    pub const MIDI: CodecOptions = CodecOptions {
        word_aligned: false,
        endianness: Endianness::Big,
    };

    pub const fn new(word_aligned: bool, endianness: Endianness) -> Self {
        CodecOptions {
            word_aligned,
            endianness,
        }
    }

    pub const fn with_word_aligned(mut self, word_aligned: bool) -> Self {
        self.word_aligned = word_aligned;
        self
    }

    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Number of pad bytes that follow `length` bytes of chunk data.
    #[inline(always)]
    pub const fn padding(&self, length: u32) -> u64 {
        if self.word_aligned && (length & 1) != 0 {
            1
        } else {
            0
        }
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions::GENERIC
    }
}
