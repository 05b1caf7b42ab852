use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
#[cfg(feature = "colored")]
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{ElementDeserializer, ElementDeserializerOutput, ElementSerializerOutput},
    error::{RiffError, RiffResult},
    fourcc::FourCC,
    header::{Chunk, ChunkDeserializer, ChunkSerializer},
    io::{MemoryReadAccessor, ReadAccessor},
    options::CodecOptions,
    Element,
};

/// A chunk holding a NUL-terminated byte string, e.g. the entries of a LIST-INFO chunk.
///
/// The stored bytes never contain the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZStringElement {
    name: FourCC,
    bytes: Vec<u8>,
}

impl ZStringElement {
    pub fn new(name: FourCC) -> Self {
        ZStringElement {
            name,
            bytes: Vec::new(),
        }
    }

    pub fn with_string_bytes(name: FourCC, bytes: &[u8]) -> RiffResult<Self> {
        let mut zstr = Self::new(name);
        zstr.set_string_bytes(bytes)?;
        Ok(zstr)
    }

    pub fn name(&self) -> FourCC {
        self.name
    }

    pub fn set_name(&mut self, name: FourCC) {
        self.name = name;
    }

    pub fn string_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Stores `bytes` up to (not including) the first NUL.
    pub fn set_string_bytes(&mut self, bytes: &[u8]) -> RiffResult<()> {
        let bytes = match bytes.iter().position(|&b| b == 0) {
            Some(nul) => &bytes[..nul],
            None => bytes,
        };
        // the terminator has to fit in the chunk length too
        if bytes.len() as u64 >= u32::MAX as u64 {
            return Err(RiffError::ParameterError("String is too long.".into()));
        }
        self.bytes = bytes.to_vec();
        Ok(())
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn serialize(
        &self,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementSerializerOutput> {
        let mut data = Vec::with_capacity(self.bytes.len() + 1);
        data.extend_from_slice(&self.bytes);
        data.push(0);

        let data_length = data.len() as u32;
        let chunk = Chunk::new(
            self.name,
            Arc::new(MemoryReadAccessor::new(data)),
            data_length,
        );
        let output = ChunkSerializer::new(*options).serialize(&chunk, cancel)?;
        Ok(ElementSerializerOutput::new(
            output.data_accessor,
            output.data_length,
        ))
    }
}

#[cfg(feature = "colored")]
impl Display for ZStringElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {}",
            "ZString:".white().bold(),
            self.name.to_string().green().bold(),
            self.to_string_lossy().white()
        )
    }
}

#[cfg(not(feature = "colored"))]
impl Display for ZStringElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ZString: {}: {}", self.name, self.to_string_lossy())
    }
}

/// Decodes a NUL-terminated string chunk with the configured name.
#[derive(Debug, Clone, Copy)]
pub struct ZStringElementDeserializer {
    name: FourCC,
}

impl ZStringElementDeserializer {
    pub fn new(name: FourCC) -> Self {
        ZStringElementDeserializer { name }
    }
}

#[async_trait]
impl ElementDeserializer for ZStringElementDeserializer {
    fn acceptable_name(&self) -> FourCC {
        self.name
    }

    async fn deserialize(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementDeserializerOutput> {
        let output = ChunkDeserializer::new(*options)
            .deserialize(accessor, start, end, cancel)
            .await?;
        let chunk = output.chunk;
        if chunk.id() != self.name {
            return Err(RiffError::DeserializeError(
                "Invalid element name (chunk ID).".into(),
            ));
        }

        let data = chunk.data(cancel).await?;
        let element = ZStringElement::with_string_bytes(self.name, &data)?;
        Ok(ElementDeserializerOutput {
            element: Element::ZString(element),
            next_offset: output.next_offset,
        })
    }
}

#[cfg(test)]
mod zstr_tests {
    use super::*;

    const INAM: FourCC = FourCC::new(*b"INAM");

    #[test]
    fn truncates_at_first_nul() {
        let mut zstr = ZStringElement::new(INAM);
        assert!(zstr.string_bytes().is_empty());
        zstr.set_string_bytes(b"abc\0def\0").unwrap();
        assert_eq!(zstr.string_bytes(), b"abc");
        assert_eq!(zstr.to_string_lossy(), "abc");
    }

    #[tokio::test]
    async fn serializes_with_terminator() {
        let cancel = CancellationToken::new();
        let zstr = ZStringElement::with_string_bytes(INAM, b"Song").unwrap();

        let output = zstr.serialize(&CodecOptions::GENERIC, &cancel).unwrap();
        assert_eq!(
            output.to_bytes(&cancel).await.unwrap(),
            b"INAM\x05\x00\x00\x00Song\x00\x00"
        );

        let output = zstr.serialize(&CodecOptions::MIDI, &cancel).unwrap();
        assert_eq!(
            output.to_bytes(&cancel).await.unwrap(),
            b"INAM\x00\x00\x00\x05Song\x00"
        );
    }

    #[tokio::test]
    async fn decodes_up_to_first_nul() {
        let cancel = CancellationToken::new();
        let acc = MemoryReadAccessor::new(b"INAM\x06\x00\x00\x00ab\x00cd\x00".to_vec());
        let out = ZStringElementDeserializer::new(INAM)
            .deserialize(&acc, 0, Some(14), &CodecOptions::GENERIC, &cancel)
            .await
            .unwrap();
        assert_eq!(out.next_offset, 14);
        assert_eq!(out.element.as_zstring().unwrap().string_bytes(), b"ab");
    }

    #[tokio::test]
    async fn declines_other_names() {
        let acc = MemoryReadAccessor::new(b"ICMT\x01\x00\x00\x00\x00\x00".to_vec());
        let err = ZStringElementDeserializer::new(INAM)
            .deserialize(&acc, 0, None, &CodecOptions::GENERIC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_deserialize());
    }
}
