use std::{
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
    io::{MemoryReadAccessor, ReadAccessor, SharedReadAccessor},
    options::CodecOptions,
    Element,
};

/// An opaque chunk: a name plus a reference to its payload.
///
/// Decoded raw elements keep a view of the source accessor, the payload is only read on demand.
#[derive(Clone)]
pub struct RawElement {
    name: FourCC,
    data_accessor: SharedReadAccessor,
    data_length: u32,
}

impl RawElement {
    /// An element with an empty payload.
    pub fn new(name: FourCC) -> Self {
        RawElement {
            name,
            data_accessor: Arc::new(MemoryReadAccessor::empty()),
            data_length: 0,
        }
    }

    pub fn with_data(name: FourCC, data_accessor: SharedReadAccessor, data_length: u32) -> Self {
        RawElement {
            name,
            data_accessor,
            data_length,
        }
    }

    /// An element owning `bytes` as its payload.
    pub fn from_bytes(name: FourCC, bytes: Vec<u8>) -> RiffResult<Self> {
        let data_length = checked_length(bytes.len() as u64)?;
        Ok(RawElement {
            name,
            data_accessor: Arc::new(MemoryReadAccessor::new(bytes)),
            data_length,
        })
    }

    pub fn name(&self) -> FourCC {
        self.name
    }

    pub fn set_name(&mut self, name: FourCC) {
        self.name = name;
    }

    pub fn data_accessor(&self) -> &SharedReadAccessor {
        &self.data_accessor
    }

    pub fn set_data_accessor(&mut self, data_accessor: SharedReadAccessor) {
        self.data_accessor = data_accessor;
    }

    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    pub fn set_data_length(&mut self, data_length: u64) -> RiffResult<()> {
        self.data_length = checked_length(data_length)?;
        Ok(())
    }

    /// Reads the whole payload.
    pub async fn data(&self, cancel: &CancellationToken) -> RiffResult<Vec<u8>> {
        self.data_accessor
            .read(0, self.data_length as u64, cancel)
            .await
    }

    pub fn serialize(
        &self,
        options: &CodecOptions,
        cancel: &CancellationToken,
    ) -> RiffResult<ElementSerializerOutput> {
        let chunk = Chunk::new(self.name, Arc::clone(&self.data_accessor), self.data_length);
        let output = ChunkSerializer::new(*options).serialize(&chunk, cancel)?;
        Ok(ElementSerializerOutput::new(
            output.data_accessor,
            output.data_length,
        ))
    }
}

fn checked_length(length: u64) -> RiffResult<u32> {
    u32::try_from(length).map_err(|_| RiffError::ParameterError("Invalid data length.".into()))
}

impl std::fmt::Debug for RawElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawElement")
            .field("name", &self.name)
            .field("data_length", &self.data_length)
            .finish()
    }
}

#[cfg(feature = "colored")]
impl Display for RawElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} bytes)",
            "Raw:".white().bold(),
            self.name.to_string().green().bold(),
            self.data_length
        )
    }
}

#[cfg(not(feature = "colored"))]
impl Display for RawElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Raw: {} ({} bytes)", self.name, self.data_length)
    }
}

/// Decodes any chunk with the configured name into a [`RawElement`].
#[derive(Debug, Clone, Copy)]
pub struct RawElementDeserializer {
    name: FourCC,
}

impl RawElementDeserializer {
    pub fn new(name: FourCC) -> Self {
        RawElementDeserializer { name }
    }
}

#[async_trait]
impl ElementDeserializer for RawElementDeserializer {
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

        let element = RawElement::with_data(
            self.name,
            Arc::clone(chunk.data_accessor()),
            chunk.data_length(),
        );
        Ok(ElementDeserializerOutput {
            element: Element::Raw(element),
            next_offset: output.next_offset,
        })
    }
}
