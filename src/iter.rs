//! Module containing the two element streams.
//! The ElementDeserializationStream decodes a run of sibling chunks one element at a time, while the
//! ElementSerializationStream accumulates serialized elements into a single accessor.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        DeserializerRegistry, Element, ElementSerializerOutput, SharedElementDeserializer,
    },
    error::{RiffError, RiffResult},
    fourcc::FourCC,
    io::{MultiSegmentReadAccessorFactory, SharedReadAccessor},
    log,
    options::CodecOptions,
};

/// A cursor over back-to-back chunks.
///
/// Each call to [`next`](ElementDeserializationStream::next) peeks the id at the current offset,
/// resolves it through the stream's own registry (falling back to a raw element) and advances past
/// the decoded chunk. With no ending offset the stream never reports that it is exhausted; reading
/// past the data then fails with an I/O error.
#[derive(Clone)]
pub struct ElementDeserializationStream {
    accessor: SharedReadAccessor,
    current_offset: u64,
    ending_offset: Option<u64>,
    options: CodecOptions,
    registry: DeserializerRegistry,
}

impl ElementDeserializationStream {
    pub fn new(accessor: SharedReadAccessor, ending_offset: Option<u64>, options: CodecOptions) -> Self {
        Self::with_registry(accessor, ending_offset, options, DeserializerRegistry::new())
    }

    pub fn with_registry(
        accessor: SharedReadAccessor,
        ending_offset: Option<u64>,
        options: CodecOptions,
        registry: DeserializerRegistry,
    ) -> Self {
        ElementDeserializationStream {
            accessor,
            current_offset: 0,
            ending_offset,
            options,
            registry,
        }
    }

    pub fn use_deserializer(&mut self, deserializer: SharedElementDeserializer) -> RiffResult<()> {
        self.registry.use_deserializer(deserializer)
    }

    pub fn unuse_deserializer(&mut self, deserializer: &SharedElementDeserializer) -> RiffResult<()> {
        self.registry.unuse_deserializer(deserializer)
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn ending_offset(&self) -> Option<u64> {
        self.ending_offset
    }

    pub fn has_next(&self) -> bool {
        match self.ending_offset {
            Some(ending) => self.current_offset < ending,
            None => true,
        }
    }

    /// Decodes the element at the current offset and advances past it.
    pub async fn next(&mut self, cancel: &CancellationToken) -> RiffResult<Element> {
        if let Some(ending) = self.ending_offset {
            if self.current_offset.saturating_add(4) > ending {
                return Err(RiffError::DeserializeError("Chunk truncated.".into()));
            }
        }

        let name = FourCC::from_slice(&self.accessor.read(self.current_offset, 4, cancel).await?)?;
        let output = self
            .registry
            .resolve(
                name,
                self.accessor.as_ref(),
                self.current_offset,
                self.ending_offset,
                &self.options,
                cancel,
            )
            .await?;

        log!(
            log::Level::Trace,
            "Stream advanced {} -> {}",
            self.current_offset,
            output.next_offset
        );
        self.current_offset = output.next_offset;
        Ok(output.element)
    }
}

impl std::fmt::Debug for ElementDeserializationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementDeserializationStream")
            .field("current_offset", &self.current_offset)
            .field("ending_offset", &self.ending_offset)
            .field("options", &self.options)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Serializes elements one after another into a single virtual byte range.
#[derive(Clone, Default)]
pub struct ElementSerializationStream {
    factory: MultiSegmentReadAccessorFactory,
    options: CodecOptions,
}

impl ElementSerializationStream {
    pub fn new(options: CodecOptions) -> Self {
        ElementSerializationStream {
            factory: MultiSegmentReadAccessorFactory::new(),
            options,
        }
    }

    /// Appends the serialized bytes of `element`.
    pub fn serialize(&mut self, element: &Element, cancel: &CancellationToken) -> RiffResult<()> {
        let output = element.serialize(&self.options, cancel)?;
        self.factory
            .add(Arc::clone(output.accessor()), output.length());
        Ok(())
    }

    /// Total length serialized so far.
    pub fn len(&self) -> u64 {
        self.factory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factory.is_empty()
    }

    /// An accessor over everything serialized so far.
    pub fn create_accessor(&self) -> ElementSerializerOutput {
        ElementSerializerOutput::new(Arc::new(self.factory.create()), self.factory.len())
    }
}
