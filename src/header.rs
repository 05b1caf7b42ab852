///
/// Module containing the chunk model and the codec for the 8 byte chunk header.
///
/// A chunk on the wire is a 4 byte identifier, a 4 byte length (little- or big-endian), `length`
/// bytes of payload and, when word alignment is enabled and `length` is odd, a single zero pad byte
/// that is not counted in `length`.
///
use std::{fmt::Display, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    error::{RiffError, RiffResult},
    fourcc::FourCC,
    io::{
        ensure_not_cancelled, MemoryReadAccessor, MultiSegmentReadAccessorFactory, ReadAccessor,
        SharedReadAccessor,
    },
    log,
    options::CodecOptions,
};

/// Size of the chunk header: 4 bytes identifier + 4 bytes length.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// A chunk: identifier, a data accessor positioned at the first payload byte, and the payload length.
#[derive(Clone)]
pub struct Chunk {
    id: FourCC,
    data_accessor: SharedReadAccessor,
    data_length: u32,
}

impl Chunk {
    pub fn new(id: FourCC, data_accessor: SharedReadAccessor, data_length: u32) -> Self {
        Chunk {
            id,
            data_accessor,
            data_length,
        }
    }

    pub fn id(&self) -> FourCC {
        self.id
    }

    pub fn data_accessor(&self) -> &SharedReadAccessor {
        &self.data_accessor
    }

    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    /// Reads the whole payload.
    pub async fn data(&self, cancel: &CancellationToken) -> RiffResult<Vec<u8>> {
        self.data_accessor
            .read(0, self.data_length as u64, cancel)
            .await
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.id)
            .field("data_length", &self.data_length)
            .finish()
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (size: {})", self.id, self.data_length)
    }
}

/// A decoded chunk and the offset of the sibling that follows it (pad byte included).
#[derive(Debug, Clone)]
pub struct ChunkDeserializerOutput {
    pub chunk: Chunk,
    pub next_offset: u64,
}

/// Decodes chunk headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkDeserializer {
    options: CodecOptions,
}

impl ChunkDeserializer {
    pub fn new(options: CodecOptions) -> Self {
        ChunkDeserializer { options }
    }

    /// Decodes the chunk starting at `start`.
    ///
    /// `end` bounds the legal range (`None` means unbounded). The header and the declared payload must
    /// both fit before `end`, otherwise the chunk is truncated. The returned chunk's data accessor is a
    /// view of `accessor`, no payload bytes are read.
    pub async fn deserialize(
        &self,
        accessor: &dyn ReadAccessor,
        start: u64,
        end: Option<u64>,
        cancel: &CancellationToken,
    ) -> RiffResult<ChunkDeserializerOutput> {
        if let Some(end) = end {
            if end <= start {
                return Err(RiffError::ParameterError(format!(
                    "Invalid ending offset {} (start: {}).",
                    end, start
                )));
            }
        }
        let end = end.unwrap_or(u64::MAX);

        let data_start = start
            .checked_add(CHUNK_HEADER_SIZE)
            .filter(|&offset| offset <= end)
            .ok_or_else(|| RiffError::IOError("Data truncated.".into()))?;
        let header = accessor.read(start, CHUNK_HEADER_SIZE, cancel).await?;

        let id = FourCC::from_slice(&header[0..4])?;
        let data_length = self.options.endianness.read_u32(&header[4..8]);

        let data_end = data_start + data_length as u64;
        if data_end > end {
            return Err(RiffError::IOError("Data truncated.".into()));
        }
        let next_offset = data_end + self.options.padding(data_length);

        log!(
            log::Level::Debug,
            "Chunk {} at {}: {} bytes, next at {}",
            id,
            start,
            data_length,
            next_offset
        );

        Ok(ChunkDeserializerOutput {
            chunk: Chunk::new(id, accessor.sub(data_start), data_length),
            next_offset,
        })
    }
}

/// A serialized chunk: an accessor over the full wire bytes and their length.
#[derive(Clone)]
pub struct ChunkSerializerOutput {
    pub data_accessor: SharedReadAccessor,
    pub data_length: u64,
}

/// Encodes chunks without copying their payload.
///
/// The output is a multi-segment accessor over the identifier, the length field, the chunk's own
/// data accessor and, if needed, a shared zero pad byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkSerializer {
    options: CodecOptions,
}

impl ChunkSerializer {
    pub fn new(options: CodecOptions) -> Self {
        ChunkSerializer { options }
    }

    pub fn serialize(
        &self,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> RiffResult<ChunkSerializerOutput> {
        ensure_not_cancelled(cancel)?;

        let data_length = chunk.data_length();
        let mut factory = MultiSegmentReadAccessorFactory::new();
        factory.add(
            Arc::new(MemoryReadAccessor::new(chunk.id().as_bytes().to_vec())),
            4,
        );
        factory.add(
            Arc::new(MemoryReadAccessor::new(
                self.options.endianness.u32_bytes(data_length).to_vec(),
            )),
            4,
        );
        factory.add(Arc::clone(chunk.data_accessor()), data_length as u64);

        let padding = self.options.padding(data_length);
        if padding != 0 {
            factory.add(Arc::new(MemoryReadAccessor::new(vec![0u8])), padding);
        }

        Ok(ChunkSerializerOutput {
            data_accessor: Arc::new(factory.create()),
            data_length: CHUNK_HEADER_SIZE + data_length as u64 + padding,
        })
    }
}
