//! Addressable byte accessors.
//!
//! A [`ReadAccessor`] or [`WriteAccessor`] is a view over some backing store (a memory buffer, a file,
//! an append-only stream, or a concatenation of other accessors). [`ReadAccessor::sub`] and
//! [`WriteAccessor::sub`] return a new view over the same backing state, shifted by an offset,
//! without copying any bytes.
//!
//! Every I/O method takes a [`CancellationToken`]. Cancellation is cooperative: it is observed at the
//! next suspension point and reported as [`RiffError::OperationCancelled`].
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{RiffError, RiffResult};

pub mod file;
pub mod memory;
pub mod multi_segment;
pub mod stream;

pub use file::{FileReadAccessor, FileWriteAccessor};
pub use memory::{MemoryReadAccessor, MemoryWriteAccessor};
pub use multi_segment::{MultiSegmentReadAccessor, MultiSegmentReadAccessorFactory};
pub use stream::StreamReadAccessor;

/// Default block size used when copying between accessors.
pub const IO_BLOCK_SIZE: u64 = 4096;

pub type SharedReadAccessor = Arc<dyn ReadAccessor>;
pub type SharedWriteAccessor = Arc<dyn WriteAccessor>;

/// Read capability over an addressable byte store.
#[async_trait]
pub trait ReadAccessor: Send + Sync {
    /// Reads `length` bytes starting at `address`.
    ///
    /// Zero-length reads succeed without touching the backing store. Reading past the extent of
    /// the backing store is an [`RiffError::IOError`].
    async fn read(
        &self,
        address: u64,
        length: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<Vec<u8>>;

    /// Returns a view sharing the same backing state, with addresses shifted by `offset`.
    fn sub(&self, offset: u64) -> SharedReadAccessor;
}

/// Write capability over an addressable byte store.
#[async_trait]
pub trait WriteAccessor: Send + Sync {
    async fn write(&self, address: u64, data: &[u8], cancel: &CancellationToken) -> RiffResult<()>;

    /// Returns a view sharing the same backing state, with addresses shifted by `offset`.
    fn sub(&self, offset: u64) -> SharedWriteAccessor;
}

/// Copies `length` bytes from `src` to `dst`, `block_size` bytes at a time.
pub async fn copy_between_accessors(
    src: &dyn ReadAccessor,
    dst: &dyn WriteAccessor,
    length: u64,
    block_size: u64,
    cancel: &CancellationToken,
) -> RiffResult<()> {
    if block_size == 0 {
        return Err(RiffError::ParameterError("Invalid block size.".into()));
    }

    let mut offset = 0;
    let mut remaining = length;
    while remaining != 0 {
        let block = remaining.min(block_size);
        let buf = src.read(offset, block, cancel).await?;
        dst.write(offset, &buf, cancel).await?;
        offset += block;
        remaining -= block;
    }
    Ok(())
}

/// Resolves `base + address .. base + address + length` against an accessor's base offset.
#[inline(always)]
pub(crate) fn address_range(base: u64, address: u64, length: u64) -> RiffResult<(u64, u64)> {
    let begin = base
        .checked_add(address)
        .ok_or_else(|| RiffError::IOError("Address overflow.".into()))?;
    let end = begin
        .checked_add(length)
        .ok_or_else(|| RiffError::IOError("Address overflow.".into()))?;
    Ok((begin, end))
}

/// Converts a byte count to `usize`, failing with a parameter error if it can't be addressed.
#[inline(always)]
pub(crate) fn buffer_len(length: u64) -> RiffResult<usize> {
    usize::try_from(length).map_err(|_| RiffError::ParameterError("Invalid data length.".into()))
}

#[inline(always)]
pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> RiffResult<()> {
    match cancel.is_cancelled() {
        true => Err(RiffError::OperationCancelled),
        false => Ok(()),
    }
}
