//! Memory-backed accessors.
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{RiffError, RiffResult},
    io::{
        address_range, buffer_len, ensure_not_cancelled, ReadAccessor, SharedReadAccessor,
        SharedWriteAccessor, WriteAccessor,
    },
    log,
};

/// Read accessor over an immutable, shared byte buffer.
///
/// Sub views share the buffer, so `sub` never copies.
#[derive(Debug, Clone)]
pub struct MemoryReadAccessor {
    bytes: Arc<[u8]>,
    offset: u64,
}

impl MemoryReadAccessor {
    pub fn new<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        MemoryReadAccessor {
            bytes: bytes.into(),
            offset: 0,
        }
    }

    /// An accessor over no bytes at all.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of bytes readable from address 0 of this view.
    pub fn len(&self) -> u64 {
        (self.bytes.len() as u64).saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadAccessor for MemoryReadAccessor {
    async fn read(
        &self,
        address: u64,
        length: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        ensure_not_cancelled(cancel)?;

        let (begin, end) = address_range(self.offset, address, length)?;
        if end > self.bytes.len() as u64 {
            return Err(RiffError::IOError("Address overflow.".into()));
        }
        Ok(self.bytes[begin as usize..end as usize].to_vec())
    }

    fn sub(&self, offset: u64) -> SharedReadAccessor {
        Arc::new(MemoryReadAccessor {
            bytes: Arc::clone(&self.bytes),
            offset: self.offset.saturating_add(offset),
        })
    }
}

#[derive(Debug, Default)]
struct MemoryWriteState {
    bytes: Vec<u8>,
    ended: bool,
}

/// Write accessor over a growable in-memory buffer.
///
/// Writes past the current end zero-fill the gap. Only the top-level accessor returned by
/// [`MemoryWriteAccessor::new`] can [`end`](MemoryWriteAccessor::end) the buffer, which hands back
/// the written bytes and rejects any further write through any view.
#[derive(Debug)]
pub struct MemoryWriteAccessor {
    state: Arc<Mutex<MemoryWriteState>>,
    offset: u64,
    toplevel: bool,
}

impl MemoryWriteAccessor {
    pub fn new() -> Self {
        MemoryWriteAccessor {
            state: Arc::new(Mutex::new(MemoryWriteState::default())),
            offset: 0,
            toplevel: true,
        }
    }

    /// Current length of the shared buffer.
    pub fn len(&self) -> u64 {
        self.state.lock().bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// Ends the accessor and returns the written bytes.
    pub fn end(&self) -> RiffResult<Vec<u8>> {
        if !self.toplevel {
            return Err(RiffError::InvalidOperation(
                "Not top-level accessor.".into(),
            ));
        }
        let mut state = self.state.lock();
        if state.ended {
            return Err(RiffError::InvalidOperation(
                "The accessor was already ended.".into(),
            ));
        }
        state.ended = true;
        log!(log::Level::Debug, "Memory write accessor ended after {} bytes", state.bytes.len());
        Ok(std::mem::take(&mut state.bytes))
    }
}

impl Default for MemoryWriteAccessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WriteAccessor for MemoryWriteAccessor {
    async fn write(&self, address: u64, data: &[u8], cancel: &CancellationToken) -> RiffResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        ensure_not_cancelled(cancel)?;

        let (begin, end) = address_range(self.offset, address, data.len() as u64)?;
        let begin = buffer_len(begin)?;
        let end = buffer_len(end)?;

        let mut state = self.state.lock();
        if state.ended {
            return Err(RiffError::IOError(
                "The accessor was already ended.".into(),
            ));
        }
        if state.bytes.len() < end {
            state.bytes.resize(end, 0);
        }
        state.bytes[begin..end].copy_from_slice(data);
        Ok(())
    }

    fn sub(&self, offset: u64) -> SharedWriteAccessor {
        Arc::new(MemoryWriteAccessor {
            state: Arc::clone(&self.state),
            offset: self.offset.saturating_add(offset),
            toplevel: false,
        })
    }
}
