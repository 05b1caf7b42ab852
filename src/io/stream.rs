//! Append-only stream accessor.
//!
//! Bytes are appended by a producer through the top-level accessor; readers asking for bytes that
//! haven't arrived yet wait until they are appended, the stream is ended, or their cancellation token
//! fires. This supports append-then-read-back, not single-pass scanning.
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{RiffError, RiffResult},
    io::{address_range, ReadAccessor, SharedReadAccessor},
    log,
};

#[derive(Debug, Default)]
struct StreamState {
    bytes: Vec<u8>,
    ended: bool,
}

#[derive(Debug, Default)]
struct StreamShared {
    state: Mutex<StreamState>,
    updated: Notify,
}

/// Read accessor over a growable, append-only byte stream.
#[derive(Debug)]
pub struct StreamReadAccessor {
    shared: Arc<StreamShared>,
    offset: u64,
    toplevel: bool,
}

impl StreamReadAccessor {
    /// Creates a new, empty, top-level stream.
    pub fn new() -> Self {
        StreamReadAccessor {
            shared: Arc::new(StreamShared::default()),
            offset: 0,
            toplevel: true,
        }
    }

    fn ensure_appendable(&self, state: &StreamState) -> RiffResult<()> {
        if !self.toplevel {
            return Err(RiffError::InvalidOperation(
                "Not top-level accessor.".into(),
            ));
        }
        if state.ended {
            return Err(RiffError::InvalidOperation(
                "The stream was already ended.".into(),
            ));
        }
        Ok(())
    }

    /// Appends bytes to the stream and wakes every pending reader.
    pub fn append(&self, bytes: &[u8]) -> RiffResult<()> {
        {
            let mut state = self.shared.state.lock();
            self.ensure_appendable(&state)?;
            state.bytes.extend_from_slice(bytes);
        }
        self.shared.updated.notify_waiters();
        Ok(())
    }

    /// Ends the stream. Pending readers wake up and either complete with bytes already present or
    /// fail with an I/O error.
    pub fn end(&self) -> RiffResult<()> {
        {
            let mut state = self.shared.state.lock();
            self.ensure_appendable(&state)?;
            state.ended = true;
            log!(log::Level::Debug, "Stream ended after {} bytes", state.bytes.len());
        }
        self.shared.updated.notify_waiters();
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.shared.state.lock().ended
    }

    /// Number of bytes appended so far.
    pub fn len(&self) -> u64 {
        self.shared.state.lock().bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StreamReadAccessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadAccessor for StreamReadAccessor {
    async fn read(
        &self,
        address: u64,
        length: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let (begin, end) = address_range(self.offset, address, length)?;

        loop {
            // Register interest before looking at the state so an append between the check and the
            // wait isn't missed.
            let updated = self.shared.updated.notified();
            tokio::pin!(updated);
            updated.as_mut().enable();

            {
                let state = self.shared.state.lock();
                if end <= state.bytes.len() as u64 {
                    return Ok(state.bytes[begin as usize..end as usize].to_vec());
                }
                if state.ended {
                    return Err(RiffError::IOError("Address overflow.".into()));
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RiffError::OperationCancelled),
                _ = &mut updated => continue,
            }
        }
    }

    fn sub(&self, offset: u64) -> SharedReadAccessor {
        Arc::new(StreamReadAccessor {
            shared: Arc::clone(&self.shared),
            offset: self.offset.saturating_add(offset),
            toplevel: false,
        })
    }
}

#[cfg(test)]
mod stream_tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn read_available_bytes() {
        let stream = StreamReadAccessor::new();
        stream.append(b"hello world").unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(stream.read(6, 5, &cancel).await.unwrap(), b"world");
        assert_eq!(stream.sub(6).read(0, 2, &cancel).await.unwrap(), b"wo");
    }

    #[tokio::test]
    async fn pending_read_wakes_on_append() {
        let stream = StreamReadAccessor::new();
        let view = stream.sub(2);
        let reader = tokio::spawn(async move {
            view.read(0, 4, &CancellationToken::new()).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.append(b"ab").unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.append(b"cdef").unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), b"cdef");
    }

    #[tokio::test]
    async fn end_fails_pending_read_past_data() {
        let stream = StreamReadAccessor::new();
        stream.append(b"abc").unwrap();
        let view = stream.sub(0);
        let reader = tokio::spawn(async move {
            view.read(0, 8, &CancellationToken::new()).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.end().unwrap();

        let err = reader.await.unwrap().unwrap_err();
        assert!(matches!(err, RiffError::IOError(_)));
        // bytes already present stay readable
        assert_eq!(
            stream.read(0, 3, &CancellationToken::new()).await.unwrap(),
            b"abc"
        );
    }

    #[tokio::test]
    async fn cancel_pending_read_then_read_again() {
        let stream = StreamReadAccessor::new();
        let cancel = CancellationToken::new();
        let view = stream.sub(0);
        let token = cancel.clone();
        let reader = tokio::spawn(async move { view.read(0, 4, &token).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let err = reader.await.unwrap().unwrap_err();
        assert!(matches!(err, RiffError::OperationCancelled));

        stream.append(b"RIFF").unwrap();
        assert_eq!(
            stream.read(0, 4, &CancellationToken::new()).await.unwrap(),
            b"RIFF"
        );
    }

    #[tokio::test]
    async fn append_and_end_are_toplevel_only() {
        let stream = StreamReadAccessor::new();
        let view = StreamReadAccessor {
            shared: Arc::clone(&stream.shared),
            offset: 0,
            toplevel: false,
        };
        assert!(matches!(
            view.append(b"x"),
            Err(RiffError::InvalidOperation(_))
        ));
        assert!(matches!(view.end(), Err(RiffError::InvalidOperation(_))));

        stream.end().unwrap();
        assert!(stream.is_ended());
        assert!(matches!(
            stream.append(b"x"),
            Err(RiffError::InvalidOperation(_))
        ));
        assert!(matches!(stream.end(), Err(RiffError::InvalidOperation(_))));
    }
}
