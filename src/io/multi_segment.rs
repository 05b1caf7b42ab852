//! Virtual concatenation of several read accessors.
//!
//! This is what lets serializers describe "the bytes of a chunk" as a header buffer followed by a
//! reference to the original payload accessor, with no copy of the payload.
use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{RiffError, RiffResult},
    io::{address_range, buffer_len, ReadAccessor, SharedReadAccessor},
    log,
};

/// A `[begin, end)` range of the virtual address space bound to a backing accessor.
#[derive(Clone)]
struct Segment {
    begin: u64,
    end: u64,
    accessor: SharedReadAccessor,
}

/// Read accessor presenting an ordered list of segments as one contiguous range.
///
/// Segments are contiguous and sorted by construction (see [`MultiSegmentReadAccessorFactory`]),
/// so a read is answered by binary searching for the segment holding the address and walking
/// forward across segment boundaries.
#[derive(Clone)]
pub struct MultiSegmentReadAccessor {
    segments: Arc<[Segment]>,
    offset: u64,
}

impl MultiSegmentReadAccessor {
    fn lookup_segment(&self, address: u64) -> Option<&Segment> {
        self.segments
            .binary_search_by(|segment| {
                if address >= segment.end {
                    Ordering::Less
                } else if address < segment.begin {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .ok()
            .map(|idx| &self.segments[idx])
    }

    /// Total length of all segments, as seen from address 0 of this view.
    pub fn len(&self) -> u64 {
        let total = self.segments.last().map(|s| s.end).unwrap_or(0);
        total.saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

#[async_trait]
impl ReadAccessor for MultiSegmentReadAccessor {
    async fn read(
        &self,
        address: u64,
        length: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let (mut cursor, _) = address_range(self.offset, address, length)?;
        let mut remaining = length;
        let mut buf = Vec::with_capacity(buffer_len(length)?);

        while remaining != 0 {
            let segment = self
                .lookup_segment(cursor)
                .ok_or_else(|| RiffError::IOError("Address overflow.".into()))?;
            let segment_len = (segment.end - cursor).min(remaining);
            log!(
                log::Level::Trace,
                "Reading {} bytes from segment [{}, {})",
                segment_len,
                segment.begin,
                segment.end
            );

            let part = segment
                .accessor
                .read(cursor - segment.begin, segment_len, cancel)
                .await?;
            buf.extend_from_slice(&part);

            cursor += segment_len;
            remaining -= segment_len;
        }

        Ok(buf)
    }

    fn sub(&self, offset: u64) -> SharedReadAccessor {
        Arc::new(MultiSegmentReadAccessor {
            segments: Arc::clone(&self.segments),
            offset: self.offset.saturating_add(offset),
        })
    }
}

/// Accumulates segments for a [`MultiSegmentReadAccessor`].
///
/// Each added segment begins where the previous one ended.
#[derive(Clone, Default)]
pub struct MultiSegmentReadAccessorFactory {
    segments: Vec<Segment>,
    offset: u64,
}

impl MultiSegmentReadAccessorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the first `length` bytes of `accessor` to the virtual range.
    pub fn add(&mut self, accessor: SharedReadAccessor, length: u64) {
        let next = self.offset + length;
        if length != 0 {
            self.segments.push(Segment {
                begin: self.offset,
                end: next,
                accessor,
            });
        }
        self.offset = next;
    }

    /// Total length added so far.
    pub fn len(&self) -> u64 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Creates an accessor over a snapshot of the segments added so far.
    pub fn create(&self) -> MultiSegmentReadAccessor {
        MultiSegmentReadAccessor {
            segments: self.segments.clone().into(),
            offset: 0,
        }
    }
}
