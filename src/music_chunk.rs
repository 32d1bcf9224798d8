//! `MusicChunk` and `MusicBuffer`: the shared PCM substrate.
//!
//! Grounded on `original_source/src/MusicChunk.hxx` and `MusicBuffer.{hxx,cxx}`.
//! The C++ original is an intrusive slab with a custom deleter that returns
//! a chunk to its buffer; this crate gets the same "allocate never blocks,
//! return happens on drop" behavior from `Arc` refcounting (teacher
//! precedent: `pmoaudio::audio_chunk::AudioChunkData` shares PCM data via
//! `Arc` rather than copying it around the pipeline).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::audio_format::{AudioFormat, SignedSongTime, SongTime};
use crate::replay_gain::{ReplayGainInfo, ReplayGainSerial};

/// Total chunk size including the header, per spec §6.
pub const CHUNK_SIZE: usize = 4096;
/// Rough size of the non-PCM header fields; the remainder is payload.
const HEADER_SIZE: usize = 192;
pub const CHUNK_PAYLOAD: usize = CHUNK_SIZE - HEADER_SIZE;

/// A song-boundary metadata marker: an empty chunk may carry a tag without
/// consuming PCM space (spec §4.1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<SignedSongTime>,
}

/// PCM payload plus the metadata the pipeline needs to carry alongside it.
#[derive(Debug)]
pub struct MusicChunk {
    format: AudioFormat,
    data: Vec<u8>,
    length: usize,
    pub tag: Option<Tag>,
    /// A second chunk to mix into this one during cross-fade.
    pub other: Option<MusicChunkHandle>,
    /// 1.0 = all of this chunk, 0.0 = all of `other`; negative = MixRamp
    /// mode (the magnitude is still the linear position-derived ratio).
    pub mix_ratio: f32,
    pub bit_rate: u16,
    pub time: SignedSongTime,
    pub replay_gain_info: ReplayGainInfo,
    pub replay_gain_serial: ReplayGainSerial,
}

impl Default for MusicChunk {
    fn default() -> Self {
        MusicChunk {
            format: AudioFormat::undefined(),
            data: Vec::new(),
            length: 0,
            tag: None,
            other: None,
            mix_ratio: 1.0,
            bit_rate: 0,
            time: SignedSongTime::NEGATIVE,
            replay_gain_info: ReplayGainInfo::clear(),
            replay_gain_serial: 0,
        }
    }
}

impl MusicChunk {
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0 && self.tag.is_none()
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Debug-mode invariant check: does this chunk's format agree with the
    /// one the pipe established?
    pub fn check_format(&self, format: AudioFormat) -> bool {
        self.length == 0 || self.format == format
    }

    /// Returns a writable slice in the chunk's free tail, establishing the
    /// chunk's format on first write. Returns `None` if the chunk is full.
    pub fn write(&mut self, format: AudioFormat, data_time: SongTime, bit_rate: u16) -> Option<&mut [u8]> {
        if self.data.is_empty() && self.length == 0 {
            self.data = vec![0u8; CHUNK_PAYLOAD];
            self.format = format;
            self.time = SignedSongTime::from_duration(data_time.as_duration());
            self.bit_rate = bit_rate;
        } else {
            debug_assert_eq!(self.format, format, "chunk format must stay constant");
        }
        if self.length >= CHUNK_PAYLOAD {
            return None;
        }
        Some(&mut self.data[self.length..])
    }

    /// Commits `n` bytes written via the slice returned by [`write`].
    /// Returns `true` if the chunk is now full.
    pub fn expand(&mut self, format: AudioFormat, n: usize) -> bool {
        debug_assert_eq!(self.format, format);
        debug_assert!(self.length + n <= CHUNK_PAYLOAD);
        self.length += n;
        self.length >= CHUNK_PAYLOAD
    }

    pub fn remaining(&self) -> usize {
        CHUNK_PAYLOAD.saturating_sub(self.length)
    }
}

struct ChunkSlot {
    data: RwLock<MusicChunk>,
    allocated: Arc<AtomicUsize>,
}

impl Drop for ChunkSlot {
    fn drop(&mut self) {
        // Clear `other` outside of any buffer-wide lock: dropping it may
        // recursively drop another ChunkSlot (see MusicBuffer::Return in
        // the original — must not happen while a buffer mutex is held).
        if let Ok(mut chunk) = self.data.write() {
            chunk.other = None;
        }
        self.allocated.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An owning handle to a slab-allocated [`MusicChunk`]. Cloning shares the
/// same chunk (used to fan a chunk out to multiple output consumers without
/// copying PCM data); the chunk returns to its [`MusicBuffer`] once the
/// last clone is dropped.
#[derive(Clone)]
pub struct MusicChunkHandle(Arc<ChunkSlot>);

impl MusicChunkHandle {
    pub fn read(&self) -> RwLockReadGuard<'_, MusicChunk> {
        self.0.data.read().expect("chunk lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, MusicChunk> {
        self.0.data.write().expect("chunk lock poisoned")
    }

    pub fn ptr_eq(&self, other: &MusicChunkHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles sharing this chunk, including `self`. Used by
    /// `MultipleOutputs::check_pipe` to decide when a chunk at the pipe's
    /// head can be reclaimed: once the pipe's own handle is the only one
    /// left, every output has advanced past it.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for MusicChunkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MusicChunkHandle({:p})", Arc::as_ptr(&self.0))
    }
}

/// A fixed-capacity slab allocator of [`MusicChunk`]s. `allocate` never
/// blocks: it returns `None` immediately under contention (spec §4.1).
#[derive(Clone)]
pub struct MusicBuffer {
    capacity: usize,
    allocated: Arc<AtomicUsize>,
}

impl MusicBuffer {
    pub fn new(capacity: usize) -> Self {
        MusicBuffer {
            capacity,
            allocated: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allocates a fresh, empty chunk, or `None` if the buffer is full.
    pub fn allocate(&self) -> Option<MusicChunkHandle> {
        loop {
            let current = self.allocated.load(Ordering::Acquire);
            if current >= self.capacity {
                return None;
            }
            if self
                .allocated
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(MusicChunkHandle(Arc::new(ChunkSlot {
                    data: RwLock::new(MusicChunk::default()),
                    allocated: self.allocated.clone(),
                })));
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn free(&self) -> usize {
        self.capacity - self.allocated()
    }

    pub fn is_full(&self) -> bool {
        self.allocated() >= self.capacity
    }

    /// Debug-only: true if no chunk is currently in flight.
    pub fn is_empty(&self) -> bool {
        self.allocated() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    fn af() -> AudioFormat {
        AudioFormat::new(48000, SampleFormat::Float, 2)
    }

    #[test]
    fn allocate_never_exceeds_capacity() {
        let buf = MusicBuffer::new(2);
        let a = buf.allocate().unwrap();
        let b = buf.allocate().unwrap();
        assert!(buf.allocate().is_none());
        assert!(buf.is_full());
        drop(a);
        assert!(!buf.is_full());
        let _c = buf.allocate().unwrap();
        let _ = b;
    }

    #[test]
    fn conservation_invariant() {
        let buf = MusicBuffer::new(4);
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(buf.allocate().unwrap());
        }
        assert_eq!(buf.allocated() + buf.free(), 4);
        handles.pop();
        assert_eq!(buf.allocated() + buf.free(), 4);
        assert_eq!(buf.allocated(), 3);
    }

    #[test]
    fn dropped_chunk_is_eventually_allocatable() {
        let buf = MusicBuffer::new(1);
        {
            let _h = buf.allocate().unwrap();
            assert!(buf.allocate().is_none());
        }
        assert!(buf.allocate().is_some());
    }

    #[test]
    fn write_then_expand_tracks_length() {
        let buf = MusicBuffer::new(1);
        let handle = buf.allocate().unwrap();
        {
            let mut chunk = handle.write();
            let slice = chunk.write(af(), SongTime::ZERO, 320).unwrap();
            assert!(slice.len() >= 8);
        }
        handle.write().expand(af(), 8);
        assert_eq!(handle.read().len(), 8);
        assert_eq!(handle.read().format(), af());
    }

    #[test]
    fn empty_chunk_with_tag_is_legal() {
        // A chunk with zero audio bytes but a tag attached (a song-boundary
        // marker) is legal to push through the pipe; `is_empty` counts it
        // as non-empty precisely because of the tag, matching
        // `MusicChunkInfo::IsEmpty`.
        let buf = MusicBuffer::new(1);
        let handle = buf.allocate().unwrap();
        handle.write().tag = Some(Tag {
            title: Some("boundary".into()),
            ..Default::default()
        });
        assert!(!handle.read().is_empty());
        assert_eq!(handle.read().len(), 0);
    }
}
