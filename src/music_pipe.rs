//! `MusicPipe`: an ordered queue of chunks shared between the decoder (the
//! producer) and one or more outputs (the consumers).
//!
//! Grounded on `original_source/src/MusicPipe.{hxx,cxx}` and
//! `output/SharedPipeConsumer.{hxx,cxx}`. The original builds the queue as
//! an intrusive linked list through `MusicChunk::next`, and walks that list
//! directly from `SharedPipeConsumer`. Since `MusicChunkHandle` does not
//! carry its own successor pointer (see `music_chunk.rs`), the queue here
//! is a plain `VecDeque` and "what comes after this chunk" is answered by
//! scanning it — the same O(n) debug-only scan the original already does
//! in `Contains()`, just promoted to the non-debug path.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::audio_format::AudioFormat;
use crate::music_chunk::MusicChunkHandle;

struct PipeState {
    chunks: VecDeque<MusicChunkHandle>,
    format: AudioFormat,
}

/// A FIFO of chunks. One party [`push`](MusicPipe::push)es at the tail,
/// the other [`shift`](MusicPipe::shift)s from the head once every
/// consumer is done with it.
pub struct MusicPipe {
    state: Mutex<PipeState>,
}

impl Default for MusicPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicPipe {
    pub fn new() -> Self {
        MusicPipe {
            state: Mutex::new(PipeState {
                chunks: VecDeque::new(),
                format: AudioFormat::undefined(),
            }),
        }
    }

    /// True if every chunk in the pipe so far agrees with `format`;
    /// mirrors `MusicPipe::CheckFormat`.
    pub fn check_format(&self, format: AudioFormat) -> bool {
        let state = self.state.lock().expect("pipe mutex poisoned");
        !state.format.is_defined() || state.format == format
    }

    pub fn contains(&self, chunk: &MusicChunkHandle) -> bool {
        let state = self.state.lock().expect("pipe mutex poisoned");
        state.chunks.iter().any(|c| c.ptr_eq(chunk))
    }

    /// Returns the head chunk without removing it.
    pub fn peek(&self) -> Option<MusicChunkHandle> {
        let state = self.state.lock().expect("pipe mutex poisoned");
        state.chunks.front().cloned()
    }

    /// Returns the chunk immediately after `chunk`, or `None` if `chunk`
    /// is the tail (or not in the pipe at all).
    pub fn next_after(&self, chunk: &MusicChunkHandle) -> Option<MusicChunkHandle> {
        let state = self.state.lock().expect("pipe mutex poisoned");
        let mut iter = state.chunks.iter();
        for c in iter.by_ref() {
            if c.ptr_eq(chunk) {
                return iter.next().cloned();
            }
        }
        None
    }

    /// Removes and returns the head chunk, returning it to its buffer once
    /// the last handle drops.
    pub fn shift(&self) -> Option<MusicChunkHandle> {
        let mut state = self.state.lock().expect("pipe mutex poisoned");
        let chunk = state.chunks.pop_front();
        if state.chunks.is_empty() {
            state.format = AudioFormat::undefined();
        }
        chunk
    }

    /// Drains the whole pipe.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("pipe mutex poisoned");
        state.chunks.clear();
        state.format = AudioFormat::undefined();
    }

    /// Appends a chunk at the tail. The first non-empty chunk pushed since
    /// the pipe was last empty establishes the pipe's format; later pushes
    /// are debug-checked against it.
    pub fn push(&self, chunk: MusicChunkHandle) {
        let format = chunk.read().format();
        let empty = chunk.read().is_empty();
        debug_assert!(!empty, "pushed chunk must not be empty");

        let mut state = self.state.lock().expect("pipe mutex poisoned");
        debug_assert!(
            !state.chunks.is_empty() || !state.format.is_defined(),
            "format must be cleared while the pipe is empty"
        );
        if !state.format.is_defined() && format.is_defined() {
            state.format = format;
        }
        debug_assert!(state.format.is_defined() && chunk.read().check_format(state.format) || !state.format.is_defined());
        state.chunks.push_back(chunk);
    }

    pub fn size(&self) -> usize {
        self.state.lock().expect("pipe mutex poisoned").chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Tracks one output's read position within a shared [`MusicPipe`].
///
/// Not internally synchronised — the original documents that it is meant
/// to be called only while holding the owning output's own mutex, since
/// the player (feeder) and the output (consumer) both touch it. This port
/// keeps that contract: callers serialise their own access.
#[derive(Default)]
pub struct SharedPipeConsumer {
    pipe: Option<Arc<MusicPipe>>,
    chunk: Option<MusicChunkHandle>,
    consumed: bool,
}

impl SharedPipeConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, pipe: Arc<MusicPipe>) {
        self.pipe = Some(pipe);
        self.chunk = None;
    }

    pub fn pipe(&self) -> &Arc<MusicPipe> {
        self.pipe.as_ref().expect("SharedPipeConsumer not initialised")
    }

    pub fn is_initial(&self) -> bool {
        self.chunk.is_none()
    }

    pub fn cancel(&mut self) {
        self.chunk = None;
    }

    /// Returns the chunk this consumer should be playing, advancing past
    /// already-consumed chunks as needed. `None` means "caught up with the
    /// pipe's tail".
    pub fn get(&mut self) -> Option<MusicChunkHandle> {
        if let Some(current) = self.chunk.clone() {
            if !self.consumed {
                return Some(current);
            }
            let next = self.pipe().next_after(&current)?;
            self.consumed = false;
            self.chunk = Some(next.clone());
            Some(next)
        } else {
            self.consumed = false;
            let first = self.pipe().peek();
            self.chunk = first.clone();
            first
        }
    }

    pub fn consume(&mut self, chunk: &MusicChunkHandle) {
        debug_assert!(
            self.chunk.as_ref().is_some_and(|c| c.ptr_eq(chunk)),
            "can only consume the chunk currently under the cursor"
        );
        self.consumed = true;
    }

    /// True once this consumer has moved past `chunk` for good, so it can
    /// be reclaimed by the buffer.
    pub fn is_consumed(&self, chunk: &MusicChunkHandle) -> bool {
        let Some(current) = &self.chunk else {
            return false;
        };
        debug_assert!(chunk.ptr_eq(current) || self.pipe().contains(chunk));
        if !chunk.ptr_eq(current) {
            return true;
        }
        self.consumed && self.pipe().next_after(current).is_none()
    }

    /// Clears the cursor once its chunk has been fully consumed and
    /// confirmed to have no successor, mirroring `ClearTail`.
    pub fn clear_tail(&mut self, chunk: &MusicChunkHandle) {
        debug_assert!(self.chunk.as_ref().is_some_and(|c| c.ptr_eq(chunk)));
        debug_assert!(self.consumed);
        self.chunk = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::{SampleFormat, SongTime};
    use crate::music_chunk::MusicBuffer;

    fn filled_chunk(buf: &MusicBuffer, af: AudioFormat, n: usize) -> MusicChunkHandle {
        let handle = buf.allocate().unwrap();
        {
            let mut chunk = handle.write();
            chunk.write(af, SongTime::ZERO, 0).unwrap();
            chunk.expand(af, n);
        }
        handle
    }

    fn af() -> AudioFormat {
        AudioFormat::new(44100, SampleFormat::S16, 2)
    }

    #[test]
    fn order_is_preserved() {
        let buf = MusicBuffer::new(4);
        let pipe = MusicPipe::new();
        let a = filled_chunk(&buf, af(), 4);
        let b = filled_chunk(&buf, af(), 4);
        pipe.push(a.clone());
        pipe.push(b.clone());
        assert_eq!(pipe.size(), 2);
        assert!(pipe.peek().unwrap().ptr_eq(&a));
        let shifted = pipe.shift().unwrap();
        assert!(shifted.ptr_eq(&a));
        assert!(pipe.peek().unwrap().ptr_eq(&b));
    }

    #[test]
    fn single_consumer_walks_to_tail() {
        let buf = MusicBuffer::new(4);
        let pipe = Arc::new(MusicPipe::new());
        let a = filled_chunk(&buf, af(), 4);
        let b = filled_chunk(&buf, af(), 4);
        pipe.push(a.clone());
        pipe.push(b.clone());

        let mut consumer = SharedPipeConsumer::new();
        consumer.init(pipe.clone());
        assert!(consumer.is_initial());

        let got = consumer.get().unwrap();
        assert!(got.ptr_eq(&a));
        consumer.consume(&got);
        // `a` has a successor (`b`), so it isn't reclaimable yet even
        // though playback of it finished. (`is_consumed` is only meaningful
        // for the cursor's current chunk or one already behind it, so `b`
        // isn't checked here.)
        assert!(!consumer.is_consumed(&a));

        let got = consumer.get().unwrap();
        assert!(got.ptr_eq(&b));
        consumer.consume(&got);
        // `b` is the tail: consumed and no successor, so it's reclaimable.
        assert!(consumer.is_consumed(&b));
        assert!(consumer.get().is_none());
    }

    #[test]
    fn reclaimed_only_after_all_consumers_pass() {
        let buf = MusicBuffer::new(4);
        let pipe = Arc::new(MusicPipe::new());
        let a = filled_chunk(&buf, af(), 4);
        pipe.push(a.clone());

        let mut fast = SharedPipeConsumer::new();
        fast.init(pipe.clone());
        let mut slow = SharedPipeConsumer::new();
        slow.init(pipe.clone());

        let got = fast.get().unwrap();
        fast.consume(&got);
        assert!(fast.is_consumed(&a));
        // slow hasn't even looked yet: the chunk isn't reclaimable.
        assert!(!slow.is_consumed(&a));

        let got2 = slow.get().unwrap();
        slow.consume(&got2);
        assert!(slow.is_consumed(&a));
    }

    #[test]
    fn cancel_resets_cursor_to_initial() {
        let buf = MusicBuffer::new(2);
        let pipe = Arc::new(MusicPipe::new());
        pipe.push(filled_chunk(&buf, af(), 4));
        let mut consumer = SharedPipeConsumer::new();
        consumer.init(pipe);
        consumer.get();
        assert!(!consumer.is_initial());
        consumer.cancel();
        assert!(consumer.is_initial());
    }

    #[test]
    fn shift_clears_format_when_pipe_empties() {
        let buf = MusicBuffer::new(2);
        let pipe = MusicPipe::new();
        pipe.push(filled_chunk(&buf, af(), 4));
        assert!(pipe.check_format(af()));
        pipe.shift();
        assert!(pipe.is_empty());
        // format reset, so any format is accepted again
        let other = AudioFormat::new(48000, SampleFormat::Float, 2);
        assert!(pipe.check_format(other));
    }
}
