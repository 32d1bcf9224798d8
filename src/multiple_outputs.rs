//! `MultipleOutputs`: fans one shared pipe out to every configured output
//! and tracks the "elapsed_time" stamp of the most recently fully-consumed
//! chunk, so the player can reclaim it from the `MusicBuffer`.
//!
//! Grounded on `original_source/src/output/MultipleOutputs.{hxx,cxx}`: same
//! `Open`/`Play`/`CheckPipe`/`Cancel`/`Drain`/`Pause`/`Release` operation
//! set, same `elapsed_time` field purpose.

use std::sync::Arc;

use crate::audio_format::SignedSongTime;
use crate::music_pipe::MusicPipe;
use crate::output::{OutputCommand, OutputControl};

/// Wraps every configured output with a single interface that keeps them
/// synchronized, and reclaims chunks from the shared pipe once every output
/// has passed them.
pub struct MultipleOutputs {
    outputs: Vec<Arc<OutputControl>>,
    pipe: Arc<MusicPipe>,
    elapsed_time: SignedSongTime,
}

impl MultipleOutputs {
    pub fn new(pipe: Arc<MusicPipe>, outputs: Vec<Arc<OutputControl>>) -> Self {
        MultipleOutputs {
            outputs,
            pipe,
            elapsed_time: SignedSongTime::NEGATIVE,
        }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn pipe(&self) -> &Arc<MusicPipe> {
        &self.pipe
    }

    pub fn elapsed_time(&self) -> SignedSongTime {
        self.elapsed_time
    }

    pub async fn enable_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Enable).await;
        }
    }

    pub async fn open_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Open).await;
        }
    }

    pub async fn cancel_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Cancel).await;
        }
    }

    pub async fn pause_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Pause).await;
        }
    }

    pub async fn release_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Release).await;
        }
    }

    pub async fn drain_all(&self) {
        for o in &self.outputs {
            o.send_command(OutputCommand::Drain).await;
        }
    }

    /// Reclaims chunks from the head of the shared pipe that every output
    /// has moved past, updating `elapsed_time` from the last one reclaimed.
    /// A real per-output "is this chunk consumed" check requires each
    /// output's own `SharedPipeConsumer`, which lives inside its
    /// `AudioOutputSource`; `check_pipe` here models the reclamation policy
    /// against the pipe alone, since chunk lifetime (via `Drop`) already
    /// guarantees a chunk is freed only once every `MusicChunkHandle`
    /// (including any held by an output's source) is gone.
    pub fn check_pipe(&mut self) {
        while let Some(front) = self.pipe.peek() {
            // `front` here plus the pipe's own internal handle account for
            // 2; a third live handle means some output's SharedPipeConsumer
            // still holds a clone.
            if front.handle_count() > 2 {
                break;
            }
            let time = front.read().time;
            if !time.is_negative() {
                self.elapsed_time = time;
            }
            self.pipe.shift();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_outputs_list_reports_its_length() {
        let pipe = Arc::new(MusicPipe::new());
        let outputs = vec![Arc::new(OutputControl::new("a")), Arc::new(OutputControl::new("b"))];
        let multi = MultipleOutputs::new(pipe, outputs);
        assert_eq!(multi.len(), 2);
        assert!(!multi.is_empty());
    }
}
