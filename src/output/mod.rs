//! The output stage: one task per sink, each owning a `Sink` plugin handle,
//! a filter chain, and a cursor into the shared pipe (spec §4.6).

mod control;
mod sink;
mod source;
mod worker;

pub use control::{OutputCommand, OutputControl, FAIL_TIMER_DURATION};
pub use sink::Sink;
pub use source::AudioOutputSource;
pub use worker::run;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::{AudioFormat, SampleFormat, SongTime};
    use crate::filter::PreparedChain;
    use crate::music_chunk::MusicBuffer;
    use crate::music_pipe::MusicPipe;
    use crate::replay_gain::ReplayGainMode;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    struct FakeSink {
        played: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl Sink for FakeSink {
        async fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, crate::error::EngineError> {
            Ok(format)
        }
        async fn close(&mut self) {}
        async fn play(&mut self, data: &[u8]) -> Result<usize, crate::error::EngineError> {
            self.played.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
    }

    fn af() -> AudioFormat {
        AudioFormat::new(44100, SampleFormat::S16, 1)
    }

    #[tokio::test]
    async fn worker_plays_queued_chunk_then_idles() {
        let buf = MusicBuffer::new(2);
        let pipe = Arc::new(MusicPipe::new());
        let handle = buf.allocate().unwrap();
        {
            let mut chunk = handle.write();
            let slice = chunk.write(af(), SongTime::ZERO, 0).unwrap();
            slice[..2].copy_from_slice(&4242i16.to_le_bytes());
            chunk.expand(af(), 2);
        }
        pipe.push(handle);

        let control = Arc::new(OutputControl::new("fake"));
        control.set_format(af()).await;
        let played = Arc::new(Mutex::new(Vec::new()));
        let sink: Box<dyn Sink> = Box::new(FakeSink { played: played.clone() });
        let chain: Box<dyn crate::filter::PreparedFilter> = Box::new(PreparedChain::new(af()));
        let source = AudioOutputSource::new(pipe, af(), ReplayGainMode::Off, 0.0, chain).unwrap();

        let shutdown = CancellationToken::new();
        let shutdown2 = shutdown.clone();
        let handle = tokio::spawn(run(control.clone(), sink, source, shutdown2));
        control.send_command(OutputCommand::Open).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();
        let _ = handle.await;

        assert_eq!(&played.lock().unwrap()[..], &4242i16.to_le_bytes());
    }
}
