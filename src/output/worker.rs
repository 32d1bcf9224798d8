//! Drives one output: services `OutputControl` commands, opens/closes the
//! sink, and pumps PCM from its `AudioOutputSource` when playing.
//!
//! Grounded on `original_source/src/output/Thread.cxx`: the per-output
//! thread loop waiting on its own command queue, opening the sink lazily,
//! and handling `Cancel`/`Pause`/`Drain` without tearing down the device.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::control::{OutputCommand, OutputControl};
use super::sink::Sink;
use super::source::AudioOutputSource;
use crate::error::EngineError;

/// Runs the output loop until `Kill` or `shutdown`. Errors from the sink
/// are caught and converted to `OutputControl::record_failure` (spec §7's
/// "within one stage, errors are caught and converted to state").
pub async fn run(
    control: Arc<OutputControl>,
    mut sink: Box<dyn Sink>,
    mut source: AudioOutputSource,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() || control.is_killed().await {
            sink.close().await;
            return;
        }

        if let Some(cmd) = control.take_command().await {
            match cmd {
                OutputCommand::Kill => {
                    sink.close().await;
                    control.kill().await;
                    return;
                }
                OutputCommand::Disable => {
                    control.set_enabled(false).await;
                    if control.is_open().await {
                        sink.close().await;
                        control.set_open(false).await;
                    }
                }
                OutputCommand::Enable => control.set_enabled(true).await,
                OutputCommand::Close => {
                    sink.close().await;
                    control.set_open(false).await;
                }
                OutputCommand::Open => {
                    try_open(&control, sink.as_mut(), false).await;
                }
                OutputCommand::Pause => {
                    let paused = sink.pause().await.unwrap_or(false);
                    control.set_paused(paused).await;
                    control.set_allow_play(false).await;
                }
                OutputCommand::Release => {
                    control.set_paused(false).await;
                    control.set_allow_play(true).await;
                }
                OutputCommand::Drain => {
                    if let Err(err) = sink.drain().await {
                        control.record_failure(Arc::new(err)).await;
                    }
                }
                OutputCommand::Cancel => {
                    sink.cancel().await;
                    source.cancel();
                    control.note_interrupted().await;
                }
            }
            continue;
        }

        if !control.is_enabled().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
            continue;
        }

        if !control.is_open().await {
            if !control.reopen_allowed(false).await {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
            try_open(&control, sink.as_mut(), false).await;
            if !control.is_open().await {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        }

        if control.is_paused().await || !control.allow_play().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
            continue;
        }

        match source.next_block() {
            Ok(Some(block)) => {
                if let Err(err) = play_all(sink.as_mut(), &block).await {
                    control.record_failure(Arc::new(err)).await;
                }
            }
            Ok(None) => tokio::time::sleep(Duration::from_millis(5)).await,
            Err(err) => control.record_failure(Arc::new(err)).await,
        }
    }
}

async fn try_open(control: &Arc<OutputControl>, sink: &mut dyn Sink, force: bool) {
    if !control.reopen_allowed(force).await {
        return;
    }
    let format = control.format().await;
    match sink.open(format).await {
        Ok(negotiated) => {
            control.set_format(negotiated).await;
            control.set_open(true).await;
        }
        Err(err) => control.record_failure(Arc::new(err)).await,
    }
}

async fn play_all(sink: &mut dyn Sink, mut data: &[u8]) -> Result<(), EngineError> {
    while !data.is_empty() {
        let consumed = sink.play(data).await?;
        if consumed == 0 {
            return Err(EngineError::output("sink", "play() consumed zero bytes"));
        }
        data = &data[consumed..];
    }
    Ok(())
}
