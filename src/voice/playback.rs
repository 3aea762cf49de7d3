//! Audio playback through the default output device (rodio).

use crate::error::{RenderError, RenderResult};
use crate::voice::AudioPlayer;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

/// Plays samples on the system's default output device.
///
/// The device is opened per answer and released when playback ends, so a
/// missing or busy device only fails that one answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlayer;

impl AudioPlayer for RodioPlayer {
    async fn play(&self, samples: Vec<i16>, sample_rate: u32) -> RenderResult<()> {
        // rodio blocks the calling thread until the sink drains
        tokio::task::spawn_blocking(move || play_blocking(samples, sample_rate))
            .await
            .map_err(|e| RenderError::Playback(e.to_string()))?
    }
}

fn play_blocking(samples: Vec<i16>, sample_rate: u32) -> RenderResult<()> {
    let (_stream, handle) =
        OutputStream::try_default().map_err(|e| RenderError::Playback(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| RenderError::Playback(e.to_string()))?;
    sink.append(SamplesBuffer::new(1, sample_rate, samples));
    sink.sleep_until_end();
    Ok(())
}
