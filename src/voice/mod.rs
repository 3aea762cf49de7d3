//! Voice output
//!
//! Text → raw PCM via a speech service, then synchronous playback. Audio is
//! best-effort: every failure is a [`RenderError`](crate::error::RenderError)
//! the session reports and moves past.

pub mod huggingface;
pub mod playback;

use crate::error::{RenderError, RenderResult};

pub use huggingface::HuggingFaceTts;
pub use playback::RodioPlayer;

/// Speech-synthesis service: text in, raw audio bytes out
#[allow(async_fn_in_trait)]
pub trait SpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> RenderResult<Vec<u8>>;
}

/// Plays mono 16-bit samples to completion
#[allow(async_fn_in_trait)]
pub trait AudioPlayer {
    async fn play(&self, samples: Vec<i16>, sample_rate: u32) -> RenderResult<()>;
}

/// What the session calls to speak an answer
#[allow(async_fn_in_trait)]
pub trait Renderer {
    /// Speak `text`, returning once playback has finished
    async fn render(&self, text: &str) -> RenderResult<()>;
}

/// Synthesizes speech and plays it back
pub struct VoiceRenderer<S, P> {
    synthesizer: S,
    player: P,
    sample_rate: u32,
}

impl<S: SpeechSynthesizer, P: AudioPlayer> VoiceRenderer<S, P> {
    pub fn new(synthesizer: S, player: P, sample_rate: u32) -> Self {
        Self {
            synthesizer,
            player,
            sample_rate,
        }
    }
}

impl<S: SpeechSynthesizer, P: AudioPlayer> Renderer for VoiceRenderer<S, P> {
    async fn render(&self, text: &str) -> RenderResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let bytes = self.synthesizer.synthesize(text).await?;
        let samples = decode_pcm16(&bytes)?;
        tracing::debug!(
            samples = samples.len(),
            sample_rate = self.sample_rate,
            "playing answer"
        );
        self.player.play(samples, self.sample_rate).await
    }
}

/// Renderer used when voice is off: does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct Muted;

impl Renderer for Muted {
    async fn render(&self, _text: &str) -> RenderResult<()> {
        Ok(())
    }
}

/// Either renderer, chosen at startup
pub enum AnyRenderer<S, P> {
    Voice(VoiceRenderer<S, P>),
    Muted(Muted),
}

impl<S: SpeechSynthesizer, P: AudioPlayer> Renderer for AnyRenderer<S, P> {
    async fn render(&self, text: &str) -> RenderResult<()> {
        match self {
            AnyRenderer::Voice(voice) => voice.render(text).await,
            AnyRenderer::Muted(muted) => muted.render(text).await,
        }
    }
}

/// Interpret `bytes` as little-endian signed 16-bit PCM.
pub fn decode_pcm16(bytes: &[u8]) -> RenderResult<Vec<i16>> {
    if bytes.is_empty() {
        return Err(RenderError::Decode("no audio returned".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(RenderError::Decode(format!(
            "odd byte count {} for 16-bit samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
