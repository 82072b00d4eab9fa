//! Speech synthesis backends and the silent-clip fallback

use std::io::Cursor;

use async_trait::async_trait;

use crate::{Error, Result};

/// Sample rate of generated fallback clips
pub const FALLBACK_SAMPLE_RATE: u32 = 16_000;

/// An external speech synthesizer
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render text to audio bytes (WAV or MP3 depending on backend)
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Encode a silent WAV clip of the given duration
///
/// Terminal tier of the synthesis cascade: the turn still carries audio of
/// nominal length rather than failing outright.
///
/// # Errors
///
/// Returns error if WAV encoding fails
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn silent_wav(duration_secs: f64) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: FALLBACK_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec)
            .map_err(|e| Error::Audio(e.to_string()))?;
        let samples = (f64::from(FALLBACK_SAMPLE_RATE) * duration_secs) as usize;
        for _ in 0..samples {
            writer
                .write_sample(0_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    Ok(buf.into_inner())
}

/// TTS request body for the OpenAI speech API
#[derive(serde::Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// `OpenAI` speech synthesizer
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
}

impl OpenAiSynthesizer {
    /// Create an `OpenAI` synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, model: String, voice: String, speed: f32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice,
            speed,
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(model = %self.model, chars = text.len(), "starting synthesis");

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&TtsRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.speed,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
