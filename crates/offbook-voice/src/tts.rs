//! **Speech synthesis** — one dialogue line in, audio bytes out.
//!
//! The live backend talks to an OpenAI-compatible speech API. Without an API
//! key the gateway falls back to [`PlaceholderTts`], which produces a short
//! silent WAV so the artifact pipeline behaves the same either way.

use crate::error::{VoiceError, VoiceResult};
use tracing::info;

/// Voice roster of the OpenAI speech API.
pub const VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Request timeout for one synthesis call. No retries: a failed call fails
/// the turn and the client may resend the same position.
const TTS_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Deterministically assign a voice to a character name. The same name always
/// lands on the same voice, so a scene keeps consistent casting across turns
/// and across processes.
pub fn voice_for_character(name: &str) -> &'static str {
    let sum: usize = name.trim().to_uppercase().bytes().map(|b| b as usize).sum();
    VOICES[sum % VOICES.len()]
}

/// Backend that turns text into audio bytes (MP3/WAV). Implement for
/// OpenAI-compatible APIs or a local engine.
#[async_trait::async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text` with the given voice. A non-success response from
    /// the API is an error, never silently empty audio.
    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>>;

    /// File extension of the bytes this backend produces.
    fn file_extension(&self) -> &'static str {
        "mp3"
    }
}

/// Placeholder TTS for keyless development and tests: returns a short silent
/// WAV so artifact writing and `/audio` serving exercise the real code path.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTts;

#[async_trait::async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(&self, _text: &str, _voice: &str) -> VoiceResult<Vec<u8>> {
        Ok(silence_wav(200))
    }

    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

/// Encode `duration_ms` of 16 kHz mono silence as 16-bit PCM WAV bytes.
fn silence_wav(duration_ms: u32) -> Vec<u8> {
    let sample_rate: u32 = 16_000;
    let num_samples = (sample_rate * duration_ms / 1000) as usize;
    let data_len = num_samples * 2;

    let mut buf = Vec::with_capacity(44 + data_len);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len as u32).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&16u16.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&(data_len as u32).to_le_bytes());
    buf.resize(44 + data_len, 0);
    buf
}

/// Production TTS backend: OpenAI-compatible speech API (OpenAI, OpenRouter,
/// etc.). Uses `TTS_API_URL` (e.g. https://api.openai.com/v1) and `TTS_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    /// HTTP client with the synthesis timeout baked in.
    client: reqwest::Client,
}

impl OpenAiTts {
    /// Build from environment: TTS_API_URL, TTS_API_KEY (or OPENAI_API_KEY), TTS_MODEL.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url =
            std::env::var("TTS_API_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY or OPENAI_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TTS_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl TtsBackend for OpenAiTts {
    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Pick the live backend when an API key is configured, placeholder otherwise.
/// `force_placeholder` comes from config (`tts_mode = "placeholder"`).
pub fn create_tts(force_placeholder: bool) -> Box<dyn TtsBackend> {
    if force_placeholder {
        info!(target: "offbook::tts", "TTS: [Placeholder] (tts_mode = placeholder)");
        return Box::new(PlaceholderTts);
    }
    match OpenAiTts::from_env() {
        Ok(tts) => {
            info!(target: "offbook::tts", "TTS: [{}] via {}", tts.model, tts.base_url);
            Box::new(tts)
        }
        Err(_) => {
            info!(target: "offbook::tts", "TTS: [Placeholder] (set TTS_API_KEY for live synthesis)");
            Box::new(PlaceholderTts)
        }
    }
}
