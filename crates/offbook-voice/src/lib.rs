//! # Offbook Voice — Speech Synthesis for Scene Partners
//!
//! NPC dialogue lines go out to an OpenAI-compatible speech API and come back
//! as audio bytes. Keyless setups get a silent placeholder instead, so the
//! rest of the pipeline never has to care which backend is live.

pub mod error;
pub mod tts;

pub use error::{VoiceError, VoiceResult};
pub use tts::{create_tts, voice_for_character, OpenAiTts, PlaceholderTts, TtsBackend, VOICES};
