//! Speech bridge for Sage.
//!
//! Inbound voice clips are normalized with an [`AudioNormalizer`] and then
//! transcribed through a [`VoiceApi`]; replies are synthesized through the
//! same API. [`ElevenLabsApi`] and [`FfmpegNormalizer`] are the production
//! implementations, the `mock` module holds in-process doubles.

pub mod api;
pub mod bridge;
pub mod elevenlabs;
pub mod error;
pub mod format;
pub mod mock;
pub mod normalizer;

pub use api::VoiceApi;
pub use bridge::{SpeechBridge, SynthesizedAudio, CUSTOM_VOICE_CATEGORIES};
pub use elevenlabs::ElevenLabsApi;
pub use error::VoiceError;
pub use format::AudioFormat;
pub use mock::{FailingNormalizer, MockVoiceApi, PassthroughNormalizer};
pub use normalizer::{AudioNormalizer, FfmpegNormalizer};
