//! User-facing texts returned when the pipeline fails hard.

use sage_core::error::ErrorKind;

pub const GENERIC_APOLOGY: &str =
    "I apologize, but I encountered an error while processing your request. Please try again.";

/// The reply shown to the user for a hard failure of `kind`.
pub fn apology_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RateLimit => {
            "I'm getting a lot of requests right now. Please try again in a moment."
        }
        ErrorKind::Transcription | ErrorKind::AudioFormat => {
            "Sorry, I couldn't understand the voice message. Please try again or send text."
        }
        ErrorKind::Validation => "Please send a non-empty message.",
        _ => GENERIC_APOLOGY,
    }
}
