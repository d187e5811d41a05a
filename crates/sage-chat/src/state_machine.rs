//! Pipeline state machine with validated transitions.
//!
//! Received -> [Transcribed] -> ContextBuilt -> Completed -> Persisted
//! -> [Synthesized] -> Done, or Failed(stage) from any non-terminal state.

use crate::error::PipelineError;
use crate::types::PipelineState;

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - Received -> Transcribed (voice input)
/// - Received -> ContextBuilt (text input)
/// - Transcribed -> ContextBuilt
/// - ContextBuilt -> Completed
/// - Completed -> Persisted
/// - Persisted -> Synthesized
/// - Persisted -> Done
/// - Synthesized -> Done
/// - any non-terminal state -> Failed
pub fn validate_transition(from: PipelineState, to: PipelineState) -> Result<(), PipelineError> {
    use PipelineState::*;

    let valid = match (from, to) {
        (from, Failed(_)) => !from.is_terminal(),
        (Received, Transcribed)
        | (Received, ContextBuilt)
        | (Transcribed, ContextBuilt)
        | (ContextBuilt, Completed)
        | (Completed, Persisted)
        | (Persisted, Synthesized)
        | (Persisted, Done)
        | (Synthesized, Done) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PipelineStage;
    use PipelineState::*;

    // =====================================================================
    // Valid transitions
    // =====================================================================

    #[test]
    fn test_text_path() {
        for (from, to) in [
            (Received, ContextBuilt),
            (ContextBuilt, Completed),
            (Completed, Persisted),
            (Persisted, Done),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_voice_path() {
        for (from, to) in [
            (Received, Transcribed),
            (Transcribed, ContextBuilt),
            (Persisted, Synthesized),
            (Synthesized, Done),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_fail_from_any_live_state() {
        for from in [Received, Transcribed, ContextBuilt, Completed, Persisted, Synthesized] {
            assert!(validate_transition(from, Failed(PipelineStage::Completion)).is_ok());
        }
    }

    // =====================================================================
    // Invalid transitions
    // =====================================================================

    #[test]
    fn test_cannot_skip_completion() {
        assert!(validate_transition(ContextBuilt, Persisted).is_err());
        assert!(validate_transition(Received, Completed).is_err());
    }

    #[test]
    fn test_cannot_transcribe_after_context() {
        assert!(validate_transition(ContextBuilt, Transcribed).is_err());
    }

    #[test]
    fn test_synthesis_requires_persistence_step() {
        assert!(validate_transition(Completed, Synthesized).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(validate_transition(Done, Failed(PipelineStage::Synthesis)).is_err());
        assert!(validate_transition(Failed(PipelineStage::Input), Done).is_err());
        assert!(
            validate_transition(Failed(PipelineStage::Input), Failed(PipelineStage::Input))
                .is_err()
        );
    }

    #[test]
    fn test_self_transition_invalid() {
        assert!(validate_transition(Received, Received).is_err());
        assert!(validate_transition(Completed, Completed).is_err());
    }

    #[test]
    fn test_error_carries_states() {
        let err = validate_transition(Done, Completed).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidTransition {
                from: Done,
                to: Completed
            }
        );
    }
}
