//! Musical tokens, vocabularies and MIDI serialization.
//!
//! A token is either a note name (`"G4"`, `"E-3"`) or a chord written as a
//! dot-separated list of MIDI pitch numbers (`"4.8.11"`). A purely numeric
//! token is a one-pitch chord.

mod pitch;
mod score;
mod vocab;

pub use pitch::note_name_to_midi;
pub use score::{EventKind, Score, ScoreEvent, OFFSET_STEP};
pub use vocab::Vocabulary;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("unrecognized token {0:?}")]
    BadToken(String),
    #[error("pitch outside the MIDI range in token {0:?}")]
    PitchOutOfRange(String),
    #[error("midi serialization failed: {0}")]
    Midi(String),
}

/// A token is a chord when it carries the pitch separator or is purely numeric.
pub fn is_chord_token(token: &str) -> bool {
    token.contains('.') || (!token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
}

/// Split a chord token into its constituent MIDI pitches.
pub fn chord_pitches(token: &str) -> Result<Vec<u8>, ScoreError> {
    token
        .split('.')
        .map(|part| {
            let pitch: u32 = part
                .parse()
                .map_err(|_| ScoreError::BadToken(token.to_owned()))?;
            if pitch > 127 {
                return Err(ScoreError::PitchOutOfRange(token.to_owned()));
            }
            Ok(pitch as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chord_detection() {
        assert!(is_chord_token("4.8.11"));
        assert!(is_chord_token("7"));
        assert!(!is_chord_token("G4"));
        assert!(!is_chord_token("E-3"));
        assert!(!is_chord_token(""));
    }

    #[test]
    fn chord_splitting() {
        assert_eq!(chord_pitches("4.8.11").unwrap(), vec![4, 8, 11]);
        assert_eq!(chord_pitches("60").unwrap(), vec![60]);
    }

    #[test]
    fn chord_rejects_garbage() {
        assert!(chord_pitches("4.x.11").is_err());
        assert!(chord_pitches("4..11").is_err());
        assert!(chord_pitches("200").is_err());
    }
}
