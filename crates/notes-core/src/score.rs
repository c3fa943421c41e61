use serde::{Deserialize, Serialize};

use crate::{chord_pitches, is_chord_token, note_name_to_midi, ScoreError};

/// Quarter-note gap between consecutive generated events, so notes do not
/// stack on the same onset.
pub const OFFSET_STEP: f64 = 2.0;

const PPQ: u16 = 480;
const TEMPO_USPQ: u32 = 500_000; // 120 bpm
const NOTE_QUARTERS: f64 = 1.0;
const VELOCITY: u8 = 64;
const PIANO_PROGRAM: u8 = 0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Note(u8),
    Chord(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    /// Onset in quarter-note units from the start of the piece.
    pub offset: f64,
    pub kind: EventKind,
}

/// A single-voice piano timeline of notes and chords.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub events: Vec<ScoreEvent>,
}

impl Score {
    /// Decode generated tokens into a timeline, one event per token, onsets
    /// advancing by [`OFFSET_STEP`].
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ScoreError> {
        let mut events = Vec::with_capacity(tokens.len());
        let mut offset = 0.0;
        for token in tokens {
            let token = token.as_ref();
            let kind = if is_chord_token(token) {
                EventKind::Chord(chord_pitches(token)?)
            } else {
                EventKind::Note(note_name_to_midi(token)?)
            };
            events.push(ScoreEvent { offset, kind });
            offset += OFFSET_STEP;
        }
        Ok(Self { events })
    }

    /// Serialize to SMF bytes (single track), simple delta timing.
    pub fn to_midi_bytes(&self) -> Result<Vec<u8>, ScoreError> {
        use midly::num::{u4, u7};
        use midly::{
            Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
        };

        // flatten to (tick, on, key), note-offs sorted ahead of note-ons that
        // share a tick
        let mut evs: Vec<(u32, bool, u8)> = Vec::new();
        for ev in &self.events {
            let on_tick = (ev.offset * PPQ as f64) as u32;
            let off_tick = ((ev.offset + NOTE_QUARTERS) * PPQ as f64) as u32;
            let keys: &[u8] = match &ev.kind {
                EventKind::Note(key) => std::slice::from_ref(key),
                EventKind::Chord(keys) => keys,
            };
            for &key in keys {
                evs.push((on_tick, true, key));
                evs.push((off_tick, false, key));
            }
        }
        evs.sort_by_key(|&(tick, is_on, _)| (tick, is_on));

        let mut track: Vec<TrackEvent> = Vec::new();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(TEMPO_USPQ.into())),
        });
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::ProgramChange {
                    program: u7::new(PIANO_PROGRAM),
                },
            },
        });

        let mut last_tick: u32 = 0;
        for (tick, is_on, key) in evs {
            let delta = tick.saturating_sub(last_tick);
            last_tick = tick;
            let message = if is_on {
                MidiMessage::NoteOn {
                    key: u7::new(key.min(127)),
                    vel: u7::new(VELOCITY),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::new(key.min(127)),
                    vel: u7::new(0),
                }
            };
            track.push(TrackEvent {
                delta: delta.into(),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message,
                },
            });
        }
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(PPQ.into()),
            },
            tracks: vec![track],
        };

        let mut buf = Vec::new();
        smf.write(&mut buf)
            .map_err(|e| crate::ScoreError::Midi(format!("{e:?}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_become_timed_events() {
        let score = Score::from_tokens(&["G4", "4.8.11", "C4"]).unwrap();
        assert_eq!(score.events.len(), 3);
        assert_eq!(score.events[0].offset, 0.0);
        assert_eq!(score.events[1].offset, 2.0);
        assert_eq!(score.events[2].offset, 4.0);
        assert_eq!(score.events[0].kind, EventKind::Note(67));
        assert_eq!(score.events[1].kind, EventKind::Chord(vec![4, 8, 11]));
    }

    #[test]
    fn bad_token_is_an_error() {
        assert!(Score::from_tokens(&["G4", "noise"]).is_err());
    }

    #[test]
    fn midi_bytes_carry_the_smf_header() {
        let score = Score::from_tokens(&["C4", "E4", "G4", "4.8.11"]).unwrap();
        let bytes = score.to_midi_bytes().unwrap();
        assert!(bytes.len() > 20);
        assert_eq!(&bytes[..4], b"MThd");
    }

    #[test]
    fn empty_score_still_serializes() {
        let bytes = Score::default().to_midi_bytes().unwrap();
        assert_eq!(&bytes[..4], b"MThd");
    }
}
