use crate::ScoreError;

/// Parse a note name in letter/accidental/octave form into a MIDI key number.
///
/// Middle C (`"C4"`) is 60. `#` raises and `-` lowers by a semitone, and both
/// may repeat; the octave is the trailing digit run. Training corpora only
/// contain non-negative octaves, so a `-` between the letter and the digits is
/// always a flat.
pub fn note_name_to_midi(name: &str) -> Result<u8, ScoreError> {
    let bad = || ScoreError::BadToken(name.to_owned());

    let mut chars = name.chars();
    let letter = chars.next().ok_or_else(bad)?;
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(bad()),
    };

    let rest = chars.as_str();
    let digits_at = rest
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(bad)?;
    let (accidentals, octave) = rest.split_at(digits_at);

    let mut alter = 0i32;
    for c in accidentals.chars() {
        match c {
            '#' => alter += 1,
            '-' => alter -= 1,
            _ => return Err(bad()),
        }
    }

    let octave: i32 = octave.parse().map_err(|_| bad())?;
    let midi = (octave + 1) * 12 + base + alter;
    if !(0..=127).contains(&midi) {
        return Err(ScoreError::PitchOutOfRange(name.to_owned()));
    }
    Ok(midi as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notes() {
        assert_eq!(note_name_to_midi("C4").unwrap(), 60);
        assert_eq!(note_name_to_midi("G4").unwrap(), 67);
        assert_eq!(note_name_to_midi("A0").unwrap(), 21);
        assert_eq!(note_name_to_midi("C0").unwrap(), 12);
    }

    #[test]
    fn accidentals() {
        assert_eq!(note_name_to_midi("C#5").unwrap(), 73);
        assert_eq!(note_name_to_midi("E-3").unwrap(), 51);
        assert_eq!(note_name_to_midi("B-2").unwrap(), 46);
        assert_eq!(note_name_to_midi("F##4").unwrap(), 67);
    }

    #[test]
    fn lowercase_letter_accepted() {
        assert_eq!(note_name_to_midi("g4").unwrap(), 67);
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(note_name_to_midi("").is_err());
        assert!(note_name_to_midi("H4").is_err());
        assert!(note_name_to_midi("G").is_err());
        assert!(note_name_to_midi("G#").is_err());
        assert!(note_name_to_midi("Gb4").is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(note_name_to_midi("G12").is_err());
    }
}
