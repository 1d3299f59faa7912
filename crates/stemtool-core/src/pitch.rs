//! Key and scale arithmetic for transposition

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KEYS: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid key: {0}")]
pub struct InvalidKey(pub String);

impl Key {
    /// Chromatic index, C = 0
    pub fn index(self) -> u8 {
        self.0
    }
}

impl FromStr for Key {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let normalized = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => return Err(InvalidKey(s.to_string())),
        };

        KEYS.iter()
            .position(|k| *k == normalized)
            .map(|i| Key(i as u8))
            .ok_or_else(|| InvalidKey(s.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(KEYS[self.0 as usize])
    }
}

/// Semitone shift to move a track from one key/scale to another.
///
/// The key distance is folded into [-6, 6]; switching major to minor lowers by
/// three semitones and minor to major raises by three.
pub fn semitones_between(from: Key, to: Key, from_scale: Scale, to_scale: Scale) -> i32 {
    let mut semitones = to.index() as i32 - from.index() as i32;
    if semitones > 6 {
        semitones -= 12;
    }
    if semitones < -6 {
        semitones += 12;
    }

    match (from_scale, to_scale) {
        (Scale::Major, Scale::Minor) => semitones - 3,
        (Scale::Minor, Scale::Major) => semitones + 3,
        _ => semitones,
    }
}

/// Playback pitch ratio for a semitone shift
pub fn pitch_factor(semitones: i32) -> f64 {
    2f64.powf(semitones as f64 / 12.0)
}
