//! Vocabulary to dictionary lookup

use std::collections::BTreeSet;
use std::io::Write;

use log::warn;

use crate::dictionary::{write_entry, PronunciationMap};
use crate::vocab::Vocabulary;

/// Outcome of looking up a vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Words written with at least one pronunciation
    pub written_words: usize,
    /// Dictionary lines written (one per variant)
    pub written_lines: usize,
    /// Words with no pronunciation, not written
    pub missing: BTreeSet<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Write every known vocabulary word to `writer` in dictionary format and
/// collect the rest.
pub fn resolve_pronunciations(
    vocabulary: &Vocabulary,
    pronunciations: &PronunciationMap,
    mut writer: impl Write,
) -> std::io::Result<Resolution> {
    let mut resolution = Resolution::default();

    for word in vocabulary {
        match pronunciations.get(word) {
            Some(variants) if !variants.is_empty() => {
                write_entry(&mut writer, word, variants)?;
                resolution.written_words += 1;
                resolution.written_lines += variants.len();
            }
            _ => {
                warn!("Missing word '{}'", word);
                resolution.missing.insert(word.clone());
            }
        }
    }

    Ok(resolution)
}
