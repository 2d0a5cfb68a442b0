//! CMU-style pronunciation dictionaries
//!
//! One entry per line, the word followed by its phonemes:
//!
//! ```text
//! turn T ER N
//! the DH AH
//! the(2) DH IY
//! ```
//!
//! A `(n)` suffix marks an alternate pronunciation. The number is positional
//! only: variants are kept in the order their lines are read.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::{debug, warn};

use crate::{Error, Result};

/// Word to ordered pronunciation variants. The first variant is the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PronunciationMap {
    words: BTreeMap<String, Vec<Vec<String>>>,
}

/// Why a dictionary line was skipped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum LineError {
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error("empty word")]
    EmptyWord,
    #[error("no phonemes for '{0}'")]
    NoPhonemes(String),
}

impl PronunciationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dictionary from scratch.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut map = Self::new();
        map.read_into(reader)?;
        Ok(map)
    }

    /// Merge several dictionary files in order.
    ///
    /// Earlier files keep their variants first; matching words in later
    /// files add further variants.
    pub fn from_files<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut map = Self::new();
        for path in paths {
            map.read_file_into(path)?;
        }
        Ok(map)
    }

    pub fn read_file_into(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::io(format!("open dictionary {}", path.display()), e))?;
        let added = self.read_into(BufReader::new(file))?;
        debug!("Loaded {} pronunciation(s) from {}", added, path.display());
        Ok(added)
    }

    /// Append every entry from `reader` to this map.
    ///
    /// Malformed lines are logged with their 1-based line number and skipped.
    /// Only I/O errors from the reader itself are returned. Returns the number
    /// of variants added.
    pub fn read_into(&mut self, mut reader: impl BufRead) -> Result<usize> {
        let mut buf = Vec::new();
        let mut line_number = 0usize;
        let mut added = 0usize;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| Error::io("read dictionary", e))?;
            if n == 0 {
                break;
            }
            line_number += 1;

            match parse_line(&buf) {
                Ok(Some((word, phonemes))) => {
                    self.insert(word, phonemes);
                    added += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("read_dict: {} (line {})", e, line_number),
            }
        }

        Ok(added)
    }

    /// Append a pronunciation variant. Empty variants are ignored.
    pub fn insert(&mut self, word: impl Into<String>, phonemes: Vec<String>) {
        if phonemes.is_empty() {
            return;
        }
        self.words.entry(word.into()).or_default().push(phonemes);
    }

    pub fn get(&self, word: &str) -> Option<&[Vec<String>]> {
        self.words.get(word).map(Vec::as_slice)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    /// Write the whole map in dictionary format, words in sorted order.
    pub fn write_to(&self, mut writer: impl Write) -> std::io::Result<()> {
        for (word, variants) in &self.words {
            write_entry(&mut writer, word, variants)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Vec<String>)> for PronunciationMap {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (word, phonemes) in iter {
            map.insert(word, phonemes);
        }
        map
    }
}

/// Write all variants of one word: `word`, `word(2)`, `word(3)`, ...
pub(crate) fn write_entry(
    writer: &mut impl Write,
    word: &str,
    variants: &[Vec<String>],
) -> std::io::Result<()> {
    for (i, phonemes) in variants.iter().enumerate() {
        write_variant(writer, word, i, phonemes)?;
    }
    Ok(())
}

/// Write the zero-based `index`-th variant of `word`.
pub(crate) fn write_variant(
    writer: &mut impl Write,
    word: &str,
    index: usize,
    phonemes: &[String],
) -> std::io::Result<()> {
    let phoneme_str = phonemes.join(" ");
    let phoneme_str = phoneme_str.trim();
    if index == 0 {
        writeln!(writer, "{} {}", word, phoneme_str)
    } else {
        writeln!(writer, "{}({}) {}", word, index + 1, phoneme_str)
    }
}

/// Split one raw line into base word and phonemes. Blank lines yield `None`.
fn parse_line(raw: &[u8]) -> std::result::Result<Option<(String, Vec<String>)>, LineError> {
    let line = std::str::from_utf8(raw).map_err(|_| LineError::InvalidUtf8)?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    // Only space and tab separate tokens; U+00A0 can appear inside words.
    let mut tokens = line.split([' ', '\t']).filter(|t| !t.is_empty());
    let head = tokens.next().ok_or(LineError::EmptyWord)?;
    let word = base_word(head);
    if word.is_empty() {
        return Err(LineError::EmptyWord);
    }

    let phonemes: Vec<String> = tokens.map(str::to_string).collect();
    if phonemes.is_empty() {
        return Err(LineError::NoPhonemes(word.to_string()));
    }

    Ok(Some((word.to_string(), phonemes)))
}

/// Strip a `(n)` variant suffix. A leading `(` is part of the word.
fn base_word(head: &str) -> &str {
    match head.find('(') {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head,
    }
}
