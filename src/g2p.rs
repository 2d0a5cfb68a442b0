//! Grapheme-to-phoneme guesses for words missing from every dictionary
//!
//! Guesses come from `phonetisaurus-apply`, which prints one guess per line in
//! dictionary format (`word PH ON EMES`), best guess first for each word.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use crate::dictionary;
use crate::transform::{self, WordTransform};
use crate::{Error, Result};

/// Produces raw pronunciation guesses for a word list.
pub trait G2pPredictor {
    /// Guess up to `num_guesses` pronunciations for each word listed (one per
    /// line) in `word_list` and return the predictor's output.
    fn predict(&self, model: &Path, word_list: &Path, num_guesses: usize) -> Result<String>;
}

/// Phonetisaurus `phonetisaurus-apply`
#[derive(Debug, Clone)]
pub struct PhonetisaurusApply {
    program: PathBuf,
}

impl PhonetisaurusApply {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl G2pPredictor for PhonetisaurusApply {
    fn predict(&self, model: &Path, word_list: &Path, num_guesses: usize) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .arg("--model")
            .arg(model)
            .arg("--word_list")
            .arg(word_list)
            .arg("--nbest")
            .arg(num_guesses.to_string());

        debug!("{:?}", command);
        let output = command.output().map_err(|source| Error::ToolSpawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(Error::G2pInvocationFailure {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Guessed `(word, phonemes)` pairs, in the predictor's order.
///
/// The predictor has already run when this is returned; iterating only parses
/// its output. The sequence is finite and can be consumed once.
#[derive(Debug)]
pub struct PronunciationGuesses {
    lines: std::vec::IntoIter<String>,
}

impl PronunciationGuesses {
    fn from_output(output: &str) -> Self {
        let lines: Vec<String> = output.lines().map(str::to_string).collect();
        Self {
            lines: lines.into_iter(),
        }
    }

    fn empty() -> Self {
        Self::from_output("")
    }
}

impl Iterator for PronunciationGuesses {
    type Item = (String, Vec<String>);

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let mut tokens = line.split_whitespace();
            let Some(word) = tokens.next() else {
                continue;
            };
            let phonemes: Vec<String> = tokens.map(str::to_string).collect();
            if phonemes.is_empty() {
                warn!("No phonemes guessed for '{}'", word);
                continue;
            }
            return Some((word.to_string(), phonemes));
        }
        None
    }
}

impl FusedIterator for PronunciationGuesses {}

/// Guess pronunciations for `words` with a g2p model.
///
/// `transform` is applied to each word before it is handed to the predictor.
/// The words in the returned pairs are whatever the predictor printed.
pub fn guess_pronunciations<I, S>(
    predictor: &dyn G2pPredictor,
    words: I,
    model: &Path,
    transform: Option<&dyn WordTransform>,
    num_guesses: usize,
) -> Result<PronunciationGuesses>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if !model.exists() {
        return Err(Error::G2pModelNotFound {
            path: model.to_path_buf(),
        });
    }

    let mut word_list = tempfile::Builder::new()
        .prefix("words")
        .suffix(".txt")
        .tempfile()
        .map_err(|e| Error::io("create g2p word list", e))?;

    let mut count = 0usize;
    for word in words {
        let word = transform::apply(transform, word.as_ref());
        writeln!(word_list, "{}", word).map_err(|e| Error::io("write g2p word list", e))?;
        count += 1;
    }
    word_list
        .flush()
        .map_err(|e| Error::io("write g2p word list", e))?;

    if count == 0 {
        return Ok(PronunciationGuesses::empty());
    }

    debug!("Guessing pronunciations for {} word(s)", count);
    let output = predictor.predict(model, word_list.path(), num_guesses.max(1))?;
    Ok(PronunciationGuesses::from_output(&output))
}

/// Write guesses in dictionary format, one line per guess.
///
/// Repeated guesses for a word become `word(2)`, `word(3)`, ... in the order
/// they arrive.
pub fn write_guesses<'a>(
    guesses: impl IntoIterator<Item = &'a (String, Vec<String>)>,
    writer: impl Write,
) -> std::io::Result<()> {
    write_guesses_after(guesses, |_| 0, writer)
}

/// Like [`write_guesses`], but numbering for each word continues after the
/// `existing(word)` variants already written for it.
pub(crate) fn write_guesses_after<'a>(
    guesses: impl IntoIterator<Item = &'a (String, Vec<String>)>,
    existing: impl Fn(&str) -> usize,
    mut writer: impl Write,
) -> std::io::Result<()> {
    let mut written: HashMap<&str, usize> = HashMap::new();
    for (word, phonemes) in guesses {
        let index = written.entry(word.as_str()).or_insert_with(|| existing(word.as_str()));
        dictionary::write_variant(&mut writer, word, *index, phonemes)?;
        *index += 1;
    }
    Ok(())
}

/// Read the word list a predictor was given.
#[doc(hidden)]
pub fn read_word_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("read word list {}", path.display()), e))?;
    Ok(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Casing;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Echoes each listed word with a fixed pronunciation and records its input.
    struct SpellingPredictor {
        seen: RefCell<Vec<String>>,
        nbest: RefCell<usize>,
    }

    impl SpellingPredictor {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
                nbest: RefCell::new(0),
            }
        }
    }

    impl G2pPredictor for SpellingPredictor {
        fn predict(&self, _model: &Path, word_list: &Path, num_guesses: usize) -> Result<String> {
            let words = read_word_list(word_list)?;
            *self.nbest.borrow_mut() = num_guesses;
            let mut out = String::new();
            for word in &words {
                let spelled: Vec<String> = word.chars().map(|c| c.to_uppercase().to_string()).collect();
                out.push_str(&format!("{}\t{}\n\n", word, spelled.join(" ")));
            }
            self.seen.borrow_mut().extend(words);
            Ok(out)
        }
    }

    fn model_file(dir: &TempDir) -> PathBuf {
        let model = dir.path().join("g2p.fst");
        fs::write(&model, "").unwrap();
        model
    }

    #[test]
    fn test_guesses_parsed_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let model = model_file(&temp_dir);
        let predictor = SpellingPredictor::new();

        let guesses: Vec<_> =
            guess_pronunciations(&predictor, ["ab", "cd"], &model, None, 1)
                .unwrap()
                .collect();

        assert_eq!(
            guesses,
            vec![
                ("ab".to_string(), vec!["A".to_string(), "B".to_string()]),
                ("cd".to_string(), vec!["C".to_string(), "D".to_string()]),
            ]
        );
        assert_eq!(*predictor.nbest.borrow(), 1);
    }

    #[test]
    fn test_transform_applied_before_predictor() {
        let temp_dir = TempDir::new().unwrap();
        let model = model_file(&temp_dir);
        let predictor = SpellingPredictor::new();

        let guesses: Vec<_> =
            guess_pronunciations(&predictor, ["Light"], &model, Some(&Casing::Lower), 2)
                .unwrap()
                .collect();

        assert_eq!(*predictor.seen.borrow(), vec!["light".to_string()]);
        assert_eq!(guesses[0].0, "light");
        assert_eq!(*predictor.nbest.borrow(), 2);
    }

    #[test]
    fn test_guesses_are_single_pass() {
        let mut guesses = PronunciationGuesses::from_output("a AH\nb B IY\n");
        assert_eq!(guesses.by_ref().count(), 2);
        assert_eq!(guesses.next(), None);
        assert_eq!(guesses.next(), None);
    }

    #[test]
    fn test_guess_without_phonemes_skipped() {
        let guesses: Vec<_> = PronunciationGuesses::from_output("  \nhmm\nok OW K EY\n").collect();
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].0, "ok");
    }

    #[test]
    fn test_missing_model() {
        let temp_dir = TempDir::new().unwrap();
        let predictor = SpellingPredictor::new();

        let result = guess_pronunciations(
            &predictor,
            ["light"],
            &temp_dir.path().join("missing.fst"),
            None,
            1,
        );
        assert!(matches!(result, Err(Error::G2pModelNotFound { .. })));
        assert!(predictor.seen.borrow().is_empty());
    }

    #[test]
    fn test_no_words_skips_predictor() {
        let temp_dir = TempDir::new().unwrap();
        let model = model_file(&temp_dir);
        let predictor = SpellingPredictor::new();

        let mut guesses =
            guess_pronunciations(&predictor, Vec::<String>::new(), &model, None, 1).unwrap();
        assert!(guesses.next().is_none());
        assert_eq!(*predictor.nbest.borrow(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_predictor_non_zero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let model = model_file(&temp_dir);
        let predictor = PhonetisaurusApply::new("false");

        let result = guess_pronunciations(&predictor, ["light"], &model, None, 1);
        assert!(matches!(result, Err(Error::G2pInvocationFailure { .. })));
    }

    #[test]
    fn test_write_guesses() {
        let guesses = vec![("light".to_string(), vec!["L".to_string(), "AY".to_string(), "T".to_string()])];
        let mut out = Vec::new();
        write_guesses(&guesses, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "light L AY T\n");
    }

    #[test]
    fn test_write_guesses_numbers_repeated_words() {
        let guesses = PronunciationGuesses::from_output("light L AY T\nlight L IY T\nlamp L AE M P\n");
        let guesses: Vec<_> = guesses.collect();
        let mut out = Vec::new();
        write_guesses(&guesses, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "light L AY T\nlight(2) L IY T\nlamp L AE M P\n"
        );
    }

    #[test]
    fn test_write_guesses_after_existing_variants() {
        let guesses = PronunciationGuesses::from_output("the DH UH\nlamp L AE M P\n");
        let guesses: Vec<_> = guesses.collect();
        let mut out = Vec::new();
        write_guesses_after(&guesses, |w| if w == "the" { 2 } else { 0 }, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "the(3) DH UH\nlamp L AE M P\n"
        );
    }
}
