//! N-gram counts and language model estimation
//!
//! Counts are written in the format MIT LM reads with `-counts`:
//!
//! ```text
//! turn on the	5
//! turn off	3
//! ```
//!
//! The estimator writes the ARPA model plus a vocabulary listing, which is read
//! back to decide which words need pronunciations.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::transform::{self, WordTransform};
use crate::{Error, Result, NGRAM_ORDER};

/// Distinct words covered by the language model, sorted.
pub type Vocabulary = BTreeSet<String>;

/// One n-gram (1 to 3 words) and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramCount {
    pub ngram: Vec<String>,
    pub count: u64,
}

/// N-gram counts grouped by intent name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NgramCounts {
    intents: BTreeMap<String, Vec<NgramCount>>,
}

impl NgramCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load counts from JSON: `{"Intent": [{"ngram": ["a", "b"], "count": 2}]}`
    pub fn from_json_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::io(format!("open counts {}", path.display()), e))?;
        Self::from_json_reader(BufReader::new(file))
    }

    pub fn add<I, S>(&mut self, intent: &str, ngram: I, count: u64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intents
            .entry(intent.to_string())
            .or_default()
            .push(NgramCount {
                ngram: ngram.into_iter().map(Into::into).collect(),
                count,
            });
    }

    /// Flat stream of all n-grams, intents in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&[String], u64)> {
        self.intents
            .values()
            .flatten()
            .map(|c| (c.ngram.as_slice(), c.count))
    }

    pub fn intents(&self) -> impl Iterator<Item = &str> {
        self.intents.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.intents.values().all(Vec::is_empty)
    }
}

/// Write `word word<TAB>count` lines, transforming each word first.
pub fn write_counts(
    counts: &NgramCounts,
    transform: Option<&dyn WordTransform>,
    mut writer: impl Write,
) -> std::io::Result<usize> {
    let mut lines = 0;
    for (ngram, count) in counts.iter() {
        let words: Vec<String> = ngram
            .iter()
            .map(|w| transform::apply(transform, w))
            .collect();
        writeln!(writer, "{}\t{}", words.join(" "), count)?;
        lines += 1;
    }
    Ok(lines)
}

/// Read an estimator vocabulary listing, skipping `<s>`-style reserved symbols.
pub fn read_vocabulary(reader: impl BufRead) -> Result<Vocabulary> {
    let mut vocabulary = Vocabulary::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::io("read vocabulary", e))?;
        let word = line.trim();
        if word.is_empty() || word.starts_with('<') {
            continue;
        }
        vocabulary.insert(word.to_string());
    }
    Ok(vocabulary)
}

/// Builds a language model from a counts file.
pub trait LmEstimator {
    /// Estimate an order-3 model from `counts`, writing the model to
    /// `language_model` and the vocabulary listing to `vocabulary`.
    fn estimate(&self, counts: &Path, language_model: &Path, vocabulary: &Path) -> Result<()>;
}

/// MIT LM `estimate-ngram`
#[derive(Debug, Clone)]
pub struct EstimateNgram {
    program: PathBuf,
}

impl EstimateNgram {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl LmEstimator for EstimateNgram {
    fn estimate(&self, counts: &Path, language_model: &Path, vocabulary: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-order")
            .arg(NGRAM_ORDER.to_string())
            .arg("-counts")
            .arg(counts)
            .arg("-write-lm")
            .arg(language_model)
            .arg("-write-vocab")
            .arg(vocabulary);

        debug!("{:?}", command);
        let status = command.status().map_err(|source| Error::ToolSpawn {
            program: self.program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(Error::EstimationFailure { status });
        }
        Ok(())
    }
}

/// Run the estimator and load the vocabulary it wrote.
///
/// Fails with [`Error::EmptyVocabulary`] when no usable word remains.
pub fn estimate_language_model(
    estimator: &dyn LmEstimator,
    counts: &Path,
    language_model: &Path,
    vocabulary: &Path,
) -> Result<Vocabulary> {
    estimator.estimate(counts, language_model, vocabulary)?;

    let file = File::open(vocabulary)
        .map_err(|e| Error::io(format!("open vocabulary {}", vocabulary.display()), e))?;
    let words = read_vocabulary(BufReader::new(file))?;
    if words.is_empty() {
        return Err(Error::EmptyVocabulary);
    }

    debug!("Vocabulary has {} word(s)", words.len());
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Casing;
    use std::fs;
    use tempfile::TempDir;

    struct FixedVocab(&'static str);

    impl LmEstimator for FixedVocab {
        fn estimate(&self, _counts: &Path, lm: &Path, vocab: &Path) -> Result<()> {
            fs::write(lm, "\\data\\\n").unwrap();
            fs::write(vocab, self.0).unwrap();
            Ok(())
        }
    }

    fn light_counts() -> NgramCounts {
        let mut counts = NgramCounts::new();
        counts.add("ChangeLight", ["turn", "on", "the", "light"], 5);
        counts.add("ChangeLight", ["turn", "off", "the", "light"], 3);
        counts
    }

    #[test]
    fn test_write_counts_format() {
        let mut out = Vec::new();
        let lines = write_counts(&light_counts(), None, &mut out).unwrap();

        assert_eq!(lines, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "turn on the light\t5\nturn off the light\t3\n"
        );
    }

    #[test]
    fn test_write_counts_applies_transform() {
        let mut counts = NgramCounts::new();
        counts.add("GetTime", ["What", "Time"], 2);

        let mut out = Vec::new();
        write_counts(&counts, Some(&Casing::Lower), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "what time\t2\n");
    }

    #[test]
    fn test_counts_from_json() {
        let json = r#"{
            "GetTime": [{"ngram": ["what", "time"], "count": 2}],
            "ChangeLight": [{"ngram": ["turn"], "count": 1}]
        }"#;
        let counts = NgramCounts::from_json_reader(json.as_bytes()).unwrap();

        assert_eq!(counts.intents().collect::<Vec<_>>(), ["ChangeLight", "GetTime"]);
        let flat: Vec<_> = counts.iter().map(|(n, c)| (n.join(" "), c)).collect();
        assert_eq!(
            flat,
            vec![("turn".to_string(), 1), ("what time".to_string(), 2)]
        );
    }

    #[test]
    fn test_counts_from_invalid_json() {
        let result = NgramCounts::from_json_reader("[1, 2]".as_bytes());
        assert!(matches!(result, Err(Error::Counts(_))));
    }

    #[test]
    fn test_read_vocabulary_skips_reserved() {
        let text = "<s>\n</s>\n<unk>\nturn\non\n\nlight\n";
        let vocabulary = read_vocabulary(text.as_bytes()).unwrap();

        assert_eq!(
            vocabulary.into_iter().collect::<Vec<_>>(),
            ["light", "on", "turn"]
        );
    }

    #[test]
    fn test_estimate_language_model() {
        let temp_dir = TempDir::new().unwrap();
        let counts = temp_dir.path().join("counts");
        let lm = temp_dir.path().join("lm");
        let vocab = temp_dir.path().join("vocab");
        fs::write(&counts, "").unwrap();

        let estimator = FixedVocab("<s>\n</s>\nturn\non\n");
        let words = estimate_language_model(&estimator, &counts, &lm, &vocab).unwrap();

        assert_eq!(words.len(), 2);
        assert!(words.contains("turn"));
        assert!(lm.exists());
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();
        let estimator = FixedVocab("<s>\n</s>\n");

        let result = estimate_language_model(
            &estimator,
            &path.join("counts"),
            &path.join("lm"),
            &path.join("vocab"),
        );
        assert!(matches!(result, Err(Error::EmptyVocabulary)));
    }

    #[cfg(unix)]
    #[test]
    fn test_estimator_non_zero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();
        let estimator = EstimateNgram::new("false");

        let result = estimator.estimate(&path.join("counts"), &path.join("lm"), &path.join("vocab"));
        assert!(matches!(result, Err(Error::EstimationFailure { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_estimator_success_with_empty_listing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();
        fs::write(path.join("vocab"), "").unwrap();
        let estimator = EstimateNgram::new("true");

        let result =
            estimate_language_model(&estimator, &path.join("counts"), &path.join("lm"), &path.join("vocab"));
        assert!(matches!(result, Err(Error::EmptyVocabulary)));
    }

    #[test]
    fn test_estimator_missing_program() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();
        let estimator = EstimateNgram::new(path.join("no-such-estimator"));

        let result = estimator.estimate(&path.join("counts"), &path.join("lm"), &path.join("vocab"));
        assert!(matches!(result, Err(Error::ToolSpawn { .. })));
    }
}
