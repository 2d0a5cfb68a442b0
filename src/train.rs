//! End-to-end training: counts in, language model and dictionary out
//!
//! ```text
//! Counting -> Estimating -> Resolving -> [Fallback] -> Writing -> Done
//! ```
//!
//! Every intermediate file lives in a scratch directory owned by the run and
//! removed when the run ends, however it ends. Destination paths are only
//! written in the `Writing` stage: every artifact is first copied to a
//! temporary file beside its destination, and only once all of them are
//! staged are they renamed into place, language model first. A run that fails
//! before the renames leaves every destination untouched. A rename failing
//! partway can still leave a new language model next to an old dictionary.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use tempfile::NamedTempFile;

use crate::dictionary::PronunciationMap;
use crate::g2p::{guess_pronunciations, write_guesses, write_guesses_after, G2pPredictor, PhonetisaurusApply};
use crate::resolve::resolve_pronunciations;
use crate::tools::ToolPaths;
use crate::transform::WordTransform;
use crate::vocab::{estimate_language_model, write_counts, EstimateNgram, LmEstimator, NgramCounts, Vocabulary};
use crate::{Error, Result, DEFAULT_NUM_GUESSES};

const COUNTS_FILE: &str = "corpus.counts";
const VOCAB_FILE: &str = "vocabulary.txt";
const LM_FILE: &str = "language_model.arpa";
const DICT_FILE: &str = "dictionary.txt";
const MISSING_FILE: &str = "missing_words.txt";

/// Pipeline stages, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStage {
    Counting,
    Estimating,
    Resolving,
    Fallback,
    Writing,
    Done,
    /// Terminal state of a run that returned an error
    Failed,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::Counting => "counting",
            TrainingStage::Estimating => "estimating",
            TrainingStage::Resolving => "resolving",
            TrainingStage::Fallback => "fallback",
            TrainingStage::Writing => "writing",
            TrainingStage::Done => "done",
            TrainingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where known pronunciations come from.
#[derive(Debug, Clone)]
pub enum PronunciationSource {
    /// An already built map
    Map(PronunciationMap),
    /// Base dictionary files, merged in order
    Files(Vec<PathBuf>),
}

impl PronunciationSource {
    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        PronunciationSource::Files(paths.into_iter().map(Into::into).collect())
    }

    pub fn load(self) -> Result<PronunciationMap> {
        match self {
            PronunciationSource::Map(map) => Ok(map),
            PronunciationSource::Files(paths) => PronunciationMap::from_files(paths),
        }
    }
}

impl From<PronunciationMap> for PronunciationSource {
    fn from(map: PronunciationMap) -> Self {
        PronunciationSource::Map(map)
    }
}

/// Training configuration.
///
/// Only the two destination paths are required; everything else has a
/// `with_*` setter.
pub struct TrainingConfig {
    /// Destination of the pronunciation dictionary
    pub dictionary_path: PathBuf,
    /// Destination of the language model
    pub language_model_path: PathBuf,
    /// Optional report of g2p-guessed entries
    pub missing_words_path: Option<PathBuf>,
    /// Phonetisaurus model used for unknown words
    pub g2p_model: Option<PathBuf>,
    /// Guesses per unknown word
    pub num_guesses: usize,
    /// Applied to every n-gram word before counting
    pub dictionary_word_transform: Option<Box<dyn WordTransform>>,
    /// Applied to unknown words before guessing
    pub g2p_word_transform: Option<Box<dyn WordTransform>>,
    pub tools: ToolPaths,
}

impl TrainingConfig {
    pub fn new(dictionary_path: impl Into<PathBuf>, language_model_path: impl Into<PathBuf>) -> Self {
        Self {
            dictionary_path: dictionary_path.into(),
            language_model_path: language_model_path.into(),
            missing_words_path: None,
            g2p_model: None,
            num_guesses: DEFAULT_NUM_GUESSES,
            dictionary_word_transform: None,
            g2p_word_transform: None,
            tools: ToolPaths::default(),
        }
    }

    pub fn with_g2p_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.g2p_model = Some(model.into());
        self
    }

    pub fn with_missing_words_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_words_path = Some(path.into());
        self
    }

    pub fn with_num_guesses(mut self, num_guesses: usize) -> Self {
        self.num_guesses = num_guesses.max(1);
        self
    }

    pub fn with_dictionary_word_transform(mut self, transform: impl WordTransform + 'static) -> Self {
        self.dictionary_word_transform = Some(Box::new(transform));
        self
    }

    pub fn with_g2p_word_transform(mut self, transform: impl WordTransform + 'static) -> Self {
        self.g2p_word_transform = Some(Box::new(transform));
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Stages passed through, ending with [`TrainingStage::Done`]
    pub stages: Vec<TrainingStage>,
    /// Words covered by the language model
    pub vocabulary: Vocabulary,
    /// Pronunciations guessed by g2p, in output order
    pub guesses: Vec<(String, Vec<String>)>,
    /// Lines written to the dictionary
    pub dictionary_lines: usize,
    /// Known pronunciations, extended with the guesses
    pub pronunciations: PronunciationMap,
}

impl TrainingReport {
    pub fn used_fallback(&self) -> bool {
        self.stages.contains(&TrainingStage::Fallback)
    }
}

/// Runs the training pipeline.
///
/// # Example
///
/// ```no_run
/// use memo_asr_train::{Casing, NgramCounts, PronunciationSource, Trainer, TrainingConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let counts = NgramCounts::from_json_file("intent_counts.json")?;
/// let config = TrainingConfig::new("dictionary.txt", "language_model.txt")
///     .with_dictionary_word_transform(Casing::Lower)
///     .with_g2p_model("g2p.fst")
///     .with_missing_words_path("missing_words.txt");
///
/// let report = Trainer::new(config).train(&counts, PronunciationSource::files(["base.dict"]))?;
/// println!("Guessed {} pronunciation(s)", report.guesses.len());
/// # Ok(())
/// # }
/// ```
pub struct Trainer {
    config: TrainingConfig,
    estimator: Box<dyn LmEstimator>,
    predictor: Box<dyn G2pPredictor>,
}

impl Trainer {
    /// Create a trainer using `estimate-ngram` and `phonetisaurus-apply`,
    /// located through `config.tools`.
    pub fn new(config: TrainingConfig) -> Self {
        let estimator = EstimateNgram::new(config.tools.estimate_ngram());
        let predictor = PhonetisaurusApply::new(config.tools.phonetisaurus_apply());
        debug!("Using estimator {}", estimator.program().display());
        debug!("Using g2p predictor {}", predictor.program().display());

        Self {
            config,
            estimator: Box::new(estimator),
            predictor: Box::new(predictor),
        }
    }

    /// Replace the language model estimator.
    pub fn with_estimator(mut self, estimator: impl LmEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Replace the g2p predictor.
    pub fn with_predictor(mut self, predictor: impl G2pPredictor + 'static) -> Self {
        self.predictor = Box::new(predictor);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train from `counts`, looking words up in `pronunciations`.
    ///
    /// Fails with [`Error::MissingWordPronunciations`] when some words have no
    /// pronunciation and no g2p model is configured. A failed run ends in
    /// [`TrainingStage::Failed`]; the returned error is its only result.
    pub fn train(
        &self,
        counts: &NgramCounts,
        pronunciations: impl Into<PronunciationSource>,
    ) -> Result<TrainingReport> {
        let mut stages = Vec::new();
        self.run_recorded(counts, pronunciations.into(), &mut stages)
    }

    /// Run the pipeline, recording each stage entered in `stages`.
    fn run_recorded(
        &self,
        counts: &NgramCounts,
        source: PronunciationSource,
        stages: &mut Vec<TrainingStage>,
    ) -> Result<TrainingReport> {
        match self.run(counts, source, stages) {
            Ok(report) => Ok(report),
            Err(e) => {
                let stage = stages.last().copied().unwrap_or(TrainingStage::Counting);
                error!("Training failed while {}: {}", stage, e);
                stages.push(TrainingStage::Failed);
                Err(e)
            }
        }
    }

    fn run(
        &self,
        counts: &NgramCounts,
        source: PronunciationSource,
        stages: &mut Vec<TrainingStage>,
    ) -> Result<TrainingReport> {
        let scratch = tempfile::Builder::new()
            .prefix("memo-asr-train")
            .tempdir()
            .map_err(|e| Error::io("create scratch directory", e))?;
        let scratch_path = |name: &str| scratch.path().join(name);

        enter(stages, TrainingStage::Counting);
        let counts_path = scratch_path(COUNTS_FILE);
        let lines = write_scratch(&counts_path, |w| {
            write_counts(counts, self.config.dictionary_word_transform.as_deref(), w)
        })?;
        debug!("Wrote {} n-gram count(s) to {}", lines, counts_path.display());

        enter(stages, TrainingStage::Estimating);
        let lm_path = scratch_path(LM_FILE);
        let vocabulary = estimate_language_model(
            self.estimator.as_ref(),
            &counts_path,
            &lm_path,
            &scratch_path(VOCAB_FILE),
        )?;

        enter(stages, TrainingStage::Resolving);
        let mut pronunciations = source.load()?;
        let dict_path = scratch_path(DICT_FILE);
        let dict_file = File::create(&dict_path)
            .map_err(|e| Error::io(format!("create {}", dict_path.display()), e))?;
        let mut dict_writer = BufWriter::new(dict_file);

        let resolution = resolve_pronunciations(&vocabulary, &pronunciations, &mut dict_writer)
            .map_err(|e| Error::io("write dictionary", e))?;
        let mut dictionary_lines = resolution.written_lines;

        let mut guesses = Vec::new();
        if !resolution.is_complete() {
            let Some(g2p_model) = self.config.g2p_model.as_deref() else {
                return Err(Error::MissingWordPronunciations {
                    words: resolution.missing.into_iter().collect(),
                });
            };

            enter(stages, TrainingStage::Fallback);
            debug!("Guessing pronunciations for {:?}", resolution.missing);
            guesses = guess_pronunciations(
                self.predictor.as_ref(),
                &resolution.missing,
                g2p_model,
                self.config.g2p_word_transform.as_deref(),
                self.config.num_guesses,
            )?
            .collect();

            let already_written = |word: &str| {
                if vocabulary.contains(word) {
                    pronunciations.get(word).map_or(0, <[_]>::len)
                } else {
                    0
                }
            };
            write_guesses_after(&guesses, already_written, &mut dict_writer)
                .map_err(|e| Error::io("write dictionary", e))?;
            dictionary_lines += guesses.len();
            for (word, phonemes) in &guesses {
                pronunciations.insert(word.clone(), phonemes.clone());
            }
            self.warn_unguessed(&resolution.missing, &pronunciations);
        }

        dict_writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|f| f.sync_all())
            .map_err(|e| Error::io("write dictionary", e))?;

        let missing_path = scratch_path(MISSING_FILE);
        if self.config.missing_words_path.is_some() {
            write_scratch(&missing_path, |w| write_guesses(&guesses, w))?;
        }

        enter(stages, TrainingStage::Writing);
        let mut staged = vec![
            stage(&lm_path, &self.config.language_model_path)?,
            stage(&dict_path, &self.config.dictionary_path)?,
        ];
        if let Some(report_path) = &self.config.missing_words_path {
            staged.push(stage(&missing_path, report_path)?);
        }
        for artifact in staged {
            artifact.persist()?;
        }

        enter(stages, TrainingStage::Done);

        Ok(TrainingReport {
            stages: stages.clone(),
            vocabulary,
            guesses,
            dictionary_lines,
            pronunciations,
        })
    }

    fn warn_unguessed(&self, missing: &Vocabulary, pronunciations: &PronunciationMap) {
        let g2p_transform = self.config.g2p_word_transform.as_deref();
        for word in missing {
            let guessed_as = crate::transform::apply(g2p_transform, word);
            if !pronunciations.contains(word) && !pronunciations.contains(&guessed_as) {
                warn!("No pronunciation guessed for '{}'", word);
            }
        }
    }
}

fn enter(stages: &mut Vec<TrainingStage>, stage: TrainingStage) {
    info!("Training stage: {}", stage);
    stages.push(stage);
}

/// Create a scratch file and fill it through a buffered writer.
fn write_scratch<T>(
    path: &Path,
    fill: impl FnOnce(&mut BufWriter<File>) -> io::Result<T>,
) -> Result<T> {
    let context = || format!("write {}", path.display());
    let file = File::create(path).map_err(|e| Error::io(context(), e))?;
    let mut writer = BufWriter::new(file);
    let value = fill(&mut writer).map_err(|e| Error::io(context(), e))?;
    writer.flush().map_err(|e| Error::io(context(), e))?;
    Ok(value)
}

/// An artifact copied beside its destination, waiting to be renamed over it.
struct Staged {
    file: NamedTempFile,
    dest: PathBuf,
}

impl Staged {
    fn persist(self) -> Result<()> {
        let dest = self.dest;
        self.file
            .persist(&dest)
            .map_err(|e| Error::io(format!("publish {}", dest.display()), e.error))?;
        debug!("Wrote {}", dest.display());
        Ok(())
    }
}

/// Copy `src` to a temporary file in the directory of `dest`.
fn stage(src: &Path, dest: &Path) -> Result<Staged> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| Error::io(format!("create directory {}", parent.display()), e))?;

    let context = || format!("publish {}", dest.display());
    let mut input = File::open(src).map_err(|e| Error::io(context(), e))?;
    let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| Error::io(context(), e))?;
    io::copy(&mut input, &mut temp_file).map_err(|e| Error::io(context(), e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(context(), e))?;

    Ok(Staged {
        file: temp_file,
        dest: dest.to_path_buf(),
    })
}
