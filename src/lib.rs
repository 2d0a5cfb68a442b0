//! # memo-asr-train
//!
//! **Language model and pronunciation dictionary training for voice assistants.**
//!
//! Hand it the n-gram counts of your intents and it produces the two artifacts a
//! statistical recognizer (pocketsphinx, Kaldi-style decoders) needs: an ARPA
//! language model and a CMU-style pronunciation dictionary.
//!
//! ## Quick Example
//!
//! ```no_run
//! use memo_asr_train::{NgramCounts, PronunciationSource, Trainer, TrainingConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut counts = NgramCounts::new();
//! counts.add("ChangeLight", ["turn", "on", "the"], 5);
//!
//! let config = TrainingConfig::new("out/dictionary.txt", "out/language_model.txt")
//!     .with_g2p_model("g2p/model.fst");
//! let trainer = Trainer::new(config);
//! let report = trainer.train(&counts, PronunciationSource::files(["base_dictionary.txt"]))?;
//! println!("Vocabulary: {} words", report.vocabulary.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. **Counting** - n-gram counts are written as `word word<TAB>count` lines
//! 2. **Estimating** - `estimate-ngram` (MIT LM) builds the model and its vocabulary
//! 3. **Resolving** - every vocabulary word is looked up in the base dictionaries
//! 4. **Fallback** - unknown words are guessed with `phonetisaurus-apply`
//! 5. **Writing** - artifacts are published atomically to their destinations
//!
//! A run that fails at any stage never touches the destination paths.
//!
//! ## External Tools
//!
//! | Tool | Purpose | Lookup |
//! |------|---------|--------|
//! | `estimate-ngram` | Language model estimation | override, `PATH`, tool dir |
//! | `phonetisaurus-apply` | Grapheme-to-phoneme guesses | override, `PATH`, tool dir |
//!
//! See [`tools`] for the lookup rules.

pub mod dictionary;
pub mod g2p;
pub mod resolve;
pub mod tools;
pub mod train;
pub mod transform;
pub mod vocab;

pub use dictionary::PronunciationMap;
pub use g2p::{
    guess_pronunciations, write_guesses, G2pPredictor, PhonetisaurusApply, PronunciationGuesses,
};
pub use resolve::{resolve_pronunciations, Resolution};
pub use tools::{default_tool_dir, ToolPaths};
pub use train::{PronunciationSource, Trainer, TrainingConfig, TrainingReport, TrainingStage};
pub use transform::{Casing, WordTransform};
pub use vocab::{EstimateNgram, LmEstimator, NgramCounts, Vocabulary};

use std::path::PathBuf;
use std::process::ExitStatus;

/// Order of the estimated language model
pub const NGRAM_ORDER: usize = 3;

/// Default number of g2p guesses per word
pub const DEFAULT_NUM_GUESSES: usize = 1;

/// Errors produced while training.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `estimate-ngram` exited unsuccessfully.
    #[error("Language model estimation failed ({status})")]
    EstimationFailure { status: ExitStatus },

    /// The estimator produced no usable words.
    #[error("No words in vocabulary")]
    EmptyVocabulary,

    /// Words have no pronunciation and no g2p model is configured.
    #[error("Missing pronunciations for: {}", .words.join(", "))]
    MissingWordPronunciations { words: Vec<String> },

    /// `phonetisaurus-apply` exited unsuccessfully.
    #[error("Pronunciation guessing failed ({status}): {stderr}")]
    G2pInvocationFailure { status: ExitStatus, stderr: String },

    #[error("G2P model not found: {}", .path.display())]
    G2pModelNotFound { path: PathBuf },

    /// An external tool could not be started at all.
    #[error("Failed to run {}: {source}", .program.display())]
    ToolSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid n-gram counts: {0}")]
    Counts(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
