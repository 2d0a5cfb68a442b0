//! memo-asr-train binary - build recognizer artifacts from intent n-gram counts
//!
//! ```text
//! memo-asr-train train --counts counts.json --dictionary dictionary.txt \
//!     --language-model language_model.txt --base-dictionary base.dict --g2p-model g2p.fst
//! memo-asr-train guess --g2p-model g2p.fst lamp kitchen
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use memo_asr_train::{
    guess_pronunciations, write_guesses, Casing, Error, NgramCounts, PhonetisaurusApply, PronunciationSource,
    ToolPaths, Trainer, TrainingConfig, DEFAULT_NUM_GUESSES,
};

/// Train a language model and pronunciation dictionary for speech recognition
#[derive(Parser)]
#[command(name = "memo-asr-train", version)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    tools: ToolArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ToolArgs {
    /// Path to estimate-ngram (default: PATH, then the user tool directory)
    #[arg(long, global = true, env = "MEMO_ASR_ESTIMATE_NGRAM")]
    estimate_ngram: Option<PathBuf>,

    /// Path to phonetisaurus-apply (default: PATH, then the user tool directory)
    #[arg(long, global = true, env = "MEMO_ASR_PHONETISAURUS_APPLY")]
    phonetisaurus_apply: Option<PathBuf>,

    /// Directory searched for tools after PATH
    #[arg(long, global = true, env = "MEMO_ASR_TOOL_DIR")]
    tool_dir: Option<PathBuf>,
}

impl ToolArgs {
    fn into_tool_paths(self) -> ToolPaths {
        ToolPaths {
            estimate_ngram: self.estimate_ngram,
            phonetisaurus_apply: self.phonetisaurus_apply,
            tool_dir: self.tool_dir,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Generate the language model and dictionary
    Train {
        /// JSON n-gram counts per intent
        #[arg(long)]
        counts: PathBuf,

        /// Where to write the pronunciation dictionary
        #[arg(long)]
        dictionary: PathBuf,

        /// Where to write the language model
        #[arg(long)]
        language_model: PathBuf,

        /// Base dictionaries, merged in the order given
        #[arg(long = "base-dictionary")]
        base_dictionaries: Vec<PathBuf>,

        /// Phonetisaurus model for words missing from the base dictionaries
        #[arg(long, env = "MEMO_ASR_G2P_MODEL")]
        g2p_model: Option<PathBuf>,

        /// Where to write the guessed pronunciations
        #[arg(long)]
        missing_words: Option<PathBuf>,

        /// Guesses per missing word
        #[arg(long, default_value_t = DEFAULT_NUM_GUESSES)]
        nbest: usize,

        /// Casing applied to words before counting (keep, lower, upper)
        #[arg(long, default_value_t = Casing::Keep)]
        dictionary_casing: Casing,

        /// Casing applied to words before guessing (keep, lower, upper)
        #[arg(long, default_value_t = Casing::Keep)]
        g2p_casing: Casing,
    },

    /// Guess pronunciations for words and print them in dictionary format
    Guess {
        #[arg(long, env = "MEMO_ASR_G2P_MODEL")]
        g2p_model: PathBuf,

        /// Guesses per word
        #[arg(long, default_value_t = DEFAULT_NUM_GUESSES)]
        nbest: usize,

        /// Casing applied to words before guessing (keep, lower, upper)
        #[arg(long, default_value_t = Casing::Keep)]
        g2p_casing: Casing,

        #[arg(required = true)]
        words: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(Error::MissingWordPronunciations { words }) = e.downcast_ref::<Error>() {
                eprintln!("Missing pronunciations for {} word(s):", words.len());
                for word in words {
                    eprintln!("  {}", word);
                }
                eprintln!("Add them to a base dictionary or pass --g2p-model.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let tools = cli.tools.into_tool_paths();

    match cli.command {
        Command::Train {
            counts,
            dictionary,
            language_model,
            base_dictionaries,
            g2p_model,
            missing_words,
            nbest,
            dictionary_casing,
            g2p_casing,
        } => {
            let ngram_counts = NgramCounts::from_json_file(&counts)
                .with_context(|| format!("Failed to load counts from {}", counts.display()))?;

            let mut config = TrainingConfig::new(dictionary, language_model)
                .with_num_guesses(nbest)
                .with_dictionary_word_transform(dictionary_casing)
                .with_g2p_word_transform(g2p_casing)
                .with_tools(tools);
            if let Some(model) = g2p_model {
                config = config.with_g2p_model(model);
            }
            if let Some(path) = missing_words {
                config = config.with_missing_words_path(path);
            }

            let report = Trainer::new(config)
                .train(&ngram_counts, PronunciationSource::Files(base_dictionaries))?;

            info!(
                "Trained {} word(s), {} dictionary line(s), {} guessed",
                report.vocabulary.len(),
                report.dictionary_lines,
                report.guesses.len()
            );
        }

        Command::Guess {
            g2p_model,
            nbest,
            g2p_casing,
            words,
        } => {
            let predictor = PhonetisaurusApply::new(tools.phonetisaurus_apply());
            let guesses: Vec<_> =
                guess_pronunciations(&predictor, &words, &g2p_model, Some(&g2p_casing), nbest)?
                    .collect();

            let stdout = io::stdout();
            write_guesses(&guesses, stdout.lock())?;
        }
    }

    Ok(())
}
