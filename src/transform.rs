//! Word normalization applied before words reach an external tool

use std::fmt;
use std::str::FromStr;

/// A pure `&str -> String` mapping applied to each word.
///
/// Implemented for any `Fn(&str) -> String`, so closures plug in directly:
///
/// ```
/// use memo_asr_train::WordTransform;
///
/// let strip = |w: &str| w.trim_matches('\'').to_string();
/// assert_eq!(strip.transform("'twas'"), "twas");
/// ```
pub trait WordTransform {
    fn transform(&self, word: &str) -> String;
}

impl<F> WordTransform for F
where
    F: Fn(&str) -> String,
{
    fn transform(&self, word: &str) -> String {
        self(word)
    }
}

/// Apply an optional transform, passing the word through unchanged when absent.
pub(crate) fn apply(transform: Option<&dyn WordTransform>, word: &str) -> String {
    match transform {
        Some(t) => t.transform(word),
        None => word.to_string(),
    }
}

/// Case normalization expected by most acoustic models and g2p models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    #[default]
    Keep,
    Lower,
    Upper,
}

impl WordTransform for Casing {
    fn transform(&self, word: &str) -> String {
        match self {
            Casing::Keep => word.to_string(),
            Casing::Lower => word.to_lowercase(),
            Casing::Upper => word.to_uppercase(),
        }
    }
}

impl FromStr for Casing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" | "ignore" => Ok(Casing::Keep),
            "lower" => Ok(Casing::Lower),
            "upper" => Ok(Casing::Upper),
            other => Err(format!("unknown casing '{}' (expected keep, lower or upper)", other)),
        }
    }
}

impl fmt::Display for Casing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Casing::Keep => "keep",
            Casing::Lower => "lower",
            Casing::Upper => "upper",
        };
        f.write_str(name)
    }
}
