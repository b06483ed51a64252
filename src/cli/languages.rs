use std::fmt::Display;

/// The unique string token for Afrikaans
pub static AFRIKAANS: &str = "af";

/// The unique string token for Xitsonga
pub static TSONGA: &str = "ts";

/// The unique string token for Sepedi
pub static NORTHERN_SOTHO: &str = "nso";

/// The unique string token for English
pub static ENGLISH: &str = "en";

/// Languages with parallel corpora available
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Language {
    /// Afrikaans
    Afrikaans,

    /// Xitsonga
    Tsonga,

    /// Sepedi
    NorthernSotho,

    /// English
    English,
}

impl Language {
    /// Get the unique string token that identifies this language
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Afrikaans => AFRIKAANS,
            Language::Tsonga => TSONGA,
            Language::NorthernSotho => NORTHERN_SOTHO,
            Language::English => ENGLISH,
        }
    }
}

impl TryFrom<&str> for Language {
    type Error = LanguageError;

    /// Try to convert a string to a Language
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "af" => Ok(Language::Afrikaans),
            "ts" => Ok(Language::Tsonga),
            "nso" => Ok(Language::NorthernSotho),
            "en" => Ok(Language::English),
            _ => Err(LanguageError::Unknown(value.to_string())),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::try_from(s)
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A translation direction between two languages
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct LanguagePair {
    /// The language translated from
    pub source: Language,

    /// The language translated into
    pub target: Language,
}

impl LanguagePair {
    /// Create a new pair. Corpora are English-centric, so one side must be English.
    pub fn new(source: Language, target: Language) -> Result<Self, LanguageError> {
        if source == target {
            return Err(LanguageError::SameLanguage(source.to_string()));
        }

        if source != Language::English && target != Language::English {
            return Err(LanguageError::UnsupportedPair(
                source.to_string(),
                target.to_string(),
            ));
        }

        Ok(Self { source, target })
    }

    /// The non-English side of the pair
    fn other(&self) -> Language {
        if self.source == Language::English {
            self.target
        } else {
            self.source
        }
    }

    /// The directory holding the corpus for this pair, shared by both directions
    pub fn corpus_dir(&self, data_dir: &str) -> String {
        format!("{}/{}_{}", data_dir, ENGLISH, self.other())
    }

    /// The file prefix for a split ("train" or "dev"), without the language extension
    pub fn split_prefix(&self, data_dir: &str, split: &str) -> String {
        format!(
            "{}/{}{}_parallel.bpe.{}",
            self.corpus_dir(data_dir),
            ENGLISH,
            self.other(),
            split
        )
    }

    /// The prepared corpus cache for this direction
    pub fn cache_file(&self, data_dir: &str) -> String {
        format!("{}/{}-{}.json", data_dir, self.source, self.target)
    }
}

impl Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

/// Language Error
#[derive(thiserror::Error, Debug)]
pub enum LanguageError {
    /// No language found for the given string
    #[error("no language found for {0}")]
    Unknown(String),

    /// Source and target are the same
    #[error("cannot translate {0} into itself")]
    SameLanguage(String),

    /// No corpus exists for the pair
    #[error("no parallel corpus for {0}-{1}, one side must be English")]
    UnsupportedPair(String, String),
}
