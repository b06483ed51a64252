/// Languages and translation directions
pub mod languages;

pub use languages::{Language, LanguagePair};
