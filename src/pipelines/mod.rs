/// Translation
pub mod translation;
