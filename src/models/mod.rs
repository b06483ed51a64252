/// Encoder-decoder Transformer for translation
pub mod transformer;
