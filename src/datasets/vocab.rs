use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::{classes::index_of, files::read_file};

/// The padding token, always id 0
pub static PAD: &str = "<pad>";

/// The unknown token
pub static UNK: &str = "<unk>";

/// The start of sentence token
pub static SOS: &str = "<sos>";

/// The end of sentence token
pub static EOS: &str = "<eos>";

/// Special tokens in id order
pub static SPECIALS: [&str; 4] = [PAD, UNK, SOS, EOS];

/// A word-level vocabulary over whitespace-separated (BPE) tokens, shared by both languages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vocab {
    /// Tokens by id
    id2token: Vec<String>,

    /// Ids by token
    token2id: HashMap<String, usize>,
}

impl Vocab {
    /// Build a vocabulary from lines of text. Tokens are ordered by descending frequency, with
    /// ties broken alphabetically.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();

        for line in lines {
            for token in line.as_ref().split_whitespace() {
                *counts.entry(token.to_string()).or_default() += 1;
            }
        }

        for special in SPECIALS {
            counts.remove(special);
        }

        let mut by_frequency: Vec<(String, usize)> = counts.into_iter().collect();
        by_frequency.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then(a.cmp(b)));

        let id2token: Vec<String> = SPECIALS
            .iter()
            .map(|s| s.to_string())
            .chain(by_frequency.into_iter().map(|(token, _)| token))
            .collect();

        let token2id = index_of(&id2token);

        Self { id2token, token2id }
    }

    /// Build a vocabulary from the source and target training files
    pub async fn from_data_files(src_path: &str, tgt_path: &str) -> std::io::Result<Self> {
        let mut lines = read_file(src_path).await?;
        lines.extend(read_file(tgt_path).await?);

        Ok(Self::from_lines(lines))
    }

    /// The number of tokens, including specials
    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    /// Always false, the special tokens are present in every vocabulary
    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }

    /// The id for a token, falling back to `<unk>`
    pub fn id(&self, token: &str) -> usize {
        self.token2id
            .get(token)
            .copied()
            .unwrap_or_else(|| self.unk_id())
    }

    /// The token for an id
    pub fn token(&self, id: usize) -> &str {
        self.id2token.get(id).map(String::as_str).unwrap_or(UNK)
    }

    /// Id of the padding token
    pub fn pad_id(&self) -> usize {
        self.token2id[PAD]
    }

    /// Id of the unknown token
    pub fn unk_id(&self) -> usize {
        self.token2id[UNK]
    }

    /// Id of the start of sentence token
    pub fn sos_id(&self) -> usize {
        self.token2id[SOS]
    }

    /// Id of the end of sentence token
    pub fn eos_id(&self) -> usize {
        self.token2id[EOS]
    }

    /// Encode a line, wrapped in `<sos>` and `<eos>`
    pub fn encode(&self, line: &str) -> Vec<usize> {
        std::iter::once(self.sos_id())
            .chain(line.split_whitespace().map(|token| self.id(token)))
            .chain(std::iter::once(self.eos_id()))
            .collect()
    }

    /// Decode ids back into tokens, stopping at the first `<eos>`
    pub fn decode(&self, ids: &[usize]) -> Vec<String> {
        let (pad, sos, eos) = (self.pad_id(), self.sos_id(), self.eos_id());

        ids.iter()
            .copied()
            .take_while(|id| *id != eos)
            .filter(|id| *id != pad && *id != sos)
            .map(|id| self.token(id).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vocab() -> Vocab {
        Vocab::from_lines(["die kat sit", "die hond <eos> sit", "die"])
    }

    #[test]
    fn specials_come_first_and_padding_is_zero() {
        let vocab = vocab();

        assert_eq!(vocab.pad_id(), 0);
        assert_eq!(vocab.unk_id(), 1);
        assert_eq!(vocab.sos_id(), 2);
        assert_eq!(vocab.eos_id(), 3);
        assert_eq!(vocab.len(), 8);
    }

    #[test]
    fn tokens_are_ordered_by_frequency() {
        let vocab = vocab();

        assert_eq!(vocab.token(4), "die");
        assert_eq!(vocab.token(5), "sit");
        // ties are alphabetical
        assert_eq!(vocab.token(6), "hond");
        assert_eq!(vocab.token(7), "kat");
    }

    #[test]
    fn encodes_with_sentence_markers() {
        let vocab = vocab();

        assert_eq!(vocab.encode("die kat blaf"), vec![2, 4, 7, 1, 3]);
        assert_eq!(vocab.encode(""), vec![2, 3]);
    }

    #[test]
    fn decoding_stops_at_end_of_sentence() {
        let vocab = vocab();

        assert_eq!(vocab.decode(&[2, 4, 7, 3, 5, 0]), vec!["die", "kat"]);
        assert_eq!(vocab.decode(&[2, 6, 0, 0]), vec!["hond"]);
    }
}
