use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::LanguagePair;

use super::{
    parallel::{self, Item},
    DatasetError, Vocab,
};

/// The training split name
pub static TRAIN: &str = "train";

/// The validation split name
pub static DEV: &str = "dev";

/// A prepared corpus: the shared vocabulary plus encoded train and validation splits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Corpus {
    /// Vocabulary built from the training split
    pub vocab: Vocab,

    /// Encoded training pairs
    pub train: Vec<Item>,

    /// Encoded validation pairs
    pub valid: Vec<Item>,
}

impl Corpus {
    /// Load the corpus for a language pair, preparing and caching it first if needed
    pub async fn load(data_dir: &str, pair: &LanguagePair, overwrite: bool) -> anyhow::Result<Self> {
        let cache_file = pair.cache_file(data_dir);

        if overwrite || !Path::new(&cache_file).is_file() {
            log::info!("Preparing {} corpus from {}", pair, pair.corpus_dir(data_dir));

            let corpus = Self::prepare(data_dir, pair).await?;
            corpus.save(&cache_file).await?;
        }

        Self::read(&cache_file).await
    }

    /// Build the vocabulary and encode both splits from the raw BPE files
    pub async fn prepare(data_dir: &str, pair: &LanguagePair) -> anyhow::Result<Self> {
        let train_prefix = pair.split_prefix(data_dir, TRAIN);
        let dev_prefix = pair.split_prefix(data_dir, DEV);

        let vocab = Vocab::from_data_files(
            &format!("{}.{}", train_prefix, pair.source),
            &format!("{}.{}", train_prefix, pair.target),
        )
        .await
        .map_err(|e| anyhow!("Unable to build vocabulary from {}: {}", train_prefix, e))?;

        let train = parallel::Dataset::load_items(&vocab, &train_prefix, pair).await?;
        let valid = parallel::Dataset::load_items(&vocab, &dev_prefix, pair).await?;

        if train.is_empty() {
            return Err(DatasetError::Empty(train_prefix).into());
        }

        Ok(Self {
            vocab,
            train,
            valid,
        })
    }

    /// Write the corpus cache
    pub async fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_vec(self)?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| anyhow!("Unable to write corpus cache {}: {}", path, e))?;

        log::debug!("Cached corpus to {}", path);

        Ok(())
    }

    /// Read a corpus cache
    pub async fn read(path: &str) -> anyhow::Result<Self> {
        let json = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Unable to read corpus cache {}: {}", path, e))?;

        let corpus: Self = serde_json::from_slice(&json)
            .map_err(|e| DatasetError::Cache(path.to_string(), e.to_string()))?;

        Ok(corpus)
    }

    /// Cut every pair in both splits down to `max_len` ids. Returns how many pairs were cut.
    pub fn truncate(&mut self, max_len: usize) -> usize {
        self.train
            .iter_mut()
            .chain(self.valid.iter_mut())
            .map(|item| item.truncate(max_len))
            .filter(|cut| *cut)
            .count()
    }

    /// The training split as a Burn dataset
    pub fn train_dataset(&self) -> parallel::Dataset {
        parallel::Dataset::from_items(self.train.clone())
    }

    /// The validation split as a Burn dataset
    pub fn valid_dataset(&self) -> parallel::Dataset {
        parallel::Dataset::from_items(self.valid.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{cli::Language, utils::files::write_lines};

    use super::*;

    async fn write_corpus(data_dir: &str, pair: &LanguagePair) {
        tokio::fs::create_dir_all(pair.corpus_dir(data_dir))
            .await
            .unwrap();

        let train = pair.split_prefix(data_dir, TRAIN);
        let dev = pair.split_prefix(data_dir, DEV);

        write_lines(&format!("{train}.en"), &["the cat sits", "the dog"])
            .await
            .unwrap();
        write_lines(&format!("{train}.af"), &["die kat sit", "die hond"])
            .await
            .unwrap();
        write_lines(&format!("{dev}.en"), &["the bird"]).await.unwrap();
        write_lines(&format!("{dev}.af"), &["die voël"]).await.unwrap();
    }

    #[tokio::test]
    async fn prepares_and_caches_the_corpus() {
        let data_dir = std::env::temp_dir().join(format!("burn-nmt-corpus-{}", std::process::id()));
        let data_dir = data_dir.to_string_lossy().to_string();
        let pair = LanguagePair::new(Language::English, Language::Afrikaans).unwrap();

        write_corpus(&data_dir, &pair).await;

        let corpus = Corpus::load(&data_dir, &pair, false).await.unwrap();

        assert!(Path::new(&pair.cache_file(&data_dir)).is_file());
        assert_eq!(corpus.train.len(), 2);
        assert_eq!(corpus.valid.len(), 1);
        assert_eq!(corpus.vocab.token(4), "die");
        // "voël" only appears in the dev split
        assert_eq!(corpus.valid[0].target_ids[2], corpus.vocab.unk_id());

        let cached = Corpus::read(&pair.cache_file(&data_dir)).await.unwrap();
        assert_eq!(cached.train[1].target, "die hond");

        tokio::fs::remove_dir_all(&data_dir).await.unwrap();
    }

    #[test]
    fn truncation_counts_cut_pairs() {
        let vocab = Vocab::from_lines(["a b c"]);
        let short = Item::encode(&vocab, "a".to_string(), "b".to_string());
        let long = Item::encode(&vocab, "a b c a b c".to_string(), "b".to_string());

        let mut corpus = Corpus {
            vocab,
            train: vec![short.clone(), long.clone()],
            valid: vec![long],
        };

        assert_eq!(corpus.truncate(5), 2);
        assert_eq!(corpus.train[0].source_ids, short.source_ids);
        assert!(corpus
            .train
            .iter()
            .chain(&corpus.valid)
            .all(|item| item.source_ids.len() <= 5));
        assert_eq!(corpus.truncate(5), 0);
    }

    #[tokio::test]
    async fn missing_corpus_is_an_error() {
        let pair = LanguagePair::new(Language::Tsonga, Language::English).unwrap();

        assert!(Corpus::load("/definitely/not/here", &pair, false)
            .await
            .is_err());
    }
}
