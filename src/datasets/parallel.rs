use async_trait::async_trait;
use burn::data::dataset::{self, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{cli::LanguagePair, utils::files::read_file};

use super::{DatasetError, LoadableDataset, Vocab};

/// A sentence pair from a parallel corpus
#[derive(Clone, Debug, Serialize, Deserialize, new)]
pub struct Item {
    /// The BPE-segmented source sentence
    pub source: String,

    /// The BPE-segmented target sentence
    pub target: String,

    /// Source token ids, wrapped in `<sos>` and `<eos>`
    pub source_ids: Vec<usize>,

    /// Target token ids, wrapped in `<sos>` and `<eos>`
    pub target_ids: Vec<usize>,
}

impl Item {
    /// Encode a raw sentence pair
    pub fn encode(vocab: &Vocab, source: String, target: String) -> Self {
        let source_ids = vocab.encode(&source);
        let target_ids = vocab.encode(&target);

        Self::new(source, target, source_ids, target_ids)
    }

    /// Cut both sides down to `max_len` ids, keeping the closing `<eos>`. Returns whether
    /// anything was cut.
    pub fn truncate(&mut self, max_len: usize) -> bool {
        let source_cut = truncate_ids(&mut self.source_ids, max_len);
        let target_cut = truncate_ids(&mut self.target_ids, max_len);

        source_cut || target_cut
    }
}

fn truncate_ids(ids: &mut Vec<usize>, max_len: usize) -> bool {
    if ids.len() <= max_len {
        return false;
    }

    let last = ids.last().copied();
    ids.truncate(max_len.saturating_sub(1));
    ids.extend(last);

    true
}

/// A parallel corpus split held in memory
pub struct Dataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Item>,
}

impl dataset::Dataset<Item> for Dataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Item> {
        self.dataset.get(index)
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl Dataset {
    /// Wrap already-encoded sentence pairs
    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            dataset: InMemDataset::new(items),
        }
    }

    /// Pair up source and target lines and encode them
    pub fn from_lines(
        vocab: &Vocab,
        source: Vec<String>,
        target: Vec<String>,
    ) -> Result<Vec<Item>, DatasetError> {
        if source.len() != target.len() {
            return Err(DatasetError::Misaligned(source.len(), target.len()));
        }

        Ok(source
            .into_iter()
            .zip(target)
            .map(|(src, tgt)| Item::encode(vocab, src.trim().to_string(), tgt.trim().to_string()))
            .collect())
    }

    /// Read and encode the `{prefix}.{src}` and `{prefix}.{tgt}` files of a split
    pub async fn load_items(
        vocab: &Vocab,
        prefix: &str,
        pair: &LanguagePair,
    ) -> anyhow::Result<Vec<Item>> {
        let src_path = format!("{}.{}", prefix, pair.source);
        let tgt_path = format!("{}.{}", prefix, pair.target);

        let source = read_file(&src_path)
            .await
            .map_err(|e| anyhow!("Unable to read {}: {}", src_path, e))?;
        let target = read_file(&tgt_path)
            .await
            .map_err(|e| anyhow!("Unable to read {}: {}", tgt_path, e))?;

        let items = Self::from_lines(vocab, source, target)
            .map_err(|e| anyhow!("{} ({}): {}", prefix, pair, e))?;

        log::debug!("Loaded {} sentence pairs from {}", items.len(), prefix);

        Ok(items)
    }
}

#[async_trait]
impl LoadableDataset<Item> for Dataset {
    async fn load(vocab: &Vocab, prefix: &str, pair: &LanguagePair) -> anyhow::Result<Self> {
        let items = Self::load_items(vocab, prefix, pair).await?;

        Ok(Self::from_items(items))
    }
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::Dataset as _;
    use pretty_assertions::assert_eq;

    use crate::{cli::Language, utils::files::write_lines};

    use super::*;

    #[test]
    fn pairs_lines_in_order() {
        let vocab = Vocab::from_lines(["the cat", "die kat"]);
        let items = Dataset::from_lines(
            &vocab,
            vec!["the cat ".to_string()],
            vec!["die kat".to_string()],
        )
        .unwrap();

        assert_eq!(items[0].source, "the cat");
        assert_eq!(items[0].target_ids.len(), 4);
        assert_eq!(items[0].target_ids.first(), Some(&vocab.sos_id()));
        assert_eq!(items[0].target_ids.last(), Some(&vocab.eos_id()));

        let dataset = Dataset::from_items(items);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.get(0).unwrap().target, "die kat");
    }

    #[test]
    fn rejects_misaligned_files() {
        let vocab = Vocab::from_lines(["a"]);
        let result = Dataset::from_lines(&vocab, vec!["a".to_string()], vec![]);

        assert!(matches!(result, Err(DatasetError::Misaligned(1, 0))));
    }

    #[test]
    fn truncation_keeps_the_end_token() {
        let vocab = Vocab::from_lines(["a b c d e"]);
        let mut item = Item::encode(&vocab, "a b c d e".to_string(), "a b".to_string());

        assert!(item.truncate(4));
        assert_eq!(item.source_ids.len(), 4);
        assert_eq!(item.source_ids.first(), Some(&vocab.sos_id()));
        assert_eq!(item.source_ids.last(), Some(&vocab.eos_id()));
        assert_eq!(item.target_ids, vocab.encode("a b"));

        assert!(!item.truncate(4));
    }

    #[tokio::test]
    async fn loads_a_split_from_disk() {
        let dir = std::env::temp_dir().join(format!("burn-nmt-parallel-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let prefix = dir.join("enaf_parallel.bpe.dev").to_string_lossy().to_string();
        write_lines(&format!("{prefix}.en"), &["the cat", "the dog"])
            .await
            .unwrap();
        write_lines(&format!("{prefix}.af"), &["die kat", "die hond"])
            .await
            .unwrap();

        let pair = LanguagePair::new(Language::English, Language::Afrikaans).unwrap();
        let vocab = Vocab::from_lines(["the cat the dog", "die kat die hond"]);

        let dataset = <Dataset as LoadableDataset<Item>>::load(&vocab, &prefix, &pair)
            .await
            .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().source, "the dog");
        assert_eq!(dataset.get(1).unwrap().target, "die hond");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
