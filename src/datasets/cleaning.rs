use std::collections::HashMap;

/// Characters that mark markup or alignment noise in scraped corpora
static NOISE: [char; 2] = ['~', '<'];

/// Count whitespace-separated tokens, most frequent first
pub fn term_frequency(text: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for token in text.split_whitespace() {
        *counts.entry(token).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(token, count)| (token.to_string(), count))
        .collect();

    counts.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then(a.cmp(b)));

    counts
}

/// Whether a sentence pair is clean enough to train on
pub fn keep_pair(source: &str, target: &str) -> bool {
    if source.trim().is_empty() && target.trim().is_empty() {
        return false;
    }

    [source, target].iter().all(|line| {
        !line.contains(NOISE) && line.chars().next().is_some_and(char::is_alphabetic)
    })
}

/// The result of filtering a parallel corpus
#[derive(Debug, Default)]
pub struct Filtered {
    /// Kept source lines
    pub source: Vec<String>,

    /// Kept target lines
    pub target: Vec<String>,

    /// Dropped pairs
    pub rejected: Vec<(String, String)>,
}

/// Filter a parallel corpus line by line. Lines past the end of the shorter side are ignored.
pub fn filter_parallel(source: Vec<String>, target: Vec<String>) -> Filtered {
    let mut filtered = Filtered::default();

    for (src, tgt) in source.into_iter().zip(target) {
        if keep_pair(&src, &tgt) {
            filtered.source.push(src);
            filtered.target.push(tgt);
        } else {
            filtered.rejected.push((src, tgt));
        }
    }

    filtered
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counts_terms_by_frequency() {
        let counts = term_frequency("a b a\nc a b");

        assert_eq!(
            counts,
            vec![
                ("a".to_string(), 3),
                ("b".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }

    #[test]
    fn rejects_noisy_pairs() {
        assert!(keep_pair("Hello there", "Avuxeni"));
        assert!(!keep_pair("", "  "));
        assert!(!keep_pair("Hello ~ there", "Avuxeni"));
        assert!(!keep_pair("Hello", "<i>Avuxeni</i>"));
        assert!(!keep_pair("1. Hello", "Avuxeni"));
        assert!(!keep_pair("Hello", ""));
    }

    #[test]
    fn filters_in_lockstep() {
        let filtered = filter_parallel(
            vec!["Good".into(), "(bad)".into(), "Fine".into(), "Extra".into()],
            vec!["Kahle".into(), "Kahle".into(), "Swinene".into()],
        );

        assert_eq!(filtered.source, vec!["Good", "Fine"]);
        assert_eq!(filtered.target, vec!["Kahle", "Swinene"]);
        assert_eq!(filtered.rejected.len(), 1);
    }
}
