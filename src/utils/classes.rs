use std::hash::Hash;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Hash + Eq,
    V: Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// Build a lookup from each entry of an ordered list to its position
pub fn index_of<V, MV>(entries: &[V]) -> MV
where
    V: Hash + Eq + Clone,
    MV: FromIterator<(V, usize)>,
{
    invert_map(entries.iter().cloned().enumerate())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn indexes_follow_list_order() {
        let index: HashMap<String, usize> =
            index_of(&["<pad>".to_string(), "die".to_string(), "kat".to_string()]);

        assert_eq!(index["<pad>"], 0);
        assert_eq!(index["kat"], 2);
    }
}
