use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};

use crate::errors::Result;

/// Assigns dense ids to keys in insertion order and counts their occurrences.
pub struct Indexer<K> {
    ids: HashMap<K, usize>,
    keys: Vec<K>,
    counts: Vec<u32>,
}

impl<K> Indexer<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            keys: vec![],
            counts: vec![],
        }
    }

    /// Counts one occurrence of `key` and returns its provisional id.
    pub fn add<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ToOwned<Owned = K> + Eq + Hash + ?Sized,
    {
        let id = if let Some(&id) = self.ids.get(key) {
            id
        } else {
            let id = self.keys.len();
            self.keys.push(key.to_owned());
            self.ids.insert(key.to_owned(), id);
            self.counts.push(0);
            id
        };
        self.counts[id] = self.counts[id].saturating_add(1);
        id
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }
}

impl<K> Default for Indexer<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer<String> {
    /// Keeps the keys seen at least `minc` times and builds a frozen vocabulary.
    ///
    /// # Returns
    ///
    /// The vocabulary and a table that maps every provisional id to its permanent id, or to
    /// `None` if the key was filtered out. Permanent ids keep the first-occurrence order.
    pub fn build(self, minc: u32) -> Result<(Vocabulary, Vec<Option<u32>>)> {
        let mut vocab = Vocabulary::new();
        let mut remap = Vec::with_capacity(self.keys.len());
        for (key, count) in self.keys.into_iter().zip(self.counts) {
            if count >= minc {
                let id = u32::try_from(vocab.keys.len())?;
                vocab.ids.insert(key.clone(), id);
                vocab.keys.push(key);
                vocab.counts.push(count);
                remap.push(Some(id));
            } else {
                remap.push(None);
            }
        }
        vocab.frozen = true;
        Ok((vocab, remap))
    }
}

/// Bidirectional mapping between feature keys and dense indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    keys: Vec<String>,
    counts: Vec<u32>,
    frozen: bool,
}

impl Vocabulary {
    /// Creates an open, empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `key`, allocating one if the vocabulary is still open.
    ///
    /// Once frozen, unknown keys yield `None` and the vocabulary is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use greedy_ner::Vocabulary;
    ///
    /// let mut v = Vocabulary::new();
    /// assert_eq!(Some(0), v.index("w[0]=paris"));
    /// assert_eq!(Some(0), v.index("w[0]=paris"));
    /// v.freeze();
    /// assert_eq!(None, v.index("w[0]=berlin"));
    /// assert_eq!(1, v.len());
    /// ```
    pub fn index(&mut self, key: &str) -> Option<u32> {
        if let Some(&id) = self.ids.get(key) {
            return Some(id);
        }
        if self.frozen {
            return None;
        }
        let id = u32::try_from(self.keys.len()).ok()?;
        self.ids.insert(key.to_string(), id);
        self.keys.push(key.to_string());
        self.counts.push(0);
        Some(id)
    }

    /// Looks up `key` without allocating.
    #[inline(always)]
    pub fn get(&self, key: &str) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key(&self, id: u32) -> Option<&str> {
        self.keys.get(id as usize).map(String::as_str)
    }

    /// Occurrence count of the key in the indexing corpus.
    pub fn count(&self, id: u32) -> Option<u32> {
        self.counts.get(id as usize).copied()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

// Only the ordered keys are stored. The hash index is rebuilt on decode.
impl Encode for Vocabulary {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        Encode::encode(&self.keys, encoder)?;
        Encode::encode(&self.counts, encoder)?;
        Encode::encode(&self.frozen, encoder)?;
        Ok(())
    }
}

impl<Context> Decode<Context> for Vocabulary {
    fn decode<D: Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let keys: Vec<String> = Decode::decode(decoder)?;
        let counts: Vec<u32> = Decode::decode(decoder)?;
        let frozen: bool = Decode::decode(decoder)?;
        if keys.len() != counts.len() {
            return Err(DecodeError::Other("inconsistent size of the vocabulary counts"));
        }
        let mut ids = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let id = u32::try_from(i)
                .map_err(|_| DecodeError::Other("too many keys in the vocabulary"))?;
            if ids.insert(key.clone(), id).is_some() {
                return Err(DecodeError::Other("duplicate key in the vocabulary"));
            }
        }
        Ok(Self {
            ids,
            keys,
            counts,
            frozen,
        })
    }
}

bincode::impl_borrow_decode!(Vocabulary);

/// Closed set of tags. Every tag seen in training gets an index; there is no count filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct TagSet {
    tags: Vocabulary,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `tag`, allocating one while the set is open.
    pub fn index(&mut self, tag: &str) -> Option<usize> {
        self.tags.index(tag).map(|id| id as usize)
    }

    pub fn get(&self, tag: &str) -> Option<usize> {
        self.tags.get(tag).map(|id| id as usize)
    }

    /// Name of the tag with index `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn name(&self, id: usize) -> &str {
        &self.tags.keys[id]
    }

    pub fn names(&self) -> &[String] {
        self.tags.keys()
    }

    pub fn freeze(&mut self) {
        self.tags.freeze();
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_idempotent() {
        let mut v = Vocabulary::new();
        for (s, id) in [("zero", 0), ("one", 1), ("two", 2), ("one", 1), ("zero", 0), ("three", 3)] {
            assert_eq!(Some(id), v.index(s), "{} != {}", s, id);
        }
        assert_eq!(4, v.len());
    }

    #[test]
    fn test_frozen_vocabulary_does_not_change() {
        let mut v = Vocabulary::new();
        v.index("a");
        v.index("b");
        v.freeze();
        let before = v.clone();

        assert_eq!(None, v.index("c"));
        assert_eq!(Some(1), v.index("b"));
        assert_eq!(None, v.get("c"));
        assert_eq!(before, v);

        v.freeze();
        assert_eq!(before, v);
    }

    #[test]
    fn test_key_lookup() {
        let mut v = Vocabulary::new();
        v.index("zero");
        v.index("one");

        assert_eq!(Some("zero"), v.key(0));
        assert_eq!(Some("one"), v.key(1));
        assert_eq!(None, v.key(2));
    }

    #[test]
    fn test_build_min_count() {
        let mut indexer = Indexer::<String>::new();
        for key in ["a", "b", "a", "c", "b", "a", "d"] {
            indexer.add(key);
        }
        let (v, remap) = indexer.build(2).unwrap();

        assert!(v.is_frozen());
        assert_eq!(&["a".to_string(), "b".to_string()], v.keys());
        assert_eq!(vec![Some(0), Some(1), None, None], remap);
        assert_eq!(Some(3), v.count(0));
        assert_eq!(Some(2), v.count(1));
        assert_eq!(None, v.get("c"));
    }

    #[test]
    fn test_build_min_count_boundary() {
        let minc = 3;
        let mut indexer = Indexer::<String>::new();
        for _ in 0..minc - 1 {
            indexer.add("rare");
        }
        for _ in 0..minc {
            indexer.add("common");
        }
        let (v, remap) = indexer.build(minc).unwrap();

        assert_eq!(None, v.get("rare"));
        assert_eq!(Some(0), v.get("common"));
        assert_eq!(vec![None, Some(0)], remap);
    }

    #[test]
    fn test_build_keeps_first_occurrence_order() {
        let mut indexer = Indexer::<String>::new();
        for key in ["z", "y", "x", "x", "y", "z"] {
            indexer.add(key);
        }
        let (v, _) = indexer.build(1).unwrap();

        assert_eq!(&["z".to_string(), "y".to_string(), "x".to_string()], v.keys());
    }

    #[test]
    fn test_encode_decode_rebuilds_index() {
        let mut v = Vocabulary::new();
        for key in ["w[0]=paris", "w[0]=berlin", "w[0]=paris"] {
            v.index(key);
        }
        v.freeze();
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&v, config).unwrap();
        let (decoded, _): (Vocabulary, usize) = bincode::decode_from_slice(&bytes, config).unwrap();

        assert_eq!(v, decoded);
        assert_eq!(Some(1), decoded.get("w[0]=berlin"));
        assert!(decoded.is_frozen());
        assert_eq!(bytes, bincode::encode_to_vec(&decoded, config).unwrap());
    }

    #[test]
    fn test_decode_rejects_duplicate_keys() {
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(
            (vec!["a".to_string(), "a".to_string()], vec![1u32, 1], true),
            config,
        )
        .unwrap();
        let result: std::result::Result<(Vocabulary, usize), _> =
            bincode::decode_from_slice(&bytes, config);

        assert!(result.is_err());
    }

    #[test]
    fn test_tag_set() {
        let mut tags = TagSet::new();
        assert_eq!(Some(0), tags.index("O"));
        assert_eq!(Some(1), tags.index("B-PER"));
        assert_eq!(Some(0), tags.index("O"));
        tags.freeze();

        assert_eq!(None, tags.index("B-LOC"));
        assert_eq!("B-PER", tags.name(1));
        assert_eq!(2, tags.len());
    }
}
