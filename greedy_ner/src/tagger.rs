//! Greedy left-to-right decoding.

use crate::aso::AsoModel;
use crate::errors::Result;
use crate::feature::{scheme_by_name, FeatureScheme};
use crate::model::{argmax, FeatureVector, Model};
use crate::sentence::{Document, Sentence};
use crate::vocabulary::Vocabulary;

/// Turns a token in context into a [`FeatureVector`] under a frozen vocabulary.
pub(crate) struct Featurizer<'a> {
    pub(crate) scheme: &'static dyn FeatureScheme,
    pub(crate) vocabulary: &'a Vocabulary,
    pub(crate) aso: Option<&'a AsoModel>,
    pub(crate) use_eph: bool,
}

impl Featurizer<'_> {
    /// Pushes the features that depend only on the sentence.
    ///
    /// The ASO block of `x` is reset to the projection of the same features.
    pub(crate) fn static_features(
        &self,
        sentence: &Sentence,
        position: usize,
        keys: &mut Vec<String>,
        x: &mut FeatureVector,
    ) {
        keys.clear();
        self.scheme.fd(sentence, position, keys);
        x.ids
            .extend(keys.iter().filter_map(|k| self.vocabulary.get(k)));
        if let Some(aso) = self.aso {
            x.aso.clear();
            x.aso.resize(aso.width(), 0.0);
            aso.project(keys.iter().map(String::as_str), &mut x.aso);
        }
    }

    /// Pushes the features of the tag history. Does nothing unless EPH is enabled.
    pub(crate) fn history_features(
        &self,
        history: &[&str],
        position: usize,
        keys: &mut Vec<String>,
        x: &mut FeatureVector,
    ) {
        if !self.use_eph {
            return;
        }
        keys.clear();
        self.scheme.hd(history, position, keys);
        x.ids
            .extend(keys.iter().filter_map(|k| self.vocabulary.get(k)));
        if let Some(aso) = self.aso {
            aso.project(keys.iter().map(String::as_str), &mut x.aso);
        }
    }
}

/// State of a [`Decoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// At the sentence boundary with an empty history.
    Ready,

    /// The tags of all positions before `position` are decided.
    InProgress { position: usize },

    /// Every token is tagged.
    Done,
}

/// Tags decided so far in the current sentence, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagHistory {
    tags: Vec<usize>,
}

impl TagHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: usize) {
        self.tags.push(tag);
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.tags
    }
}

/// A running left-to-right decoding of one sentence.
///
/// Each step commits the best tag of the current token and feeds it back into the history used
/// by the following tokens. Decisions are never revised.
pub struct Decoding<'t, 's> {
    tagger: &'t GreedyTagger,
    sentence: &'s Sentence,
    state: DecodeState,
    history: TagHistory,
    names: Vec<&'t str>,
    keys: Vec<String>,
    x: FeatureVector,
    scores: Vec<f64>,
}

impl<'t, 's> Decoding<'t, 's> {
    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn history(&self) -> &TagHistory {
        &self.history
    }

    /// Decides the tag of the next token.
    ///
    /// # Returns
    ///
    /// The tag index, or `None` once the whole sentence is tagged.
    pub fn step(&mut self) -> Option<usize> {
        let position = match self.state {
            DecodeState::Ready => 0,
            DecodeState::InProgress { position } => position,
            DecodeState::Done => return None,
        };
        if position >= self.sentence.len() {
            self.state = DecodeState::Done;
            return None;
        }

        let tagger = self.tagger;
        let model = &tagger.model;
        let featurizer = tagger.featurizer();
        self.x.clear();
        featurizer.static_features(self.sentence, position, &mut self.keys, &mut self.x);
        featurizer.history_features(&self.names, position, &mut self.keys, &mut self.x);
        self.x.normalize();

        model.weights.scores(&self.x, &mut self.scores);
        let tag = argmax(&self.scores);
        self.history.push(tag);
        self.names.push(model.tags.name(tag));

        self.state = if position + 1 == self.sentence.len() {
            DecodeState::Done
        } else {
            DecodeState::InProgress {
                position: position + 1,
            }
        };
        Some(tag)
    }

    /// Runs the decoding to the end.
    pub fn finish(mut self) -> TagHistory {
        while self.step().is_some() {}
        self.history
    }
}

impl Iterator for Decoding<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// Greedy tagger over a frozen model.
///
/// # Examples
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
///
/// use greedy_ner::{GreedyTagger, Model, Sentence};
///
/// let mut f = BufReader::new(File::open("model.bin").unwrap());
/// let model = Model::read(&mut f).unwrap();
/// let tagger = GreedyTagger::new(model).unwrap();
///
/// let s = Sentence::from_tagged("Peter lives in Berlin");
/// println!("{:?}", tagger.tag(&s));
/// ```
pub struct GreedyTagger {
    model: Model,
    scheme: &'static dyn FeatureScheme,
}

impl GreedyTagger {
    /// Creates a new tagger.
    ///
    /// # Errors
    ///
    /// [`NerError::Configuration`](crate::errors::NerError::Configuration) will be returned if
    /// the model names an unknown feature scheme or is bound to an incompatible ASO model.
    pub fn new(model: Model) -> Result<Self> {
        let scheme = scheme_by_name(&model.config.scheme)?;
        if let Some(aso) = model.aso() {
            aso.check_compatible(&model.config)?;
        }
        Ok(Self { model, scheme })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub(crate) fn featurizer(&self) -> Featurizer<'_> {
        Featurizer {
            scheme: self.scheme,
            vocabulary: &self.model.vocabulary,
            aso: self.model.aso(),
            use_eph: self.model.config.use_eph,
        }
    }

    /// Starts decoding `sentence`.
    pub fn decode<'t, 's>(&'t self, sentence: &'s Sentence) -> Decoding<'t, 's> {
        Decoding {
            tagger: self,
            sentence,
            state: DecodeState::Ready,
            history: TagHistory::new(),
            names: Vec::with_capacity(sentence.len()),
            keys: vec![],
            x: FeatureVector::new(),
            scores: vec![0.0; self.model.tags.len()],
        }
    }

    /// Predicts tag indices, one per token.
    pub fn tag_ids(&self, sentence: &Sentence) -> Vec<usize> {
        self.decode(sentence).finish().into_vec()
    }

    /// Predicts tags, one per token.
    pub fn tag(&self, sentence: &Sentence) -> Vec<&str> {
        self.decode(sentence)
            .map(|tag| self.model.tags.name(tag))
            .collect()
    }

    /// Predicts the tags of every sentence of a document.
    pub fn tag_document(&self, doc: &Document) -> Vec<Vec<&str>> {
        doc.sentences().iter().map(|s| self.tag(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::errors::NerError;
    use crate::model::{TaggerConfig, WeightMatrix};
    use crate::vocabulary::TagSet;

    // O=0, B-PER=1. "John" votes for B-PER, a preceding B-PER votes for O.
    fn handmade_model() -> Model {
        let mut tags = TagSet::new();
        tags.index("O");
        tags.index("B-PER");
        tags.freeze();
        let mut vocabulary = Vocabulary::new();
        vocabulary.index("w[0]=John");
        vocabulary.index("t[-1]=B-PER");
        vocabulary.freeze();
        let mut weights = WeightMatrix::new(2, 0, 2);
        let john = FeatureVector {
            ids: vec![0],
            aso: vec![],
        };
        let after_per = FeatureVector {
            ids: vec![1],
            aso: vec![],
        };
        weights.add(&john, 1, 1.0);
        weights.add(&after_per, 0, 1.0);
        Model {
            config: TaggerConfig {
                scheme: "word".to_string(),
                use_eph: true,
                ..TaggerConfig::default()
            },
            vocabulary,
            tags,
            weights,
            aso: None,
        }
    }

    // A model whose only non-zero weight sits on the ASO block. "John" projects to `john`.
    fn aso_driven_model(john: f64) -> Model {
        let mut model = handmade_model();
        let mut aso_vocabulary = Vocabulary::new();
        aso_vocabulary.index("w[0]=John");
        let aso = AsoModel::new(
            model.config.clone(),
            aso_vocabulary,
            TagSet::new(),
            1,
            vec![john],
        )
        .unwrap();
        let mut weights = WeightMatrix::new(2, 1, 2);
        let aso_only = FeatureVector {
            ids: vec![],
            aso: vec![1.0],
        };
        weights.add(&aso_only, 1, 1.0);
        model.weights = weights;
        model.aso = Some(Arc::new(aso));
        model
    }

    #[test]
    fn test_tag() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();

        assert_eq!(vec!["B-PER", "O"], tagger.tag(&Sentence::from_tagged("John runs")));
        assert_eq!(vec!["O", "B-PER"], tagger.tag(&Sentence::from_tagged("runs John")));
    }

    #[test]
    fn test_history_feeds_back() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();

        // The second "John" sees B-PER in its history; the tie is broken towards O.
        assert_eq!(vec![1, 0], tagger.tag_ids(&Sentence::from_tagged("John John")));
    }

    #[test]
    fn test_history_ignored_without_eph() {
        let mut model = handmade_model();
        model.config.use_eph = false;
        let tagger = GreedyTagger::new(model).unwrap();

        assert_eq!(vec![1, 1], tagger.tag_ids(&Sentence::from_tagged("John John")));
    }

    #[test]
    fn test_decode_states() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();
        let s = Sentence::from_tagged("John runs");
        let mut decoding = tagger.decode(&s);

        assert_eq!(DecodeState::Ready, decoding.state());
        assert_eq!(Some(1), decoding.step());
        assert_eq!(DecodeState::InProgress { position: 1 }, decoding.state());
        assert_eq!(&[1], decoding.history().as_slice());
        assert_eq!(Some(0), decoding.step());
        assert_eq!(DecodeState::Done, decoding.state());
        assert_eq!(None, decoding.step());
        assert_eq!(&[1, 0], decoding.history().as_slice());
    }

    #[test]
    fn test_empty_sentence() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();
        let s = Sentence::default();
        let mut decoding = tagger.decode(&s);

        assert_eq!(None, decoding.step());
        assert_eq!(DecodeState::Done, decoding.state());
        assert!(tagger.tag(&s).is_empty());
    }

    #[test]
    fn test_output_length_and_tag_set() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();
        let s = Sentence::from_tagged("John met Mary and John again in John town");
        let tags = tagger.tag(&s);

        assert_eq!(s.len(), tags.len());
        for tag in tags {
            assert!(tagger.model().tags().get(tag).is_some());
        }
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let tagger = GreedyTagger::new(handmade_model()).unwrap();
        let s = Sentence::from_tagged("John John runs John");

        assert_eq!(tagger.tag_ids(&s), tagger.tag_ids(&s));
    }

    #[test]
    fn test_tagger_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GreedyTagger>();
    }

    #[test]
    fn test_unknown_scheme() {
        let mut model = handmade_model();
        model.config.scheme = "missing".to_string();

        assert!(matches!(
            GreedyTagger::new(model),
            Err(NerError::Configuration(_))
        ));
    }

    #[test]
    fn test_write_read() {
        let model = handmade_model();
        let mut buf = vec![];
        model.write(&mut buf).unwrap();
        let restored = Model::read(&mut buf.as_slice()).unwrap();

        assert_eq!(model, restored);
    }

    #[test]
    fn test_read_inconsistent_model() {
        let mut model = handmade_model();
        model.weights = WeightMatrix::new(5, 0, 2);
        let mut buf = vec![];
        model.write(&mut buf).unwrap();

        assert!(matches!(
            Model::read(&mut buf.as_slice()),
            Err(NerError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_aso_block_decides_tag() {
        let tagger = GreedyTagger::new(aso_driven_model(1.0)).unwrap();
        let s = Sentence::from_tagged("runs John runs");

        assert_eq!(vec![0, 1, 0], tagger.tag_ids(&s));

        let tagger = GreedyTagger::new(aso_driven_model(0.0)).unwrap();

        assert_eq!(vec![0, 0, 0], tagger.tag_ids(&s));
    }

    #[test]
    fn test_write_read_with_aso() {
        let model = aso_driven_model(1.0);
        let mut buf = vec![];
        model.write(&mut buf).unwrap();
        let restored = Model::read(&mut buf.as_slice()).unwrap();

        assert_eq!(model, restored);
        let s = Sentence::from_tagged("John runs John");
        assert_eq!(
            GreedyTagger::new(model).unwrap().tag_ids(&s),
            GreedyTagger::new(restored).unwrap().tag_ids(&s)
        );
    }

    #[test]
    fn test_read_inconsistent_aso_matrix() {
        let mut model = aso_driven_model(1.0);
        if let Some(aso) = model.aso.as_mut() {
            Arc::make_mut(aso).theta.push(0.5);
        }
        let mut buf = vec![];
        model.write(&mut buf).unwrap();

        assert!(matches!(
            Model::read(&mut buf.as_slice()),
            Err(NerError::InvalidModel(_))
        ));
    }
}
