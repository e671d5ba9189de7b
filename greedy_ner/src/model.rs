use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use bincode::{Decode, Encode};

use crate::aso::AsoModel;
use crate::errors::{NerError, Result};
use crate::feature::DEFAULT_SCHEME;
use crate::sentence::Language;
use crate::vocabulary::{TagSet, Vocabulary};

/// Settings shared by a tagger and the ASO model it may be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TaggerConfig {
    /// Name of the registered feature scheme.
    pub scheme: String,

    /// Corpus language.
    pub language: Language,

    /// Uses the tags predicted earlier in the sentence as features.
    pub use_eph: bool,

    /// Minimum number of occurrences for a feature to be indexed.
    pub minc: u32,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            language: Language::En,
            use_eph: false,
            minc: 1,
        }
    }
}

/// Features of one token at decision time.
///
/// `ids` are binary features of the base vocabulary. `aso` is the dense ASO block, which
/// occupies the indices right after the base vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    pub(crate) ids: Vec<u32>,
    pub(crate) aso: Vec<f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.aso.clear();
    }

    /// Sorts the binary features and removes duplicates.
    pub(crate) fn normalize(&mut self) {
        self.ids.sort_unstable();
        self.ids.dedup();
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn aso(&self) -> &[f64] {
        &self.aso
    }

    /// Number of non-zero features.
    pub fn nnz(&self) -> usize {
        self.ids.len() + self.aso.iter().filter(|&&v| v != 0.0).count()
    }
}

// Weights are ordered as follows:
//
//      feat1 feat2 feat3 ...
//
// tag1   1     5     9
// tag2   2     6     .
// tag3   3     7     .
// ...    4     8     .
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct WeightMatrix {
    n_tags: usize,
    base_width: usize,
    weights: Vec<f64>,
}

impl WeightMatrix {
    /// Creates a zero matrix for `base_width + aso_width` features and `n_tags` tags.
    pub fn new(base_width: usize, aso_width: usize, n_tags: usize) -> Self {
        Self {
            n_tags,
            base_width,
            weights: vec![0.0; (base_width + aso_width) * n_tags],
        }
    }

    pub fn n_tags(&self) -> usize {
        self.n_tags
    }

    /// Total number of features, including the ASO block.
    pub fn width(&self) -> usize {
        if self.n_tags == 0 {
            0
        } else {
            self.weights.len() / self.n_tags
        }
    }

    /// Number of features of the base vocabulary.
    pub fn base_width(&self) -> usize {
        self.base_width
    }

    #[inline(always)]
    fn column(&self, fid: usize) -> &[f64] {
        &self.weights[fid * self.n_tags..(fid + 1) * self.n_tags]
    }

    #[inline(always)]
    fn column_mut(&mut self, fid: usize) -> &mut [f64] {
        &mut self.weights[fid * self.n_tags..(fid + 1) * self.n_tags]
    }

    pub fn weight(&self, fid: usize, tag: usize) -> f64 {
        self.weights[fid * self.n_tags + tag]
    }

    /// Writes the score of every tag for `x` into `scores`.
    pub fn scores(&self, x: &FeatureVector, scores: &mut [f64]) {
        let scores = &mut scores[..self.n_tags];
        scores.fill(0.0);
        for &fid in &x.ids {
            for (y, w) in scores.iter_mut().zip(self.column(fid as usize)) {
                *y += w;
            }
        }
        for (k, &v) in x.aso.iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            for (y, w) in scores.iter_mut().zip(self.column(self.base_width + k)) {
                *y += v * w;
            }
        }
    }

    /// Adds `delta * x` to the weights of `tag`.
    pub fn add(&mut self, x: &FeatureVector, tag: usize, delta: f64) {
        for &fid in &x.ids {
            self.column_mut(fid as usize)[tag] += delta;
        }
        let base_width = self.base_width;
        for (k, &v) in x.aso.iter().enumerate() {
            if v != 0.0 {
                self.column_mut(base_width + k)[tag] += delta * v;
            }
        }
    }

    /// Multiplies all weights by `s`.
    pub fn scale(&mut self, s: f64) {
        for w in &mut self.weights {
            *w *= s;
        }
    }

    pub fn squared_norm(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum()
    }

    pub fn nnz(&self) -> usize {
        self.weights.iter().filter(|&&w| w != 0.0).count()
    }
}

/// Index of the greatest score. Ties go to the lowest index.
#[inline(always)]
pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

/// Tagger model: configuration, indices, weights and the optional bound ASO model.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Model {
    pub(crate) config: TaggerConfig,
    pub(crate) vocabulary: Vocabulary,
    pub(crate) tags: TagSet,
    pub(crate) weights: WeightMatrix,
    pub(crate) aso: Option<Arc<AsoModel>>,
}

impl Model {
    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn weights(&self) -> &WeightMatrix {
        &self.weights
    }

    pub fn aso(&self) -> Option<&AsoModel> {
        self.aso.as_deref()
    }

    pub fn use_aso(&self) -> bool {
        self.aso.is_some()
    }

    /// Width of the feature space: the vocabulary plus the ASO block.
    pub fn n_features(&self) -> usize {
        self.vocabulary.len() + self.aso.as_ref().map_or(0, |aso| aso.width())
    }

    fn validate(&self) -> Result<()> {
        if self.weights.n_tags() != self.tags.len()
            || self.weights.base_width() != self.vocabulary.len()
            || self.weights.width() != self.n_features()
        {
            return Err(NerError::invalid_model(
                "the weight matrix does not match the vocabulary and the tag set",
            ));
        }
        if let Some(aso) = &self.aso {
            aso.validate()?;
            aso.check_compatible(&self.config)?;
        }
        Ok(())
    }

    /// Exports the model data.
    ///
    /// # Arguments
    ///
    /// * `wtr` - Byte-oriented sink object.
    ///
    /// # Errors
    ///
    /// When `wtr` generates an error, it will be returned as is.
    pub fn write<W>(&self, wtr: &mut W) -> Result<()>
    where
        W: Write,
    {
        bincode::encode_into_std_write(self, wtr, bincode::config::standard())?;
        Ok(())
    }

    /// Creates a model from a reader.
    ///
    /// # Arguments
    ///
    /// * `rdr` - A data source.
    ///
    /// # Returns
    ///
    /// A model data read from `rdr`.
    ///
    /// # Errors
    ///
    /// When `rdr` generates an error, it will be returned as is. If the decoded parts are
    /// inconsistent, [`NerError::InvalidModel`] will be returned.
    pub fn read<R>(rdr: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let model: Self = bincode::decode_from_std_read(rdr, bincode::config::standard())?;
        model.validate()?;
        Ok(model)
    }

    fn feature_name(&self, fid: usize) -> String {
        let base_width = self.vocabulary.len();
        if fid < base_width {
            self.vocabulary.keys()[fid].clone()
        } else {
            format!("aso[{}]", fid - base_width)
        }
    }

    /// Summarizes the model: the most frequent features and the largest weights of each tag.
    pub fn describe(&self, k: usize) -> ModelSummary {
        let mut frequent: Vec<(String, u32)> = self
            .vocabulary
            .keys()
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), self.vocabulary.count(i as u32).unwrap_or(0)))
            .collect();
        frequent.sort_by(|a, b| b.1.cmp(&a.1));
        frequent.truncate(k);

        let width = self.weights.width();
        let top_weights = self
            .tags
            .names()
            .iter()
            .enumerate()
            .map(|(tag, name)| {
                let mut ws: Vec<(usize, f64)> = (0..width)
                    .map(|fid| (fid, self.weights.weight(fid, tag)))
                    .filter(|&(_, w)| w != 0.0)
                    .collect();
                ws.sort_by(|a, b| b.1.total_cmp(&a.1));
                ws.truncate(k);
                let ws = ws
                    .into_iter()
                    .map(|(fid, w)| (self.feature_name(fid), w))
                    .collect();
                (name.clone(), ws)
            })
            .collect();

        ModelSummary {
            n_features: width,
            n_tags: self.tags.len(),
            nnz_weights: self.weights.nnz(),
            use_eph: self.config.use_eph,
            use_aso: self.use_aso(),
            frequent,
            top_weights,
        }
    }
}

/// Term-frequency and weight summary of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub n_features: usize,
    pub n_tags: usize,
    pub nnz_weights: usize,
    pub use_eph: bool,
    pub use_aso: bool,

    /// Most frequent features with their corpus counts.
    pub frequent: Vec<(String, u32)>,

    /// Largest weights of each tag.
    pub top_weights: Vec<(String, Vec<(String, f64)>)>,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "# of features: {}, # of tags: {}, non-zero weights: {}, eph: {}, aso: {}",
            self.n_features, self.n_tags, self.nnz_weights, self.use_eph, self.use_aso
        )?;
        writeln!(f, "Most frequent features:")?;
        for (key, count) in &self.frequent {
            writeln!(f, "\t{}\t{}", count, key)?;
        }
        for (tag, weights) in &self.top_weights {
            writeln!(f, "Top features of {}:", tag)?;
            for (key, w) in weights {
                writeln!(f, "\t{:.4}\t{}", w, key)?;
            }
        }
        Ok(())
    }
}
