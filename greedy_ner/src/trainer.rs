//! Online training of the greedy tagger.

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::aso::AsoModel;
use crate::errors::{NerError, Result};
use crate::feature::{scheme_by_name, FeatureScheme};
use crate::model::{argmax, FeatureVector, Model, TaggerConfig, WeightMatrix};
use crate::sentence::Sentence;
use crate::tagger::Featurizer;
use crate::vocabulary::{Indexer, TagSet};

/// The weight scale is folded into the weights when it falls below this value.
const MIN_SCALE: f64 = 1e-9;

/// Source of the tag history while training.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// The trainer's own greedy predictions, as seen at inference time.
    #[default]
    Predicted,

    /// The gold tags.
    Gold,
}

/// Parameters of [`Trainer::train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainParams {
    /// L2 regularization strength, in `(0, 1)`.
    pub reg: f64,

    /// Number of passes over the training data.
    pub epochs: usize,

    /// Reorders the sentences before every epoch.
    pub shuffle: bool,

    /// Seed of the shuffling order. A seed from the OS is used if `None`.
    pub seed: Option<u64>,

    pub history: HistoryPolicy,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            reg: 1e-5,
            epochs: 100,
            shuffle: false,
            seed: None,
            history: HistoryPolicy::Predicted,
        }
    }
}

impl TrainParams {
    fn validate(&self) -> Result<()> {
        if !(self.reg > 0.0 && self.reg < 1.0) {
            return Err(NerError::invalid_argument(
                "reg",
                format!("must be in (0, 1), got {}", self.reg),
            ));
        }
        if self.epochs == 0 {
            return Err(NerError::invalid_argument("epochs", "must be at least 1"));
        }
        Ok(())
    }
}

/// Statistics of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub n_tokens: usize,
    pub mistakes: usize,

    /// Greedy accuracy on the training data, measured before each update.
    pub accuracy: f64,

    /// `½·reg·‖w‖²` at the end of the epoch.
    pub reg_term: f64,

    pub elapsed: Duration,
}

/// Diagnostics of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub n_sentences: usize,
    pub n_instances: usize,
    pub n_features: usize,
    pub n_tags: usize,

    /// Average number of non-zero features per instance in the first epoch.
    pub avg_nnz: f64,

    pub epochs: Vec<EpochStats>,
}

struct Instance {
    // Provisional ids of the static features.
    ids: Vec<usize>,
    aso: Vec<f64>,
    gold: usize,
}

/// Trainer of the greedy tagger.
///
/// # Examples
///
/// ```
/// use greedy_ner::{GreedyTagger, Sentence, TaggerConfig, TrainParams, Trainer};
///
/// let config = TaggerConfig {
///     use_eph: true,
///     ..TaggerConfig::default()
/// };
/// let mut trainer = Trainer::new(config, None).unwrap();
/// trainer
///     .push_sentence(&Sentence::from_tagged("Peter/B-PER lives/O in/O Berlin/B-LOC"))
///     .unwrap();
///
/// let params = TrainParams {
///     epochs: 5,
///     ..TrainParams::default()
/// };
/// let (model, report) = trainer.train(&params).unwrap();
/// assert_eq!(4, report.n_instances);
///
/// let tagger = GreedyTagger::new(model).unwrap();
/// assert_eq!(4, tagger.tag(&Sentence::from_tagged("Anna lives in Paris")).len());
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "train")))]
pub struct Trainer {
    config: TaggerConfig,
    scheme: &'static dyn FeatureScheme,
    aso: Option<Arc<AsoModel>>,
    feature_ids: Indexer<String>,
    tags: TagSet,
    instances: Vec<Instance>,
    sentences: Vec<Range<usize>>,
    keys: Vec<String>,
}

impl Trainer {
    /// Creates a new trainer.
    ///
    /// # Arguments
    ///
    /// * `config` - Settings of the tagger to train.
    /// * `aso` - An ASO model to bind, if any.
    ///
    /// # Errors
    ///
    /// [`NerError::Configuration`] will be returned if the scheme is unknown or the ASO model was
    /// trained with different settings.
    pub fn new(config: TaggerConfig, aso: Option<Arc<AsoModel>>) -> Result<Self> {
        let scheme = scheme_by_name(&config.scheme)?;
        if let Some(aso) = &aso {
            aso.check_compatible(&config)?;
        }
        Ok(Self {
            config,
            scheme,
            aso,
            feature_ids: Indexer::new(),
            tags: TagSet::new(),
            instances: vec![],
            sentences: vec![],
            keys: vec![],
        })
    }

    /// Adds a sentence to the dataset.
    ///
    /// History features are counted from the gold tags.
    ///
    /// # Errors
    ///
    /// [`NerError::InvalidArgument`] will be returned if a token has no gold tag.
    pub fn push_sentence(&mut self, s: &Sentence) -> Result<()> {
        let gold = s.gold_tags().ok_or_else(|| {
            NerError::invalid_argument("s", "every training token must carry a gold tag")
        })?;
        let start = self.instances.len();
        for position in 0..s.len() {
            self.keys.clear();
            self.scheme.fd(s, position, &mut self.keys);
            let ids = self
                .keys
                .iter()
                .map(|k| self.feature_ids.add(k.as_str()))
                .collect();
            let mut aso = vec![];
            if let Some(model) = &self.aso {
                aso.resize(model.width(), 0.0);
                model.project(self.keys.iter().map(String::as_str), &mut aso);
            }
            if self.config.use_eph {
                self.keys.clear();
                self.scheme.hd(&gold[..position], position, &mut self.keys);
                for k in &self.keys {
                    self.feature_ids.add(k.as_str());
                }
            }
            let tag = self.tags.index(gold[position]).ok_or_else(|| {
                NerError::invalid_argument("s", format!("unknown tag `{}`", gold[position]))
            })?;
            self.instances.push(Instance { ids, aso, gold: tag });
        }
        self.sentences.push(start..self.instances.len());
        Ok(())
    }

    /// Number of distinct raw features seen so far, before count filtering.
    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn n_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn n_sentences(&self) -> usize {
        self.sentences.len()
    }

    /// Trains the weights.
    ///
    /// # Returns
    ///
    /// A trained model and the diagnostics of the run.
    ///
    /// # Errors
    ///
    /// [`NerError::InvalidArgument`] will be returned if a parameter is out of range or no
    /// training token was added.
    pub fn train(self, params: &TrainParams) -> Result<(Model, TrainingReport)> {
        params.validate()?;
        if self.instances.is_empty() {
            return Err(NerError::invalid_argument(
                "sentences",
                "no training token was given",
            ));
        }

        let Self {
            config,
            scheme,
            aso,
            feature_ids,
            mut tags,
            instances,
            sentences,
            mut keys,
        } = self;

        let (vocabulary, remap) = feature_ids.build(config.minc)?;
        tags.freeze();
        let aso_width = aso.as_ref().map_or(0, |m| m.width());
        let mut weights = WeightMatrix::new(vocabulary.len(), aso_width, tags.len());
        log::info!(
            "# of sentences: {}, # of instances: {}, # of features: {} (+{} ASO), # of tags: {}",
            sentences.len(),
            instances.len(),
            vocabulary.len(),
            aso_width,
            tags.len(),
        );

        let statics: Vec<FeatureVector> = instances
            .iter()
            .map(|inst| {
                let mut x = FeatureVector {
                    ids: inst.ids.iter().filter_map(|&id| remap[id]).collect(),
                    aso: inst.aso.clone(),
                };
                x.normalize();
                x
            })
            .collect();

        let featurizer = Featurizer {
            scheme,
            vocabulary: &vocabulary,
            aso: aso.as_deref(),
            use_eph: config.use_eph,
        };

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..sentences.len()).collect();

        let typw = (1.0 / params.reg.sqrt()).sqrt();
        let eta0 = typw;
        let mut t = 1.0 / (eta0 * params.reg);
        let mut wscale = 1.0;

        let mut report = TrainingReport {
            n_sentences: sentences.len(),
            n_instances: instances.len(),
            n_features: weights.width(),
            n_tags: tags.len(),
            ..TrainingReport::default()
        };
        let mut x = FeatureVector::new();
        let mut scores = vec![0.0; tags.len()];
        let mut history: Vec<&str> = vec![];

        for epoch in 1..=params.epochs {
            let start = Instant::now();
            if params.shuffle {
                order.shuffle(&mut rng);
            }
            let mut mistakes = 0;
            let mut total_nnz = 0;
            for &si in &order {
                history.clear();
                for (position, i) in sentences[si].clone().enumerate() {
                    x.clear();
                    x.ids.extend_from_slice(&statics[i].ids);
                    x.aso.extend_from_slice(&statics[i].aso);
                    featurizer.history_features(&history, position, &mut keys, &mut x);
                    x.normalize();
                    total_nnz += x.nnz();

                    weights.scores(&x, &mut scores);
                    let pred = argmax(&scores);
                    let gold = instances[i].gold;

                    let eta = 1.0 / (params.reg * t);
                    wscale *= 1.0 - eta * params.reg;
                    if pred != gold {
                        mistakes += 1;
                        weights.add(&x, gold, eta / wscale);
                        weights.add(&x, pred, -eta / wscale);
                    }
                    if wscale < MIN_SCALE {
                        weights.scale(wscale);
                        wscale = 1.0;
                    }
                    t += 1.0;

                    let next = match params.history {
                        HistoryPolicy::Predicted => pred,
                        HistoryPolicy::Gold => gold,
                    };
                    history.push(tags.name(next));
                }
            }

            let n_tokens = instances.len();
            if epoch == 1 {
                report.avg_nnz = total_nnz as f64 / n_tokens as f64;
            }
            let stats = EpochStats {
                epoch,
                n_tokens,
                mistakes,
                accuracy: (n_tokens - mistakes) as f64 / n_tokens as f64,
                reg_term: 0.5 * params.reg * weights.squared_norm() * wscale * wscale,
                elapsed: start.elapsed(),
            };
            log::info!(
                "epoch {}: mistakes = {}, accuracy = {:.4}, reg = {:.6}, {:.2?}",
                stats.epoch,
                stats.mistakes,
                stats.accuracy,
                stats.reg_term,
                stats.elapsed,
            );
            report.epochs.push(stats);
        }
        weights.scale(wscale);

        let model = Model {
            config,
            vocabulary,
            tags,
            weights,
            aso,
        };
        Ok((model, report))
    }
}
