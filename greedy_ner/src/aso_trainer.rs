//! Learning of the ASO projection from auxiliary problems.
//!
//! Every auxiliary problem asks "is the current word `w`?" for one of the most frequent words
//! and is solved from the context features of the token only. The weight vectors of all problems
//! form a matrix `W`, and Θ spans its dominant left singular subspace.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::aso::AsoModel;
use crate::errors::{NerError, Result};
use crate::feature::{key_offset, scheme_by_name, FeatureScheme};
use crate::model::TaggerConfig;
use crate::sentence::Sentence;
use crate::vocabulary::{Indexer, TagSet};

const MIN_SCALE: f64 = 1e-9;
const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-12;
const CONVERGENCE: f64 = 1e-20;

/// Parameters of [`AsoTrainer::train`].
#[derive(Debug, Clone, PartialEq)]
pub struct AsoParams {
    /// Number of auxiliary problems.
    pub n_problems: usize,

    /// Number of ASO features, at most `n_problems`.
    pub width: usize,

    /// L2 regularization strength of the auxiliary classifiers, in `(0, 1)`.
    pub reg: f64,

    pub epochs: usize,

    /// Seed of the example order. A seed from the OS is used if `None`.
    pub seed: Option<u64>,
}

impl Default for AsoParams {
    fn default() -> Self {
        Self {
            n_problems: 1000,
            width: 50,
            reg: 1e-4,
            epochs: 5,
            seed: None,
        }
    }
}

impl AsoParams {
    fn validate(&self, n_words: usize) -> Result<()> {
        if self.width == 0 {
            return Err(NerError::invalid_argument("width", "must be at least 1"));
        }
        if self.width > self.n_problems {
            return Err(NerError::invalid_argument(
                "width",
                format!(
                    "must not exceed the number of problems ({})",
                    self.n_problems
                ),
            ));
        }
        if self.n_problems > n_words {
            return Err(NerError::invalid_argument(
                "n_problems",
                format!(
                    "must not exceed the number of distinct words ({})",
                    n_words
                ),
            ));
        }
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

struct AuxInstance {
    // Provisional ids of the context features.
    ids: Vec<usize>,
    word: usize,
}

/// Trainer of [`AsoModel`]s.
///
/// Labeled and unlabeled sentences may be mixed. Gold tags only contribute history features and
/// the tag set of the model.
#[cfg_attr(docsrs, doc(cfg(feature = "train")))]
pub struct AsoTrainer {
    config: TaggerConfig,
    scheme: &'static dyn FeatureScheme,
    feature_ids: Indexer<String>,
    words: Indexer<String>,
    tags: TagSet,
    instances: Vec<AuxInstance>,
    keys: Vec<String>,
}

impl AsoTrainer {
    /// Creates a new trainer.
    ///
    /// # Errors
    ///
    /// [`NerError::Configuration`] will be returned if the scheme is unknown.
    pub fn new(config: TaggerConfig) -> Result<Self> {
        let scheme = scheme_by_name(&config.scheme)?;
        Ok(Self {
            config,
            scheme,
            feature_ids: Indexer::new(),
            words: Indexer::new(),
            tags: TagSet::new(),
            instances: vec![],
            keys: vec![],
        })
    }

    /// Adds a labeled or unlabeled sentence.
    pub fn push_sentence(&mut self, s: &Sentence) -> Result<()> {
        let gold = s.gold_tags();
        if let Some(gold) = &gold {
            for tag in gold {
                self.tags.index(tag).ok_or_else(|| {
                    NerError::invalid_argument("s", format!("unknown tag `{}`", tag))
                })?;
            }
        }
        for position in 0..s.len() {
            self.keys.clear();
            self.scheme.fd(s, position, &mut self.keys);
            if self.config.use_eph {
                if let Some(gold) = &gold {
                    self.scheme.hd(&gold[..position], position, &mut self.keys);
                }
            }
            let mut ids = vec![];
            for key in &self.keys {
                let id = self.feature_ids.add(key.as_str());
                if key_offset(key) != Some(0) {
                    ids.push(id);
                }
            }
            let word = self.words.add(s.tokens[position].word.to_lowercase().as_str());
            self.instances.push(AuxInstance { ids, word });
        }
        Ok(())
    }

    pub fn n_instances(&self) -> usize {
        self.instances.len()
    }

    /// Number of distinct lower-cased words, the upper bound of auxiliary problems.
    pub fn n_words(&self) -> usize {
        self.words.len()
    }

    /// Learns Θ.
    ///
    /// # Errors
    ///
    /// [`NerError::InvalidArgument`] will be returned if a parameter is out of range or no token
    /// was added.
    pub fn train(self, params: &AsoParams) -> Result<AsoModel> {
        params.validate(self.words.len())?;
        if self.instances.is_empty() {
            return Err(NerError::invalid_argument(
                "sentences",
                "no training token was given",
            ));
        }

        let Self {
            config,
            feature_ids,
            words,
            tags,
            instances,
            ..
        } = self;

        // Most frequent words first; ties keep the first-occurrence order.
        let mut ranked: Vec<usize> = (0..words.len()).collect();
        ranked.sort_by(|&a, &b| words.counts()[b].cmp(&words.counts()[a]));
        let mut problem_of_word = vec![None; words.len()];
        for (p, &w) in ranked.iter().take(params.n_problems).enumerate() {
            problem_of_word[w] = Some(p);
        }

        let (vocabulary, remap) = feature_ids.build(config.minc)?;
        let examples: Vec<(Vec<usize>, Option<usize>)> = instances
            .iter()
            .map(|inst| {
                let mut ids: Vec<usize> = inst
                    .ids
                    .iter()
                    .filter_map(|&id| remap[id].map(|id| id as usize))
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                (ids, problem_of_word[inst.word])
            })
            .collect();
        log::info!(
            "# of instances: {}, # of features: {}, # of problems: {}",
            examples.len(),
            vocabulary.len(),
            params.n_problems,
        );

        let m = params.n_problems;
        let w = train_auxiliary(&examples, vocabulary.len(), m, params);

        let mut g = vec![0.0; m * m];
        for row in w.chunks(m) {
            for a in 0..m {
                if row[a] == 0.0 {
                    continue;
                }
                for b in 0..m {
                    g[a * m + b] += row[a] * row[b];
                }
            }
        }
        let pairs = top_eigenpairs(&mut g, m, params.width);
        for (k, (lambda, _)) in pairs.iter().enumerate() {
            log::debug!("singular value {}: {:.6}", k, lambda.max(0.0).sqrt());
        }

        let n_features = vocabulary.len();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(params.width);
        for (_, v) in &pairs {
            let mut u: Vec<f64> = w
                .chunks(m)
                .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
                .collect();
            for prev in &columns {
                let d = dot(&u, prev);
                for (x, y) in u.iter_mut().zip(prev) {
                    *x -= d * y;
                }
            }
            let norm = dot(&u, &u).sqrt();
            if norm > TOLERANCE {
                for x in &mut u {
                    *x /= norm;
                }
            } else {
                u.fill(0.0);
            }
            columns.push(u);
        }

        let mut theta = vec![0.0; n_features * params.width];
        for (k, u) in columns.iter().enumerate() {
            for (f, &x) in u.iter().enumerate() {
                theta[f * params.width + k] = x;
            }
        }
        AsoModel::new(config, vocabulary, tags, params.width, theta)
    }
}

/// Trains the binary classifiers of all auxiliary problems jointly.
///
/// Returns `W` stored feature-major: `w[f * n_problems + p]`.
fn train_auxiliary(
    examples: &[(Vec<usize>, Option<usize>)],
    n_features: usize,
    n_problems: usize,
    params: &AsoParams,
) -> Vec<f64> {
    let mut w = vec![0.0; n_features * n_problems];
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut order: Vec<usize> = (0..examples.len()).collect();

    let typw = (1.0 / params.reg.sqrt()).sqrt();
    let eta0 = typw;
    let mut t = 1.0 / (eta0 * params.reg);
    let mut wscale = 1.0;
    let mut scores = vec![0.0; n_problems];

    for epoch in 1..=params.epochs {
        order.shuffle(&mut rng);
        let mut loss = 0.0;
        for &i in &order {
            let (ids, target) = &examples[i];
            scores.fill(0.0);
            for &f in ids {
                for (s, x) in scores.iter_mut().zip(&w[f * n_problems..(f + 1) * n_problems]) {
                    *s += x;
                }
            }

            let eta = 1.0 / (params.reg * t);
            let scale = wscale;
            wscale *= 1.0 - eta * params.reg;
            for (p, &s) in scores.iter().enumerate() {
                let y = if *target == Some(p) { 1.0 } else { -1.0 };
                let margin = y * s * scale;
                if margin < 1.0 {
                    loss += 1.0 - margin;
                    let delta = eta * y / wscale;
                    for &f in ids {
                        w[f * n_problems + p] += delta;
                    }
                }
            }
            if wscale < MIN_SCALE {
                for x in &mut w {
                    *x *= wscale;
                }
                wscale = 1.0;
            }
            t += 1.0;
        }
        log::info!(
            "aux epoch {}: hinge loss = {:.6}",
            epoch,
            loss / examples.len() as f64
        );
    }
    for x in &mut w {
        *x *= wscale;
    }
    w
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Finds the `k` dominant eigenpairs of the symmetric `n × n` matrix `g` by power iteration
/// with deflation. `g` is deflated in place.
pub(crate) fn top_eigenpairs(g: &mut [f64], n: usize, k: usize) -> Vec<(f64, Vec<f64>)> {
    let mut pairs: Vec<(f64, Vec<f64>)> = Vec::with_capacity(k);
    let mut next = vec![0.0; n];
    for _ in 0..k {
        let mut v: Vec<f64> = (0..n).map(|i| 1.0 / (1.0 + i as f64)).collect();
        let norm = dot(&v, &v).sqrt();
        for x in &mut v {
            *x /= norm;
        }
        let mut lambda = 0.0;
        for _ in 0..MAX_ITERATIONS {
            for (i, y) in next.iter_mut().enumerate() {
                *y = dot(&g[i * n..(i + 1) * n], &v);
            }
            for (_, prev) in &pairs {
                let d = dot(&next, prev);
                for (x, y) in next.iter_mut().zip(prev) {
                    *x -= d * y;
                }
            }
            let norm = dot(&next, &next).sqrt();
            if norm < TOLERANCE {
                v.fill(0.0);
                lambda = 0.0;
                break;
            }
            for x in &mut next {
                *x /= norm;
            }
            let diff: f64 = next.iter().zip(&v).map(|(a, b)| (a - b) * (a - b)).sum();
            std::mem::swap(&mut v, &mut next);
            lambda = norm;
            if diff < CONVERGENCE {
                break;
            }
        }
        for i in 0..n {
            for j in 0..n {
                g[i * n + j] -= lambda * v[i] * v[j];
            }
        }
        pairs.push((lambda, v));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn test_power_iteration_known_matrix() {
        // Eigenvalues 3 and 1 with eigenvectors (1, 1) and (1, -1).
        let mut g = vec![2.0, 1.0, 1.0, 2.0];
        let pairs = top_eigenpairs(&mut g, 2, 2);

        assert_close(3.0, pairs[0].0);
        assert_close(1.0, pairs[1].0);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(s, pairs[0].1[0].abs());
        assert_close(s, pairs[0].1[1].abs());
        assert_close(0.0, dot(&pairs[0].1, &pairs[1].1));
    }

    #[test]
    fn test_power_iteration_diagonal() {
        let mut g = vec![1.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 2.0];
        let pairs = top_eigenpairs(&mut g, 3, 2);

        assert_close(5.0, pairs[0].0);
        assert_close(1.0, pairs[0].1[1].abs());
        assert_close(2.0, pairs[1].0);
        assert_close(1.0, pairs[1].1[2].abs());
    }

    fn corpus() -> Vec<Sentence> {
        [
            "the cat sat on the mat",
            "the dog sat on the rug",
            "a cat saw the dog",
            "the/O man/O saw/O a/O cat/O in/O Paris/B-LOC",
            "a dog ran in the park",
        ]
        .iter()
        .map(|s| Sentence::from_tagged(s))
        .collect()
    }

    fn params() -> AsoParams {
        AsoParams {
            n_problems: 4,
            width: 2,
            reg: 1e-3,
            epochs: 3,
            seed: Some(7),
        }
    }

    fn train_corpus(config: TaggerConfig, params: &AsoParams) -> AsoModel {
        let mut trainer = AsoTrainer::new(config).unwrap();
        for s in corpus() {
            trainer.push_sentence(&s).unwrap();
        }
        trainer.train(params).unwrap()
    }

    #[test]
    fn test_theta_shape() {
        let aso = train_corpus(TaggerConfig::default(), &params());

        assert_eq!(2, aso.width());
        assert_eq!(aso.vocabulary().len() * 2, aso.theta.len());
        assert_eq!(Some(0), aso.tags().get("O"));
        assert_eq!(Some(1), aso.tags().get("B-LOC"));
    }

    #[test]
    fn test_theta_columns_are_orthonormal() {
        let aso = train_corpus(TaggerConfig::default(), &params());
        let n = aso.vocabulary().len();
        let col = |k: usize| -> Vec<f64> { (0..n).map(|f| aso.theta[f * 2 + k]).collect() };
        let (a, b) = (col(0), col(1));

        assert_close(1.0, dot(&a, &a));
        assert_close(1.0, dot(&b, &b));
        assert_close(0.0, dot(&a, &b));
    }

    #[test]
    fn test_current_word_features_are_not_projected() {
        let aso = train_corpus(TaggerConfig::default(), &params());
        let fid = aso.vocabulary().get("w[0]=cat").unwrap();

        assert!(aso.row(fid).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_training_with_seed_is_deterministic() {
        let a = train_corpus(TaggerConfig::default(), &params());
        let b = train_corpus(TaggerConfig::default(), &params());

        assert_eq!(a, b);
    }

    #[test]
    fn test_eph_history_features() {
        let config = TaggerConfig {
            use_eph: true,
            ..TaggerConfig::default()
        };
        let aso = train_corpus(config, &params());

        assert!(aso.config().use_eph);
        assert!(aso.vocabulary().get("t[-1]=O").is_some());
    }

    #[test]
    fn test_invalid_params() {
        for p in [
            AsoParams {
                width: 0,
                ..params()
            },
            AsoParams {
                width: 5,
                ..params()
            },
            AsoParams {
                n_problems: 1000,
                ..params()
            },
            AsoParams {
                reg: 0.0,
                ..params()
            },
            AsoParams {
                epochs: 0,
                ..params()
            },
        ] {
            let mut trainer = AsoTrainer::new(TaggerConfig::default()).unwrap();
            for s in corpus() {
                trainer.push_sentence(&s).unwrap();
            }
            assert!(matches!(
                trainer.train(&p),
                Err(NerError::InvalidArgument(_))
            ));
        }
    }
}
