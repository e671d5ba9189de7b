//! Alternating Structural Optimization (ASO) projection.

use std::io::{Read, Write};

use bincode::{Decode, Encode};

use crate::errors::{NerError, Result};
use crate::model::TaggerConfig;
use crate::vocabulary::{TagSet, Vocabulary};

/// A trained ASO model.
///
/// The projection matrix Θ has one row of `width` reals per feature of the model's own
/// vocabulary. Projecting a token sums the rows of its features into a dense block that is
/// appended to the token's ordinary features.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct AsoModel {
    pub(crate) config: TaggerConfig,
    pub(crate) vocabulary: Vocabulary,
    pub(crate) tags: TagSet,
    pub(crate) width: usize,

    // theta[fid * width + k]
    pub(crate) theta: Vec<f64>,
}

impl AsoModel {
    /// Creates a new ASO model.
    ///
    /// # Arguments
    ///
    /// * `config` - The settings Θ was learned with.
    /// * `vocabulary` - The ASO model's own vocabulary.
    /// * `tags` - The tag set seen while learning Θ. May be empty.
    /// * `width` - The number of ASO features.
    /// * `theta` - Row-major `|vocabulary| × width` projection matrix.
    ///
    /// # Errors
    ///
    /// If `width` is zero or the size of `theta` is inconsistent, an error variant will be
    /// returned.
    pub fn new(
        config: TaggerConfig,
        mut vocabulary: Vocabulary,
        mut tags: TagSet,
        width: usize,
        theta: Vec<f64>,
    ) -> Result<Self> {
        if width == 0 {
            return Err(NerError::invalid_argument("width", "must be at least 1"));
        }
        if theta.len() != vocabulary.len() * width {
            return Err(NerError::invalid_argument(
                "theta",
                format!(
                    "expected {} values, got {}",
                    vocabulary.len() * width,
                    theta.len()
                ),
            ));
        }
        vocabulary.freeze();
        tags.freeze();
        Ok(Self {
            config,
            vocabulary,
            tags,
            width,
            theta,
        })
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Number of ASO features added to every token.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Θ row of the ASO feature `fid`.
    pub fn row(&self, fid: u32) -> &[f64] {
        let start = fid as usize * self.width;
        &self.theta[start..start + self.width]
    }

    /// Adds the projection of `keys` into `out`.
    ///
    /// Keys unknown to the ASO vocabulary contribute nothing.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`AsoModel::width`].
    pub fn project<'a, I>(&self, keys: I, out: &mut [f64])
    where
        I: IntoIterator<Item = &'a str>,
    {
        let out = &mut out[..self.width];
        for key in keys {
            if let Some(fid) = self.vocabulary.get(key) {
                for (y, w) in out.iter_mut().zip(self.row(fid)) {
                    *y += w;
                }
            }
        }
    }

    /// Checks that a tagger with `config` may be bound to this model.
    ///
    /// # Errors
    ///
    /// [`NerError::Configuration`] will be returned if the language, the EPH flag or the feature
    /// scheme differ.
    pub fn check_compatible(&self, config: &TaggerConfig) -> Result<()> {
        if config.use_eph != self.config.use_eph {
            return Err(NerError::configuration(format!(
                "use_eph of the tagger ({}) differs from the ASO model ({})",
                config.use_eph, self.config.use_eph
            )));
        }
        if config.language != self.config.language {
            return Err(NerError::configuration(format!(
                "language of the tagger ({}) differs from the ASO model ({})",
                config.language, self.config.language
            )));
        }
        if config.scheme != self.config.scheme {
            return Err(NerError::configuration(format!(
                "feature scheme of the tagger ({}) differs from the ASO model ({})",
                config.scheme, self.config.scheme
            )));
        }
        Ok(())
    }

    /// Exports the model data.
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
    /// # Errors
    ///
    /// When `rdr` generates an error, it will be returned as is. If the size of Θ does not
    /// match the vocabulary, [`NerError::InvalidModel`] will be returned.
    pub fn read<R>(rdr: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let model: Self = bincode::decode_from_std_read(rdr, bincode::config::standard())?;
        model.validate()?;
        Ok(model)
    }

    /// Θ must hold exactly one row of `width` reals per vocabulary entry.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.theta.len() != self.vocabulary.len() * self.width {
            return Err(NerError::invalid_model("inconsistent size of the ASO matrix"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sentence::Language;

    fn toy_aso(config: TaggerConfig) -> AsoModel {
        let mut vocab = Vocabulary::new();
        vocab.index("w[-1]=in");
        vocab.index("w[1]=said");
        AsoModel::new(
            config,
            vocab,
            TagSet::new(),
            2,
            vec![0.5, -1.0, 0.25, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_project() {
        let aso = toy_aso(TaggerConfig::default());
        let mut out = vec![0.0; 2];
        aso.project(["w[-1]=in", "unknown", "w[1]=said"], &mut out);

        assert_eq!(vec![0.75, 1.0], out);
    }

    #[test]
    fn test_project_accumulates() {
        let aso = toy_aso(TaggerConfig::default());
        let mut out = vec![1.0, 1.0];
        aso.project(["w[1]=said"], &mut out);

        assert_eq!(vec![1.25, 3.0], out);
    }

    #[test]
    fn test_new_invalid_theta() {
        let mut vocab = Vocabulary::new();
        vocab.index("a");
        let result = AsoModel::new(TaggerConfig::default(), vocab, TagSet::new(), 2, vec![1.0]);

        assert!(result.is_err());
    }

    #[test]
    fn test_check_compatible() {
        let config = TaggerConfig {
            use_eph: true,
            ..TaggerConfig::default()
        };
        let aso = toy_aso(config.clone());

        assert!(aso.check_compatible(&config).is_ok());

        let result = aso.check_compatible(&TaggerConfig {
            use_eph: false,
            ..config.clone()
        });
        assert!(matches!(result, Err(NerError::Configuration(_))));

        let result = aso.check_compatible(&TaggerConfig {
            language: Language::De,
            ..config.clone()
        });
        assert!(matches!(result, Err(NerError::Configuration(_))));

        let result = aso.check_compatible(&TaggerConfig {
            scheme: "word".to_string(),
            ..config
        });
        assert!(matches!(result, Err(NerError::Configuration(_))));
    }

    #[test]
    fn test_write_read() {
        let aso = toy_aso(TaggerConfig::default());
        let mut buf = vec![];
        aso.write(&mut buf).unwrap();
        let restored = AsoModel::read(&mut buf.as_slice()).unwrap();

        assert_eq!(aso, restored);
        assert!(restored.vocabulary().is_frozen());
    }

    #[test]
    fn test_read_inconsistent_theta() {
        let mut aso = toy_aso(TaggerConfig::default());
        aso.theta.pop();
        let mut buf = vec![];
        aso.write(&mut buf).unwrap();

        assert!(matches!(
            AsoModel::read(&mut buf.as_slice()),
            Err(NerError::InvalidModel(_))
        ));
    }
}
