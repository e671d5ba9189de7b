#![cfg_attr(docsrs, feature(doc_cfg))]

//! # greedy_ner
//!
//! A greedy left-to-right named-entity tagger. Each token is classified by a linear model whose
//! features include the tags already predicted in the same sentence (extended prediction
//! history, EPH) and, optionally, a dense block projected by an ASO model.
//!
//! ## Examples
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::{stdin, BufReader};
//!
//! use greedy_ner::{read_conll, GreedyTagger, Language, Model};
//!
//! let mut f = BufReader::new(File::open("model.bin").unwrap());
//! let model = Model::read(&mut f).unwrap();
//! let tagger = GreedyTagger::new(model).unwrap();
//!
//! for doc in read_conll(stdin().lock(), Language::En, None).unwrap() {
//!     for s in doc.sentences() {
//!         println!("{:?}", tagger.tag(s));
//!     }
//! }
//! ```
//!
//! Training requires **crate feature** `train`. For more details, see [`Trainer`] and
//! [`AsoTrainer`].

pub mod errors;
pub mod feature;

mod aso;
mod corpus;
mod model;
mod sentence;
mod tagger;
mod vocabulary;

#[cfg(feature = "train")]
mod aso_trainer;
#[cfg(feature = "train")]
mod trainer;

pub use aso::AsoModel;
pub use corpus::{read_conll, write_predictions};
pub use model::{FeatureVector, Model, ModelSummary, TaggerConfig, WeightMatrix};
pub use sentence::{Document, Language, Sentence, Token};
pub use tagger::{DecodeState, Decoding, GreedyTagger, TagHistory};
pub use vocabulary::{TagSet, Vocabulary};

#[cfg(feature = "train")]
pub use aso_trainer::{AsoParams, AsoTrainer};
#[cfg(feature = "train")]
pub use trainer::{EpochStats, HistoryPolicy, TrainParams, Trainer, TrainingReport};
