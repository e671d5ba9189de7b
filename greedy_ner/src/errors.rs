//! Definition of errors.

use std::error::Error;
use std::fmt;

pub type Result<T, E = NerError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum NerError {
    Configuration(ConfigurationError),
    InvalidArgument(InvalidArgumentError),
    CorpusFormat(CorpusFormatError),
    InvalidModel(InvalidModelError),
    CastError(std::num::TryFromIntError),
    DecodeError(bincode::error::DecodeError),
    EncodeError(bincode::error::EncodeError),
    IOError(std::io::Error),
}

impl NerError {
    pub(crate) fn configuration<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Configuration(ConfigurationError { msg: msg.into() })
    }

    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn corpus_format<S>(line: usize, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::CorpusFormat(CorpusFormatError {
            line,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_model<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidModel(InvalidModelError { msg: msg.into() })
    }
}

impl fmt::Display for NerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Configuration(e) => e.fmt(f),
            Self::InvalidArgument(e) => e.fmt(f),
            Self::CorpusFormat(e) => e.fmt(f),
            Self::InvalidModel(e) => e.fmt(f),
            Self::CastError(e) => e.fmt(f),
            Self::DecodeError(e) => e.fmt(f),
            Self::EncodeError(e) => e.fmt(f),
            Self::IOError(e) => e.fmt(f),
        }
    }
}

impl Error for NerError {}

/// Error used when the tagger configuration is inconsistent, e.g. an unknown feature scheme or
/// an ASO model trained with different settings.
#[derive(Debug)]
pub struct ConfigurationError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConfigurationError: {}", self.msg)
    }
}

impl Error for ConfigurationError {}

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when a corpus line cannot be parsed.
#[derive(Debug)]
pub struct CorpusFormatError {
    /// 1-based line number in the input.
    pub(crate) line: usize,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for CorpusFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CorpusFormatError: line {}: {}", self.line, self.msg)
    }
}

impl Error for CorpusFormatError {}

/// Error used when the model is invalid.
#[derive(Debug)]
pub struct InvalidModelError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidModelError: {}", self.msg)
    }
}

impl Error for InvalidModelError {}

impl From<std::num::TryFromIntError> for NerError {
    fn from(error: std::num::TryFromIntError) -> Self {
        Self::CastError(error)
    }
}

impl From<bincode::error::DecodeError> for NerError {
    fn from(error: bincode::error::DecodeError) -> Self {
        Self::DecodeError(error)
    }
}

impl From<bincode::error::EncodeError> for NerError {
    fn from(error: bincode::error::EncodeError) -> Self {
        Self::EncodeError(error)
    }
}

impl From<std::io::Error> for NerError {
    fn from(error: std::io::Error) -> Self {
        Self::IOError(error)
    }
}
