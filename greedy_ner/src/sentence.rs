use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};

/// Corpus language. It decides the column layout of the input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Language {
    /// English: `word pos chunk [tag]`.
    En,

    /// German: `word lemma pos chunk [tag]`.
    De,
}

impl Language {
    /// Number of annotation columns before the NER tag.
    pub(crate) const fn n_input_columns(self) -> usize {
        match self {
            Self::En => 3,
            Self::De => 4,
        }
    }
}

impl FromStr for Language {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "de" => Ok(Self::De),
            _ => Err("Unsupported language. Use `en` or `de`."),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::En => write!(f, "en"),
            Self::De => write!(f, "de"),
        }
    }
}

/// A token with its input annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub(crate) word: String,
    pub(crate) lemma: Option<String>,
    pub(crate) pos: Option<String>,
    pub(crate) chunk: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) raw: String,
}

impl Token {
    /// Creates a bare token without annotations.
    ///
    /// # Arguments
    ///
    /// * `word` - A surface string.
    /// * `tag` - The gold tag, if known.
    ///
    /// # Returns
    ///
    /// A new token. Its raw line is the word itself.
    pub fn new<S>(word: S, tag: Option<&str>) -> Self
    where
        S: Into<String>,
    {
        let word = word.into();
        Self {
            raw: word.clone(),
            word,
            lemma: None,
            pos: None,
            chunk: None,
            tag: tag.map(|t| t.to_string()),
        }
    }

    /// Sets the part-of-speech and chunk columns.
    pub fn with_syntax<S>(mut self, pos: S, chunk: S) -> Self
    where
        S: Into<String>,
    {
        self.pos = Some(pos.into());
        self.chunk = Some(chunk.into());
        self
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn lemma(&self) -> Option<&str> {
        self.lemma.as_deref()
    }

    pub fn pos(&self) -> Option<&str> {
        self.pos.as_deref()
    }

    pub fn chunk(&self) -> Option<&str> {
        self.chunk.as_deref()
    }

    /// Gold tag of the token.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The line this token was read from.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Sentence, the unit of greedy decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub(crate) tokens: Vec<Token>,
}

impl Sentence {
    /// Creates a new sentence from tokens.
    pub const fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Creates a sentence from `word/TAG` pairs separated by whitespace.
    ///
    /// # Arguments
    ///
    /// * `text` - A string such as `"John/B-PER lives/O in/O Berlin/B-LOC"`. A pair without a
    ///            slash gives a token without a gold tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use greedy_ner::Sentence;
    ///
    /// let s = Sentence::from_tagged("John/B-PER runs/O");
    /// assert_eq!(2, s.len());
    /// assert_eq!(Some("B-PER"), s.tokens()[0].tag());
    /// ```
    pub fn from_tagged(text: &str) -> Self {
        let tokens = text
            .split_whitespace()
            .map(|pair| match pair.rsplit_once('/') {
                Some((word, tag)) if !word.is_empty() => Token::new(word, Some(tag)),
                _ => Token::new(pair, None),
            })
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns `true` if every token carries a gold tag.
    pub fn is_labeled(&self) -> bool {
        self.tokens.iter().all(|t| t.tag.is_some())
    }

    /// Gold tags of the sentence, or `None` if some token is unlabeled.
    pub fn gold_tags(&self) -> Option<Vec<&str>> {
        self.tokens.iter().map(|t| t.tag()).collect()
    }
}

/// Document: a sequence of sentences, optionally introduced by a `-DOCSTART-` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub(crate) header: Option<String>,
    pub(crate) sentences: Vec<Sentence>,
}

impl Document {
    pub const fn new(header: Option<String>, sentences: Vec<Sentence>) -> Self {
        Self { header, sentences }
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn n_tokens(&self) -> usize {
        self.sentences.iter().map(Sentence::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_str() {
        assert_eq!(Ok(Language::En), "en".parse());
        assert_eq!(Ok(Language::De), "de".parse());
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_sentence_from_tagged() {
        let s = Sentence::from_tagged("New/B-LOC York/I-LOC is/O big");

        assert_eq!(4, s.len());
        assert_eq!("York", s.tokens()[1].word());
        assert_eq!(Some("I-LOC"), s.tokens()[1].tag());
        assert_eq!(None, s.tokens()[3].tag());
        assert!(!s.is_labeled());
        assert_eq!(None, s.gold_tags());
    }

    #[test]
    fn test_sentence_gold_tags() {
        let s = Sentence::from_tagged("a/O b/B-ORG");

        assert!(s.is_labeled());
        assert_eq!(Some(vec!["O", "B-ORG"]), s.gold_tags());
    }

    #[test]
    fn test_sentence_from_tagged_empty() {
        let s = Sentence::from_tagged("");

        assert!(s.is_empty());
        assert!(s.is_labeled());
    }
}
