//! Feature extraction schemes.
//!
//! Every key produced by a scheme has the form `name[offset]=value`, where `offset` is the
//! position relative to the current token, e.g. `w[-1]=the` or `t[-2,-1]=O|B-PER`. Keys without
//! an offset (such as `bias`) do not belong to any position.

use std::fmt;

use crate::errors::{NerError, Result};
use crate::sentence::Sentence;

/// Marker for positions before the start of a sentence.
pub const BOS: &str = "<s>";

/// Marker for positions after the end of a sentence.
pub const EOS: &str = "</s>";

/// A pair of feature extraction functions.
///
/// Both functions must be pure: the same input always yields the same keys, in the same order.
pub trait FeatureScheme: Send + Sync {
    /// Registered name of the scheme.
    fn name(&self) -> &'static str;

    /// Pushes the structural features of the token at `position` into `out`.
    fn fd(&self, sentence: &Sentence, position: usize, out: &mut Vec<String>);

    /// Pushes the features of the tags assigned before `position` into `out`.
    ///
    /// `history` holds exactly the tags of positions `0..position`.
    fn hd(&self, history: &[&str], position: usize, out: &mut Vec<String>);
}

impl fmt::Debug for dyn FeatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FeatureScheme({})", self.name())
    }
}

static SCHEMES: &[&dyn FeatureScheme] = &[&Rr09Scheme, &WordScheme];

/// Name of the scheme used when none is given.
pub const DEFAULT_SCHEME: &str = "rr09";

/// Resolves a registered scheme by name.
///
/// # Errors
///
/// [`NerError::Configuration`] will be returned if no scheme has the given name.
pub fn scheme_by_name(name: &str) -> Result<&'static dyn FeatureScheme> {
    SCHEMES
        .iter()
        .copied()
        .find(|s| s.name() == name)
        .ok_or_else(|| {
            NerError::configuration(format!(
                "unknown feature scheme `{}` (available: {})",
                name,
                scheme_names().join(", ")
            ))
        })
}

/// Names of all registered schemes.
pub fn scheme_names() -> Vec<&'static str> {
    SCHEMES.iter().map(|s| s.name()).collect()
}

/// Returns the relative position encoded in a feature key.
///
/// For keys spanning several positions, the first one is returned.
///
/// # Examples
///
/// ```
/// use greedy_ner::feature::key_offset;
///
/// assert_eq!(Some(-1), key_offset("w[-1]=the"));
/// assert_eq!(Some(0), key_offset("suf3[0]=ris"));
/// assert_eq!(Some(-2), key_offset("t[-2,-1]=O|O"));
/// assert_eq!(None, key_offset("bias"));
/// ```
pub fn key_offset(key: &str) -> Option<isize> {
    let open = key.find('[')?;
    let close = open + key[open..].find(']')?;
    let inner = &key[open + 1..close];
    inner.split(',').next()?.parse().ok()
}

fn word_at(sentence: &Sentence, position: usize, offset: isize) -> &str {
    let i = position as isize + offset;
    if i < 0 {
        BOS
    } else if i as usize >= sentence.len() {
        EOS
    } else {
        &sentence.tokens[i as usize].word
    }
}

fn tag_at<'a>(history: &[&'a str], position: usize, offset: usize) -> &'a str {
    if offset > position {
        BOS
    } else {
        history[position - offset]
    }
}

/// Word shape with runs of the same character class collapsed, e.g. `McDonald's` -> `XxXx'x`.
pub(crate) fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    let mut last = None;
    for c in word.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if last != Some(class) {
            shape.push(class);
            last = Some(class);
        }
    }
    shape
}

/// Features in the style of Ratinov and Roth (2009): a word window, affixes, shapes and
/// orthographic flags, plus the syntactic columns when the corpus provides them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rr09Scheme;

impl FeatureScheme for Rr09Scheme {
    fn name(&self) -> &'static str {
        "rr09"
    }

    fn fd(&self, sentence: &Sentence, position: usize, out: &mut Vec<String>) {
        let token = &sentence.tokens[position];
        let word = token.word.as_str();

        out.push("bias".to_string());
        for offset in -2..=2 {
            let w = word_at(sentence, position, offset).to_lowercase();
            out.push(format!("w[{}]={}", offset, w));
        }
        for offset in -1..=1 {
            let w = word_at(sentence, position, offset);
            let shape = if w == BOS || w == EOS {
                w.to_string()
            } else {
                word_shape(w)
            };
            out.push(format!("shape[{}]={}", offset, shape));
        }

        let chars: Vec<char> = word.chars().collect();
        for n in 1..=4 {
            if chars.len() > n {
                let prefix: String = chars[..n].iter().collect();
                let suffix: String = chars[chars.len() - n..].iter().collect();
                out.push(format!("pre{}[0]={}", n, prefix.to_lowercase()));
                out.push(format!("suf{}[0]={}", n, suffix.to_lowercase()));
            }
        }

        if chars.first().map_or(false, |c| c.is_uppercase()) {
            out.push("initcap[0]=1".to_string());
            if position == 0 {
                out.push("initcap_first[0]=1".to_string());
            }
        }
        if chars.iter().all(|c| c.is_uppercase()) {
            out.push("allcaps[0]=1".to_string());
        }
        if chars.iter().any(|c| c.is_numeric()) {
            out.push("hasdigit[0]=1".to_string());
            if chars.iter().all(|c| c.is_numeric()) {
                out.push("alldigit[0]=1".to_string());
            }
        }
        if chars.contains(&'-') {
            out.push("hyphen[0]=1".to_string());
        }
        if position == 0 {
            out.push("first[0]=1".to_string());
        }

        for offset in -1..=1isize {
            let i = position as isize + offset;
            if i < 0 || i as usize >= sentence.len() {
                continue;
            }
            if let Some(pos) = sentence.tokens[i as usize].pos() {
                out.push(format!("pos[{}]={}", offset, pos));
            }
        }
        if let Some(chunk) = token.chunk() {
            out.push(format!("chunk[0]={}", chunk));
        }
        if let Some(lemma) = token.lemma() {
            out.push(format!("lemma[0]={}", lemma.to_lowercase()));
        }
    }

    fn hd(&self, history: &[&str], position: usize, out: &mut Vec<String>) {
        let t1 = tag_at(history, position, 1);
        let t2 = tag_at(history, position, 2);
        out.push(format!("t[-1]={}", t1));
        out.push(format!("t[-2]={}", t2));
        out.push(format!("t[-2,-1]={}|{}", t2, t1));
    }
}

/// Only the current word and the previous tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordScheme;

impl FeatureScheme for WordScheme {
    fn name(&self) -> &'static str {
        "word"
    }

    fn fd(&self, sentence: &Sentence, position: usize, out: &mut Vec<String>) {
        out.push(format!("w[0]={}", sentence.tokens[position].word));
    }

    fn hd(&self, history: &[&str], position: usize, out: &mut Vec<String>) {
        out.push(format!("t[-1]={}", tag_at(history, position, 1)));
    }
}
