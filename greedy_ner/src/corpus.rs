//! Reader and writer of CoNLL-2003 formatted corpora.

use std::io::{BufRead, Write};

use crate::errors::{NerError, Result};
use crate::sentence::{Document, Language, Sentence, Token};

const DOCSTART: &str = "-DOCSTART-";

fn parse_token(line: &str, line_no: usize, language: Language) -> Result<Token> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    let n_input = language.n_input_columns();
    if cols.len() == 1 {
        return Ok(Token {
            word: cols[0].to_string(),
            lemma: None,
            pos: None,
            chunk: None,
            tag: None,
            raw: line.to_string(),
        });
    }
    if cols.len() != n_input && cols.len() != n_input + 1 {
        return Err(NerError::corpus_format(
            line_no,
            format!(
                "expected {} or {} columns for language `{}`, found {}",
                n_input,
                n_input + 1,
                language,
                cols.len()
            ),
        ));
    }
    let (lemma, rest) = match language {
        Language::En => (None, &cols[1..]),
        Language::De => (Some(cols[1].to_string()), &cols[2..]),
    };
    Ok(Token {
        word: cols[0].to_string(),
        lemma,
        pos: Some(rest[0].to_string()),
        chunk: Some(rest[1].to_string()),
        tag: rest.get(2).map(|t| t.to_string()),
        raw: line.to_string(),
    })
}

/// Reads documents from a CoNLL-2003 formatted source.
///
/// A `-DOCSTART-` line starts a new document and blank lines end sentences. Input without any
/// `-DOCSTART-` line is read as a single document.
///
/// # Arguments
///
/// * `rdr` - A data source.
/// * `language` - The column layout of the source.
/// * `max_documents` - Stop after this many documents if given.
///
/// # Errors
///
/// [`NerError::CorpusFormat`] will be returned if a line has an unexpected number of columns.
/// When `rdr` generates an error, it will be returned as is.
pub fn read_conll<R>(rdr: R, language: Language, max_documents: Option<usize>) -> Result<Vec<Document>>
where
    R: BufRead,
{
    if max_documents == Some(0) {
        return Ok(vec![]);
    }
    let mut docs = vec![];
    let mut doc = Document::default();
    let mut tokens = vec![];
    for (i, line) in rdr.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.starts_with(DOCSTART) {
            if !tokens.is_empty() {
                doc.sentences.push(Sentence::new(std::mem::take(&mut tokens)));
            }
            if doc.header.is_some() || !doc.sentences.is_empty() {
                docs.push(std::mem::take(&mut doc));
                if max_documents.map_or(false, |max| docs.len() >= max) {
                    return Ok(docs);
                }
            }
            doc.header = Some(line.clone());
        } else if trimmed.is_empty() {
            if !tokens.is_empty() {
                doc.sentences.push(Sentence::new(std::mem::take(&mut tokens)));
            }
        } else {
            tokens.push(parse_token(&line, i + 1, language)?);
        }
    }
    if !tokens.is_empty() {
        doc.sentences.push(Sentence::new(tokens));
    }
    if doc.header.is_some() || !doc.sentences.is_empty() {
        docs.push(doc);
    }
    if let Some(max) = max_documents {
        docs.truncate(max);
    }
    Ok(docs)
}

/// Writes a document with one predicted tag appended to every token line.
///
/// # Arguments
///
/// * `wtr` - Byte-oriented sink object.
/// * `doc` - The document that was tagged.
/// * `predictions` - One tag sequence per sentence of `doc`.
///
/// # Errors
///
/// [`NerError::InvalidArgument`] will be returned if `predictions` does not match the shape of
/// `doc`. When `wtr` generates an error, it will be returned as is.
pub fn write_predictions<W, S>(mut wtr: W, doc: &Document, predictions: &[Vec<S>]) -> Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    if predictions.len() != doc.sentences.len() {
        return Err(NerError::invalid_argument(
            "predictions",
            "the number of sentences does not match",
        ));
    }
    if let Some(header) = &doc.header {
        writeln!(wtr, "{}", header)?;
        writeln!(wtr)?;
    }
    for (sentence, tags) in doc.sentences.iter().zip(predictions) {
        if sentence.len() != tags.len() {
            return Err(NerError::invalid_argument(
                "predictions",
                "the number of tags does not match the sentence length",
            ));
        }
        for (token, tag) in sentence.tokens.iter().zip(tags) {
            writeln!(wtr, "{} {}", token.raw, tag.as_ref())?;
        }
        writeln!(wtr)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EN_CORPUS: &str = "\
-DOCSTART- -X- O O

EU NNP I-NP I-ORG
rejects VBZ I-VP O
German JJ I-NP I-MISC

Peter NNP I-NP I-PER
Blackburn NNP I-NP I-PER

-DOCSTART- -X- O O

BRUSSELS NNP I-NP I-LOC
";

    #[test]
    fn test_read_conll_en() {
        let docs = read_conll(EN_CORPUS.as_bytes(), Language::En, None).unwrap();

        assert_eq!(2, docs.len());
        assert_eq!(Some("-DOCSTART- -X- O O"), docs[0].header());
        assert_eq!(2, docs[0].sentences().len());
        assert_eq!(5, docs[0].n_tokens());
        let t = &docs[0].sentences()[0].tokens()[1];
        assert_eq!("rejects", t.word());
        assert_eq!(Some("VBZ"), t.pos());
        assert_eq!(Some("I-VP"), t.chunk());
        assert_eq!(Some("O"), t.tag());
        assert_eq!(None, t.lemma());
        assert_eq!(1, docs[1].sentences().len());
    }

    #[test]
    fn test_read_conll_max_documents() {
        let docs = read_conll(EN_CORPUS.as_bytes(), Language::En, Some(1)).unwrap();

        assert_eq!(1, docs.len());
        assert_eq!(2, docs[0].sentences().len());
    }

    #[test]
    fn test_read_conll_max_documents_boundary() {
        let corpus = format!("{}\n-DOCSTART- -X- O O\n\nParis NNP I-NP I-LOC\n", EN_CORPUS);

        assert_eq!(3, read_conll(corpus.as_bytes(), Language::En, None).unwrap().len());
        assert!(read_conll(corpus.as_bytes(), Language::En, Some(0))
            .unwrap()
            .is_empty());
        assert_eq!(2, read_conll(corpus.as_bytes(), Language::En, Some(2)).unwrap().len());
        assert_eq!(3, read_conll(corpus.as_bytes(), Language::En, Some(3)).unwrap().len());
        assert_eq!(3, read_conll(corpus.as_bytes(), Language::En, Some(9)).unwrap().len());
    }

    #[test]
    fn test_read_conll_de() {
        let corpus = "Die die ART I-NC O\nEU EU NE I-NC I-ORG\n";
        let docs = read_conll(corpus.as_bytes(), Language::De, None).unwrap();

        assert_eq!(1, docs.len());
        assert_eq!(None, docs[0].header());
        let t = &docs[0].sentences()[0].tokens()[1];
        assert_eq!(Some("EU"), t.lemma());
        assert_eq!(Some("NE"), t.pos());
        assert_eq!(Some("I-ORG"), t.tag());
    }

    #[test]
    fn test_read_conll_unlabeled() {
        let corpus = "Peter NNP I-NP\nruns\n";
        let docs = read_conll(corpus.as_bytes(), Language::En, None).unwrap();

        let s = &docs[0].sentences()[0];
        assert_eq!(None, s.tokens()[0].tag());
        assert_eq!(None, s.tokens()[1].pos());
        assert!(!s.is_labeled());
    }

    #[test]
    fn test_read_conll_bad_columns() {
        let corpus = "EU NNP I-NP I-ORG\nbad line here now extra\n";
        let result = read_conll(corpus.as_bytes(), Language::En, None);

        assert_eq!(
            "CorpusFormatError: line 2: expected 3 or 4 columns for language `en`, found 5",
            result.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_write_predictions() {
        let docs = read_conll(EN_CORPUS.as_bytes(), Language::En, None).unwrap();
        let mut buf = vec![];
        write_predictions(
            &mut buf,
            &docs[1],
            &[vec!["B-LOC"]],
        )
        .unwrap();

        assert_eq!(
            "-DOCSTART- -X- O O\n\nBRUSSELS NNP I-NP I-LOC B-LOC\n\n",
            String::from_utf8(buf).unwrap()
        );
    }

    #[test]
    fn test_write_predictions_shape_mismatch() {
        let docs = read_conll(EN_CORPUS.as_bytes(), Language::En, None).unwrap();
        let result = write_predictions(&mut vec![], &docs[1], &[vec!["O", "O"]]);

        assert!(result.is_err());
    }
}
