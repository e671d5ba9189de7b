use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use greedy_ner::{read_conll, GreedyTagger, Model};

#[derive(Parser, Debug)]
#[command(about = "A program to evaluate the accuracy of greedy NER models.")]
struct Args {
    /// The model file to evaluate
    model_file: PathBuf,

    /// A labeled CoNLL-2003 formatted corpus
    test_file: PathBuf,
}

/// Entity spans `(start, end, type)` of an IOB tag sequence.
///
/// An `I-X` tag that does not continue an `X` entity opens a new one.
fn entities<S>(tags: &[S]) -> Vec<(usize, usize, String)>
where
    S: AsRef<str>,
{
    let mut result = vec![];
    let mut current: Option<(usize, &str)> = None;
    for (i, tag) in tags.iter().enumerate() {
        let (prefix, ty) = tag.as_ref().split_once('-').unwrap_or(("O", ""));
        let continues = prefix == "I" && matches!(current, Some((_, t)) if t == ty);
        if continues {
            continue;
        }
        if let Some((start, t)) = current.take() {
            result.push((start, i, t.to_string()));
        }
        if prefix == "B" || prefix == "I" {
            current = Some((i, ty));
        }
    }
    if let Some((start, t)) = current {
        result.push((start, tags.len(), t.to_string()));
    }
    result
}

#[derive(Debug, Default)]
struct Counts {
    correct: usize,
    predicted: usize,
    gold: usize,
}

impl Counts {
    fn scores(&self) -> (f64, f64, f64) {
        let precision = if self.predicted == 0 {
            0.0
        } else {
            self.correct as f64 / self.predicted as f64
        };
        let recall = if self.gold == 0 {
            0.0
        } else {
            self.correct as f64 / self.gold as f64
        };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        (precision, recall, f1)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    eprintln!("Loading model file...");
    let mut f = zstd::Decoder::new(File::open(args.model_file)?)?;
    let model = Model::read(&mut f)?;
    let tagger = GreedyTagger::new(model)?;

    let f = BufReader::new(File::open(args.test_file)?);
    let docs = read_conll(f, tagger.model().config().language, None)?;

    eprintln!("Start tagging");
    let mut n_tokens = 0;
    let mut n_correct = 0;
    let mut total = Counts::default();
    let mut by_type: BTreeMap<String, Counts> = BTreeMap::new();
    for doc in &docs {
        for s in doc.sentences() {
            let gold = s
                .gold_tags()
                .ok_or("the evaluation corpus must carry a gold tag on every token")?;
            let pred = tagger.tag(s);
            n_tokens += gold.len();
            n_correct += gold.iter().zip(&pred).filter(|(g, p)| g == p).count();

            let gold_entities = entities(&gold);
            let pred_entities = entities(&pred);
            for (_, _, ty) in &gold_entities {
                total.gold += 1;
                by_type.entry(ty.clone()).or_default().gold += 1;
            }
            for e in &pred_entities {
                total.predicted += 1;
                let counts = by_type.entry(e.2.clone()).or_default();
                counts.predicted += 1;
                if gold_entities.contains(e) {
                    total.correct += 1;
                    counts.correct += 1;
                }
            }
        }
    }

    println!(
        "Accuracy: {:.4} ({}/{})",
        n_correct as f64 / n_tokens.max(1) as f64,
        n_correct,
        n_tokens
    );
    let (precision, recall, f1) = total.scores();
    println!(
        "Entities: precision = {:.4}, recall = {:.4}, F1 = {:.4} ({} correct, {} predicted, {} gold)",
        precision, recall, f1, total.correct, total.predicted, total.gold
    );
    for (ty, counts) in &by_type {
        let (precision, recall, f1) = counts.scores();
        println!(
            "{:>8}: precision = {:.4}, recall = {:.4}, F1 = {:.4}",
            ty, precision, recall, f1
        );
    }

    Ok(())
}
