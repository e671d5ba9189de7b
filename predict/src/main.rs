use std::fs::File;
use std::io::{prelude::*, stdout, BufReader, BufWriter};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::Parser;
use greedy_ner::{read_conll, write_predictions, Document, GreedyTagger, Model};

#[derive(Parser, Debug)]
#[command(about = "A program to tag named entities with a greedy NER model.")]
struct Args {
    /// The model file to use when tagging
    model_file: PathBuf,

    /// A CoNLL-2003 formatted corpus to tag
    test_file: PathBuf,

    /// The file to write the predictions to (`-` means stdout)
    pred_file: String,

    /// Number of threads
    #[arg(long, default_value = "1")]
    n_threads: usize,

    /// Print the progress
    #[arg(short, long)]
    verbose: bool,
}

fn tag_documents<'a>(
    tagger: &'a GreedyTagger,
    docs: &[Document],
    n_threads: usize,
) -> Result<Vec<Vec<Vec<&'a str>>>, Box<dyn std::error::Error>> {
    if n_threads <= 1 || docs.len() <= 1 {
        return Ok(docs.iter().map(|doc| tagger.tag_document(doc)).collect());
    }
    let chunk_size = docs.len().div_ceil(n_threads);
    thread::scope(|scope| -> Result<_, Box<dyn std::error::Error>> {
        let handles: Vec<_> = docs
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|doc| tagger.tag_document(doc))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut predictions = Vec::with_capacity(docs.len());
        for handle in handles {
            predictions.extend(handle.join().map_err(|_| "a worker thread panicked")?);
        }
        Ok(predictions)
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    eprintln!("Loading model file...");
    let mut f = zstd::Decoder::new(File::open(args.model_file)?)?;
    let model = Model::read(&mut f)?;
    let tagger = GreedyTagger::new(model)?;
    log::info!(
        "# of features: {}, # of tags: {}, eph: {}, aso: {}",
        tagger.model().n_features(),
        tagger.model().tags().len(),
        tagger.model().config().use_eph,
        tagger.model().use_aso(),
    );

    let f = BufReader::new(File::open(args.test_file)?);
    let docs = read_conll(f, tagger.model().config().language, None)?;

    eprintln!("Start tagging");
    let start = Instant::now();
    let predictions = tag_documents(&tagger, &docs, args.n_threads)?;
    let duration = start.elapsed();

    let mut out: Box<dyn Write> = if args.pred_file == "-" {
        Box::new(BufWriter::new(stdout().lock()))
    } else {
        Box::new(BufWriter::new(File::create(&args.pred_file)?))
    };
    for (doc, preds) in docs.iter().zip(&predictions) {
        write_predictions(&mut out, doc, preds)?;
    }
    out.flush()?;

    let n_tokens: usize = docs.iter().map(Document::n_tokens).sum();
    eprintln!("Elapsed: {} [sec]", duration.as_secs_f64());
    eprintln!(
        "Speed: {} [tokens/sec]",
        n_tokens as f64 / duration.as_secs_f64()
    );

    Ok(())
}
