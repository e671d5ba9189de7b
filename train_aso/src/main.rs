use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use greedy_ner::{read_conll, AsoParams, AsoTrainer, Language, TaggerConfig};

#[derive(Parser, Debug)]
#[command(about = "A program to train ASO models for the greedy NER tagger.")]
struct Args {
    /// A CoNLL-2003 formatted training corpus
    train_file: PathBuf,

    /// The file to write the trained ASO model to
    model_file: PathBuf,

    /// An unlabeled corpus, one token per line
    #[arg(long)]
    unlabeled: Option<PathBuf>,

    /// The maximum number of unlabeled documents to read (-1 means unlimited)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    max_unlabeled: i64,

    /// The number of auxiliary problems
    #[arg(long, default_value = "1000")]
    problems: usize,

    /// The number of ASO features
    #[arg(long, default_value = "50")]
    width: usize,

    /// The L2 regularization strength of the auxiliary classifiers
    #[arg(short, long, default_value = "1e-4")]
    reg: f64,

    /// The number of training epochs of the auxiliary classifiers
    #[arg(short = 'E', long, default_value = "5")]
    epochs: usize,

    /// The feature scheme: {rr09, word}
    #[arg(short = 'f', long, default_value = "rr09")]
    feature_scheme: String,

    /// The corpus language: {en, de}
    #[arg(short, long, default_value = "en")]
    lang: Language,

    /// Features occurring less often than this value are ignored
    #[arg(long, default_value = "1")]
    min_count: u32,

    /// Add the gold tag history of labeled sentences as features
    #[arg(long)]
    eph: bool,

    /// The seed of the example order
    #[arg(long)]
    seed: Option<u64>,

    /// Print the training progress
    #[arg(short, long)]
    verbose: bool,

    /// The number of workers for zstd (0 means multithreaded will be disabled)
    #[arg(long, default_value = "0")]
    zstd_workers: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    let config = TaggerConfig {
        scheme: args.feature_scheme,
        language: args.lang,
        use_eph: args.eph,
        minc: args.min_count,
    };
    let mut trainer = AsoTrainer::new(config)?;

    eprintln!("Loading {:?} ...", args.train_file);
    let f = BufReader::new(File::open(&args.train_file)?);
    for doc in read_conll(f, args.lang, None)? {
        for s in doc.sentences() {
            trainer.push_sentence(s)?;
        }
    }
    eprintln!("# of tokens: {}", trainer.n_instances());

    if let Some(path) = &args.unlabeled {
        eprintln!("Loading {path:?} ...");
        let max_documents = usize::try_from(args.max_unlabeled).ok();
        let f = BufReader::new(File::open(path)?);
        let docs = read_conll(f, args.lang, max_documents)?;
        eprintln!("# of unlabeled documents: {}", docs.len());
        for doc in &docs {
            for s in doc.sentences() {
                trainer.push_sentence(s)?;
            }
        }
        eprintln!("# of tokens: {}", trainer.n_instances());
    }
    eprintln!("# of distinct words: {}", trainer.n_words());

    eprintln!("Start training...");
    let params = AsoParams {
        n_problems: args.problems,
        width: args.width,
        reg: args.reg,
        epochs: args.epochs,
        seed: args.seed,
    };
    let aso = trainer.train(&params)?;
    eprintln!("Finish training.");

    let mut f = zstd::Encoder::new(File::create(args.model_file)?, 19)?;
    f.multithread(args.zstd_workers)?;
    aso.write(&mut f)?;
    f.finish()?;

    Ok(())
}
