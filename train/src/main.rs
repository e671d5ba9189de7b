use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use greedy_ner::{
    read_conll, AsoModel, HistoryPolicy, Language, TaggerConfig, TrainParams, Trainer,
};

#[derive(Parser, Debug)]
#[command(about = "A program to train greedy NER models.")]
struct Args {
    /// A CoNLL-2003 formatted training corpus
    train_file: PathBuf,

    /// The file to write the trained model to
    model_file: PathBuf,

    /// Print the training progress
    #[arg(short, long)]
    verbose: bool,

    /// The feature scheme: {rr09, word}
    #[arg(short = 'f', long, default_value = "rr09")]
    feature_scheme: String,

    /// The L2 regularization strength
    #[arg(short, long, default_value = "1e-5")]
    reg: f64,

    /// The number of training epochs
    #[arg(short = 'E', long, default_value = "100")]
    epochs: usize,

    /// Features occurring less often than this value are ignored
    #[arg(long, default_value = "1")]
    min_count: u32,

    /// The corpus language: {en, de}
    #[arg(short, long, default_value = "en")]
    lang: Language,

    /// Shuffle the sentences before every epoch
    #[arg(long)]
    shuffle: bool,

    /// The seed of the shuffling order
    #[arg(long)]
    seed: Option<u64>,

    /// Print the model summary after training
    #[arg(long)]
    stats: bool,

    /// Use the tags predicted earlier in the sentence as features
    #[arg(long)]
    eph: bool,

    /// Feed the gold tags instead of the predicted ones as history while training
    #[arg(long)]
    gold_history: bool,

    /// An ASO model whose features are added to every token
    #[arg(long)]
    aso: Option<PathBuf>,

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

    let aso = if let Some(path) = &args.aso {
        eprintln!("Loading {path:?} ...");
        let mut f = zstd::Decoder::new(File::open(path)?)?;
        Some(Arc::new(AsoModel::read(&mut f)?))
    } else {
        None
    };

    let config = TaggerConfig {
        scheme: args.feature_scheme,
        language: args.lang,
        use_eph: args.eph,
        minc: args.min_count,
    };
    let mut trainer = Trainer::new(config, aso)?;

    eprintln!("Loading {:?} ...", args.train_file);
    let f = BufReader::new(File::open(&args.train_file)?);
    let docs = read_conll(f, args.lang, None)?;
    eprintln!("# of documents: {}", docs.len());

    eprintln!("Extracting into features...");
    for doc in &docs {
        for s in doc.sentences() {
            trainer.push_sentence(s)?;
        }
    }
    eprintln!(
        "# of sentences: {}, # of tokens: {}, # of features: {}",
        trainer.n_sentences(),
        trainer.n_instances(),
        trainer.n_features()
    );

    eprintln!("Start training...");
    let params = TrainParams {
        reg: args.reg,
        epochs: args.epochs,
        shuffle: args.shuffle,
        seed: args.seed,
        history: if args.gold_history {
            HistoryPolicy::Gold
        } else {
            HistoryPolicy::Predicted
        },
    };
    let (model, report) = trainer.train(&params)?;
    eprintln!("Finish training.");

    if args.stats {
        eprintln!(
            "# of instances: {}, average # of active features: {:.2}",
            report.n_instances, report.avg_nnz
        );
        for stats in &report.epochs {
            eprintln!(
                "epoch {}: accuracy = {:.4} ({}/{}), reg = {:.6}, {:.2?}",
                stats.epoch,
                stats.accuracy,
                stats.n_tokens - stats.mistakes,
                stats.n_tokens,
                stats.reg_term,
                stats.elapsed,
            );
        }
        eprint!("{}", model.describe(20));
    }

    let mut f = zstd::Encoder::new(File::create(args.model_file)?, 19)?;
    f.multithread(args.zstd_workers)?;
    model.write(&mut f)?;
    f.finish()?;

    Ok(())
}
