//! credit-eval: synthetic data, batch scoring and accuracy reports for the
//! encrypted credit pipeline.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use credit_ckks::harness::{self, EncryptedEvaluator, Evaluator, ReferenceEvaluator, Report};
use credit_ckks::{
    CkksContext, CreditRecord, EncryptedCreditPipeline, EncryptedCreditRecord, KeyGenerator,
    SchemeParameters,
};

#[derive(Parser)]
#[command(name = "credit-eval")]
#[command(about = "Credit scoring over CKKS-encrypted inputs")]
#[command(version)]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a synthetic `Credit Score`,`DTI` table
    Generate {
        #[arg(long, default_value_t = 500)]
        rows: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value = "credit_evaluation_test_data.csv")]
        output: PathBuf,
    },

    /// Score every row of a table and append the result columns
    Evaluate {
        #[arg(long, default_value = "credit_evaluation_test_data.csv")]
        input: PathBuf,

        /// Defaults to overwriting the input table
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Mode::Both)]
        mode: Mode,

        /// Seed for key generation and encryption randomness
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, value_enum, default_value_t = RingDegree::N8192)]
        ring_degree: RingDegree,
    },

    /// Compare raw and encrypted columns of a scored table
    Report {
        #[arg(long, default_value = "credit_evaluation_test_data.csv")]
        input: PathBuf,
    },

    /// Score one applicant in plaintext and under encryption
    Demo {
        #[arg(long, default_value_t = 25)]
        age: u32,

        #[arg(long, default_value_t = 150_000_000)]
        salary: u64,

        #[arg(long, default_value_t = 800.0)]
        credit_score: f64,

        #[arg(long, default_value_t = 0.2)]
        dti: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, value_enum, default_value_t = RingDegree::N8192)]
        ring_degree: RingDegree,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Raw,
    Encrypted,
    Both,
}

/// Ring degrees the binary is built for. None of them reaches 128-bit
/// security for the pipeline's modulus chain.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RingDegree {
    #[value(name = "1024")]
    N1024,
    #[value(name = "4096")]
    N4096,
    #[value(name = "8192")]
    N8192,
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _dhat = dhat::Profiler::new_heap();

    let args = Args::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Generate { rows, seed, output } => {
            harness::generate_file(&output, rows, seed)
                .wrap_err_with(|| format!("writing {}", output.display()))?;
        }
        Command::Evaluate {
            input,
            output,
            mode,
            seed,
            ring_degree,
        } => {
            let output = output.unwrap_or_else(|| input.clone());
            match ring_degree {
                RingDegree::N1024 => evaluate::<1024>(&input, &output, mode, seed)?,
                RingDegree::N8192 => evaluate::<8192>(&input, &output, mode, seed)?,
                RingDegree::N4096 => evaluate::<4096>(&input, &output, mode, seed)?,
            }
        }
        Command::Report { input } => {
            let report = Report::from_path(&input)
                .wrap_err_with(|| format!("reading {}", input.display()))?;
            println!("{report}");
        }
        Command::Demo {
            age,
            salary,
            credit_score,
            dti,
            seed,
            ring_degree,
        } => {
            let record = CreditRecord::new(age, salary, credit_score, dti);
            match ring_degree {
                RingDegree::N1024 => demo::<1024>(&record, seed)?,
                RingDegree::N8192 => demo::<8192>(&record, seed)?,
                RingDegree::N4096 => demo::<4096>(&record, seed)?,
            }
        }
    }
    Ok(())
}

fn context<const DEGREE: usize>() -> Result<Arc<CkksContext<DEGREE>>> {
    warn!(
        degree = DEGREE,
        "ring degree too small for 128-bit security at this modulus size"
    );
    let params = SchemeParameters::<DEGREE>::credit_scoring()?;
    Ok(Arc::new(CkksContext::new(params)?))
}

fn evaluate<const DEGREE: usize>(
    input: &std::path::Path,
    output: &std::path::Path,
    mode: Mode,
    seed: u64,
) -> Result<()> {
    let reference = ReferenceEvaluator;
    let encrypted = match mode {
        Mode::Raw => None,
        Mode::Encrypted | Mode::Both => Some(EncryptedEvaluator::new(context::<DEGREE>()?, seed)?),
    };

    let mut evaluators: Vec<&dyn Evaluator> = Vec::new();
    if mode != Mode::Encrypted {
        evaluators.push(&reference);
    }
    if let Some(encrypted) = &encrypted {
        evaluators.push(encrypted);
    }

    let start = Instant::now();
    let summaries = harness::batch::run_file(input, output, &evaluators)
        .wrap_err_with(|| format!("scoring {}", input.display()))?;
    for summary in summaries {
        info!(
            mode = summary.mode.label(),
            rows = summary.rows,
            failures = summary.failures,
            "done"
        );
    }
    info!("Total time: {:.2?}", start.elapsed());
    Ok(())
}

fn demo<const DEGREE: usize>(record: &CreditRecord, seed: u64) -> Result<()> {
    let context = context::<DEGREE>()?;
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    // data owner
    let generator = KeyGenerator::new(Arc::clone(&context));
    let keys = generator.generate_key_pair(&mut rng)?;
    let evaluation_keys = Arc::new(generator.generate_evaluation_keys(&keys.secret, &mut rng)?);

    // evaluator
    let pipeline = EncryptedCreditPipeline::new(Arc::clone(&context), evaluation_keys)?;
    let encrypted = EncryptedCreditRecord::encrypt(
        record,
        pipeline.domain(),
        pipeline.engine(),
        &keys.public,
        &mut rng,
    )?;
    let start = Instant::now();
    let output = pipeline.evaluate(&encrypted)?;
    let elapsed = start.elapsed();

    // data owner
    let decrypted = pipeline.engine().decrypt(&output, &keys.secret)?;
    let reference = record.reference_score();

    println!("Reference score: {reference:.6}");
    println!("Encrypted score: {decrypted:.6}");
    println!("Absolute error:  {:.2e}", (decrypted - reference).abs());
    println!("Evaluation time: {elapsed:.2?}");
    Ok(())
}
