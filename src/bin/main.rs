//! RSKM Command Line Interface
//!
//! Drives kernel-machine prediction on synthetic data, decodes one-vs-rest
//! outputs and reports extreme eigenvalues of generated Gram matrices.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use rskm::core::{KernelMachineConfig, MachineError, Parallelism, Result, SparseFeatures};
use rskm::eigsolver::{DenseMatrixOperator, DirectEigenSolver, EigenSolver};
use rskm::kernel::{shared_kernel, GaussianKernel, Kernel, LinearKernel};
use rskm::machine::KernelMachine;
use rskm::multiclass::{
    MulticlassStrategy, OneVsRestStrategy, ProbHeuristic, ThresholdRejectionStrategy,
};
use serde::Serialize;
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "rskm")]
#[command(about = "Kernel machine prediction, multiclass decoding and eigen solving")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score synthetic query vectors with a kernel machine
    Apply(ApplyArgs),
    /// Decode one set of per-class outputs with one-vs-rest
    Decide(DecideArgs),
    /// Extreme eigenvalues of a generated Gram matrix
    Eigen(EigenArgs),
}

#[derive(Args)]
struct ApplyArgs {
    /// Number of training (support) vectors
    #[arg(long, default_value = "200")]
    train: usize,

    /// Number of query vectors
    #[arg(long, default_value = "1000")]
    queries: usize,

    /// Feature dimension
    #[arg(long, default_value = "16")]
    dim: usize,

    /// Kernel function
    #[arg(short, long, default_value = "linear")]
    kernel: CliKernel,

    /// Gaussian kernel width (defaults to 1 / dim)
    #[arg(long)]
    gamma: Option<f64>,

    /// Evaluation path
    #[arg(short, long, default_value = "auto")]
    path: CliPath,

    /// Worker threads (0 uses the global pool, 1 runs sequentially)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Bias term of the synthetic model
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    bias: f64,

    /// Print every output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
enum CliKernel {
    /// K(x, y) = x^T y
    #[value(name = "linear")]
    Linear,
    /// K(x, y) = exp(-gamma ||x - y||²)
    #[value(name = "gaussian")]
    Gaussian,
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
enum CliPath {
    /// Batch evaluation when the kernel offers it
    #[value(name = "auto")]
    Auto,
    /// Weighted kernel sum per query
    #[value(name = "per-example")]
    PerExample,
    /// Folded normal vector per query (linear kernel only)
    #[value(name = "linadd")]
    Linadd,
}

#[derive(Args)]
struct DecideArgs {
    /// Per-class outputs, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    outputs: Vec<f64>,

    /// Probability heuristic applied before deciding
    #[arg(long, default_value = "none")]
    heuristic: CliHeuristic,

    /// Sigmoid slope per class for softmax rescaling
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    sigmoid_a: Vec<f64>,

    /// Sigmoid offset per class for softmax rescaling
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    sigmoid_b: Vec<f64>,

    /// Reject when no output exceeds this threshold
    #[arg(long, allow_hyphen_values = true)]
    reject_below: Option<f64>,

    /// Number of ranked classes to report
    #[arg(long, default_value = "1")]
    top: usize,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliHeuristic {
    #[value(name = "none")]
    None,
    /// Divide by the output sum
    #[value(name = "norm")]
    Norm,
    /// Sigmoid exponentials, then normalise
    #[value(name = "softmax")]
    Softmax,
}

impl From<CliHeuristic> for ProbHeuristic {
    fn from(cli_heuristic: CliHeuristic) -> Self {
        match cli_heuristic {
            CliHeuristic::None => ProbHeuristic::None,
            CliHeuristic::Norm => ProbHeuristic::OvaNorm,
            CliHeuristic::Softmax => ProbHeuristic::OvaSoftmax,
        }
    }
}

#[derive(Args)]
struct EigenArgs {
    /// Number of generated points (matrix dimension)
    #[arg(short = 'n', long, default_value = "8")]
    size: usize,

    /// Dimension of the generated points
    #[arg(long, default_value = "3")]
    dim: usize,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ApplyReport {
    kernel: CliKernel,
    path: CliPath,
    threads: usize,
    num_outputs: usize,
    elapsed_ms: f64,
    outputs: Vec<f64>,
}

#[derive(Serialize)]
struct DecideReport {
    label: i32,
    ranked: Vec<usize>,
    outputs: Vec<f64>,
}

#[derive(Serialize)]
struct EigenReport {
    dimension: usize,
    min_eigenvalue: f64,
    max_eigenvalue: f64,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Apply(args) => apply_command(args),
        Commands::Decide(args) => decide_command(args),
        Commands::Eigen(args) => eigen_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn apply_command(args: ApplyArgs) -> Result<()> {
    if args.dim == 0 {
        return Err(MachineError::InvalidParameter(
            "Feature dimension must be positive".to_string(),
        ));
    }
    info!(
        "Scoring {} queries against {} support vectors (dim {})",
        args.queries, args.train, args.dim
    );

    let train = Arc::new(synthetic_features(args.train, args.dim, 0.0));
    let queries = Arc::new(synthetic_features(args.queries, args.dim, 1.3));

    let kernel = match args.kernel {
        CliKernel::Linear => shared_kernel(bind(LinearKernel::new(), &train)?),
        CliKernel::Gaussian => {
            let gamma = args.gamma.unwrap_or(1.0 / args.dim as f64);
            if gamma <= 0.0 {
                return Err(MachineError::InvalidParameter(format!(
                    "Gamma must be positive, got: {gamma}"
                )));
            }
            shared_kernel(bind(GaussianKernel::new(gamma), &train)?)
        }
    };

    let alphas = (0..args.train).map(|i| (i as f64 * 0.91).sin()).collect();
    let support_vectors = (0..args.train).collect();
    let config = KernelMachineConfig::default()
        .with_batch_computation(matches!(args.path, CliPath::Auto));
    let machine = KernelMachine::with_model(kernel, alphas, support_vectors, args.bias)?
        .with_config(config)
        .with_parallelism(
            Parallelism::with_threads(args.threads)
                .with_progress(log::log_enabled!(log::Level::Debug)),
        );

    if matches!(args.path, CliPath::Linadd) {
        machine.init_kernel_optimization()?;
    }

    let start = Instant::now();
    let outputs = machine.apply_get_outputs(Some(queries))?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("Computed {} outputs in {elapsed_ms:.3} ms", outputs.len());

    if args.json {
        let report = ApplyReport {
            kernel: args.kernel,
            path: args.path,
            threads: args.threads,
            num_outputs: outputs.len(),
            elapsed_ms,
            outputs,
        };
        print_json(&report)?;
        return Ok(());
    }

    let positives = outputs.iter().filter(|&&o| o >= 0.0).count();
    let mean = outputs.iter().sum::<f64>() / outputs.len().max(1) as f64;
    println!("=== Kernel Machine Outputs ===");
    println!("Kernel: {:?}", args.kernel);
    println!("Path: {:?}", args.path);
    println!("Outputs: {}", outputs.len());
    println!("Positive: {positives}");
    println!("Mean output: {mean:.6}");
    println!("Elapsed: {elapsed_ms:.3} ms");
    Ok(())
}

fn decide_command(args: DecideArgs) -> Result<()> {
    let num_classes = args.outputs.len();
    let mut strategy = OneVsRestStrategy::with_num_classes(num_classes)
        .with_prob_heuristic(args.heuristic.into());
    if let Some(threshold) = args.reject_below {
        strategy.set_rejection_strategy(Some(Arc::new(ThresholdRejectionStrategy::new(threshold))));
    }

    let mut outputs = args.outputs;
    match args.heuristic {
        CliHeuristic::Softmax => {
            strategy.rescale_outputs_with_sigmoid(&mut outputs, &args.sigmoid_a, &args.sigmoid_b)?
        }
        _ => strategy.rescale_outputs(&mut outputs)?,
    }

    let report = DecideReport {
        label: strategy.decide_label(&outputs),
        ranked: strategy.decide_label_multiple_output(&outputs, args.top),
        outputs,
    };

    if args.json {
        return print_json(&report);
    }

    println!("Label: {}", report.label);
    println!("Ranked: {:?}", report.ranked);
    println!("Outputs: {:?}", report.outputs);
    Ok(())
}

fn eigen_command(args: EigenArgs) -> Result<()> {
    let points = synthetic_features(args.size, args.dim, 0.5);
    let mut gram = LinearKernel::new();
    let points = Arc::new(points);
    gram.init(Arc::clone(&points), points)?;

    let n = args.size;
    let values: Vec<f64> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| gram.kernel(i, j))
        .collect();
    let operator = DenseMatrixOperator::from_row_slice(n, &values)?;

    let mut solver = DirectEigenSolver::new(Arc::new(operator));
    solver.compute()?;

    let report = EigenReport {
        dimension: n,
        min_eigenvalue: solver.min_eigenvalue(),
        max_eigenvalue: solver.max_eigenvalue(),
    };

    if args.json {
        return print_json(&report);
    }

    println!("=== Gram Matrix Eigenvalues ===");
    println!("Dimension: {}", report.dimension);
    println!("Min eigenvalue: {:.6}", report.min_eigenvalue);
    println!("Max eigenvalue: {:.6}", report.max_eigenvalue);
    Ok(())
}

fn bind<K: Kernel>(mut kernel: K, train: &Arc<SparseFeatures>) -> Result<K> {
    kernel.init(Arc::clone(train), Arc::clone(train))?;
    Ok(kernel)
}

/// Deterministic sparse rows; small entries are dropped
fn synthetic_features(rows: usize, dim: usize, phase: f64) -> SparseFeatures {
    let rows: Vec<Vec<f64>> = (0..rows)
        .map(|i| {
            (0..dim)
                .map(|j| {
                    let v = ((i * dim + j) as f64 * 0.37 + phase).sin();
                    if v.abs() < 0.2 {
                        0.0
                    } else {
                        v
                    }
                })
                .collect()
        })
        .collect();
    SparseFeatures::from_dense_rows(&rows)
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| MachineError::InvalidParameter(format!("Cannot encode report: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_features_are_deterministic() {
        let a = synthetic_features(4, 3, 0.0);
        let b = synthetic_features(4, 3, 0.0);
        assert_eq!(a, b);
        assert_eq!(a.vectors().len(), 4);
        assert!(a.vectors().iter().all(|v| v.dim() <= 3));
    }

    #[test]
    fn test_heuristic_mapping() {
        assert_eq!(ProbHeuristic::from(CliHeuristic::None), ProbHeuristic::None);
        assert_eq!(ProbHeuristic::from(CliHeuristic::Norm), ProbHeuristic::OvaNorm);
        assert_eq!(
            ProbHeuristic::from(CliHeuristic::Softmax),
            ProbHeuristic::OvaSoftmax
        );
    }
}
