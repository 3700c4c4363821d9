//! CLI entry point: wires the job's input/output files and worker count
//! from argv/env, then hands off to `pipeline_core::job::run`.

use std::fs::File;
use std::process::ExitCode;

use pipeline_core::record::{DecodedRecord, ParameterDefinitionsBody, RecordReader, VariableValuesBody};
use pipeline_core::roles::DealerVariant;
use pipeline_core::tree::TreeRegistry;
use pipeline_core::workflow::{Config, Log};
use pipeline_core::{job, Role};

const PIPELINE_WORKERS: &str = "PIPELINE_WORKERS";
const PIPELINE_BLOCK_SIZE: &str = "PIPELINE_BLOCK_SIZE";
const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
const CHANNEL_CAPACITY: usize = 64;

struct Args {
    input_path: String,
    output_path: String,
    workers: usize,
    block_size: usize,
    variant: DealerVariant,
}

fn parse_args() -> Result<Args, String> {
    let mut positionals = Vec::new();
    let mut workers: Option<usize> = None;
    let mut block_size: Option<usize> = None;
    let mut variant_flag = "raw".to_string();

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--workers" => {
                let v = argv.next().ok_or("--workers requires a value")?;
                workers = Some(v.parse().map_err(|_| format!("--workers value '{v}' is not a number"))?);
            }
            "--block-size" => {
                let v = argv.next().ok_or("--block-size requires a value")?;
                block_size = Some(v.parse().map_err(|_| format!("--block-size value '{v}' is not a number"))?);
            }
            "--variant" => {
                variant_flag = argv.next().ok_or("--variant requires a value")?;
            }
            other => positionals.push(other.to_string()),
        }
    }

    if positionals.len() < 2 {
        return Err("usage: analysis-pipeline <input-file> <output-file> [--workers N] [--block-size BYTES] [--variant raw|parameter]".to_string());
    }

    let mut cfg = Config::new();
    if workers.is_none() {
        if let Ok(v) = std::env::var(PIPELINE_WORKERS) {
            cfg.set_usize(PIPELINE_WORKERS, v.parse().map_err(|_| format!("{PIPELINE_WORKERS}='{v}' is not a number"))?);
        }
    }
    if block_size.is_none() {
        if let Ok(v) = std::env::var(PIPELINE_BLOCK_SIZE) {
            cfg.set_usize(PIPELINE_BLOCK_SIZE, v.parse().map_err(|_| format!("{PIPELINE_BLOCK_SIZE}='{v}' is not a number"))?);
        }
    }

    let workers = workers
        .or_else(|| cfg.usize.get(PIPELINE_WORKERS).copied())
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
    let block_size = block_size.or_else(|| cfg.usize.get(PIPELINE_BLOCK_SIZE).copied()).unwrap_or(DEFAULT_BLOCK_SIZE);

    let variant = match variant_flag.as_str() {
        "raw" => DealerVariant::Raw { block_size },
        "parameter" => DealerVariant::Parameter,
        other => return Err(format!("--variant must be 'raw' or 'parameter', got '{other}'")),
    };

    Ok(Args { input_path: positionals[0].clone(), output_path: positionals[1].clone(), workers, block_size, variant })
}

/// The generic CLI has no parameter-to-parameter transform of its own; the
/// framework has already loaded the mapped values into `registry` by the
/// time this runs, so the identity case is a no-op. A real deployment
/// overrides this to derive its own parameters from the loaded ones.
fn identity_parameter_transform(_registry: &mut TreeRegistry) {}

/// The generic CLI has no physics-record transform of its own; a real
/// deployment overrides this to populate the tree-parameter registry.
fn noop_raw_transform(_record_body: &[u8], _registry: &mut TreeRegistry) {}

/// Peek the leading parameter-definitions and variable-values records of a
/// parameter-variant input, so the Outputter's own preamble can mirror
/// them. Does not consume the Dealer's own read of the same file.
fn peek_parameter_preamble(path: &str) -> Result<(ParameterDefinitionsBody, VariableValuesBody), String> {
    let file = File::open(path).map_err(|e| format!("opening '{path}' to peek its preamble: {e}"))?;
    let mut reader = RecordReader::new(file, Role::Outputter);
    let definitions = match reader.next_record().map_err(|e| e.to_string())? {
        Some(DecodedRecord::ParameterDefinitions(body)) => body,
        _ => return Err(format!("'{path}' does not begin with a parameter-definitions record")),
    };
    let variables = match reader.next_record().map_err(|e| e.to_string())? {
        Some(DecodedRecord::VariableValues(body)) => body,
        _ => return Err(format!("'{path}' does not have a variables record following its definitions")),
    };
    Ok((definitions, variables))
}

fn main() -> ExitCode {
    let log = Log::new("analysis-pipeline");
    log.initializing();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("analysis-pipeline: configuration error: {message}");
            return ExitCode::FAILURE;
        }
    };

    if args.workers < 1 {
        eprintln!("analysis-pipeline: configuration error: at least one worker rank is required");
        return ExitCode::FAILURE;
    }

    let (output_definitions, output_variables) = match args.variant {
        DealerVariant::Parameter => match peek_parameter_preamble(&args.input_path) {
            Ok(preamble) => preamble,
            Err(message) => {
                eprintln!("analysis-pipeline: {message}");
                return ExitCode::FAILURE;
            }
        },
        DealerVariant::Raw { .. } => (ParameterDefinitionsBody::default(), VariableValuesBody::default()),
    };

    let input = match File::open(&args.input_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("analysis-pipeline: i/o error: opening '{}': {e}", args.input_path);
            return ExitCode::FAILURE;
        }
    };
    let output = match File::create(&args.output_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("analysis-pipeline: i/o error: creating '{}': {e}", args.output_path);
            return ExitCode::FAILURE;
        }
    };

    let worker_logic = match args.variant {
        DealerVariant::Raw { .. } => job::WorkerLogic::RawToParameter(&noop_raw_transform),
        DealerVariant::Parameter => job::WorkerLogic::ParameterToParameter(&identity_parameter_transform),
    };

    let config = job::JobConfig {
        variant: args.variant,
        num_workers: args.workers,
        channel_capacity: CHANNEL_CAPACITY,
        worker_logic,
        output_definitions,
        output_variables,
    };

    match job::run(input, output, config) {
        Ok(()) => {
            log.print("job completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("analysis-pipeline: {e}");
            ExitCode::FAILURE
        }
    }
}
