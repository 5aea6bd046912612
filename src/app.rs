//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and resolves configuration
//! - initialises logging
//! - loads the model bundle
//! - serves HTTP or runs a one-shot command

use std::io::Write;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EvaluateArgs, ModelArgs, PredictArgs, ScoreArgs, ServeArgs};
use crate::config::ServiceConfig;
use crate::domain::YearInput;
use crate::error::AppError;
use crate::eval::EvalConfig;
use crate::io::RESIDUAL_STATS;
use crate::report::ScoreSummary;

pub mod pipeline;

/// Entry point for the `asylum` binary.
pub fn run() -> Result<(), AppError> {
    // `asylum` and `asylum --port 9000` behave like `asylum serve ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    let config = ServiceConfig::from_env()?;

    let default_level = match cli.command {
        Command::Serve(_) => "info",
        _ => "warn",
    };
    init_tracing(config.log_json, default_level);

    match cli.command {
        Command::Serve(args) => handle_serve(config, args),
        Command::Predict(args) => handle_predict(config, args),
        Command::Info(args) => handle_info(config, args),
        Command::Score(args) => handle_score(config, args),
        Command::Evaluate(args) => handle_evaluate(config, args),
    }
}

/// `RUST_LOG` wins over `default_level`. Repeated calls are no-ops.
pub fn init_tracing(log_json: bool, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn apply_model_args(mut config: ServiceConfig, args: &ModelArgs) -> ServiceConfig {
    if let Some(dir) = &args.model_dir {
        config.model_dir = dir.clone();
    }
    config
}

fn handle_serve(config: ServiceConfig, args: ServeArgs) -> Result<(), AppError> {
    let mut config = apply_model_args(config, &args.model);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let state = pipeline::startup_state(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(&config, state))
}

fn handle_predict(config: ServiceConfig, args: PredictArgs) -> Result<(), AppError> {
    let config = apply_model_args(config, &args.model);
    let predictor = pipeline::load_predictor(&config)?;

    let request = predictor.validate(
        &args.origin,
        &args.asylum,
        &YearInput::Text(args.year.clone()),
        &args.procedure,
    )?;
    let result = predictor.predict_request(&request)?;

    if args.json {
        let body = serde_json::to_string(&result.rounded())
            .map_err(|e| AppError::new(4, format!("Failed to encode result: {e}")))?;
        println!("{body}");
    } else {
        print!("{}", crate::report::format_prediction(&request, &result));
    }
    Ok(())
}

fn handle_info(config: ServiceConfig, args: ModelArgs) -> Result<(), AppError> {
    let config = apply_model_args(config, &args);
    let predictor = pipeline::load_predictor(&config)?;
    print!("{}", crate::report::format_model_info(predictor.bundle()));
    Ok(())
}

fn handle_score(config: ServiceConfig, args: ScoreArgs) -> Result<(), AppError> {
    let config = apply_model_args(config, &args.model);
    let predictor = pipeline::load_predictor(&config)?;

    let rows = crate::io::load_requests(&args.input)?;
    let scored = pipeline::score_rows(&predictor, rows);

    match &args.output {
        Some(path) => crate::io::write_scores_file(path, &scored)?,
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            crate::io::write_scores(&mut lock, &scored)?;
            lock.flush()
                .map_err(|e| AppError::new(2, format!("Failed to write scores: {e}")))?;
        }
    }

    eprintln!("{}", crate::report::format_score_summary(&ScoreSummary::from_rows(&scored)));
    Ok(())
}

fn handle_evaluate(config: ServiceConfig, args: EvaluateArgs) -> Result<(), AppError> {
    let config = apply_model_args(config, &args.model);
    let predictor = pipeline::load_predictor(&config)?;

    let eval_config = EvalConfig {
        test_fraction: args.test_fraction,
        seed: args.seed,
    };
    let (dataset, evaluation) = pipeline::run_evaluation(&predictor, &args.data, &eval_config)?;
    print!("{}", crate::report::format_evaluation(&dataset, &evaluation));

    if args.write_residual_stats {
        let path = config.model_dir.join(RESIDUAL_STATS);
        crate::io::write_residual_stats(&path, &evaluation.residuals)
            .map_err(|e| AppError::new(2, format!("Failed to write residual statistics: {e}")))?;
        info!(path = %path.display(), "residual statistics written");
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Rewrite argv so `asylum` defaults to `asylum serve`.
///
/// Rules:
/// - `asylum`                          -> `asylum serve`
/// - `asylum --port 9000 ...`          -> `asylum serve --port 9000 ...`
/// - `asylum --help/--version/-h`      -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("serve".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "serve".to_string());
    }
    argv
}
