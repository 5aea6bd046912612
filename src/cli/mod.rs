//! Command-line parsing for the asylum acceptance-rate service.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! command dispatch (`app`) and the prediction code.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "asylum", version, about = "Asylum acceptance-rate prediction service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the model bundle and serve the HTTP API (default).
    Serve(ServeArgs),
    /// Predict a single acceptance rate.
    Predict(PredictArgs),
    /// Show model metadata, confidence method, and vocabulary sizes.
    Info(ModelArgs),
    /// Score a CSV of `origin,asylum,year,procedure` rows.
    Score(ScoreArgs),
    /// Evaluate the bundle against raw asylum-seeker records.
    Evaluate(EvaluateArgs),
}

/// Model directory override shared by every command.
#[derive(Debug, Args, Clone, Default)]
pub struct ModelArgs {
    /// Directory holding the model artifacts (overrides MODEL_DIR).
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// IP address to bind, e.g. 0.0.0.0 or 127.0.0.1; hostnames are not resolved (overrides HOST).
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to bind (overrides PORT).
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Country of origin, e.g. "Syria".
    #[arg(long)]
    pub origin: String,

    /// Country of asylum, e.g. "Germany".
    #[arg(long)]
    pub asylum: String,

    /// Year of application.
    #[arg(long)]
    pub year: String,

    /// Government, UNHCR, Joint or Unknown.
    #[arg(long)]
    pub procedure: String,

    /// Print the result as JSON, as the HTTP API returns it.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Input CSV with origin, asylum, year, procedure columns.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output CSV (stdout when omitted).
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Raw asylum-seeker CSV (UNHCR column names).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Share of encoded rows held out for RMSE/MAE.
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Random seed for the hold-out split.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write `residual_stats.json` into the model directory.
    #[arg(long)]
    pub write_residual_stats: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predict_flags() {
        let cli = Cli::parse_from([
            "asylum", "predict", "--origin", "Syria", "--asylum", "Germany", "--year", "2015",
            "--procedure", "Government", "--json",
        ]);
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.origin, "Syria");
        assert_eq!(args.year, "2015");
        assert!(args.json);
        assert!(args.model.model_dir.is_none());
    }

    #[test]
    fn evaluate_defaults() {
        let cli = Cli::parse_from(["asylum", "evaluate", "--data", "asylum_seekers.csv"]);
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.test_fraction, 0.2);
        assert_eq!(args.seed, 42);
        assert!(!args.write_residual_stats);
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::parse_from(["asylum", "serve", "--port", "9000", "--model-dir", "/srv/models"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.model.model_dir, Some(PathBuf::from("/srv/models")));
    }
}
