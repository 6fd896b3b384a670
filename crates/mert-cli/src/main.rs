use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use tracing::error;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Minimum error rate training over n-best lists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tune feature weights against a corpus metric
    Tune(cmd::tune::TuneArgs),
    /// Score weights: model 1-best and oracle metric
    Eval(cmd::eval::EvalArgs),
}

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let sub_matches = matches.subcommand().map_or(&matches, |(_, m)| m);
    let result = match cli.command {
        Commands::Tune(args) => cmd::tune::run(args, sub_matches),
        Commands::Eval(args) => cmd::eval::run(args),
    };

    if let Err(e) = result {
        error!("❌ {}", e);
        process::exit(1);
    }
}
