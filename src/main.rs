use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use signforge::config::Config;
use std::process;
use tracing::Level;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file; explicit flags still win.
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every frame of a landmark recording.
    Classify(cmd::classify::ClassifyArgs),
    /// Run the recognition loop over a recording and compose sentences.
    Converse(cmd::converse::ConverseArgs),
    /// Compose a sentence from words.
    Sentence(cmd::sentence::SentenceArgs),
    /// Train a model on the collected dataset.
    Train(cmd::train::TrainArgs),
    /// Compare classifiers frame by frame.
    Compete(cmd::compete::CompeteArgs),
    Models(cmd::models::ModelsArgs),
    Dataset(cmd::dataset::DatasetArgs),
}

/// File config (if any) overlaid with the flags the user actually typed.
fn resolve_config(path: &Option<String>, cli_config: &Config, sub_matches: &ArgMatches) -> Config {
    match path {
        Some(p) => {
            let mut config = Config::load_from_file(p).unwrap_or_else(|e| {
                eprintln!("❌ {}", e);
                process::exit(1);
            });
            config.merge_from_cli(cli_config, sub_matches);
            config
        }
        None => cli_config.clone(),
    }
}

fn main() {
    // Raw matches tell user input apart from defaults.
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let Some((_, sub_matches)) = matches.subcommand() else {
        eprintln!("❌ No subcommand given");
        process::exit(2);
    };

    let result = match cli.command {
        Commands::Classify(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::classify::run(args, config)
        }
        Commands::Converse(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::converse::run(args, config)
        }
        Commands::Sentence(args) => cmd::sentence::run(args),
        Commands::Train(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::train::run(args, config)
        }
        Commands::Compete(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::compete::run(args, config)
        }
        Commands::Models(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::models::run(args, config)
        }
        Commands::Dataset(args) => {
            let config = resolve_config(&cli.config, &args.config, sub_matches);
            cmd::dataset::run(args, config)
        }
    };

    if let Err(e) = result {
        eprintln!("\n❌ {}", e);
        process::exit(1);
    }
}
