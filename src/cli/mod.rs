//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cotton-advisor",
    version,
    author = "neur0map",
    about = "Question answering over the cotton pest and disease advisory",
    long_about = "Cotton Advisor answers farmer questions from the ICAR-CICR advisory document. \
                  Each answer is grounded in retrieved passages and cites the pages it draws on."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/cotton-advisor/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Answer a single question
    Ask {
        /// Question to ask
        question: String,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop; recent turns are sent as context
    Chat,

    /// Embed the corpus and write the index file
    Index {
        /// Corpus file (defaults to corpus.chunks_file)
        #[arg(long, value_name = "FILE")]
        corpus: Option<PathBuf>,

        /// Index file to write (defaults to corpus.index_file)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run a question suite and report success and citation rates
    Eval {
        /// JSON file with questions (defaults to the built-in suite)
        #[arg(short, long, value_name = "FILE")]
        questions: Option<PathBuf>,

        /// Report path (defaults to eval_results_<timestamp>.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Load every component and show readiness
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["cotton-advisor", "-v", "ask", "How to control whitefly?"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask { question, json } => {
                assert_eq!(question, "How to control whitefly?");
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_bind() {
        let cli = Cli::try_parse_from(["cotton-advisor", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { bind: Some(ref b) } if b == "127.0.0.1:9000"));
    }
}
