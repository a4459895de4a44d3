use anyhow::{Context, Result};
use cotton_advisor::cli::{Cli, Commands, ConfigAction};
use cotton_advisor::config::Config;
use cotton_advisor::context::{build_index_file, load_pipeline, SystemStatus};
use cotton_advisor::corpus::CorpusStore;
use cotton_advisor::embedding::FastEmbedProvider;
use cotton_advisor::eval;
use cotton_advisor::pipeline::{AnswerPipeline, AnswerResult, SourceExcerpt};
use cotton_advisor::prompt::ConversationTurn;
use cotton_advisor::server;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // Handle commands
    match cli.command {
        Commands::Serve { bind } => {
            cmd_serve(cli.config, bind)?;
        }
        Commands::Ask { question, json } => {
            cmd_ask(cli.config, &question, json)?;
        }
        Commands::Chat => {
            cmd_chat(cli.config)?;
        }
        Commands::Index { corpus, output } => {
            cmd_index(cli.config, corpus, output)?;
        }
        Commands::Eval { questions, output } => {
            cmd_eval(cli.config, questions, output)?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "cotton_advisor=debug,tower_http=debug"
    } else {
        "cotton_advisor=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}

fn init_pipeline(config: &Config) -> Result<AnswerPipeline> {
    load_pipeline(config).context("Failed to initialize cotton advisor")
}

fn cmd_serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    tracing::info!("Initializing cotton advisor...");
    let pipeline = Arc::new(init_pipeline(&config)?);
    let status = SystemStatus::of(&pipeline);
    tracing::info!("✓ System ready ({} chunks)", status.chunks_count);

    runtime()?
        .block_on(server::run_server(
            pipeline,
            &bind,
            &config.server.allowed_origins,
        ))
        .with_context(|| format!("HTTP service on {} failed", bind))
}

fn cmd_ask(config_path: Option<PathBuf>, question: &str, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = init_pipeline(&config)?;

    let result = runtime()?.block_on(pipeline.answer(question, &[]));

    if json {
        let out = serde_json::to_string_pretty(&result).context("Failed to serialize answer")?;
        println!("{}", out);
    } else {
        print_answer(&result);
    }
    Ok(())
}

fn cmd_chat(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = init_pipeline(&config)?;
    let rt = runtime()?;

    println!("🌱 Cotton advisor. Ask about cotton pests and diseases; an empty line or 'exit' quits.");

    let stdin = std::io::stdin();
    let mut history: Vec<ConversationTurn> = Vec::new();
    loop {
        print!("\n> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        let question = line.trim();
        if read == 0 || question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        let result = rt.block_on(pipeline.answer(question, &history));
        print_answer(&result);

        if result.success {
            history.push(ConversationTurn::user(question));
            history.push(ConversationTurn::assistant(result.answer_text));
        }
    }

    Ok(())
}

fn cmd_index(
    config_path: Option<PathBuf>,
    corpus: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let corpus_path = corpus.unwrap_or_else(|| config.corpus.chunks_file.clone());
    let output = output.unwrap_or_else(|| config.corpus.index_file.clone());

    let corpus = CorpusStore::load(&corpus_path)
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;
    println!("Embedding {} chunks with {}...", corpus.len(), config.embedding.model);

    let embedder = FastEmbedProvider::new(&config.embedding.model, config.embedding.batch_size)?;
    let index = build_index_file(&embedder, &corpus)?;
    index
        .save(&output)
        .with_context(|| format!("Failed to write index {}", output.display()))?;

    println!("✓ Index written to: {}", output.display());
    println!("  Vectors: {} ({}D)", index.vectors.len(), index.dimension);
    Ok(())
}

fn cmd_eval(
    config_path: Option<PathBuf>,
    questions: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let questions = match questions {
        Some(path) => eval::load_questions(&path)?,
        None => eval::default_questions(),
    };
    let pipeline = init_pipeline(&config)?;

    println!("Running {} questions...", questions.len());
    let report = runtime()?.block_on(eval::run_suite(&pipeline, &questions));

    let summary = &report.summary;
    println!("\nTotal Questions: {}", summary.total_questions);
    println!(
        "Successful Answers: {} ({:.1}%)",
        summary.successful,
        summary.success_rate * 100.0
    );
    println!(
        "Answers with Citations: {} ({:.1}%)",
        summary.with_citations,
        summary.citation_rate * 100.0
    );
    println!("Average Answer Length: {:.1} words", summary.average_word_count);

    let uncited: Vec<_> = report.uncited().collect();
    if !uncited.is_empty() {
        println!("\n⚠ Answers without citations ({}):", uncited.len());
        for r in uncited {
            println!("  - Q{}: {}", r.question_num, r.question);
        }
    }

    let output = output.unwrap_or_else(|| PathBuf::from(eval::default_report_name()));
    report.save(&output)?;
    println!("\n✓ Results saved to: {}", output.display());
    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = init_pipeline(&config)?;
    let status = SystemStatus::of(&pipeline);

    println!("Status: {} ({})", status.status, status.message);
    println!("  Embedder loaded: {}", status.embedder_loaded);
    println!("  Index loaded:    {}", status.index_loaded);
    println!("  Model loaded:    {}", status.model_loaded);
    println!("  Chunks:          {}", status.chunks_count);
    println!("  Index kind:      {}", config.index.kind);
    println!("  LLM model:       {}", pipeline.generator().model_name());
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'cotton-advisor config init' to create one."
        );
        return Config::from_env().context("Invalid configuration from environment");
    }

    Config::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn print_answer(result: &AnswerResult) {
    println!("\n{}", result.answer_text);

    if !result.sources.is_empty() {
        println!("\nSources:");
        for source in &result.sources {
            println!("  [p.{}] {}", page_display(source), source.excerpt);
        }
    }
}

fn page_display(source: &SourceExcerpt) -> String {
    match &source.page {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
