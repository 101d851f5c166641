use clap::Parser;
use hs_core::{PathsConfig, Result};
use hs_pipeline::{handle_command, init_logging, PipelineArgs, PipelineCommands, PipelineContext};
use hs_storage::{create_store, load_shared};
use hs_web::{create_app, AppState};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headline sentiment: train, score and summarize", long_about = None)]
pub struct Cli {
    /// Directory holding models/ and data/
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Model store backend: fs or memory
    #[arg(long, default_value = "fs")]
    store: String,
    #[arg(long, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Pipeline(PipelineCommands),
    /// Serve the summary API over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = init_logging(cli.log_level);

    let paths = PathsConfig::from_root(&cli.root);
    let store = create_store(&cli.store, &paths.model_dir).await?;
    info!("💾 Model store initialized (using {})", store.name());

    match cli.command {
        Commands::Pipeline(command) => {
            let ctx = PipelineContext::new(paths, store);
            handle_command(PipelineArgs { command }, &ctx).await?;
        }
        Commands::Serve { addr } => {
            let model = load_shared(store.as_ref()).await?;
            let app = create_app(AppState::new(model, paths));
            let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
            logger.info(&format!("🌐 Listening on http://{}", listener.local_addr()?));
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
