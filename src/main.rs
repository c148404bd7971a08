use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use vendorchat::{Config, HttpVendorApi, VendorChat, config, logging, repl};

#[derive(Parser, Debug)]
#[command(
    name = "vendorchat",
    version,
    about = "Ask the reconciliation assistant about a vendor's invoices and POs"
)]
struct Cli {
    /// Vendor whose conversations to open
    vendor_id: String,

    /// Backend API root (overrides VENDORCHAT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Start a fresh conversation instead of reusing the latest one
    #[arg(long)]
    new: bool,

    /// Wait for whole replies instead of streaming them
    #[arg(long)]
    no_stream: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Env vars are written here, before the runtime starts its workers.
    config::load_dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::from_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }
    if cli.no_stream {
        config.stream = false;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let api = HttpVendorApi::from_config(&config)
        .with_context(|| format!("bad API url {}", config.api_url))?;
    tracing::debug!(api_url = %api.base_url(), stream = config.stream, "using backend");

    let chat = VendorChat::new(Arc::new(api), cli.vendor_id, &config);
    chat.start().await;
    if cli.new && !chat.new_chat().await {
        eprintln!("Could not create a new chat; continuing with the latest one");
    }

    let result = repl::run(&chat).await;
    chat.stop();
    result
}
