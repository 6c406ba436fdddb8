mod cli;

use clap::Parser;
use cli::{Cli, Commands, ProcessArgs, StatusArgs, SubmitArgs};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use vidferry::client::{ApiClient, ClientConfig};
use vidferry::config::Config;
use vidferry::cookies::CookieStore;
use vidferry::fetcher::Fetcher;
use vidferry::observability::init_tracing;
use vidferry::pipeline::Pipeline;
use vidferry::storage::StorageClient;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// Pause between one-by-one submissions read from stdin
const SUBMIT_PAUSE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = Config::load()?;
            init_tracing(&config.logging)?;
            vidferry::api::run(config, args.address).await?
        }
        Commands::Process(args) => {
            let config = Config::load()?;
            init_tracing(&config.logging)?;
            process(config, args).await?
        }
        Commands::Submit(args) => {
            tracing_subscriber::fmt::init();
            submit(args).await?
        }
        Commands::Status(args) => {
            tracing_subscriber::fmt::init();
            status(args).await?
        }
    }

    Ok(())
}

async fn process(config: Config, args: ProcessArgs) -> Result<(), AnyError> {
    let cookies = CookieStore::new(config.fetcher.cookies_path.clone());
    let fetcher = Fetcher::from_config(&config, cookies);
    if !fetcher.tool_available() {
        error!(binary = %config.fetcher.binary, "Downloader not installed");
        return Err(format!("{} is not installed", config.fetcher.binary).into());
    }

    let storage = StorageClient::from_config(&config.storage)?;
    let pipeline = Pipeline::new(Arc::new(fetcher), Arc::new(storage));

    let outcome = pipeline.process(&args.url, args.keep_local).await;
    if !outcome.success {
        return Err(outcome.message.into());
    }

    println!("{}", outcome.message);
    Ok(())
}

async fn submit(args: SubmitArgs) -> Result<(), AnyError> {
    let client = ApiClient::new(&args.server, ClientConfig::default())?;

    let health = client.health().await?;
    info!(server = client.base_url(), %health, "Server is reachable");

    match args.urls.as_slice() {
        [] => submit_from_stdin(&client).await?,
        [url] => {
            let queued = client.submit_one(url).await?;
            println!(
                "Queued {} at position {}",
                queued.url, queued.queue_position
            );
        }
        urls => {
            let batch = client.submit_batch(urls).await?;
            println!("{} (queue size {})", batch.message, batch.queue_size);
        }
    }

    print_status(&client).await
}

/// Submit one URL per stdin line until a blank line or end of input
async fn submit_from_stdin(client: &ApiClient) -> Result<(), AnyError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0usize;

    while let Some(line) = lines.next_line().await? {
        let url = line.trim();
        if url.is_empty() {
            break;
        }

        if submitted > 0 {
            tokio::time::sleep(SUBMIT_PAUSE).await;
        }

        match client.submit_one(url).await {
            Ok(queued) => {
                submitted += 1;
                println!(
                    "Queued {} at position {}",
                    queued.url, queued.queue_position
                );
            }
            Err(e) => warn!(url, error = %e, "Submission failed"),
        }
    }

    println!("Submitted {submitted} URLs");
    Ok(())
}

async fn status(args: StatusArgs) -> Result<(), AnyError> {
    let client = ApiClient::new(&args.server, ClientConfig::default())?;
    print_status(&client).await
}

async fn print_status(client: &ApiClient) -> Result<(), AnyError> {
    let status = client.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
