use clap::{Parser, Subcommand};
use std::net::SocketAddr;

use vidferry::client::DEFAULT_SERVER;

#[derive(Parser, Debug)]
#[command(name = "vidferry")]
#[command(about = "Download videos and ferry them to object storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and the background worker
    Server(ServerArgs),
    /// Download and upload one URL in the foreground
    Process(ProcessArgs),
    /// Submit URLs to a running server
    Submit(SubmitArgs),
    /// Print the processing status of a running server
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct ProcessArgs {
    /// Video URL
    pub url: String,

    /// Keep the downloaded file after a successful upload
    #[arg(long)]
    pub keep_local: bool,
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// Base URL of the server
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// URLs to queue; read from stdin, one per line, when omitted
    pub urls: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Base URL of the server
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,
}
