//! rhttp - send HTTP requests with retries and a circuit breaker.
//!
//! # Commands
//!
//! - `rhttp get <url>` - Send a GET request
//! - `rhttp post <url> -d <data>` - Send a POST request
//! - `rhttp put <url> -d <data>` - Send a PUT request
//! - `rhttp patch <url> -d <data>` - Send a PATCH request
//! - `rhttp delete <url>` - Send a DELETE request

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use resilient_http::Method;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::send;
use error::CliResult;

/// rhttp - resilient HTTP requests from the command line
#[derive(Parser, Debug)]
#[command(name = "rhttp")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Send HTTP requests with automatic retries and a circuit breaker")]
#[command(long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = format!(
    "{}\n  {} rhttp get https://api.example.com/users -i\n  {} rhttp post https://api.example.com/orders -d '{{\"item\":\"widget\"}}'\n  {} rhttp put https://api.example.com/orders/1 -d @order.json --retries 5",
    "Examples:".bright_cyan().bold(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a GET request
    Get(RequestArgs),

    /// Send a POST request
    Post(RequestArgs),

    /// Send a PUT request
    Put(RequestArgs),

    /// Send a PATCH request
    Patch(RequestArgs),

    /// Send a DELETE request
    #[command(alias = "del")]
    Delete(RequestArgs),
}

impl Commands {
    fn into_parts(self) -> (Method, RequestArgs) {
        match self {
            Commands::Get(args) => (Method::GET, args),
            Commands::Post(args) => (Method::POST, args),
            Commands::Put(args) => (Method::PUT, args),
            Commands::Patch(args) => (Method::PATCH, args),
            Commands::Delete(args) => (Method::DELETE, args),
        }
    }
}

// =============================================================================
// REQUEST ARGS
// =============================================================================

#[derive(Args, Debug)]
struct RequestArgs {
    /// Target URL
    url: String,

    /// Request header, repeatable (e.g., "Accept: application/json")
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Request body; '@file' reads a file, '-' reads stdin
    #[arg(short, long)]
    data: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Retries after the first attempt
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Delay before the first retry in milliseconds
    #[arg(long, value_name = "MS")]
    base_delay: Option<u64>,

    /// Upper bound for any retry delay in milliseconds
    #[arg(long, value_name = "MS")]
    max_delay: Option<u64>,

    /// Use exact exponential delays without jitter
    #[arg(long)]
    no_jitter: bool,

    /// Disable the circuit breaker
    #[arg(long)]
    no_circuit_breaker: bool,

    /// Print response status line and headers
    #[arg(short, long)]
    include: bool,
}

fn init_tracing(verbose: bool, color: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle color preferences
    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, !cli.no_color);

    let (method, args) = cli.command.into_parts();
    let result: CliResult<()> = send::run(method, args).await;

    if let Err(e) = result {
        eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
