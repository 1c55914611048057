use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the site guard", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GUARD_ADMIN_URL", default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GUARD_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show guard mode and enabled layers
    Status,
    /// Show whether an identifier is blocked
    Inspect { identifier: String },
    /// Block an identifier
    Block {
        identifier: String,
        /// Block length in seconds
        #[arg(short, long, default_value_t = 3600)]
        duration: u64,
        #[arg(short, long, default_value = "manual block")]
        reason: String,
    },
    /// Lift a block
    Unblock { identifier: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let blocks = |id: &str| format!("{}/admin/blocks/{}", cli.url, urlencoding::encode(id));

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Inspect { identifier } => {
            client.get(blocks(&identifier)).headers(headers).send().await?
        }
        Commands::Block {
            identifier,
            duration,
            reason,
        } => {
            client
                .post(blocks(&identifier))
                .headers(headers)
                .json(&json!({ "duration_secs": duration, "reason": reason }))
                .send()
                .await?
        }
        Commands::Unblock { identifier } => {
            client.delete(blocks(&identifier)).headers(headers).send().await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
