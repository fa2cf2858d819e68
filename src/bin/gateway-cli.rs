use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the Tailor Gateway", long_about = None)]
struct Cli {
    /// Public gateway URL.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API URL.
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    admin_url: String,

    /// Admin API key.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Show the effective configuration
    Config,
    /// Request a scan token for a user and print the embeddable scanner URL
    ScanUrl {
        #[arg(long)]
        user_id: String,
        /// Organization id; the gateway default is used when omitted
        #[arg(long)]
        org: Option<String>,
    },
    /// Show the user behind a session token
    Whoami {
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.admin_url))
                .headers(bearer(&cli.key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config => {
            let res = client
                .get(format!("{}/admin/config", cli.admin_url))
                .headers(bearer(&cli.key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ScanUrl { user_id, org } => {
            let res = client
                .post(format!("{}/proxy/bodygram/scan-token", cli.url))
                .json(&json!({ "userId": user_id }))
                .send()
                .await?;
            if !res.status().is_success() {
                return fail(res).await;
            }
            let body: Value = res.json().await?;
            let Some(token) = body.get("token").and_then(Value::as_str) else {
                eprintln!("Error: backend did not return a scan token");
                std::process::exit(1);
            };
            println!("{}", scanner_url(&cli.url, token, org.as_deref())?);
        }
        Commands::Whoami { token } => {
            let res = client
                .get(format!("{}/session", cli.url))
                .headers(bearer(&token)?)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn bearer(token: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    Ok(headers)
}

fn scanner_url(base: &str, token: &str, org: Option<&str>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?.join("bodygram-proxy")?;
    url.query_pairs_mut().append_pair("token", token);
    if let Some(org) = org {
        url.query_pairs_mut().append_pair("org", org);
    }
    Ok(url)
}

async fn fail(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Error: gateway returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
    std::process::exit(1);
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        return fail(res).await;
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
