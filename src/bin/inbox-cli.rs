use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "inbox-cli")]
#[command(about = "Management CLI for the webhook inbox", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "INBOX_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    /// User id the endpoints and events belong to
    #[arg(short, long, env = "INBOX_OWNER")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check inbox status
    Status,
    /// Manage webhook endpoints
    #[command(subcommand)]
    Endpoints(EndpointCommands),
    /// Inspect received events
    #[command(subcommand)]
    Events(EventCommands),
}

#[derive(Subcommand)]
enum EndpointCommands {
    /// List endpoints, newest first
    List,
    /// Create an endpoint and print its webhook URL
    Create { name: String },
    /// Show one endpoint
    Show { id: String },
    /// Delete an endpoint and all of its events
    Delete { id: String },
}

#[derive(Subcommand)]
enum EventCommands {
    /// List events received by an endpoint
    List {
        endpoint_id: String,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one event
    Show { id: String },
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
    if let Some(owner) = &cli.owner {
        headers.insert("x-owner-id", HeaderValue::from_str(owner)?);
    }

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/api/status".to_string(), None),
        Commands::Endpoints(EndpointCommands::List) => {
            (Method::GET, "/api/endpoints".to_string(), None)
        }
        Commands::Endpoints(EndpointCommands::Create { name }) => (
            Method::POST,
            "/api/endpoints".to_string(),
            Some(json!({ "name": name })),
        ),
        Commands::Endpoints(EndpointCommands::Show { id }) => {
            (Method::GET, format!("/api/endpoints/{id}"), None)
        }
        Commands::Endpoints(EndpointCommands::Delete { id }) => {
            (Method::DELETE, format!("/api/endpoints/{id}"), None)
        }
        Commands::Events(EventCommands::List { endpoint_id, limit }) => (
            Method::GET,
            format!("/api/endpoints/{endpoint_id}/events?limit={limit}"),
            None,
        ),
        Commands::Events(EventCommands::Show { id }) => {
            (Method::GET, format!("/api/events/{id}"), None)
        }
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: management API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if status == StatusCode::NO_CONTENT {
        println!("Deleted");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
