use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_tokens::models::document::TokenDocument;
use content_tokens::models::token::TokenDraft;
use content_tokens::service::TokenService;
use content_tokens::{apply_seed, build_app, config, open_store, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.log_json);

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        None => run_server(cfg, None).await,
        Some(command) => run_command(cfg, command).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(json: bool) {
    // OTLP export only when an endpoint is configured; otherwise plain logs.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "content-tokens"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                eprintln!("failed to install OpenTelemetry tracer: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (json_layer, plain_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "content_tokens=debug,tower_http=debug".into()),
        ))
        .with(json_layer)
        .with(plain_layer)
        .with(telemetry_layer)
        .init();
}

async fn run_server(cfg: config::Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);
    let store = open_store(&cfg).await?;
    let state = Arc::new(AppState::new(store, cfg)?);

    apply_seed(&state.tokens, &state.config).await?;

    match &state.config.upstream_url {
        Some(url) => tracing::info!(upstream = %url, "Proxying unmatched requests to origin"),
        None => tracing::info!("No upstream origin configured; unmatched requests return 404"),
    }

    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Content tokens server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_command(cfg: config::Config, command: cli::Commands) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;
    let tokens = TokenService::new(store);

    // An in-memory store starts empty every run; the seed file is the only
    // way for one-shot commands to see any tokens.
    if cfg.database_url.is_none() {
        apply_seed(&tokens, &cfg).await?;
    }

    match command {
        cli::Commands::Serve { .. } => unreachable!("handled by run_server"),
        cli::Commands::Token { command } => handle_token_command(&tokens, command).await,
        cli::Commands::Preview { text, language } => {
            let preview = tokens.preview(&text, language.as_deref()).await?;
            println!("{}", preview.replaced);
            if !preview.unresolved.is_empty() {
                eprintln!("Unresolved: {}", preview.unresolved.join(", "));
            }
            Ok(())
        }
        cli::Commands::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file))?;
            let hint = if file.ends_with(".json") { "application/json" } else { "application/yaml" };
            let doc = TokenDocument::parse(&bytes, hint).map_err(|e| anyhow::anyhow!(e))?;
            let result = tokens.import(doc).await?;
            println!(
                "Import complete:\n  Created: {}\n  Updated: {}",
                result.tokens_created, result.tokens_updated
            );
            Ok(())
        }
        cli::Commands::Export { format } => {
            let doc = tokens.export().await?;
            if format.eq_ignore_ascii_case("json") {
                println!("{}", String::from_utf8(doc.to_json()?)?);
            } else {
                print!("{}", doc.to_yaml()?);
            }
            Ok(())
        }
    }
}

async fn handle_token_command(
    tokens: &TokenService,
    cmd: cli::TokenCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::List { language } => {
            let records = tokens.list_tokens(language.as_deref()).await?;
            if records.is_empty() {
                println!("No tokens found.");
            } else {
                println!("{:<38} {:<24} {:<8} VALUE", "ID", "NAME", "LANG");
                for t in records {
                    println!(
                        "{:<38} {:<24} {:<8} {}",
                        t.id,
                        t.name,
                        t.language_code.as_deref().unwrap_or("*"),
                        truncate(&t.value, 40)
                    );
                }
            }
        }
        cli::TokenCommands::Get { name, language } => {
            match tokens.get_token(&name, language.as_deref()).await? {
                Some(t) => println!("{}", serde_json::to_string_pretty(&t)?),
                None => println!("Token not found."),
            }
        }
        cli::TokenCommands::Set {
            name,
            value,
            language,
            description,
            id,
        } => {
            let id = id
                .map(|raw| uuid::Uuid::parse_str(&raw).context("Invalid token id"))
                .transpose()?;
            let draft = TokenDraft {
                id,
                name,
                value,
                language_code: language,
                description,
            };
            let saved = tokens.save_token(draft).await?;
            println!(
                "Token saved:\n  ID:       {}\n  Name:     {}\n  Language: {}",
                saved.id,
                saved.name,
                saved.language_code.as_deref().unwrap_or("(all)")
            );
        }
        cli::TokenCommands::Delete { id } => {
            tokens.delete_token(&id).await?;
            println!("Token deleted (if it existed).");
        }
    }
    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let cut: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}
