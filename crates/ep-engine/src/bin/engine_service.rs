use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use ep_engine::logging::init_tracing;
use ep_engine::{EngineConfig, SentimentEngine};
use ep_types::Symbol;

const DEFAULT_SYMBOLS: &[&str] = &["SPY", "QQQ", "IWM"];
const MAX_SYMBOLS: usize = 20;
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = EngineConfig::load()?;
    let addr = config.listen_addr.clone();
    let engine = Arc::new(SentimentEngine::from_config(config)?);

    tokio::spawn(sweep_cache(Arc::clone(&engine)));

    let listener = TcpListener::bind(&addr).await?;
    info!("Options sentiment service listening on {}", addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        let engine = Arc::clone(&engine);

        tokio::spawn(async move {
            if let Err(e) = handle(socket, engine).await {
                warn!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

/// Reclaim stale cache entries even when no new symbols are requested.
async fn sweep_cache(engine: Arc<SentimentEngine>) {
    let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let purged = engine.cache().purge_expired();
        let stats = engine.cache().get_stats();
        debug!(
            "Cache sweep: purged {}, {} live, hit rate {:.2}",
            purged,
            engine.cache().len(),
            stats.hit_rate()
        );
    }
}

async fn handle(mut socket: TcpStream, engine: Arc<SentimentEngine>) -> anyhow::Result<()> {
    let mut buffer = [0u8; 4096];
    let n = socket.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    let target = request
        .lines()
        .next()
        .and_then(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("GET"), Some(target)) => Some(target.to_string()),
                _ => None,
            }
        });
    debug!("Request: {:?}", target);

    let (path, query) = match target.as_deref() {
        Some(t) => t.split_once('?').unwrap_or((t, "")),
        None => ("", ""),
    };

    let (status, body) = match path {
        "/health" => ("200 OK", r#"{"status":"ok","service":"options-sentiment"}"#.to_string()),
        "/options-metrics" => {
            let symbols = parse_symbols(query);
            let results = engine.reports(&symbols).await;
            let body = serde_json::json!({
                "asOf": Utc::now(),
                "results": results,
            });
            ("200 OK", body.to_string())
        }
        _ => ("404 Not Found", r#"{"error":"not found"}"#.to_string()),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

/// `symbols=SPY,QQQ` from the query string; invalid tickers are dropped.
fn parse_symbols(query: &str) -> Vec<Symbol> {
    let raw = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "symbols")
        .map(|(_, value)| value.replace("%2C", ",").replace("%2c", ",").replace("%5E", "^").replace("%5e", "^"));

    let symbols: Vec<Symbol> = match raw {
        Some(list) => list.split(',').filter_map(Symbol::parse).take(MAX_SYMBOLS).collect(),
        None => Vec::new(),
    };

    if symbols.is_empty() {
        DEFAULT_SYMBOLS.iter().filter_map(|s| Symbol::parse(s)).collect()
    } else {
        symbols
    }
}
