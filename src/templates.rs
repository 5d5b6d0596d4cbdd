//! Template catalog for generated bot projects.
//!
//! Every file a generated project contains lives here as an inline body
//! plus the set of variables it requires. Rendering is pure string
//! substitution of `{var}` tokens; the bodies are opaque payload to the
//! rest of the pipeline, never parsed or executed.

use crate::error::{ProvisionError, Result};

/// One catalog entry: where the rendered file lands relative to the project
/// root, and which variables its body requires.
pub struct Template {
    pub path: &'static str,
    body: &'static str,
    pub variables: &'static [&'static str],
}

impl Template {
    fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let mut out = self.body.to_string();
        for required in self.variables {
            let value = vars
                .iter()
                .find(|(key, _)| key == required)
                .map(|(_, value)| *value)
                .ok_or_else(|| ProvisionError::MissingVariable {
                    template: name.to_string(),
                    variable: required.to_string(),
                })?;
            out = out.replace(&format!("{{{}}}", required), value);
        }
        Ok(out)
    }
}

/// Immutable catalog of every file in a generated project, in write order.
/// Built once at startup and never mutated.
pub struct TemplateSet {
    templates: Vec<(&'static str, Template)>,
}

impl TemplateSet {
    pub fn builtin() -> Self {
        let templates = vec![
            (
                "manifest",
                Template {
                    path: "Cargo.toml",
                    body: MANIFEST,
                    variables: &["name"],
                },
            ),
            (
                "dockerfile",
                Template {
                    path: "Dockerfile",
                    body: DOCKERFILE,
                    variables: &[],
                },
            ),
            (
                "entrypoint",
                Template {
                    path: "src/main.rs",
                    body: ENTRYPOINT,
                    variables: &["bot_id", "pair", "strategy", "timeframe"],
                },
            ),
            (
                "strategy",
                Template {
                    path: "src/strategy.rs",
                    body: STRATEGY,
                    variables: &[],
                },
            ),
            (
                "exchange",
                Template {
                    path: "src/exchange.rs",
                    body: EXCHANGE,
                    variables: &[],
                },
            ),
            (
                "storage",
                Template {
                    path: "src/storage.rs",
                    body: STORAGE,
                    variables: &[],
                },
            ),
            (
                "env",
                Template {
                    path: ".env",
                    body: ENV_DEFAULTS,
                    variables: &["bot_id", "pair", "strategy", "timeframe"],
                },
            ),
            (
                "blueprint",
                Template {
                    path: "render.yaml",
                    body: BLUEPRINT,
                    variables: &["name"],
                },
            ),
            (
                "ci",
                Template {
                    path: ".github/workflows/ci.yml",
                    body: CI_WORKFLOW,
                    variables: &[],
                },
            ),
            (
                "readme",
                Template {
                    path: "README.md",
                    body: README,
                    variables: &["name"],
                },
            ),
        ];
        Self { templates }
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, template)| template)
    }

    /// Catalog entries in write order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Template)> {
        self.templates.iter().map(|(name, template)| (*name, template))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render one template. Pure and deterministic; extra supplied
    /// variables are ignored.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| ProvisionError::UnknownTemplate(name.to_string()))?;
        template.render(name, vars)
    }
}

const MANIFEST: &str = r##"[package]
name = "{name}"
version = "0.1.0"
edition = "2021"

[[bin]]
name = "bot"
path = "src/main.rs"

[dependencies]
# Async runtime
tokio = { version = "1", features = ["full"] }

# HTTP server (/status) and market data client
axum = "0.7"
reqwest = { version = "0.11", features = ["json"] }

# Serialization
serde_json = "1.0"

# Error handling
anyhow = "1.0"

# Tracing
tracing = "0.1"
tracing-subscriber = "0.3"

# Trade log
rusqlite = { version = "0.31", features = ["bundled"] }
"##;

const DOCKERFILE: &str = r##"FROM rust:1.79 AS build
WORKDIR /app
COPY . .
RUN cargo build --release && cp target/release/bot /usr/local/bin/bot

FROM debian:bookworm-slim
RUN apt-get update && apt-get install -y ca-certificates && rm -rf /var/lib/apt/lists/*
COPY --from=build /usr/local/bin/bot /usr/local/bin/bot
ENV PORT=8000
CMD ["bot"]
"##;

const ENTRYPOINT: &str = r##"//! Paper-trading bot. One pair, one strategy, simulated fills, and a
//! /status endpoint for the deploy health check.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

mod exchange;
mod storage;
mod strategy;

use exchange::{MarketFeed, PaperExchange};
use storage::TradeLog;
use strategy::Signal;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
struct AppState {
    bot_id: String,
    pair: String,
    strategy: String,
    exchange: Arc<Mutex<PaperExchange>>,
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let equity = state.exchange.lock().await.equity();
    Json(json!({
        "bot_id": state.bot_id,
        "pair": state.pair,
        "strategy": state.strategy,
        "mode": env_or("MODE", "paper"),
        "equity": equity,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let bot_id = env_or("BOT_ID", "{bot_id}");
    let pair = env_or("PAIR", "{pair}");
    let strategy = env_or("STRATEGY", "{strategy}");
    let timeframe = env_or("TIMEFRAME", "{timeframe}");

    info!("bot {} trading {} ({}, {})", bot_id, pair, strategy, timeframe);

    let exchange = Arc::new(Mutex::new(PaperExchange::new(env_f64("BASE_CAPITAL", 1000.0))));
    let state = AppState {
        bot_id: bot_id.clone(),
        pair: pair.clone(),
        strategy: strategy.clone(),
        exchange: exchange.clone(),
    };

    tokio::spawn(trading_loop(bot_id, pair, strategy, timeframe, exchange));

    let app = Router::new().route("/status", get(status)).with_state(state);
    let port: u16 = env_or("PORT", "8000").parse()?;
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn trading_loop(
    bot_id: String,
    pair: String,
    strategy: String,
    timeframe: String,
    exchange: Arc<Mutex<PaperExchange>>,
) {
    let size_pct = env_f64("SIZE_PCT", 0.12);
    let stop_loss = env_f64("STOP_LOSS_PCT", 0.006);
    let take_profit = env_f64("TAKE_PROFIT_PCT", 0.012);
    let trailing = env_f64("TRAILING_PCT", 0.004);
    let loop_secs = env_f64("LOOP_SECONDS", 7.0) as u64;

    let log = match TradeLog::open("trades.db") {
        Ok(log) => log,
        Err(err) => {
            warn!("trade log unavailable: {}", err);
            return;
        }
    };
    let feed = MarketFeed::new(&pair, &timeframe);
    let mut trail_base: Option<f64> = None;

    loop {
        tokio::time::sleep(Duration::from_secs(loop_secs)).await;

        let candles = match feed.candles(220).await {
            Ok(candles) => candles,
            Err(err) => {
                warn!("candle fetch failed: {}", err);
                continue;
            }
        };
        let Some(last) = candles.last() else { continue };
        let price = last.close;

        let mut ex = exchange.lock().await;
        ex.mark(price);

        // Exits: trailing stop first, then hard stop/target.
        if let Some(position) = ex.position() {
            let change = (price - position.entry_price) / position.entry_price;
            if change > 0.0 {
                let base = trail_base.get_or_insert(price);
                if price > *base {
                    *base = price;
                }
                if (*base - price) / *base >= trailing {
                    if let Some(fill) = ex.sell() {
                        log.record(&bot_id, &pair, &strategy, &fill);
                        trail_base = None;
                        continue;
                    }
                }
            }
            if change <= -stop_loss || change >= take_profit {
                if let Some(fill) = ex.sell() {
                    log.record(&bot_id, &pair, &strategy, &fill);
                    trail_base = None;
                }
            }
        }

        // Entries.
        if ex.position().is_none() && strategy::evaluate(&strategy, &candles) == Some(Signal::Buy) {
            if let Some(fill) = ex.buy(size_pct) {
                info!("opened {} @ {}", fill.quantity, fill.price);
                log.record(&bot_id, &pair, &strategy, &fill);
            }
        }
    }
}
"##;

const STRATEGY: &str = r##"//! Signal evaluation over OHLCV candles.

#[derive(Debug, Clone, Copy)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(first) => *first,
        None => return out,
    };
    for value in values {
        prev = value * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

// Wilder-smoothed RSI; neutral 50 until enough history.
fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![50.0; values.len()];
    if values.len() <= period {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let delta = values[i] - values[i - 1];
        if delta >= 0.0 {
            avg_gain += delta;
        } else {
            avg_loss -= delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    for i in period + 1..values.len() {
        let delta = values[i] - values[i - 1];
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }
    out
}

fn macd(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let fast = ema(values, 12);
    let slow = ema(values, 26);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, 9);
    (line, signal)
}

fn crossed_above(a: &[f64], b: &[f64]) -> bool {
    let n = a.len().min(b.len());
    n >= 2 && a[n - 2] < b[n - 2] && a[n - 1] > b[n - 1]
}

pub fn signal_ema(candles: &[Candle]) -> Option<Signal> {
    if candles.len() < 23 {
        return None;
    }
    let closes = closes(candles);
    let fast = ema(&closes, 9);
    let slow = ema(&closes, 21);
    if crossed_above(&fast, &slow) {
        Some(Signal::Buy)
    } else if crossed_above(&slow, &fast) {
        Some(Signal::Sell)
    } else {
        None
    }
}

pub fn signal_rsi_macd(candles: &[Candle]) -> Option<Signal> {
    if candles.len() < 40 {
        return None;
    }
    let closes = closes(candles);
    let rsi = rsi(&closes, 14);
    let (line, signal) = macd(&closes);
    let n = rsi.len();
    let rsi_up = rsi[n - 2] < 30.0 && rsi[n - 1] > 30.0;
    let rsi_down = rsi[n - 2] > 70.0 && rsi[n - 1] < 70.0;
    if rsi_up && crossed_above(&line, &signal) {
        Some(Signal::Buy)
    } else if rsi_down && crossed_above(&signal, &line) {
        Some(Signal::Sell)
    } else {
        None
    }
}

pub fn signal_scalping(candles: &[Candle]) -> Option<Signal> {
    let last = candles.last()?;
    let range = last.high - last.low;
    if range <= 0.0 {
        return None;
    }
    let body = (last.close - last.open).abs();
    if body / range > 0.7 && last.close > last.open {
        Some(Signal::Buy)
    } else {
        None
    }
}

/// Combined signal: entries require EMA and RSI/MACD agreement.
pub fn signal_combo(candles: &[Candle]) -> Option<Signal> {
    let a = signal_ema(candles);
    let b = signal_rsi_macd(candles);
    match (a, b) {
        (Some(Signal::Buy), Some(Signal::Buy)) => Some(Signal::Buy),
        (Some(Signal::Sell), _) | (_, Some(Signal::Sell)) => Some(Signal::Sell),
        _ => None,
    }
}

pub fn evaluate(name: &str, candles: &[Candle]) -> Option<Signal> {
    match name {
        "ema" => signal_ema(candles),
        "rsi_macd" => signal_rsi_macd(candles),
        "scalping" => signal_scalping(candles),
        _ => signal_combo(candles),
    }
}
"##;

const EXCHANGE: &str = r##"//! Simulated exchange and public market data feed.

use crate::strategy::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// One simulated fill. `pnl` is zero on entries.
#[derive(Debug, Clone, Copy)]
pub struct Fill {
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub pnl: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
}

/// Paper exchange: tracks cash and at most one open position.
pub struct PaperExchange {
    cash: f64,
    position: Option<Position>,
    last_price: f64,
    fee: f64,
}

impl PaperExchange {
    pub fn new(base_capital: f64) -> Self {
        Self {
            cash: base_capital,
            position: None,
            last_price: 0.0,
            fee: 0.0006,
        }
    }

    /// Update the mark price used for fills and equity.
    pub fn mark(&mut self, price: f64) {
        self.last_price = price;
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn buy(&mut self, size_pct: f64) -> Option<Fill> {
        let notional = self.cash * size_pct;
        if notional <= 0.0 || self.last_price <= 0.0 {
            return None;
        }
        let quantity = (notional / self.last_price) * (1.0 - self.fee);
        self.cash -= notional;
        self.position = Some(Position {
            quantity,
            entry_price: self.last_price,
        });
        Some(Fill {
            side: Side::Buy,
            quantity,
            price: self.last_price,
            pnl: 0.0,
        })
    }

    pub fn sell(&mut self) -> Option<Fill> {
        let position = self.position.take()?;
        let gross = position.quantity * self.last_price * (1.0 - self.fee);
        let pnl = gross - position.quantity * position.entry_price;
        self.cash += gross;
        Some(Fill {
            side: Side::Sell,
            quantity: position.quantity,
            price: self.last_price,
            pnl,
        })
    }

    pub fn equity(&self) -> f64 {
        match self.position {
            Some(position) => self.cash + position.quantity * self.last_price,
            None => self.cash,
        }
    }
}

/// OHLCV candles from the Binance public REST API.
pub struct MarketFeed {
    client: reqwest::Client,
    symbol: String,
    interval: String,
}

impl MarketFeed {
    pub fn new(pair: &str, timeframe: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            symbol: pair.replace('/', ""),
            interval: timeframe.to_string(),
        }
    }

    pub async fn candles(&self, limit: usize) -> anyhow::Result<Vec<Candle>> {
        let url = format!(
            "https://api.binance.com/api/v3/klines?symbol={}&interval={}&limit={}",
            self.symbol, self.interval, limit
        );
        let rows: Vec<Vec<serde_json::Value>> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Candle {
                    open: field(row, 1)?,
                    high: field(row, 2)?,
                    low: field(row, 3)?,
                    close: field(row, 4)?,
                    volume: field(row, 5)?,
                })
            })
            .collect())
    }
}

fn field(row: &[serde_json::Value], idx: usize) -> Option<f64> {
    row.get(idx)?.as_str()?.parse().ok()
}
"##;

const STORAGE: &str = r##"//! Sqlite trade log.

use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::exchange::{Fill, Side};

pub struct TradeLog {
    conn: Mutex<Connection>,
}

impl TradeLog {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                pair TEXT NOT NULL,
                strategy TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                pnl REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE TABLE IF NOT EXISTS bot_stats (
                bot_id TEXT PRIMARY KEY,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                consecutive_losses INTEGER NOT NULL DEFAULT 0
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record a fill; closing fills also update the win/loss counters.
    /// Logging failures are swallowed — the trading loop must not die on a
    /// full disk.
    pub fn record(&self, bot_id: &str, pair: &str, strategy: &str, fill: &Fill) {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => return,
        };
        let _ = conn.execute(
            "INSERT INTO trades (bot_id, pair, strategy, side, quantity, price, pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bot_id,
                pair,
                strategy,
                fill.side.as_str(),
                fill.quantity,
                fill.price,
                fill.pnl
            ],
        );
        if fill.side == Side::Sell {
            let won = fill.pnl > 0.0;
            let _ = conn.execute(
                "INSERT INTO bot_stats (bot_id, wins, losses, consecutive_losses)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(bot_id) DO UPDATE SET
                    wins = wins + excluded.wins,
                    losses = losses + excluded.losses,
                    consecutive_losses = CASE
                        WHEN excluded.losses = 0 THEN 0
                        ELSE consecutive_losses + 1
                    END",
                params![bot_id, won as i64, !won as i64],
            );
        }
    }
}
"##;

const ENV_DEFAULTS: &str = r##"MODE=paper
BOT_ID={bot_id}
PAIR={pair}
STRATEGY={strategy}
TIMEFRAME={timeframe}
SIZE_PCT=0.12
STOP_LOSS_PCT=0.006
TAKE_PROFIT_PCT=0.012
TRAILING_PCT=0.004
LOOP_SECONDS=7
BASE_CAPITAL=1000
"##;

const BLUEPRINT: &str = r##"services:
  - type: web
    name: {name}
    env: docker
    plan: starter
    autoDeploy: true
    region: oregon
    branch: main
    healthCheckPath: /status
"##;

const CI_WORKFLOW: &str = r##"name: ci
on:
  push:
    branches: [ "main" ]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: dtolnay/rust-toolchain@stable
      - run: cargo build --release
      - run: cargo test
"##;

const README: &str = r##"# {name}

Paper-trading bot. The trading loop runs in the background; `/status`
reports the current equity for the deploy health check.

Runtime configuration lives in `.env` (mode, pair, strategy, risk limits).
"##;
