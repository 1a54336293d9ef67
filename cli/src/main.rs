//! Process bootstrap: load config, wire the shared services, spawn one
//! worker per character, serve the status HTTP surface, and shut everything
//! down cleanly on ctrl-c or a restart request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use agent::bank::BankTileCache;
use agent::routines::default_routines;
use agent::{CharacterContext, CharacterWorker, Services};
use common::{Clock, SystemClock, logger::init_logger};
use gameapi::{GameApi, HttpGameClient, StaticData, StaticIndex};
use ledger::InventoryLedger;
use orders::{JsonFileStore, OrderBoard};
use settings::AgentConfig;
use status::{
    AppState, BankView, ConfigHandle, ControlActions, ControlState, OrderRow, SandboxActions,
    StatusBus,
};

#[derive(Debug, Parser)]
#[clap(name = "grid-agent", version)]
struct Cli {
    /// Path to the agent config file.
    #[clap(long, default_value = "agent.json")]
    config: PathBuf,

    /// Override the configured status HTTP listen address.
    #[clap(long)]
    listen: Option<String>,
}

/// Control surface wired to the running process.
struct AgentControl {
    orders: Arc<OrderBoard>,
    gear_state_path: Option<PathBuf>,
    stop_tx: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl ControlActions for AgentControl {
    async fn restart(&self) -> anyhow::Result<()> {
        info!("restart requested, stopping workers");
        self.stop_tx.send(true).ok();
        Ok(())
    }

    async fn clear_order_board(&self) -> anyhow::Result<()> {
        self.orders.clear().await?;
        Ok(())
    }

    async fn clear_gear_state(&self) -> anyhow::Result<()> {
        let Some(path) = &self.gear_state_path else {
            info!("no gear state file configured, nothing to clear");
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// Forwards dashboard sandbox requests to the upstream server.
struct SandboxBridge {
    api: Arc<dyn GameApi>,
}

#[async_trait::async_trait]
impl SandboxActions for SandboxBridge {
    async fn give_gold(&self, name: &str, quantity: u64) -> anyhow::Result<()> {
        Ok(self.api.sandbox_give_gold(name, quantity).await?)
    }

    async fn give_item(&self, name: &str, code: &str, quantity: u32) -> anyhow::Result<()> {
        Ok(self.api.sandbox_give_item(name, code, quantity).await?)
    }

    async fn give_xp(&self, name: &str, skill: &str, quantity: u64) -> anyhow::Result<()> {
        Ok(self.api.sandbox_give_xp(name, skill, quantity).await?)
    }

    async fn spawn_event(&self, code: &str) -> anyhow::Result<()> {
        Ok(self.api.sandbox_spawn_event(code).await?)
    }

    async fn reset_account(&self) -> anyhow::Result<()> {
        Ok(self.api.sandbox_reset_account().await?)
    }
}

/// Read, normalize and validate the config; a missing file starts from
/// defaults so a fresh deployment can be configured over HTTP.
fn load_config(path: &PathBuf) -> anyhow::Result<(String, AgentConfig)> {
    let (raw, mut cfg) = match std::fs::read_to_string(path) {
        Ok(raw) => {
            let cfg: AgentConfig = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            (raw, cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file missing, starting from defaults");
            let cfg = AgentConfig::default();
            (serde_json::to_string_pretty(&cfg)?, cfg)
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    settings::normalize(&mut cfg);
    let issues = settings::validate(&cfg);
    for issue in &issues {
        error!(path = %issue.path, message = %issue.message, "config issue");
    }
    if !cfg.characters.is_empty() && !issues.is_empty() {
        anyhow::bail!("config failed validation with {} issue(s)", issues.len());
    }
    Ok((raw, cfg))
}

/// The static dataset (monsters, resources, recipes, locations) is produced
/// by its own loader; until one is attached, an empty index degrades the
/// rotation to bank and deposit work.
fn load_static_data() -> StaticIndex {
    StaticIndex::default()
}

/// Periodically fold the order board and bank figures into the status bus.
fn start_status_refresher(
    bus: Arc<StatusBus>,
    board: Arc<OrderBoard>,
    ledger: Arc<InventoryLedger>,
    mut stop: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => break,
            }
            let rows: Vec<OrderRow> = board.snapshot().await.iter().map(OrderRow::from).collect();
            bus.publish_orders(rows);
            bus.publish_bank(BankView::from(&ledger.summary()));
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("grid-agent");
    let cli = Cli::parse();

    let (raw_config, cfg) = load_config(&cli.config)?;
    let listen = cli.listen.unwrap_or_else(|| cfg.http.listen_addr.clone());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let token = std::env::var("GAME_API_TOKEN").ok().or_else(|| cfg.api.token.clone());
    let client = Arc::new(HttpGameClient::new(
        cfg.api.base_url.clone(),
        token,
        Duration::from_secs(cfg.api.timeout_secs),
        clock.clone(),
    )?);
    let api: Arc<dyn GameApi> = client.clone();

    let ledger = Arc::new(InventoryLedger::new(client.clone(), clock.clone()));
    let board = Arc::new(
        OrderBoard::initialize(
            Arc::new(JsonFileStore::new(&cfg.order_board_path)),
            clock.clone(),
        )
        .await
        .context("order board initialization")?,
    );
    let data: Arc<dyn StaticData> = Arc::new(load_static_data());
    let tiles = Arc::new(BankTileCache::new(api.clone(), clock.clone()));
    let bus = Arc::new(StatusBus::new(clock.clone()));

    let services = Services {
        api: api.clone(),
        ledger: ledger.clone(),
        orders: board.clone(),
        data,
        clock: clock.clone(),
        tiles,
        status: bus.clone(),
        travel: cfg.bank_travel.clone(),
    };

    let (stop_tx, stop_rx) = watch::channel(false);

    // One worker per configured character that exists on the account.
    let roster = api.get_my_characters().await.context("fetching roster")?;
    let mut workers = JoinSet::new();
    for character_cfg in &cfg.characters {
        let Some(live) = roster.iter().find(|c| c.name == character_cfg.name) else {
            warn!(character = %character_cfg.name, "configured character not on the account");
            continue;
        };
        let ctx = CharacterContext::new(character_cfg.clone(), services.clone(), live.clone());
        let worker = CharacterWorker::new(ctx, default_routines(), stop_rx.clone());
        workers.spawn(worker.run());
    }
    if workers.is_empty() {
        warn!("no workers started; the process only serves the status surface");
    }

    start_status_refresher(bus.clone(), board.clone(), ledger.clone(), stop_rx.clone());

    // Sandbox endpoints are mounted only against a sandbox server.
    let sandbox: Option<Arc<dyn SandboxActions>> = match api.get_server_details().await {
        Ok(details) if details.is_sandbox => Some(Arc::new(SandboxBridge { api: api.clone() })),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "server details unavailable, assuming live server");
            None
        }
    };

    let state = AppState {
        bus: bus.clone(),
        config: Arc::new(ConfigHandle::new(&cli.config, raw_config, clock.clone())),
        control: Arc::new(ControlState::default()),
        actions: Arc::new(AgentControl {
            orders: board.clone(),
            gear_state_path: cfg.gear_state_path.clone().map(PathBuf::from),
            stop_tx: stop_tx.clone(),
        }),
        sandbox,
    };

    let mut http_stop = stop_rx.clone();
    let http = tokio::spawn(async move {
        let shutdown = async move {
            let _ = http_stop.changed().await;
        };
        if let Err(e) = status::serve(&listen, state, shutdown).await {
            error!(error = %e, "status http server failed");
        }
    });

    info!(characters = cfg.characters.len(), "agent started");

    // Run until ctrl-c or a restart request from the control surface.
    let mut main_stop = stop_rx.clone();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        _ = main_stop.changed() => info!("stop requested via control surface"),
    }
    stop_tx.send(true).ok();

    // Workers observe the stop signal, finish their inflight call and exit;
    // the board is flushed last so no claim state is lost.
    while workers.join_next().await.is_some() {}
    http.await.ok();
    board.flush().await.context("final order board flush")?;

    info!("agent stopped");
    Ok(())
}
