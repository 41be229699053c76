//! Main application orchestration.
//!
//! Wires the ledger, oracle, executor, strategy engine, scheduler and
//! valuation services together, seeds instruments and agent accounts, and
//! runs:
//! - the HTTP API (optional)
//! - an internal trading round loop (optional; the cron route is the default trigger)
//! - instrument stored-price refresh
//! - display-cache refresh
//! - the reconciliation audit
//!
//! Every loop stops on the shared cancellation token, which Ctrl-C trips.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bourse_api::{AppState, CronAuth, StaticSessions};
use bourse_core::{Account, AccountKind, AgentStatus, Instrument, InstrumentTable, SharedClock, SystemClock};
use bourse_executor::{LedgerPriceLookup, TradeExecutor};
use bourse_ledger::{InMemoryLedgerStore, LedgerStore};
use bourse_oracle::{
    FinnhubConfig, FinnhubProvider, MarketDataProvider, PriceOracle, RateLimiter, StaticQuoteProvider,
};
use bourse_persistence::{AuditSink, JsonLinesAuditLog, MemoryAuditLog};
use bourse_scheduler::{refresh_instrument_prices, TradingScheduler};
use bourse_strategy::{NarrationMode, Narrator, ReasoningClient, StrategyEngine};
use bourse_valuation::{ReconciliationChecker, ValuationService};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ProviderKind, Secrets};
use crate::error::{AppError, AppResult};

/// Main application.
pub struct Application {
    config: AppConfig,
    clock: SharedClock,
    store: Arc<dyn LedgerStore>,
    instruments: Arc<InstrumentTable>,
    oracle: Arc<PriceOracle>,
    executor: Arc<TradeExecutor>,
    scheduler: Arc<TradingScheduler>,
    valuation: Arc<ValuationService>,
    reconciliation: Arc<ReconciliationChecker>,
    cron_secret: Option<zeroize::Zeroizing<String>>,
    shutdown: CancellationToken,
}

impl Application {
    /// Build every component with the system clock and an in-memory ledger.
    pub fn new(config: AppConfig, secrets: Secrets) -> AppResult<Self> {
        Self::with_parts(
            config,
            secrets,
            Arc::new(SystemClock),
            Arc::new(InMemoryLedgerStore::new()),
        )
    }

    /// Build every component around the given clock and store.
    pub fn with_parts(
        config: AppConfig,
        secrets: Secrets,
        clock: SharedClock,
        store: Arc<dyn LedgerStore>,
    ) -> AppResult<Self> {
        let instruments = Arc::new(InstrumentTable::new(config.instruments.clone())?);

        let provider = build_provider(&config, &instruments, &secrets)?;
        let oracle = Arc::new(
            PriceOracle::new(provider, clock.clone(), config.oracle.clone())
                .with_fallback(Arc::new(LedgerPriceLookup::new(store.clone(), instruments.clone())))
                .with_rate_limiter(Arc::new(RateLimiter::per_second(
                    config.market_data.rate_limit_per_sec,
                ))),
        );

        let executor = Arc::new(TradeExecutor::new(
            store.clone(),
            oracle.clone(),
            instruments.clone(),
            clock.clone(),
            config.ledger.executor.clone(),
        ));

        let narrator = build_narrator(&config, &secrets)?;
        let engine = Arc::new(StrategyEngine::new(config.strategy.clone(), narrator));

        let audit: Arc<dyn AuditSink> = if config.persistence.audit_enabled {
            info!(dir = %config.persistence.audit_dir, "Decision audit log enabled");
            Arc::new(JsonLinesAuditLog::new(
                &config.persistence.audit_dir,
                config.persistence.buffer_size,
            ))
        } else {
            Arc::new(MemoryAuditLog::default())
        };

        let scheduler = Arc::new(TradingScheduler::new(
            store.clone(),
            oracle.clone(),
            executor.clone(),
            engine,
            instruments.clone(),
            audit,
            clock.clone(),
            config.agent_profiles(),
            config.scheduler.clone(),
        ));

        let valuation = Arc::new(ValuationService::new(
            store.clone(),
            oracle.clone(),
            instruments.clone(),
            clock.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationChecker::new(valuation.clone()));

        Ok(Self {
            config,
            clock,
            store,
            instruments,
            oracle,
            executor,
            scheduler,
            valuation,
            reconciliation,
            cron_secret: secrets.cron_secret,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<TradingScheduler> {
        &self.scheduler
    }

    pub fn valuation(&self) -> &Arc<ValuationService> {
        &self.valuation
    }

    pub fn reconciliation(&self) -> &Arc<ReconciliationChecker> {
        &self.reconciliation
    }

    /// Token that stops every background task when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Store instruments and agent accounts that do not exist yet.
    pub async fn seed(&self) -> AppResult<()> {
        let now = self.clock.now();

        let mut added = 0;
        for meta in self.instruments.iter() {
            if self.store.get_instrument(&meta.id).await?.is_none() {
                self.store
                    .upsert_instrument(Instrument::from_meta(meta, now))
                    .await?;
                added += 1;
            }
        }

        for agent in &self.config.agents {
            let status = if agent.paused {
                AgentStatus::Paused
            } else {
                AgentStatus::Active
            };
            let account = Account::new(
                agent.id.clone(),
                agent.display_name.clone(),
                AccountKind::Agent,
                self.config.ledger.starting_cash,
                now,
            )
            .with_agent_persona(agent.persona.strategy.as_str(), status);
            self.store.open_account(account).await?;
        }

        info!(
            instruments = self.instruments.len(),
            new_instruments = added,
            agents = self.config.agents.len(),
            "Ledger seeded"
        );
        Ok(())
    }

    /// API state sharing this application's services.
    pub fn api_state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.executor.clone(),
            self.valuation.clone(),
            self.reconciliation.clone(),
            self.scheduler.clone(),
            Arc::new(StaticSessions::new(&self.config.api.sessions)),
            Arc::new(CronAuth::new(self.cron_secret.clone())),
            self.clock.clone(),
            self.config.ledger.starting_cash,
        )
        .with_top_agents(self.config.valuation.top_agents)
    }

    /// Run until Ctrl-C or until the shutdown token is cancelled.
    pub async fn run(self) -> AppResult<()> {
        self.seed().await?;

        let mut tasks = self.spawn_background_tasks();

        if self.config.api.enabled {
            let state = self.api_state();
            let api_config = self.config.api.clone();
            let stop = self.shutdown.clone().cancelled_owned();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = bourse_api::run_server(state, api_config, stop).await {
                    error!(error = %e, "API server failed");
                }
            }));
        }

        info!(tasks = tasks.len(), "Application running, press Ctrl-C to stop");

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
            }
            _ = self.shutdown.cancelled() => {
                info!("Shutdown token cancelled");
            }
        }
        self.shutdown.cancel();

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task panicked");
            }
        }

        info!("Application stopped");
        Ok(())
    }

    fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        let round_secs = self.config.scheduler.round_interval_secs;
        if round_secs > 0 {
            let scheduler = self.scheduler.clone();
            tasks.push(spawn_periodic(
                "trading_round",
                Duration::from_secs(round_secs),
                self.shutdown.clone(),
                move || {
                    let scheduler = scheduler.clone();
                    async move {
                        match scheduler.run_round().await {
                            Ok(report) => debug!(round_id = %report.round_id, "Scheduled round finished"),
                            Err(e) => warn!(error = %e, "Scheduled round not run"),
                        }
                    }
                },
            ));
        }

        let refresh_secs = self.config.scheduler.price_refresh_interval_secs;
        if refresh_secs > 0 {
            let oracle = self.oracle.clone();
            let store = self.store.clone();
            let instruments = self.instruments.clone();
            let clock = self.clock.clone();
            tasks.push(spawn_periodic(
                "price_refresh",
                Duration::from_secs(refresh_secs),
                self.shutdown.clone(),
                move || {
                    let (oracle, store, instruments, clock) =
                        (oracle.clone(), store.clone(), instruments.clone(), clock.clone());
                    async move {
                        refresh_instrument_prices(&oracle, store.as_ref(), &instruments, &clock).await;
                    }
                },
            ));
        }

        let display_secs = self.config.valuation.display_refresh_interval_secs;
        if display_secs > 0 {
            let valuation = self.valuation.clone();
            tasks.push(spawn_periodic(
                "display_refresh",
                Duration::from_secs(display_secs),
                self.shutdown.clone(),
                move || {
                    let valuation = valuation.clone();
                    async move {
                        if let Err(e) = valuation.refresh_display_cache().await {
                            warn!(error = %e, "Display cache refresh failed");
                        }
                    }
                },
            ));
        }

        let audit_secs = self.config.valuation.reconciliation_interval_secs;
        if audit_secs > 0 {
            let checker = self.reconciliation.clone();
            let clock = self.clock.clone();
            tasks.push(spawn_periodic(
                "reconciliation",
                Duration::from_secs(audit_secs),
                self.shutdown.clone(),
                move || {
                    let (checker, clock) = (checker.clone(), clock.clone());
                    async move {
                        if let Err(e) = checker.check_all(clock.now()).await {
                            warn!(error = %e, "Reconciliation audit failed");
                        }
                    }
                },
            ));
        }

        tasks
    }
}

/// Run `task` every `every` until `shutdown` is cancelled. The first run
/// happens one full period after spawning.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    every: Duration,
    shutdown: CancellationToken,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        info!(task = name, period_secs = every.as_secs(), "Background task started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => task().await,
            }
        }
        debug!(task = name, "Background task stopped");
    })
}

fn build_provider(
    config: &AppConfig,
    instruments: &InstrumentTable,
    secrets: &Secrets,
) -> AppResult<Arc<dyn MarketDataProvider>> {
    match config.market_data.provider {
        ProviderKind::Static => {
            let provider = StaticQuoteProvider::new();
            for meta in instruments.iter() {
                provider.set_price(&meta.ticker, meta.initial_price);
            }
            info!(instruments = instruments.len(), "Using static quote provider");
            Ok(Arc::new(provider))
        }
        ProviderKind::Finnhub => {
            if secrets.finnhub_api_key.is_empty() {
                return Err(AppError::Config(
                    "market_data.provider = \"finnhub\" requires FINNHUB_API_KEY".to_string(),
                ));
            }
            let mut finnhub = FinnhubConfig::new(secrets.finnhub_api_key.as_str());
            finnhub.base_url.clone_from(&config.market_data.base_url);
            finnhub.timeout = Duration::from_millis(config.market_data.request_timeout_ms);
            info!(base_url = %finnhub.base_url, "Using Finnhub quote provider");
            Ok(Arc::new(FinnhubProvider::new(finnhub)?))
        }
    }
}

fn build_narrator(config: &AppConfig, secrets: &Secrets) -> AppResult<Option<Arc<dyn Narrator>>> {
    if config.strategy.narration == NarrationMode::Disabled {
        info!("Narration disabled, using template rationales");
        return Ok(None);
    }

    let reasoning = config.reasoning_config(secrets.reasoning_api_key.clone());
    if !reasoning.is_configured() {
        warn!(
            mode = ?config.strategy.narration,
            "REASONING_API_KEY not set, decisions use template rationales"
        );
        return Ok(None);
    }

    info!(model = %reasoning.model, mode = ?config.strategy.narration, "Reasoning narrator enabled");
    Ok(Some(Arc::new(ReasoningClient::new(reasoning)?)))
}
