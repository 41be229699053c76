//! Shared state for request handlers.

use std::sync::Arc;

use bourse_core::{Account, AccountKind, SharedClock};
use bourse_executor::TradeExecutor;
use bourse_ledger::LedgerStore;
use bourse_scheduler::TradingScheduler;
use bourse_valuation::{ReconciliationChecker, ValuationService};
use rust_decimal::Decimal;
use tracing::info;

use crate::auth::{CronAuth, Session, SessionVerifier};
use crate::error::ApiResult;

/// Services the API routes call into.
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) executor: Arc<TradeExecutor>,
    pub(crate) valuation: Arc<ValuationService>,
    pub(crate) reconciliation: Arc<ReconciliationChecker>,
    pub(crate) scheduler: Arc<TradingScheduler>,
    pub(crate) sessions: Arc<dyn SessionVerifier>,
    pub(crate) cron: Arc<CronAuth>,
    pub(crate) clock: SharedClock,
    /// Seed balance for accounts opened on first use.
    pub(crate) starting_cash: Decimal,
    pub(crate) top_agents: usize,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        executor: Arc<TradeExecutor>,
        valuation: Arc<ValuationService>,
        reconciliation: Arc<ReconciliationChecker>,
        scheduler: Arc<TradingScheduler>,
        sessions: Arc<dyn SessionVerifier>,
        cron: Arc<CronAuth>,
        clock: SharedClock,
        starting_cash: Decimal,
    ) -> Self {
        Self {
            store,
            executor,
            valuation,
            reconciliation,
            scheduler,
            sessions,
            cron,
            clock,
            starting_cash,
            top_agents: 5,
        }
    }

    #[must_use]
    pub fn with_top_agents(mut self, top_agents: usize) -> Self {
        self.top_agents = top_agents;
        self
    }

    /// Open a human account for the session on first use.
    pub(crate) async fn ensure_account(&self, session: &Session) -> ApiResult<Account> {
        if let Some(account) = self.store.get_account(&session.account_id).await? {
            return Ok(account);
        }
        let account = self
            .store
            .open_account(Account::new(
                session.account_id.clone(),
                session.display_name.clone(),
                AccountKind::Human,
                self.starting_cash,
                self.clock.now(),
            ))
            .await?;
        info!(account = %account.id, cash = %account.cash_available, "Account provisioned");
        Ok(account)
    }
}
