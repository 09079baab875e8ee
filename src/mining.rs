//! Simulated mining: a per-session task that credits a BTC reward on a fixed cadence.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    AppState, Error,
    account::AccountId,
    auth::Session,
    bank::Bank,
    config::BankConfig,
    ledger::LedgerEntry,
    movement::Movement,
    scheduled_task::ScheduledTask,
    session_tasks::SessionTasks,
    unit::Unit,
};

/// The ledger description of a mining reward.
pub const MINING_REWARD_DESCRIPTION: &str = "Mining reward";

/// Credit one mining reward of `reward` BTC to `account_id`.
pub fn mine_once(account_id: AccountId, reward: Decimal, bank: &Bank) -> Result<LedgerEntry, Error> {
    bank.apply_movement(Movement::credit(
        account_id,
        reward,
        Unit::Btc,
        MINING_REWARD_DESCRIPTION,
    ))
}

/// Spawn a task that credits `reward` BTC to `account_id` every `period`,
/// starting one period from now.
pub fn spawn_mining_task(
    bank: Bank,
    account_id: AccountId,
    reward: Decimal,
    period: Duration,
) -> ScheduledTask {
    ScheduledTask::spawn("mining", Instant::now() + period, period, move || {
        if let Err(error) = mine_once(account_id, reward, &bank) {
            tracing::error!("Could not credit mining reward to account {account_id}: {error}");
        }
    })
}

/// The state needed to toggle mining.
#[derive(Debug, Clone)]
pub struct MiningState {
    /// Database access for the mining task.
    pub bank: Bank,
    /// The running tasks of logged in customers.
    pub session_tasks: SessionTasks,
    /// The mining reward and cadence.
    pub bank_config: BankConfig,
}

impl FromRef<AppState> for MiningState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            bank: state.bank.clone(),
            session_tasks: state.session_tasks.clone(),
            bank_config: state.bank_config.clone(),
        }
    }
}

/// Whether mining is running after a toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiningStatus {
    /// `true` if the mining task is running.
    pub mining: bool,
}

/// Route handler that starts mining for the logged in customer, or stops it
/// if it is already running.
pub async fn post_toggle_mining(
    State(state): State<MiningState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MiningStatus>, Error> {
    let account_id = session.account_id()?;

    let mining = if state.session_tasks.stop_mining(account_id).await? {
        tracing::info!("Stopped mining for account {account_id}");
        false
    } else {
        state
            .session_tasks
            .start_mining(&state.bank, account_id, &state.bank_config)?;
        tracing::info!("Started mining for account {account_id}");
        true
    };

    Ok(Json(MiningStatus { mining }))
}
