//! The scheduled tasks owned by logged in customers.
//!
//! Each customer account has at most one daily credit task and one mining
//! task. The tasks of an account live as long as at least one of its
//! sessions: they stop when the last session logs out or expires, and on
//! server shutdown.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    Error,
    account::AccountId,
    bank::Bank,
    config::BankConfig,
    daily_credit::spawn_daily_credit_task,
    mining::spawn_mining_task,
    scheduled_task::ScheduledTask,
};

#[derive(Debug, Default)]
struct AccountTasks {
    /// The account's sessions and when each one expires.
    sessions: HashMap<Uuid, OffsetDateTime>,
    daily_credit: Option<ScheduledTask>,
    mining: Option<ScheduledTask>,
}

impl AccountTasks {
    fn has_live_session(&self, now: OffsetDateTime) -> bool {
        self.sessions.values().any(|expires_at| *expires_at > now)
    }

    fn into_tasks(self) -> impl Iterator<Item = ScheduledTask> {
        self.daily_credit.into_iter().chain(self.mining)
    }
}

fn is_running(task: &Option<ScheduledTask>) -> bool {
    task.as_ref().is_some_and(|task| !task.is_finished())
}

/// A registry of the running tasks of each account.
#[derive(Debug, Clone, Default)]
pub struct SessionTasks {
    tasks: Arc<Mutex<HashMap<AccountId, AccountTasks>>>,
}

impl SessionTasks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<AccountId, AccountTasks>>, Error> {
        self.tasks.lock().map_err(|_| Error::TaskLockError)
    }

    /// Record that session `session_id` of `account_id` is valid until `expires_at`.
    ///
    /// Called on log-in and whenever the session's cookie is extended.
    pub fn keep_alive(
        &self,
        account_id: AccountId,
        session_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), Error> {
        let mut tasks = self.lock()?;
        let expiry = tasks
            .entry(account_id)
            .or_default()
            .sessions
            .entry(session_id)
            .or_insert(expires_at);

        if *expiry < expires_at {
            *expiry = expires_at;
        }

        Ok(())
    }

    /// Start the daily credit task of `account_id` unless it is already running.
    pub fn start_daily_credit(
        &self,
        bank: &Bank,
        account_id: AccountId,
        config: &BankConfig,
        local_timezone: &str,
    ) -> Result<(), Error> {
        let mut tasks = self.lock()?;
        let account_tasks = tasks.entry(account_id).or_default();

        if is_running(&account_tasks.daily_credit) {
            return Ok(());
        }

        account_tasks.daily_credit = Some(spawn_daily_credit_task(
            bank.clone(),
            account_id,
            config.daily_credit_amount,
            local_timezone.to_owned(),
            config.daily_credit_check_interval,
        ));

        Ok(())
    }

    /// Start mining for `account_id`.
    ///
    /// Returns `false` without starting a second task if mining is already running.
    pub fn start_mining(
        &self,
        bank: &Bank,
        account_id: AccountId,
        config: &BankConfig,
    ) -> Result<bool, Error> {
        let mut tasks = self.lock()?;
        let account_tasks = tasks.entry(account_id).or_default();

        if is_running(&account_tasks.mining) {
            return Ok(false);
        }

        account_tasks.mining = Some(spawn_mining_task(
            bank.clone(),
            account_id,
            config.mining_reward,
            config.mining_interval,
        ));

        Ok(true)
    }

    /// Whether mining is running for `account_id`.
    pub fn is_mining(&self, account_id: AccountId) -> Result<bool, Error> {
        let tasks = self.lock()?;

        Ok(tasks
            .get(&account_id)
            .is_some_and(|account_tasks| is_running(&account_tasks.mining)))
    }

    /// Stop mining for `account_id` and wait for the task to exit.
    ///
    /// Returns whether mining was running.
    pub async fn stop_mining(&self, account_id: AccountId) -> Result<bool, Error> {
        let task = {
            let mut tasks = self.lock()?;
            tasks
                .get_mut(&account_id)
                .and_then(|account_tasks| account_tasks.mining.take())
        };

        match task {
            Some(task) => {
                let was_running = !task.is_finished();
                task.stop().await;
                Ok(was_running)
            }
            None => Ok(false),
        }
    }

    /// End session `session_id` of `account_id`.
    ///
    /// If the account has no other live session its tasks are stopped and
    /// awaited. Returns whether the tasks were stopped.
    pub async fn end_session(
        &self,
        account_id: AccountId,
        session_id: Uuid,
    ) -> Result<bool, Error> {
        let account_tasks = {
            let mut tasks = self.lock()?;
            let Some(account_tasks) = tasks.get_mut(&account_id) else {
                return Ok(false);
            };
            account_tasks.sessions.remove(&session_id);

            if account_tasks.has_live_session(OffsetDateTime::now_utc()) {
                return Ok(false);
            }

            tasks.remove(&account_id)
        };

        if let Some(account_tasks) = account_tasks {
            for task in account_tasks.into_tasks() {
                task.stop().await;
            }

            tracing::info!("Stopped scheduled tasks for account {account_id}");
        }

        Ok(true)
    }

    /// Forget the sessions that expired before `now` and stop the tasks of
    /// every account left without a live session.
    ///
    /// Stopped tasks are signalled but not awaited. Returns the accounts
    /// whose tasks were stopped.
    pub fn reap_expired(&self, now: OffsetDateTime) -> Result<Vec<AccountId>, Error> {
        let mut tasks = self.lock()?;
        let mut reaped = Vec::new();

        tasks.retain(|account_id, account_tasks| {
            account_tasks
                .sessions
                .retain(|_, expires_at| *expires_at > now);

            if account_tasks.sessions.is_empty() {
                reaped.push(*account_id);
                return false;
            }

            true
        });

        for account_id in &reaped {
            tracing::info!("Sessions of account {account_id} expired, stopped its scheduled tasks");
        }

        Ok(reaped)
    }

    /// Spawn a task that calls [SessionTasks::reap_expired] every `period`.
    pub fn spawn_reaper(&self, period: Duration) -> ScheduledTask {
        let session_tasks = self.clone();

        ScheduledTask::spawn("session reaper", Instant::now() + period, period, move || {
            if let Err(error) = session_tasks.reap_expired(OffsetDateTime::now_utc()) {
                tracing::error!("Could not stop the tasks of expired sessions: {error}");
            }
        })
    }

    /// Stop every task of every account and wait for them to exit.
    pub async fn stop_everything(&self) -> Result<(), Error> {
        let all_tasks: Vec<AccountTasks> = {
            let mut tasks = self.lock()?;
            tasks.drain().map(|(_, account_tasks)| account_tasks).collect()
        };

        for task in all_tasks.into_iter().flat_map(AccountTasks::into_tasks) {
            task.stop().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod session_tasks_tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::{
        account::{AccountId, create_account, get_account_by_id},
        bank::Bank,
        config::BankConfig,
        ledger::list_entries_for_account,
        test_utils::{get_test_connection, new_test_account},
    };

    use super::SessionTasks;

    fn fast_config() -> BankConfig {
        BankConfig {
            daily_credit_amount: dec!(10.00),
            daily_credit_check_interval: Duration::from_millis(10),
            mining_reward: dec!(0.5),
            mining_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn mining_starts_once_and_stops() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();

        assert_eq!(tasks.start_mining(&bank, account.id, &fast_config()), Ok(true));
        assert_eq!(tasks.start_mining(&bank, account.id, &fast_config()), Ok(false));
        assert_eq!(tasks.is_mining(account.id), Ok(true));

        assert_eq!(tasks.stop_mining(account.id).await, Ok(true));
        assert_eq!(tasks.is_mining(account.id), Ok(false));
        assert_eq!(tasks.stop_mining(account.id).await, Ok(false));
    }

    fn entry_count(bank: &Bank, account_id: AccountId) -> usize {
        let connection = bank.connection().unwrap();
        list_entries_for_account(account_id, &connection)
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn ending_the_last_session_stops_every_task_of_the_account() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();
        let config = fast_config();
        let session_id = Uuid::new_v4();
        let expires_at = OffsetDateTime::now_utc() + Duration::from_secs(60);
        tasks.keep_alive(account.id, session_id, expires_at).unwrap();
        tasks
            .start_daily_credit(&bank, account.id, &config, "Etc/UTC")
            .unwrap();
        tasks.start_mining(&bank, account.id, &config).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(tasks.end_session(account.id, session_id).await, Ok(true));
        let entries_after_stop = entry_count(&bank, account.id);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(entry_count(&bank, account.id), entries_after_stop);
        assert_eq!(tasks.is_mining(account.id), Ok(false));
        let connection = bank.connection().unwrap();
        let account = get_account_by_id(account.id, &connection).unwrap();
        assert_eq!(account.balances.usd, dec!(10.00));
    }

    #[tokio::test]
    async fn ending_one_of_two_sessions_keeps_tasks_running() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();
        let expires_at = OffsetDateTime::now_utc() + Duration::from_secs(60);
        let (phone, laptop) = (Uuid::new_v4(), Uuid::new_v4());
        tasks.keep_alive(account.id, phone, expires_at).unwrap();
        tasks.keep_alive(account.id, laptop, expires_at).unwrap();
        tasks.start_mining(&bank, account.id, &fast_config()).unwrap();

        assert_eq!(tasks.end_session(account.id, phone).await, Ok(false));
        assert_eq!(tasks.is_mining(account.id), Ok(true));

        assert_eq!(tasks.end_session(account.id, laptop).await, Ok(true));
        assert_eq!(tasks.is_mining(account.id), Ok(false));
    }

    #[tokio::test]
    async fn expired_session_without_log_out_stops_tasks() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();
        let expires_at = OffsetDateTime::now_utc() + Duration::from_millis(100);
        tasks.keep_alive(account.id, Uuid::new_v4(), expires_at).unwrap();
        tasks.start_mining(&bank, account.id, &fast_config()).unwrap();

        assert_eq!(tasks.reap_expired(OffsetDateTime::now_utc()), Ok(vec![]));
        assert_eq!(tasks.is_mining(account.id), Ok(true));

        let reaper = tasks.spawn_reaper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(tasks.is_mining(account.id), Ok(false));
        let entries_after_expiry = entry_count(&bank, account.id);
        assert!(entries_after_expiry > 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(entry_count(&bank, account.id), entries_after_expiry);

        reaper.stop().await;
    }

    #[tokio::test]
    async fn keep_alive_pushes_back_expiry() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();
        let session_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        tasks
            .keep_alive(account.id, session_id, now + Duration::from_secs(1))
            .unwrap();
        tasks.start_mining(&bank, account.id, &fast_config()).unwrap();

        tasks
            .keep_alive(account.id, session_id, now + Duration::from_secs(60))
            .unwrap();
        tasks
            .keep_alive(account.id, session_id, now + Duration::from_secs(2))
            .unwrap();

        assert_eq!(tasks.reap_expired(now + Duration::from_secs(30)), Ok(vec![]));
        assert_eq!(tasks.is_mining(account.id), Ok(true));
        assert_eq!(
            tasks.reap_expired(now + Duration::from_secs(61)),
            Ok(vec![account.id])
        );

        tasks.stop_everything().await.unwrap();
    }

    #[tokio::test]
    async fn starting_daily_credit_twice_keeps_one_task() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bank = Bank::new(connection);
        let tasks = SessionTasks::new();
        let config = fast_config();

        tasks
            .start_daily_credit(&bank, account.id, &config, "Etc/UTC")
            .unwrap();
        tasks
            .start_daily_credit(&bank, account.id, &config, "Etc/UTC")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        tasks.stop_everything().await.unwrap();

        let connection = bank.connection().unwrap();
        let account = get_account_by_id(account.id, &connection).unwrap();
        assert_eq!(account.balances.usd, dec!(10.00));
    }
}
