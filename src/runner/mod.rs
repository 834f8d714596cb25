//! Per-account orchestration
//!
//! Runs login + in-game flow for one account and maps the outcome onto the
//! process exit-code contract; the batch driver spawns one child process
//! per account so corrupted in-memory state (stale window handles,
//! desynchronized stages) cannot leak between accounts. Callers branch on
//! the exit codes, not just success/failure.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::accounts::{
    consume, read_accounts, read_result_file, AccountLedger, Credentials,
};
use crate::config::Settings;
use crate::control::{sleep_ms, ControlFlags, Desktop};
use crate::game::{FlowOutcome, GameFlow};
use crate::launcher::{LoginError, LoginFlow};
use crate::vision::{SceneClassifier, TemplateStore};

/// Terminal success scene reached and held.
pub const EXIT_SUCCESS: i32 = 0;
/// Bad invocation or configuration (e.g. empty template index).
pub const EXIT_USAGE: i32 = 1;
/// Generic failure: time budget expired, stop requested, no progress.
pub const EXIT_FAILURE: i32 = 2;
/// The launcher rejected the credentials. Never retried.
pub const EXIT_INVALID_CREDENTIALS: i32 = 3;
/// Credentials accepted but the game client never appeared.
pub const EXIT_GAME_START_TIMEOUT: i32 = 4;

/// Closed set of per-account outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Success { rewards: Vec<String> },
    Failed,
    InvalidCredentials,
    GameStartTimeout,
}

impl AccountOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            AccountOutcome::Success { .. } => EXIT_SUCCESS,
            AccountOutcome::Failed => EXIT_FAILURE,
            AccountOutcome::InvalidCredentials => EXIT_INVALID_CREDENTIALS,
            AccountOutcome::GameStartTimeout => EXIT_GAME_START_TIMEOUT,
        }
    }

    /// Decode a child's exit code; unknown codes (panics, crashes) count
    /// as generic failure.
    pub fn from_exit_code(code: i32, rewards: Vec<String>) -> Self {
        match code {
            EXIT_SUCCESS => AccountOutcome::Success { rewards },
            EXIT_INVALID_CREDENTIALS => AccountOutcome::InvalidCredentials,
            EXIT_GAME_START_TIMEOUT => AccountOutcome::GameStartTimeout,
            _ => AccountOutcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AccountOutcome::Success { .. })
    }
}

/// Run login + in-game flow for one account, in this process.
pub fn run_account(
    settings: &Settings,
    classifier: &SceneClassifier,
    templates: &mut TemplateStore,
    desktop: &mut Desktop,
    flags: ControlFlags,
    creds: &Credentials,
) -> AccountOutcome {
    match LoginFlow::new(settings, classifier, templates, desktop).run(creds) {
        Ok(()) => {}
        Err(LoginError::InvalidCredentials) => return AccountOutcome::InvalidCredentials,
        Err(LoginError::GameStartTimeout(_)) => return AccountOutcome::GameStartTimeout,
        Err(e) => {
            warn!("login failed: {e}");
            return AccountOutcome::Failed;
        }
    }

    // Let the client finish creating its window before polling scenes.
    sleep_ms(settings.game.spawn_wait_ms);

    match GameFlow::new(settings, classifier, templates, desktop, flags).run() {
        FlowOutcome::Completed { rewards } => AccountOutcome::Success { rewards },
        FlowOutcome::TimeBudgetExpired | FlowOutcome::Stopped => AccountOutcome::Failed,
    }
}

/// Batch result counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: u32,
    pub failed: u32,
}

/// Process every pending account, one child process per account.
///
/// Each account is persisted to exactly one ledger bucket and removed from
/// the pending file exactly once, whatever the outcome.
pub fn run_batch(settings: &Settings, config_path: Option<&Path>) -> std::io::Result<BatchSummary> {
    let accounts_path = &settings.batch.accounts_file;
    let accounts = read_accounts(accounts_path)?;
    let ledger = AccountLedger::new(settings.batch.final_dir.clone());
    let mut summary = BatchSummary::default();

    for creds in accounts {
        info!("=== Account: {} ===", creds.email);
        let outcome = run_account_in_child(settings, config_path, &creds);
        match &outcome {
            AccountOutcome::Success { rewards } => {
                info!("SUCCESS {} (rewards: {})", creds.email, rewards.join(","));
                ledger.record_success(&creds, rewards)?;
                summary.succeeded += 1;
            }
            other => {
                warn!("FAIL {} ({:?})", creds.email, other);
                ledger.record_failure(&creds)?;
                summary.failed += 1;
            }
        }
        consume(accounts_path, &creds)?;
    }
    Ok(summary)
}

/// Spawn `run-one` for the account, bounded by a wall-clock timeout, with
/// a fixed number of retries for hung/crashed children and game-start
/// timeouts. Invalid credentials are never retried.
fn run_account_in_child(
    settings: &Settings,
    config_path: Option<&Path>,
    creds: &Credentials,
) -> AccountOutcome {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            warn!("cannot resolve current executable: {e}");
            return AccountOutcome::Failed;
        }
    };
    let result_file = settings.batch.final_dir.join("_last_result.txt");
    let timeout =
        Duration::from_secs(settings.game.time_budget_secs + settings.batch.child_grace_secs);
    let attempts = 1 + settings.batch.attempt_retries;
    let mut last = AccountOutcome::Failed;

    for attempt in 1..=attempts {
        let _ = std::fs::remove_file(&result_file);
        let mut cmd = Command::new(&exe);
        cmd.arg("run-one")
            .arg("--email")
            .arg(&creds.email)
            .arg("--password")
            .arg(&creds.password)
            .arg("--result-file")
            .arg(&result_file);
        if let Some(path) = config_path {
            cmd.arg("--config").arg(path);
        }

        let status = match cmd.spawn() {
            Ok(child) => wait_with_timeout(child, timeout),
            Err(e) => {
                warn!("cannot spawn child for {}: {e}", creds.email);
                return AccountOutcome::Failed;
            }
        };

        let hung = status.is_none();
        let outcome = match status {
            Some(status) => AccountOutcome::from_exit_code(
                status.code().unwrap_or(EXIT_FAILURE),
                read_result_file(&result_file),
            ),
            None => AccountOutcome::Failed,
        };

        match &outcome {
            AccountOutcome::Success { .. } | AccountOutcome::InvalidCredentials => return outcome,
            AccountOutcome::GameStartTimeout => {
                info!(
                    "game did not start for {} (attempt {attempt}/{attempts})",
                    creds.email
                );
            }
            AccountOutcome::Failed if hung => {
                warn!(
                    "child hung or crashed for {} (attempt {attempt}/{attempts})",
                    creds.email
                );
            }
            // A clean in-flow failure already burned its whole time budget;
            // retrying it would not converge.
            AccountOutcome::Failed => return outcome,
        }
        last = outcome;
    }
    last
}

/// Wait for the child, killing it when the deadline passes. `None` means
/// the child did not exit on its own.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!("try_wait failed: {e}");
                return None;
            }
        }
        if Instant::now() >= deadline {
            warn!("child exceeded {}s, killing it", timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}
