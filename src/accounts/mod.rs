//! Account list bookkeeping
//!
//! The pending accounts file is line-oriented `email<TAB>password` (plain
//! whitespace also accepted), UTF-8 with an optional BOM. Each processed
//! account is removed from the pending file exactly once - success or
//! failure - and appended to exactly one bucket under the final directory,
//! so a batch always makes forward progress.

use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

/// One account's login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start_matches('\u{feff}').trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = if line.contains('\t') {
        line.split('\t')
    } else {
        line.split(' ')
    }
    .filter(|p| !p.trim().is_empty());
    let email = parts.next()?.trim().to_string();
    let password = parts.next()?.trim().to_string();
    Some((email, password))
}

/// Read all well-formed credentials from the accounts file. Malformed
/// lines are logged and skipped.
pub fn read_accounts(path: &Path) -> io::Result<Vec<Credentials>> {
    let raw = std::fs::read_to_string(path)?;
    let mut accounts = Vec::new();
    for line in raw.lines() {
        match parse_line(line) {
            Some((email, password)) => accounts.push(Credentials { email, password }),
            None => {
                if !line.trim().is_empty() {
                    warn!("Skipping malformed accounts line: {line}");
                }
            }
        }
    }
    Ok(accounts)
}

/// Remove the first line matching the credentials exactly. Returns whether
/// a line was removed; the file shrinks by at most one line per call.
pub fn consume(path: &Path, creds: &Credentials) -> io::Result<bool> {
    let raw = std::fs::read_to_string(path)?;
    let mut removed = false;
    let mut kept: Vec<&str> = Vec::new();
    for line in raw.lines() {
        if !removed {
            if let Some((email, password)) = parse_line(line) {
                if email == creds.email && password == creds.password {
                    removed = true;
                    continue;
                }
            }
        }
        kept.push(line);
    }
    if removed {
        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(path, out)?;
    }
    Ok(removed)
}

/// Keep only characters safe in a bucket file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Append-only success/error buckets for processed accounts.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    dir: PathBuf,
}

impl AccountLedger {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn append(&self, file: &Path, creds: &Credentials) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut existing = std::fs::read_to_string(file).unwrap_or_default();
        existing.push_str(&format!("{}\t{}\n", creds.email, creds.password));
        std::fs::write(file, existing)
    }

    /// Record a successful account, keyed by its chosen reward ids when
    /// there are any.
    pub fn record_success(&self, creds: &Credentials, rewards: &[String]) -> io::Result<PathBuf> {
        let file = if rewards.is_empty() {
            self.dir.join("ok.txt")
        } else {
            self.dir.join(format!("{}.txt", sanitize(&rewards.join("_"))))
        };
        self.append(&file, creds)?;
        Ok(file)
    }

    /// Record a failed account.
    pub fn record_failure(&self, creds: &Credentials) -> io::Result<()> {
        let file = self.dir.join("errors.txt");
        self.append(&file, creds)
    }
}

/// Write the flow's result payload: comma-separated reward ids,
/// deduplicated, insertion order preserved.
pub fn write_result_file(path: &Path, rewards: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<&str> = rewards
        .iter()
        .filter(|r| !r.is_empty() && seen.insert(r.as_str()))
        .map(|r| r.as_str())
        .collect();
    std::fs::write(path, unique.join(","))
}

/// Read a result payload written by `write_result_file`.
pub fn read_result_file(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|raw| {
            raw.trim()
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}
