// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Notification channel credentials

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";
pub const INSECURE_VAR: &str = "TELEGRAM_INSECURE_SKIP_VERIFY";

/// Bot credentials. Values from the env file win over the process environment.
#[derive(Clone)]
pub struct NotifySecrets {
    pub bot_token: String,
    pub chat_id: String,
    /// Skip TLS certificate validation
    pub insecure_skip_verify: bool,
}

impl NotifySecrets {
    /// Load from `env_file` with environment fallback. `None` when either
    /// credential is missing.
    pub fn load(env_file: &Path) -> Option<Self> {
        let file = read_env_file(env_file);
        Self::from_lookup(|key| {
            file.get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = non_empty(TOKEN_VAR)?;
        let chat_id = non_empty(CHAT_ID_VAR)?;
        let insecure_skip_verify = non_empty(INSECURE_VAR)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Some(Self {
            bot_token,
            chat_id,
            insecure_skip_verify,
        })
    }
}

impl fmt::Debug for NotifySecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySecrets")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

fn read_env_file(path: &Path) -> HashMap<String, String> {
    let mut values = HashMap::new();
    if !path.exists() {
        return values;
    }

    match dotenv::from_path_iter(path) {
        Ok(iter) => {
            for item in iter {
                match item {
                    Ok((key, value)) => {
                        values.insert(key, value);
                    }
                    Err(e) => warn!("Skipping malformed line in {:?}: {}", path, e),
                }
            }
            debug!("Read {} entries from {:?}", values.len(), path);
        }
        Err(e) => warn!("Failed to read secrets file {:?}: {}", path, e),
    }
    values
}
