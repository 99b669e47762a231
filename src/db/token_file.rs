// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential record persistence.
//!
//! The record is always written whole: serialized to a sibling temp file and
//! renamed over the target, so a reader sees either the old or the new pair
//! of tokens and never a mix.

use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;
use crate::error::Result;
use crate::models::CredentialRecord;

/// JSON file holding the [`CredentialRecord`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record.
    pub async fn load(&self) -> Result<CredentialRecord> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing {
                    path: self.path.clone(),
                    hint: "Run `fitbit-steps login` or upload the tokens it produced.",
                }
                .into());
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("reading {}", self.path.display()))
                    .into())
            }
        };

        let record = serde_json::from_slice(&raw).map_err(ConfigError::Parse)?;
        Ok(record)
    }

    /// Replace the stored record.
    pub async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("serializing credentials")?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(anyhow::Error::new(e)
                .context(format!("replacing {}", self.path.display()))
                .into());
        }

        tracing::info!(path = %self.path.display(), "Credential record saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
