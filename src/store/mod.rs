//! Tenant configuration store.
//!
//! [`ConfigStore`] owns every persisted [`GuildConfig`]. Ids are encrypted
//! through the [`SecretCipher`] before they reach a backend and decrypted on
//! the way out. One backend is authoritative; an optional replica receives
//! the same writes in order from a background task and may fail freely.

pub mod file;
pub mod models;
pub mod sql;

pub use file::FileBackend;
pub use models::{parse_snowflake, GuildConfig, StoredGuildConfig};
pub use sql::{init_db, DbPool, SqlBackend};

use crate::cipher::SecretCipher;
use crate::error::{with_timeout, AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Durable storage for encrypted guild configuration records.
#[async_trait]
pub trait ConfigBackend: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn load(&self, guild_id: &str) -> AppResult<Option<StoredGuildConfig>>;

    /// Insert or update. An existing record keeps its `created_at`.
    async fn save(&self, record: &StoredGuildConfig) -> AppResult<()>;

    /// Returns true if a record was removed.
    async fn remove(&self, guild_id: &str) -> AppResult<bool>;

    async fn guild_ids(&self) -> AppResult<Vec<String>>;
}

#[derive(Debug)]
enum ReplicaOp {
    Save(StoredGuildConfig),
    Remove(String),
}

/// Encrypting, per-guild serialized front for a [`ConfigBackend`]
pub struct ConfigStore {
    primary: Arc<dyn ConfigBackend>,
    replica: Option<mpsc::UnboundedSender<ReplicaOp>>,
    cipher: Arc<SecretCipher>,
    locks: DashMap<GuildId, Arc<Mutex<()>>>,
    io_timeout: Duration,
}

impl ConfigStore {
    pub fn new(
        primary: Arc<dyn ConfigBackend>,
        cipher: Arc<SecretCipher>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            replica: None,
            cipher,
            locks: DashMap::new(),
            io_timeout,
        }
    }

    /// Mirror writes to a secondary backend.
    ///
    /// Must be called inside a Tokio runtime; spawns the replication task.
    pub fn with_replica(mut self, replica: Arc<dyn ConfigBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_replica(replica, rx, self.io_timeout));
        self.replica = Some(tx);
        self
    }

    fn lock_for(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.locks.entry(guild_id).or_default().clone()
    }

    fn replicate(&self, op: ReplicaOp) {
        if let Some(tx) = &self.replica {
            if tx.send(op).is_err() {
                warn!("Replica task has stopped; skipping mirrored write");
            }
        }
    }

    /// Insert or update the configuration for a guild.
    pub async fn upsert(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        role_id: RoleId,
    ) -> AppResult<()> {
        let lock = self.lock_for(guild_id);
        let _guard = lock.lock().await;

        let key = guild_id.to_string();
        let existing =
            with_timeout("config store read", self.io_timeout, self.primary.load(&key)).await?;

        let now = Utc::now();
        let record = StoredGuildConfig {
            guild_id: key,
            channel_id: channel_id
                .map(|c| self.cipher.encrypt(&c.to_string()))
                .transpose()?,
            role_id: self.cipher.encrypt(&role_id.to_string())?,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };

        with_timeout("config store write", self.io_timeout, self.primary.save(&record)).await?;
        info!(guild_id = %guild_id, backend = self.primary.name(), "Guild configuration saved");

        self.replicate(ReplicaOp::Save(record));
        Ok(())
    }

    /// Fetch and decrypt the configuration for a guild.
    ///
    /// A record that fails to decrypt is logged and reported as absent.
    pub async fn get(&self, guild_id: GuildId) -> AppResult<Option<GuildConfig>> {
        let key = guild_id.to_string();
        let loaded =
            with_timeout("config store read", self.io_timeout, self.primary.load(&key)).await?;
        let Some(record) = loaded else {
            debug!(guild_id = %guild_id, "No configuration stored");
            return Ok(None);
        };

        match self.decode(guild_id, &record) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                error!(
                    guild_id = %guild_id,
                    "Stored configuration is unreadable, treating as absent: {}",
                    e
                );
                Ok(None)
            }
        }
    }

    /// Remove the configuration for a guild. Returns false if none existed.
    pub async fn clear(&self, guild_id: GuildId) -> AppResult<bool> {
        let lock = self.lock_for(guild_id);
        let _guard = lock.lock().await;

        let key = guild_id.to_string();
        let removed =
            with_timeout("config store delete", self.io_timeout, self.primary.remove(&key)).await?;
        if removed {
            info!(guild_id = %guild_id, "Guild configuration cleared");
        }

        self.replicate(ReplicaOp::Remove(key));
        Ok(removed)
    }

    /// Guilds that currently have a stored configuration.
    pub async fn guild_ids(&self) -> AppResult<Vec<GuildId>> {
        let ids =
            with_timeout("config store list", self.io_timeout, self.primary.guild_ids()).await?;
        Ok(ids
            .iter()
            .filter_map(|raw| parse_snowflake(raw))
            .map(GuildId::new)
            .collect())
    }

    fn decode(&self, guild_id: GuildId, record: &StoredGuildConfig) -> AppResult<GuildConfig> {
        let channel_id = match &record.channel_id {
            Some(sealed) => Some(ChannelId::new(self.open_id(sealed)?)),
            None => None,
        };
        let role_id = RoleId::new(self.open_id(&record.role_id)?);

        Ok(GuildConfig {
            guild_id,
            channel_id,
            role_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn open_id(&self, sealed: &str) -> AppResult<u64> {
        let plain = self.cipher.decrypt(sealed)?;
        parse_snowflake(&plain)
            .ok_or_else(|| AppError::internal("decrypted value is not a snowflake"))
    }
}

async fn run_replica(
    replica: Arc<dyn ConfigBackend>,
    mut rx: mpsc::UnboundedReceiver<ReplicaOp>,
    io_timeout: Duration,
) {
    while let Some(op) = rx.recv().await {
        let result = match &op {
            ReplicaOp::Save(record) => {
                with_timeout("replica write", io_timeout, replica.save(record)).await
            }
            ReplicaOp::Remove(guild_id) => {
                with_timeout("replica delete", io_timeout, replica.remove(guild_id))
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Ok(()) => debug!(backend = replica.name(), "Replicated {:?}", op),
            Err(e) => warn!(backend = replica.name(), "Replica write failed: {}", e),
        }
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("primary", &self.primary.name())
            .field("replicated", &self.replica.is_some())
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}
