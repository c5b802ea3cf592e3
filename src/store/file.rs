//! Encrypted single-file backend.
//!
//! The whole guild map is serialized to JSON and sealed with the
//! [`SecretCipher`], so the file never contains plaintext guild ids. Writes go
//! to a sibling temp file which is then renamed over the original.

use crate::cipher::SecretCipher;
use crate::error::AppResult;
use crate::store::models::StoredGuildConfig;
use crate::store::ConfigBackend;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

const FILE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    guilds: BTreeMap<String, StoredGuildConfig>,
}

/// File backend with the decoded map cached in memory
pub struct FileBackend {
    path: PathBuf,
    cipher: Arc<SecretCipher>,
    records: RwLock<BTreeMap<String, StoredGuildConfig>>,
}

impl FileBackend {
    /// Open (or lazily create) the store file at `path`.
    ///
    /// A file that cannot be decrypted is moved aside to
    /// `<path>.unreadable.<timestamp>` and the backend starts empty. Earlier
    /// moved-aside files are never overwritten.
    pub async fn open(path: impl Into<PathBuf>, cipher: Arc<SecretCipher>) -> AppResult<Self> {
        let path = path.into();

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match decode_image(&cipher, &contents) {
                Ok(image) => {
                    info!("Loaded {} guild configs from {}", image.guilds.len(), path.display());
                    image.guilds
                }
                Err(e) => {
                    let aside = unreadable_target(&path).await?;
                    error!(
                        "Config file {} is unreadable ({}); moving it to {}",
                        path.display(),
                        e,
                        aside.display()
                    );
                    tokio::fs::rename(&path, &aside).await?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            cipher,
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, guilds: &BTreeMap<String, StoredGuildConfig>) -> AppResult<()> {
        let image = FileImage {
            version: FILE_VERSION,
            guilds: guilds.clone(),
        };
        let sealed = self.cipher.encrypt(&serde_json::to_string(&image)?)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = sidecar(&self.path, ".tmp");
        tokio::fs::write(&tmp, sealed).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn decode_image(cipher: &SecretCipher, contents: &str) -> AppResult<FileImage> {
    let json = cipher.decrypt(contents)?;
    Ok(serde_json::from_str(&json)?)
}

async fn unreadable_target(path: &Path) -> AppResult<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
    let mut candidate = sidecar(path, &format!(".unreadable.{}", stamp));
    let mut attempt = 1u32;
    while tokio::fs::try_exists(&candidate).await? {
        candidate = sidecar(path, &format!(".unreadable.{}.{}", stamp, attempt));
        attempt += 1;
    }
    Ok(candidate)
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl ConfigBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, guild_id: &str) -> AppResult<Option<StoredGuildConfig>> {
        Ok(self.records.read().await.get(guild_id).cloned())
    }

    async fn save(&self, record: &StoredGuildConfig) -> AppResult<()> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        match next.get_mut(&record.guild_id) {
            Some(existing) => {
                existing.channel_id = record.channel_id.clone();
                existing.role_id = record.role_id.clone();
                existing.updated_at = record.updated_at;
            }
            None => {
                next.insert(record.guild_id.clone(), record.clone());
            }
        }
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn remove(&self, guild_id: &str) -> AppResult<bool> {
        let mut guard = self.records.write().await;
        if !guard.contains_key(guild_id) {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.remove(guild_id);
        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }

    async fn guild_ids(&self) -> AppResult<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
