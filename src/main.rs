use rolegate::{
    bot,
    cipher::SecretCipher,
    config::{AppConfig, BackendKind, StoreConfig},
    identity::{IdentityClient, IdentityProvider},
    liveness,
    store::{self, ConfigBackend, ConfigStore, FileBackend, SqlBackend},
    verification::{VerificationEngine, VerificationPolicy},
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolegate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rolegate v{}", env!("CARGO_PKG_VERSION"));

    dotenvy::dotenv().ok();
    let config = AppConfig::init()?;
    info!("Configuration loaded");

    if config.discord.token.trim().is_empty() {
        error!("Discord token not configured!");
        error!("Set ROLEGATE_DISCORD__TOKEN or discord.token in config/local.toml");
        return Err(anyhow::anyhow!("Discord token not configured"));
    }

    if config.security.encryption_key.trim().is_empty() {
        error!("Encryption key not configured!");
        error!("Generate one with: openssl rand -base64 32");
        error!("Then set ROLEGATE_SECURITY__ENCRYPTION_KEY");
        return Err(anyhow::anyhow!("Encryption key not configured"));
    }

    let cipher = Arc::new(
        SecretCipher::from_base64(config.security.encryption_key.trim())
            .map_err(|e| anyhow::anyhow!("Invalid encryption key: {}", e))?,
    );

    let store = Arc::new(open_store(config, cipher).await?);

    let identity: Option<Arc<dyn IdentityProvider>> = if config.verification.require_identity {
        let client = IdentityClient::new(&config.identity)?;
        info!("Identity provider: {}", config.identity.base_url);
        Some(Arc::new(client))
    } else {
        None
    };

    let engine = Arc::new(VerificationEngine::new(
        store.clone(),
        identity,
        VerificationPolicy::from(&config.verification),
    ));

    let liveness_handle = liveness::spawn(&config.liveness).await?;

    let bot_result = bot::start_bot(config, engine, store).await;
    liveness_handle.abort();

    match bot_result {
        Ok(()) => {
            info!("Discord bot shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Discord bot error: {}", e);
            Err(anyhow::anyhow!("{}", e))
        }
    }
}

/// Build the configuration store described by `[store]`.
async fn open_store(config: &AppConfig, cipher: Arc<SecretCipher>) -> anyhow::Result<ConfigStore> {
    let sql = if config.store.uses(BackendKind::Sql) {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        info!("Database connected: {}", config.database.url);
        store::init_db(&pool).await?;
        Some(SqlBackend::new(pool))
    } else {
        None
    };

    let primary = backend(config.store.primary, &config.store, sql.as_ref(), &cipher).await?;
    info!("Configuration store primary: {}", primary.name());

    let mut store = ConfigStore::new(primary, cipher.clone(), config.store.io_timeout());
    if let Some(kind) = config.store.effective_replica() {
        let replica = backend(kind, &config.store, sql.as_ref(), &cipher).await?;
        info!("Configuration store replica: {}", replica.name());
        store = store.with_replica(replica);
    }

    Ok(store)
}

async fn backend(
    kind: BackendKind,
    settings: &StoreConfig,
    sql: Option<&SqlBackend>,
    cipher: &Arc<SecretCipher>,
) -> anyhow::Result<Arc<dyn ConfigBackend>> {
    match kind {
        BackendKind::Sql => {
            let sql = sql.ok_or_else(|| anyhow::anyhow!("SQL backend not initialized"))?;
            Ok(Arc::new(sql.clone()))
        }
        BackendKind::File => {
            let file = FileBackend::open(&settings.file_path, cipher.clone()).await?;
            Ok(Arc::new(file))
        }
    }
}
