//! External identity resolution.
//!
//! A claimed gamertag is accepted only if the provider maps it to an xuid and
//! that xuid maps back to the same gamertag, compared case-insensitively.
//! The round trip catches claims that resolve to an account which has since
//! been renamed.

pub mod client;

pub use client::IdentityClient;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Identity lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityLookupError {
    #[error("Identity not found")]
    NotFound,

    #[error("Identity provider request timed out")]
    Timeout,

    #[error("Identity provider unreachable: {0}")]
    Transport(String),
}

/// Two-step name → id → name lookup against an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    async fn resolve_id(&self, claimed_name: &str) -> Result<String, IdentityLookupError>;

    async fn resolve_canonical_name(&self, opaque_id: &str) -> Result<String, IdentityLookupError>;
}

/// A resolved identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub claimed_name: String,
    pub opaque_id: String,
    pub canonical_name: String,
}

impl ExternalIdentity {
    /// Whether the claim names the canonical account.
    pub fn matches(&self) -> bool {
        names_match(&self.claimed_name, &self.canonical_name)
    }
}

/// Case-insensitive name comparison.
pub fn names_match(claimed: &str, canonical: &str) -> bool {
    claimed.trim().to_lowercase() == canonical.trim().to_lowercase()
}

/// Resolve a claim through both hops.
///
/// The returned identity may still not match; callers check
/// [`ExternalIdentity::matches`].
pub async fn resolve_claim(
    provider: &dyn IdentityProvider,
    claimed_name: &str,
) -> Result<ExternalIdentity, IdentityLookupError> {
    let claimed_name = claimed_name.trim();
    if claimed_name.is_empty() {
        return Err(IdentityLookupError::NotFound);
    }

    let opaque_id = provider.resolve_id(claimed_name).await?;
    let canonical_name = provider.resolve_canonical_name(&opaque_id).await?;
    debug!(
        "Resolved claim {} -> {} -> {}",
        claimed_name, opaque_id, canonical_name
    );

    Ok(ExternalIdentity {
        claimed_name: claimed_name.to_string(),
        opaque_id,
        canonical_name,
    })
}
