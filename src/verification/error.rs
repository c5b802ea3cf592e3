use crate::error::AppError;
use crate::identity::IdentityLookupError;
use thiserror::Error;

/// Terminal failures of a verification or admin operation.
///
/// Each kind has one short user-facing message; the `Display` text is for
/// operators and may include transport detail.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("guild has no verification configuration")]
    ConfigurationMissing,

    #[error("verification attempted outside the designated channel")]
    ChannelMismatch,

    #[error("identity claim required but none given")]
    ClaimRequired,

    #[error("claimed identity not found")]
    IdentityNotFound,

    #[error("claimed identity {claimed} resolves to {canonical}")]
    IdentityMismatch { claimed: String, canonical: String },

    #[error("configured role no longer exists")]
    RoleMissing,

    #[error("caller lacks administrator permission")]
    PermissionDenied,

    #[error("transport failure: {0}")]
    Transport(#[from] AppError),
}

impl VerifyError {
    /// Message shown to the invoking user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing => "Verification has not been set up on this server yet.",
            Self::ChannelMismatch => "You can't verify in this channel.",
            Self::ClaimRequired => "Please provide your gamertag to verify.",
            Self::IdentityNotFound => "That gamertag could not be found.",
            Self::IdentityMismatch { .. } => "That gamertag does not match the account on record.",
            Self::RoleMissing => "The configured verification role could not be found.",
            Self::PermissionDenied => "Only server administrators can do that.",
            Self::Transport(_) => {
                "Something went wrong during verification. Please try again later."
            }
        }
    }
}

impl From<IdentityLookupError> for VerifyError {
    fn from(e: IdentityLookupError) -> Self {
        match e {
            IdentityLookupError::NotFound => Self::IdentityNotFound,
            IdentityLookupError::Timeout => Self::Transport(AppError::Timeout("identity provider")),
            IdentityLookupError::Transport(detail) => Self::Transport(AppError::Internal(detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_transport_detail() {
        let err = VerifyError::Transport(AppError::internal("connection refused on 10.0.0.3:5432"));
        assert!(!err.user_message().contains("10.0.0.3"));
        assert!(err.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn test_identity_lookup_mapping() {
        assert!(matches!(
            VerifyError::from(IdentityLookupError::NotFound),
            VerifyError::IdentityNotFound
        ));
        assert!(matches!(
            VerifyError::from(IdentityLookupError::Timeout),
            VerifyError::Transport(AppError::Timeout(_))
        ));
        assert!(matches!(
            VerifyError::from(IdentityLookupError::Transport("dns".into())),
            VerifyError::Transport(_)
        ));
    }

    #[test]
    fn test_distinct_identity_messages() {
        let missing = VerifyError::IdentityNotFound.user_message();
        let mismatch = VerifyError::IdentityMismatch {
            claimed: "Alex".into(),
            canonical: "Alexa".into(),
        }
        .user_message();
        assert_ne!(missing, mismatch);
    }
}
