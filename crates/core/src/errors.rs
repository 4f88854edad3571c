//! Conversions from collaborator errors into [`SyncError`]

use fieldsync_common::auth::CredentialError;
use fieldsync_domain::SyncError;

/// Maps a credential failure onto the run's error taxonomy.
///
/// Anything that leaves the run without a usable token is an authorization
/// failure, except bad requests (configuration) and disk trouble (storage).
pub fn map_credential_error(err: CredentialError) -> SyncError {
    match err {
        CredentialError::Configuration(message) => SyncError::Configuration(message),
        CredentialError::Store(message) => SyncError::Storage(message),
        other @ (CredentialError::NotAuthorized(_)
        | CredentialError::RefreshRejected(_)
        | CredentialError::RefreshUnavailable { .. }
        | CredentialError::Flow(_)) => SyncError::Authorization(other.to_string()),
    }
}
