//! Session token storage using the OS keychain.
//!
//! The primary session token outlives the process (unlike the admin
//! session marker), so it goes to the system's native credential store
//! keyed by the normalized API base URL.

use crate::error::AppError;
use keyring::Entry;

/// Service name used in the keychain.
const SERVICE_NAME: &str = "placement-console";

/// Credential storage operations.
pub struct CredentialService;

impl CredentialService {
    /// Store the session token for an API base URL.
    pub fn store_token(api_url: &str, token: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(api_url)?;

        entry
            .set_password(token)
            .map_err(|e| AppError::credential_storage(format!("Failed to store token: {}", e)))
    }

    /// Retrieve the stored session token, if any.
    pub fn get_token(api_url: &str) -> Result<Option<String>, AppError> {
        let entry = Self::get_entry(api_url)?;

        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::credential_storage(format!(
                "Failed to retrieve token: {}",
                e
            ))),
        }
    }

    /// Delete the session token. Deleting a missing token is not an error.
    pub fn delete_token(api_url: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(api_url)?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::credential_storage(format!(
                "Failed to delete token: {}",
                e
            ))),
        }
    }

    fn get_entry(api_url: &str) -> Result<Entry, AppError> {
        Entry::new(SERVICE_NAME, &normalize_url(api_url)).map_err(|e| {
            AppError::credential_storage(format!("Failed to create keyring entry: {}", e))
        })
    }
}

/// Normalize a URL for use as an account identifier.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://Placements.Example.edu//"),
            "https://placements.example.edu"
        );
        assert_eq!(normalize_url("http://localhost:5000"), "http://localhost:5000");
    }
}
