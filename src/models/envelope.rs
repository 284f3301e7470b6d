//! The `{success, data, message}` envelope every platform endpoint returns.

use crate::error::AppError;
use serde::Deserialize;

/// Response envelope from the platform API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning `success: false` or a missing `data`
    /// into an API error tagged with the endpoint.
    pub fn into_data(self, endpoint: &str) -> Result<T, AppError> {
        if !self.success {
            return Err(AppError::api(self.unsuccessful_message(), endpoint));
        }

        self.data.ok_or_else(|| AppError::api("Response is missing data", endpoint))
    }

    /// Check `success` only, for endpoints whose data is irrelevant.
    pub fn into_unit(self, endpoint: &str) -> Result<(), AppError> {
        if self.success {
            Ok(())
        } else {
            Err(AppError::api(self.unsuccessful_message(), endpoint))
        }
    }

    fn unsuccessful_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Request was not successful".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_data() {
        let env: ApiEnvelope<u32> =
            serde_json::from_str(r#"{"success": true, "data": 7}"#).unwrap();
        assert_eq!(env.into_data("/x").unwrap(), 7);
    }

    #[test]
    fn test_failure_carries_message() {
        let env: ApiEnvelope<u32> =
            serde_json::from_str(r#"{"success": false, "message": "nope"}"#).unwrap();
        let err = env.into_data("/x").unwrap_err();
        assert_eq!(err.to_string(), "API error: nope");
    }

    #[test]
    fn test_missing_data_is_error_but_unit_is_ok() {
        let env: ApiEnvelope<u32> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(env.clone().into_data("/x").is_err());
        assert!(env.into_unit("/x").is_ok());
    }
}
