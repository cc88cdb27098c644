//! Calls that a restrictive policy deployment may legitimately refuse.

use common::error::{CloudError, Result};
use std::future::Future;
use tracing::info;

/// Run `action`, treating a policy denial as "nothing happened".
///
/// `Ok(Some(value))` on success, `Ok(None)` if the platform answered
/// `Forbidden`; every other error propagates.
pub async fn call_ignoring_forbidden<F, Fut, T>(action: F) -> Result<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match action().await {
        Ok(value) => Ok(Some(value)),
        Err(CloudError::Forbidden(reason)) => {
            info!(target: "cloudcheck.policy", %reason, "Action forbidden by policy, ignoring");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let result = call_ignoring_forbidden(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_forbidden_is_swallowed() {
        let result: Result<Option<()>> = call_ignoring_forbidden(|| async {
            Err(CloudError::Forbidden("volume:delete".to_string()))
        })
        .await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let result: Result<Option<()>> = call_ignoring_forbidden(|| async {
            Err(CloudError::NotFound("volume".to_string()))
        })
        .await;
        assert!(matches!(result, Err(CloudError::NotFound(_))));
    }
}
