//! Caller-supplied deadlines for external calls.

use std::future::Future;

use tokio::time::{Instant, timeout_at};

use crate::error::{IcebergError, IcebergResult};

/// Awaits `fut`, failing with [`IcebergError::DeadlineExceeded`] if
/// `deadline` passes first. Without a deadline the future runs to completion.
///
/// An already expired deadline fails without polling `fut`.
pub(crate) async fn within<T, F>(deadline: Option<Instant>, operation: &str, fut: F) -> IcebergResult<T>
where
    F: Future<Output = IcebergResult<T>>,
{
    let Some(deadline) = deadline else {
        return fut.await;
    };
    let exceeded = || {
        tracing::warn!(operation, "deadline exceeded");
        IcebergError::DeadlineExceeded {
            operation: operation.to_string(),
        }
    };
    if Instant::now() >= deadline {
        return Err(exceeded());
    }
    timeout_at(deadline, fut).await.map_err(|_| exceeded())?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_no_deadline_runs_to_completion() {
        let value = within(None, "noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_expired_deadline() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let err = within(Some(deadline), "create_table", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            IcebergError::DeadlineExceeded { ref operation } if operation == "create_table"
        ));
    }

    #[tokio::test]
    async fn test_past_deadline_skips_ready_future() {
        let deadline = Instant::now();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let err = within(Some(deadline), "ensure_warehouse_prefix", async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, IcebergError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let err = within::<(), _>(
            Some(Instant::now() + Duration::from_secs(5)),
            "load_table",
            async { Err(IcebergError::table_not_found("clients.acme.main")) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IcebergError::NotFound { .. }));
    }
}
