//! Polling of zonal long-running operations.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::application::ports::ComputeApi;
use crate::domain::{Operation, OperationError, OperationStatus, PollPolicy};

/// Block until `operation` reaches `DONE`.
///
/// Re-fetches the operation, then sleeps `policy.interval` between fetches.
/// A failed fetch is logged and retried on the next tick.
///
/// # Errors
///
/// - [`OperationError::BadStatus`] for a status other than `PENDING`,
///   `RUNNING` or `DONE`.
/// - [`OperationError::Failed`] when the operation is `DONE` but carries an
///   error payload.
/// - [`OperationError::TimedOut`] when `policy.max_wait` elapses first.
pub async fn wait_for_operation(
    api: &impl ComputeApi,
    operation: &Operation,
    zone: &str,
    policy: &PollPolicy,
) -> Result<(), OperationError> {
    let started = Instant::now();
    let name = operation.name.as_str();
    loop {
        match api.get_operation(zone, name).await {
            Ok(current) => match current.status() {
                OperationStatus::Done => {
                    if let Some(message) = current.error_message() {
                        warn!(operation = name, %message, "operation finished with errors");
                        return Err(OperationError::Failed {
                            name: name.to_string(),
                            message,
                        });
                    }
                    debug!(operation = name, "operation done");
                    return Ok(());
                }
                OperationStatus::Pending | OperationStatus::Running => {
                    debug!(operation = name, status = %current.status, "operation in progress");
                }
                OperationStatus::Other(status) => {
                    warn!(operation = name, %status, "operation in unexpected state");
                    return Err(OperationError::BadStatus {
                        name: name.to_string(),
                        status,
                        description: current.description(),
                    });
                }
            },
            Err(err) => {
                warn!(operation = name, error = %err, "fetching operation failed, retrying");
            }
        }

        if let Some(max_wait) = policy.max_wait
            && started.elapsed() >= max_wait
        {
            return Err(OperationError::TimedOut {
                name: name.to_string(),
                secs: max_wait.as_secs(),
            });
        }
        sleep(policy.interval).await;
    }
}
