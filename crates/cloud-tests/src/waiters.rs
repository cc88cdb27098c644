//! Resource status waiters built on [`crate::eventual`].

use crate::adapters::{ComputeApi, VolumeApi};
use crate::eventual::{poll_until_some, PollPolicy};
use crate::models::{Server, Volume};
use common::error::{CloudError, Result};
use tracing::{debug, info, instrument};

/// Server status that aborts any wait for a different status.
pub const SERVER_ERROR_STATUS: &str = "ERROR";

/// Volume status that aborts any wait for a different status.
pub const VOLUME_ERROR_STATUS: &str = "error";

/// Wait until `server_id` reports `status`.
///
/// Fails fast with `CloudError::BuildFailed` if the server reaches `ERROR`
/// while waiting for something else.
#[instrument(skip(compute, policy), fields(timeout = ?policy.timeout))]
pub async fn wait_for_server_status(
    compute: &dyn ComputeApi,
    server_id: &str,
    status: &str,
    policy: PollPolicy,
) -> Result<Server> {
    let found = poll_until_some(
        move || async move {
            let server = compute.get_server(server_id).await?;
            debug!(
                target: "cloudcheck.waiters",
                server_id,
                observed = %server.status,
                wanted = status,
                "Server status"
            );

            if server.status == status {
                return Ok(Some(server));
            }
            if server.status == SERVER_ERROR_STATUS {
                return Err(CloudError::BuildFailed {
                    resource: format!("server {server_id}"),
                    status: server.status,
                });
            }
            Ok(None)
        },
        policy.timeout,
        policy.interval,
    )
    .await?;

    match found {
        Some(server) => {
            info!(target: "cloudcheck.waiters", server_id, status, "Server reached status");
            Ok(server)
        }
        None => Err(CloudError::Timeout {
            condition: format!("server {server_id} to reach status {status}"),
            waited: policy.timeout,
        }),
    }
}

/// Wait until the server lookup answers `NotFound`.
#[instrument(skip(compute, policy))]
pub async fn wait_for_server_termination(
    compute: &dyn ComputeApi,
    server_id: &str,
    policy: PollPolicy,
) -> Result<()> {
    let gone = poll_until_some(
        move || async move {
            match compute.get_server(server_id).await {
                Err(e) if e.is_not_found() => Ok(Some(())),
                Err(e) => Err(e),
                Ok(server) if server.status == SERVER_ERROR_STATUS => {
                    Err(CloudError::BuildFailed {
                        resource: format!("server {server_id}"),
                        status: server.status,
                    })
                }
                Ok(_) => Ok(None),
            }
        },
        policy.timeout,
        policy.interval,
    )
    .await?;

    gone.ok_or_else(|| CloudError::Timeout {
        condition: format!("server {server_id} to terminate"),
        waited: policy.timeout,
    })
}

/// Wait until `volume_id` reports `status`.
#[instrument(skip(volumes, policy))]
pub async fn wait_for_volume_status(
    volumes: &dyn VolumeApi,
    volume_id: &str,
    status: &str,
    policy: PollPolicy,
) -> Result<Volume> {
    let found = poll_until_some(
        move || async move {
            let volume = volumes.get_volume(volume_id).await?;
            if volume.status == status {
                return Ok(Some(volume));
            }
            if volume.status == VOLUME_ERROR_STATUS {
                return Err(CloudError::BuildFailed {
                    resource: format!("volume {volume_id}"),
                    status: volume.status,
                });
            }
            Ok(None)
        },
        policy.timeout,
        policy.interval,
    )
    .await?;

    found.ok_or_else(|| CloudError::Timeout {
        condition: format!("volume {volume_id} to reach status {status}"),
        waited: policy.timeout,
    })
}
