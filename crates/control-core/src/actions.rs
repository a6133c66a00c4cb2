use crate::error::CoreError;

/// Fixed vocabulary the Remote Action Dispatcher accepts (§4.7). Unlike
/// `domain`, which is an open namespace for revision streams, the set of
/// operational actions is closed: there is no storage-level way to add a
/// seventh action without a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    HeartbeatNow,
    SyncPull,
    RunDiagnostics,
    RestartBackend,
    RestartAgent,
    ReloadSettings,
}

impl RemoteAction {
    pub fn command_type(&self) -> &'static str {
        match self {
            RemoteAction::HeartbeatNow => "REMOTE_ACTION_HEARTBEAT_NOW",
            RemoteAction::SyncPull => "REMOTE_ACTION_SYNC_PULL",
            RemoteAction::RunDiagnostics => "REMOTE_ACTION_RUN_DIAGNOSTICS",
            RemoteAction::RestartBackend => "REMOTE_ACTION_RESTART_BACKEND",
            RemoteAction::RestartAgent => "REMOTE_ACTION_RESTART_AGENT",
            RemoteAction::ReloadSettings => "REMOTE_ACTION_RELOAD_SETTINGS",
        }
    }
}

impl std::fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemoteAction::HeartbeatNow => "HEARTBEAT_NOW",
            RemoteAction::SyncPull => "SYNC_PULL",
            RemoteAction::RunDiagnostics => "RUN_DIAGNOSTICS",
            RemoteAction::RestartBackend => "RESTART_BACKEND",
            RemoteAction::RestartAgent => "RESTART_AGENT",
            RemoteAction::ReloadSettings => "RELOAD_SETTINGS",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RemoteAction {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "HEARTBEAT_NOW" => Ok(RemoteAction::HeartbeatNow),
            "SYNC_PULL" => Ok(RemoteAction::SyncPull),
            "RUN_DIAGNOSTICS" => Ok(RemoteAction::RunDiagnostics),
            "RESTART_BACKEND" => Ok(RemoteAction::RestartBackend),
            "RESTART_AGENT" => Ok(RemoteAction::RestartAgent),
            "RELOAD_SETTINGS" => Ok(RemoteAction::ReloadSettings),
            other => Err(CoreError::validation(format!(
                "unknown remote action '{other}'"
            ))),
        }
    }
}

/// Error code stamped on a command cancelled by an operator (§4.4, §8 S3).
pub const CANCELLED_BY_CLOUD: &str = "CANCELLED_BY_CLOUD";

/// CommandLog status labels written by the queue's own transitions. Nodes
/// may also write `ACKED`/`FAILED` labels directly via their ack payload.
pub const LOG_STATUS_RETRY_QUEUED: &str = "RETRY_QUEUED";
pub const LOG_STATUS_CANCELLED: &str = "CANCELLED";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for action in [
            RemoteAction::HeartbeatNow,
            RemoteAction::SyncPull,
            RemoteAction::RunDiagnostics,
            RemoteAction::RestartBackend,
            RemoteAction::RestartAgent,
            RemoteAction::ReloadSettings,
        ] {
            let s = action.to_string();
            assert_eq!(RemoteAction::from_str(&s).unwrap(), action);
        }
    }

    #[test]
    fn command_type_is_prefixed() {
        assert_eq!(
            RemoteAction::RestartAgent.command_type(),
            "REMOTE_ACTION_RESTART_AGENT"
        );
    }
}
