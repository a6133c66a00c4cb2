use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeHealth {
    Online,
    Stale,
    Offline,
}

impl std::fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeHealth::Online => "ONLINE",
            NodeHealth::Stale => "STALE",
            NodeHealth::Offline => "OFFLINE",
        };
        write!(f, "{s}")
    }
}

const ONLINE_HORIZON_SECS: i64 = 120;
const STALE_HORIZON_SECS: i64 = 900;

/// Derives the effective health of a node from the age of its last
/// heartbeat. `raw_status` is the node's self-reported status; it only
/// matters at the boundary between ONLINE and STALE, where a report of
/// ONLINE that has since gone quiet is still downgraded to STALE.
pub fn classify(raw_status: &str, last_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> NodeHealth {
    let age_secs = (now - last_seen_at).num_seconds().max(0);

    if age_secs > STALE_HORIZON_SECS {
        return NodeHealth::Offline;
    }
    if age_secs > ONLINE_HORIZON_SECS {
        return NodeHealth::Stale;
    }
    if raw_status.eq_ignore_ascii_case("ONLINE") {
        NodeHealth::Online
    } else {
        NodeHealth::Stale
    }
}

pub fn heartbeat_age_seconds(last_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_seen_at).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn fresh_online_report_is_online() {
        let n = now();
        assert_eq!(classify("ONLINE", n, n), NodeHealth::Online);
    }

    #[test]
    fn ages_to_stale_after_120_seconds() {
        let n = now();
        let seen = n - Duration::seconds(150);
        assert_eq!(classify("ONLINE", seen, n), NodeHealth::Stale);
    }

    #[test]
    fn ages_to_offline_after_900_seconds() {
        let n = now();
        let seen = n - Duration::seconds(1000);
        assert_eq!(classify("ONLINE", seen, n), NodeHealth::Offline);
    }

    #[test]
    fn non_online_raw_status_within_stale_horizon_is_stale() {
        let n = now();
        let seen = n - Duration::seconds(30);
        assert_eq!(classify("DEGRADED", seen, n), NodeHealth::Stale);
    }
}
