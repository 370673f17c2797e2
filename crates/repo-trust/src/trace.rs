//! Trace correlation for spawned git processes.
//!
//! Git's trace2 machinery joins child sessions to a parent through the
//! `GIT_TRACE2_PARENT_SID` variable. A [`TraceSession`] is created once per
//! process and stamped onto every command it launches, so an external trace
//! collector can group everything a single launcher run did.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Environment variable git reads its parent session id from.
pub const TRACE_PARENT_SID: &str = "GIT_TRACE2_PARENT_SID";

/// Session identifier shared by every command of one launcher process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSession {
    id: String,
}

impl TraceSession {
    /// Create a session for the current process at the current time.
    pub fn new() -> Self {
        Self::from_parts(Utc::now(), std::process::id())
    }

    /// Create a session from an explicit timestamp and process id.
    pub fn from_parts(started_at: DateTime<Utc>, pid: u32) -> Self {
        TraceSession {
            id: format!("repo-{}-P{:08x}", started_at.format("%Y%m%dT%H%M%SZ"), pid),
        }
    }

    /// The `repo-<timestamp>-P<pid>` component.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stamp this session onto `env`, appending to an existing parent id.
    pub fn ensure_session_id(&self, env: &mut BTreeMap<String, String>) {
        let value = match env.get(TRACE_PARENT_SID) {
            Some(prior) => format!("{prior}/{}", self.id),
            None => self.id.clone(),
        };
        env.insert(TRACE_PARENT_SID.to_string(), value);
    }
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;

    fn valid_format() -> Regex {
        Regex::new(r"^repo-[0-9]{8}T[0-9]{6}Z-P[0-9a-f]{8}$").unwrap()
    }

    #[test]
    fn test_first_set() {
        let mut env = BTreeMap::new();
        TraceSession::new().ensure_session_id(&mut env);
        let value = env.get(TRACE_PARENT_SID).expect("variable set");
        assert!(valid_format().is_match(value), "bad trace id: {value}");
    }

    #[test]
    fn test_append() {
        let mut env = BTreeMap::new();
        env.insert(TRACE_PARENT_SID.to_string(), "pfx".to_string());
        TraceSession::new().ensure_session_id(&mut env);
        let value = &env[TRACE_PARENT_SID];
        assert!(value.starts_with("pfx/"));
        assert!(valid_format().is_match(&value[4..]), "bad trace id: {value}");
    }

    #[test]
    fn test_known_parts_render_exactly() {
        let at = Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap();
        let session = TraceSession::from_parts(at, 0xbeef);
        assert_eq!(session.id(), "repo-20200203T040506Z-P0000beef");
        assert_eq!(session.to_string(), session.id());

        let wide = TraceSession::from_parts(at, u32::MAX);
        assert!(wide.id().ends_with("-Pffffffff"));
    }

    #[test]
    fn test_same_session_reused_across_invocations() {
        let session = TraceSession::new();
        let mut first = BTreeMap::new();
        let mut second = BTreeMap::new();
        session.ensure_session_id(&mut first);
        session.ensure_session_id(&mut second);
        assert_eq!(first, second);
    }
}
