use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{broadcast::BroadcastSummary, domain::Recipient, errors::Error, Result};

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purged: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64, username: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            username: Some(username.to_string()),
            payload_kind: None,
            content: None,
            delivered: None,
            total: None,
            purged: None,
            failed: None,
            action: None,
            recipient: None,
            changed: None,
            authorized: None,
            error: None,
            context: None,
        }
    }

    pub fn broadcast(
        user_id: i64,
        username: &str,
        payload_kind: &str,
        content: &str,
        summary: &BroadcastSummary,
    ) -> Self {
        Self {
            payload_kind: Some(payload_kind.to_string()),
            content: Some(content.to_string()),
            delivered: Some(summary.delivered()),
            total: Some(summary.total()),
            purged: Some(summary.purged()),
            failed: Some(summary.failed()),
            ..Self::base("broadcast", user_id, username)
        }
    }

    pub fn store_change(
        user_id: i64,
        username: &str,
        action: &str,
        recipient: Recipient,
        changed: bool,
    ) -> Self {
        Self {
            action: Some(action.to_string()),
            recipient: Some(recipient.0),
            changed: Some(changed),
            ..Self::base("store_change", user_id, username)
        }
    }

    pub fn auth(user_id: i64, username: &str, authorized: bool, context: &str) -> Self {
        Self {
            authorized: Some(authorized),
            context: Some(context.to_string()),
            ..Self::base("auth", user_id, username)
        }
    }

    pub fn error(user_id: i64, username: &str, error: &str, context: Option<&str>) -> Self {
        Self {
            error: Some(error.to_string()),
            context: context.map(|s| s.to_string()),
            ..Self::base("error", user_id, username)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = if self.json {
            serde_json::to_string(&event)?
        } else {
            render_plain(&event)?
        };
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Audit failures must never break a user flow.
    pub fn write_or_log(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), "failed to write audit event: {e}");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

/// One line per event: `<timestamp> <event> key=value ...`.
fn render_plain(event: &AuditEvent) -> Result<String> {
    let value = serde_json::to_value(event)?;
    let serde_json::Value::Object(fields) = value else {
        return Err(Error::External("audit event did not serialize to an object".into()));
    };

    let mut line = format!("{} {}", event.timestamp, event.event);
    for (key, v) in fields
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "timestamp" | "event"))
    {
        let shown = match v {
            serde_json::Value::String(s) => format!("{s:?}"),
            other => other.to_string(),
        };
        line.push_str(&format!(" {key}={shown}"));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static SEQ: AtomicUsize = AtomicUsize::new(0);

    fn tmp_file(prefix: &str) -> PathBuf {
        let n = SEQ.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        let path = PathBuf::from(format!("/tmp/{prefix}-{pid}-{n}.log"));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
        assert_eq!(truncate_text("short", AUDIT_MAX_TEXT), "short");
    }

    #[test]
    fn broadcast_event_is_one_json_line_with_counts() {
        let log = AuditLogger::new(tmp_file("relay-audit-json"), true);
        let summary = BroadcastSummary {
            groups: DispatchResult {
                total: 3,
                delivered: 2,
                purge: vec![Recipient(-9)],
                ..DispatchResult::default()
            },
            users: None,
            stale: false,
        };
        let content = "x".repeat(AUDIT_MAX_TEXT + 1);
        log.write(AuditEvent::broadcast(1, "admin", "text", &content, &summary))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(written.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "broadcast");
        assert_eq!(v["delivered"], 2);
        assert_eq!(v["total"], 3);
        assert_eq!(v["purged"], 1);
        assert!(v["content"].as_str().unwrap().ends_with("..."));
        assert!(v.get("recipient").is_none());
    }

    #[test]
    fn plain_format_is_one_line_per_event() {
        let log = AuditLogger::new(tmp_file("relay-audit-text"), false);
        log.write(AuditEvent::store_change(1, "admin", "add_group", Recipient(-100), true))
            .unwrap();
        log.write(AuditEvent::auth(7, "stranger", false, "broadcast"))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" store_change "));
        assert!(lines[0].contains("recipient=-100"));
        assert!(lines[0].contains("changed=true"));
        assert!(lines[0].contains("action=\"add_group\""));
        assert!(lines[1].contains("authorized=false"));
    }
}
