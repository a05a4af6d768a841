use crate::{broadcast::BroadcastSummary, domain::Recipient};

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One id per line, or `empty` when there are none.
pub fn format_recipient_list(title: &str, ids: &[Recipient], empty: &str) -> String {
    if ids.is_empty() {
        return escape_html(empty);
    }
    let mut out = format!("<b>{}</b> ({})\n", escape_html(title), ids.len());
    let lines = ids
        .iter()
        .map(|id| format!("🔹 <code>{id}</code>"))
        .collect::<Vec<_>>()
        .join("\n");
    out.push_str(&lines);
    out
}

/// Reply shown to the sender once a broadcast is finished.
pub fn format_broadcast_summary(summary: &BroadcastSummary) -> String {
    let mut out = format!(
        "✅ Delivered to <b>{}</b> of <b>{}</b> recipients.",
        summary.delivered(),
        summary.total()
    );
    if summary.purged() > 0 {
        out.push_str(&format!(
            "\n🧹 Removed {} unreachable recipient(s).",
            summary.purged()
        ));
    }
    if summary.failed() > 0 {
        out.push_str(&format!(
            "\n⚠️ {} send(s) failed and will be retried next time.",
            summary.failed()
        ));
    }
    if summary.stale {
        out.push_str("\n⏳ Recipient list was busy; used the last known copy.");
    }
    out
}
