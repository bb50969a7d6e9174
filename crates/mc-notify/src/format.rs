//! HTML rendering of team alerts

use mc_core::Alert;

/// Longest description shown in an assignment alert
const DESCRIPTION_LIMIT: usize = 200;

/// Escape text for Telegram HTML parse mode
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cut to `max_chars` characters, appending "..." when anything was dropped
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn render_alert(alert: &Alert) -> String {
    match alert {
        Alert::TaskAssigned {
            assigner,
            assignees,
            title,
            description,
        } => {
            let mut text = format!(
                "📌 <b>Mission Control - Task Assigned</b>\n\n<b>From:</b> {}\n<b>To:</b> {}\n<b>Task:</b> {}",
                escape_html(assigner),
                escape_html(&assignees.join(", ")),
                escape_html(title),
            );
            if !description.trim().is_empty() {
                text.push_str("\n\n");
                text.push_str(&escape_html(&truncate(description, DESCRIPTION_LIMIT)));
            }
            text
        }
        Alert::TaskCompleted { title, agent } => format!(
            "✅ <b>Task completed</b>\n\n<b>Task:</b> {}\n<b>By:</b> {}",
            escape_html(title),
            escape_html(agent),
        ),
        Alert::TaskBlocked { title, agent } => format!(
            "🚫 <b>Task blocked</b>\n\n<b>Task:</b> {}\n<b>By:</b> {}",
            escape_html(title),
            escape_html(agent),
        ),
        Alert::OwnerMention { author, content } => format!(
            "💬 <b>New message for you</b>\n\n<b>From:</b> {}\n\n{}",
            escape_html(author),
            escape_html(content),
        ),
    }
}
