//! Desktop notifications for new notes and deviations, and for failed passes

use crate::config::NotificationConfig;
use crate::constants::NOTIFICATION_PREVIEW_CHARS;
use crate::sync::PassReport;

/// Summarize what a pass brought in. Nothing is sent for a pass without new
/// items.
pub fn notify_new_items(config: &NotificationConfig, report: &PassReport) {
    if !config.enabled {
        return;
    }
    let Some(summary) = summary_line(report) else {
        return;
    };
    let body = if config.show_preview {
        preview(report)
    } else {
        None
    };

    // Fire and forget, don't block on errors
    if let Err(e) = send_notification(&summary, body.as_deref(), "mail-unread") {
        tracing::warn!("Failed to send desktop notification: {}", e);
    }
}

pub fn notify_failure(config: &NotificationConfig, message: &str) {
    if !config.enabled {
        return;
    }
    if let Err(e) = send_notification("devmirror sync failed", Some(message), "dialog-error") {
        tracing::warn!("Failed to send desktop notification: {}", e);
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

fn summary_line(report: &PassReport) -> Option<String> {
    let notes = report.new_notes.len();
    let deviations = report.new_deviations.len();
    match (notes, deviations) {
        (0, 0) => None,
        (n, 0) => Some(plural(n, "new note", "new notes")),
        (0, d) => Some(plural(d, "new deviation", "new deviations")),
        (n, d) => Some(format!(
            "{}, {}",
            plural(n, "new note", "new notes"),
            plural(d, "new deviation", "new deviations")
        )),
    }
}

/// Newest note first ("sender: title"), otherwise the newest deviation.
fn preview(report: &PassReport) -> Option<String> {
    let line = if let Some(note) = report.new_notes.iter().max_by_key(|n| n.id) {
        format!("{}: {}", note.sender, note.title)
    } else {
        report
            .new_deviations
            .iter()
            .max_by_key(|d| d.id)
            .map(|d| d.title.clone())?
    };

    // Truncate on a char boundary
    if line.chars().count() > NOTIFICATION_PREVIEW_CHARS {
        let cut: String = line.chars().take(NOTIFICATION_PREVIEW_CHARS - 3).collect();
        Some(format!("{}...", cut))
    } else {
        Some(line)
    }
}

/// Low-level notification sending
fn send_notification(
    summary: &str,
    body: Option<&str>,
    icon: &str,
) -> Result<(), notify_rust::error::Error> {
    use notify_rust::Notification;

    let mut notification = Notification::new();
    notification
        .summary(summary)
        .appname("devmirror")
        .icon(icon)
        .timeout(notify_rust::Timeout::Milliseconds(5000));

    if let Some(body) = body {
        notification.body(body);
    }

    notification.show()?;
    Ok(())
}
