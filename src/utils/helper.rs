use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Get current timestamp in milliseconds since epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a new gate decision ID
pub fn generate_decision_id() -> Uuid {
    Uuid::new_v4()
}

/// Alert operations team (critical)
pub fn alert_operations_team_critical(message: String) {
    tracing::error!("CRITICAL ALERT: {}", message);

    // Send to multiple channels for redundancy
    send_pagerduty_alert(&message, "critical");
    send_slack_alert(&message, "critical");
}

/// Alert operations team (warning)
pub fn alert_operations_team_warning(message: String) {
    tracing::warn!("WARNING ALERT: {}", message);

    send_slack_alert(&message, "warning");
}

/// Send PagerDuty alert
fn send_pagerduty_alert(message: &str, severity: &str) {
    // In production, integrate with PagerDuty API
    // For now, log the alert
    tracing::error!("[PagerDuty] {} - {}", severity, message);
}

/// Send Slack alert
fn send_slack_alert(message: &str, severity: &str) {
    tracing::info!("[Slack] {} - {}", severity, message);
}
