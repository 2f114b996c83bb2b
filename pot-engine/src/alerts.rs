//! Operator Alerts
//!
//! Conditions that need a human: failed payouts, re-run months, empty
//! cycles. The default sink writes them to the log; deployments can plug
//! in mail or chat delivery.

use std::sync::Mutex;
use tracing::{error, warn};

/// Alert class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Payout could not be sent; carries the pending payload
    PayoutFailed,
    /// Some single-destination transfers failed
    PartialPayout,
    /// Settled month triggered again
    AlreadyProcessed,
    /// Cycle closed without entries
    EmptyCycle,
    /// Anything else worth a look
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn new(kind: AlertKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Destination for operator alerts
pub trait AlertSink: Send + Sync {
    fn send(&self, alert: Alert);
}

/// Writes alerts to the log
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&self, alert: Alert) {
        match alert.kind {
            AlertKind::PayoutFailed | AlertKind::PartialPayout => {
                error!(kind = ?alert.kind, subject = %alert.subject, body = %alert.body, "ALERT")
            }
            _ => warn!(kind = ?alert.kind, subject = %alert.subject, body = %alert.body, "ALERT"),
        }
    }
}

/// Keeps alerts in memory
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.alerts().iter().map(|a| a.kind).collect()
    }
}

impl AlertSink for RecordingAlertSink {
    fn send(&self, alert: Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingAlertSink::new();
        sink.send(Alert::new(AlertKind::EmptyCycle, "2021-10", "no entries"));
        sink.send(Alert::new(AlertKind::Notice, "x", "y"));
        assert_eq!(sink.kinds(), vec![AlertKind::EmptyCycle, AlertKind::Notice]);
        assert_eq!(sink.alerts()[0].subject, "2021-10");

        LogAlertSink.send(Alert::new(AlertKind::PayoutFailed, "s", "b"));
    }
}
