//! Notification sink.
//!
//! Fire-and-forget user-facing messages. The vault never reads anything
//! back from a sink.

use std::sync::{Mutex, PoisonError};

use tracing::{error, info, warn};

use medvault_core::Principal;

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Receives user-facing notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success | Severity::Info => info!(?severity, "{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
    }
}

/// Keeps notifications in memory. Useful for testing.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.messages().iter().any(|(m, _)| m == message)
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), severity));
    }
}

/// Message texts.
pub mod messages {
    use super::*;

    pub const RECORD_UPLOADED: &str = "Record uploaded successfully!";
    pub const RECORD_DELETED: &str = "Record deleted successfully!";
    pub const ACCESS_REQUEST_SENT: &str = "Access request sent!";
    pub const ACCESS_GRANTED: &str = "Access granted successfully!";
    pub const ACCESS_APPROVED: &str = "Access request approved!";
    pub const ACCESS_REJECTED: &str = "Access request rejected.";
    pub const ACCESS_REVOKED: &str = "Access revoked.";
    pub const VACCINATION_VERIFIED: &str = "Vaccination verified successfully!";
    pub const DOCUMENT_REQUIRED: &str = "Please upload a verification document";

    /// Addressed to the owner of the requested record.
    pub fn new_access_request(record_name: &str, from: &Principal) -> String {
        format!("New access request for \"{record_name}\" from {}", from.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.notify(messages::RECORD_UPLOADED, Severity::Success);
        sink.notify(messages::ACCESS_REJECTED, Severity::Info);

        let got = sink.messages();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1], (messages::ACCESS_REJECTED.to_string(), Severity::Info));
        assert!(sink.contains(messages::RECORD_UPLOADED));

        sink.clear();
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_new_access_request_text() {
        let from = Principal::new("0x1234567890abcdef1234567890abcdef12345678").unwrap();
        assert_eq!(
            messages::new_access_request("bloodtest.pdf", &from),
            "New access request for \"bloodtest.pdf\" from 0x1234...5678"
        );
    }
}
