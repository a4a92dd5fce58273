//! Transient notifications shown over the board

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "i",
            Severity::Success => "✓",
            Severity::Error => "!",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity, duration: Duration) -> Self {
        Self {
            message: message.into(),
            severity,
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Holds at most one notification; a new one replaces the old.
#[derive(Debug)]
pub struct Notifier {
    current: Option<Notification>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            current: None,
            timeout,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, severity: Severity) {
        self.current = Some(Notification::new(message, severity, self.timeout));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.show(message, Severity::Info);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.show(message, Severity::Success);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(message, Severity::Error);
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Drop the notification once its interval has passed
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        if self.current.as_ref().is_some_and(|n| n.is_expired_at(now)) {
            self.current = None;
        }
    }
}
