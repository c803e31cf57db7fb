//! Event sink interface
//!
//! Operator-visible state changes and error conditions are fired as
//! structured events by numeric id. The transport (telemetry packets,
//! console, test capture buffer) is the implementation's concern.

/// Numeric event identifier. Values are assigned by the emitting subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u16);

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Debug,
    Info,
    Error,
    Critical,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Debug => "DEBUG",
            EventSeverity::Info => "INFO",
            EventSeverity::Error => "ERROR",
            EventSeverity::Critical => "CRITICAL",
        }
    }
}

/// Destination for structured events.
pub trait EventSink {
    /// Fire one event. Must not block for long; called from scan loops.
    fn emit(&self, id: EventId, severity: EventSeverity, text: &str);
}
