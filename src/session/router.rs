//! Inbound frame classification and dispatch

use crate::session::buffer::{TelemetryBuffer, TelemetrySample};
use crate::session::events::{LogEntry, Observers, Severity};
use crate::session::protocol::{decode_frame, Decoded, InboundMessage};

/// What a routed frame turned into, mostly useful for tracing and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A sample was pushed into the buffer
    Sample,
    /// A chat line was emitted
    Chat,
    /// A system log line was emitted
    System,
    /// Heartbeat acknowledgement, nothing emitted
    Pong,
    /// Unrecognized frame type, diagnostic line emitted
    Unknown,
    /// Payload was not a valid frame and was shown as assistant chat
    RawText,
}

/// Decodes inbound payloads and dispatches them to the buffer or the log.
#[derive(Debug)]
pub struct MessageRouter {
    buffer: TelemetryBuffer,
    sound_on_sample: bool,
}

impl MessageRouter {
    /// Create a router feeding `buffer`
    ///
    /// When `sound_on_sample` is set, every pushed sample also requests the
    /// notification sound.
    pub fn new(buffer: TelemetryBuffer, sound_on_sample: bool) -> Self {
        Self {
            buffer,
            sound_on_sample,
        }
    }

    /// Decode `payload` and dispatch it. Never fails.
    pub fn route(&mut self, payload: &str, observers: &mut Observers) -> RouteOutcome {
        match decode_frame(payload) {
            Decoded::Message(message) => self.dispatch(message, observers),
            Decoded::RawText(text) => {
                tracing::debug!("Inbound payload is not a protocol frame, treating as chat text");
                observers.log_entry(&LogEntry::assistant(text));
                RouteOutcome::RawText
            }
        }
    }

    fn dispatch(&mut self, message: InboundMessage, observers: &mut Observers) -> RouteOutcome {
        match message {
            InboundMessage::SerialData { timestamp, raw } => {
                let sample = TelemetrySample::from_wire(&timestamp, raw);
                tracing::trace!(raw = sample.raw(), value = ?sample.numeric_value(), "sample");
                self.buffer.push(sample);
                if let Some(sample) = self.buffer.latest() {
                    observers.sample_added(sample);
                }
                if self.sound_on_sample {
                    observers.notification_sound();
                }
                RouteOutcome::Sample
            }
            InboundMessage::ChatResponse { text } => {
                observers.log_entry(&LogEntry::assistant(text));
                RouteOutcome::Chat
            }
            InboundMessage::SerialResponse { text } => {
                observers.log_entry(&LogEntry::system(Severity::Info, text));
                RouteOutcome::System
            }
            InboundMessage::ErrorNotice { text } => {
                tracing::warn!("Backend reported error: {}", text);
                observers.log_entry(&LogEntry::system(Severity::Error, text));
                RouteOutcome::System
            }
            InboundMessage::Pong => {
                tracing::trace!("pong");
                RouteOutcome::Pong
            }
            InboundMessage::Unknown { raw_type } => {
                tracing::debug!("Unknown message type: {}", raw_type);
                observers.log_entry(&LogEntry::system(
                    Severity::Debug,
                    format!("Unknown message type: {}", raw_type),
                ));
                RouteOutcome::Unknown
            }
        }
    }

    /// Read access to the sample buffer
    pub fn buffer(&self) -> &TelemetryBuffer {
        &self.buffer
    }

    /// Mutable access for explicit clear and capacity requests
    pub(crate) fn buffer_mut(&mut self) -> &mut TelemetryBuffer {
        &mut self.buffer
    }

    /// Toggle the notification sound policy
    pub fn set_sound_on_sample(&mut self, enabled: bool) {
        self.sound_on_sample = enabled;
    }
}
