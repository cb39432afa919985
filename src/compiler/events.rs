//! Unified event logging for the optimizer pipeline.
//!
//! This module provides a structured record of what the enum unboxer
//! decided and changed: which enums were considered and rejected, which
//! methods moved, which utility methods were synthesized and which
//! instructions were rewritten. Events can be inspected by tests and
//! embedders or safely ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Collection of events with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust,ignore
//! use enumbox::compiler::{EventLog, EventKind};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::MethodMoved)
//!     .method(moved)
//!     .message("Color.next() -> Color$EnumUnboxingLocalUtility.next(int)");
//!
//! log.info("Starting pass: enum-unboxing-analysis");
//! println!("{}", log.summary());
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::program::symbols::{MethodRef, TypeRef};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An enum class became an unboxing candidate.
    CandidateFound,
    /// A candidate was disqualified.
    CandidateRejected,
    /// An enum class was unboxed and removed from the program.
    EnumUnboxed,
    /// A method was moved to a local utility class.
    MethodMoved,
    /// An emulated virtual dispatch method was synthesized.
    DispatchSynthesized,
    /// A utility method (accessor, shared helper) was synthesized.
    UtilityMethodSynthesized,
    /// A method or field signature was retyped.
    SignatureRewritten,
    /// A check-not-zero twin of a check-not-null method was synthesized.
    CheckNotZeroSynthesized,
    /// An instruction was rewritten to operate on the unboxed value.
    InstructionRewritten,
    /// A `clone()` of a `$VALUES` copy was removed.
    CloneElided,
    /// An enum instance was replaced by its unboxed constant.
    ConstantMaterialized,
    /// A method body was reprocessed after unboxing.
    MethodReprocessed,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Analysis
            Self::CandidateFound => "candidate found",
            Self::CandidateRejected => "candidate rejected",
            // Transformations
            Self::EnumUnboxed => "enum unboxed",
            Self::MethodMoved => "method moved",
            Self::DispatchSynthesized => "dispatch synthesized",
            Self::UtilityMethodSynthesized => "utility method synthesized",
            Self::SignatureRewritten => "signature rewritten",
            Self::CheckNotZeroSynthesized => "checkNotZero synthesized",
            Self::InstructionRewritten => "instruction rewritten",
            Self::CloneElided => "clone elided",
            Self::ConstantMaterialized => "constant materialized",
            Self::MethodReprocessed => "method reprocessed",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::EnumUnboxed
                | Self::MethodMoved
                | Self::DispatchSynthesized
                | Self::UtilityMethodSynthesized
                | Self::SignatureRewritten
                | Self::CheckNotZeroSynthesized
                | Self::InstructionRewritten
                | Self::CloneElided
                | Self::ConstantMaterialized
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method the event concerns (if applicable).
    pub method: Option<MethodRef>,
    /// The class the event concerns (if applicable).
    pub class: Option<TypeRef>,
    /// Location within the method (block index).
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            class: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodRef>,
    class: Option<TypeRef>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            class: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and block where the event occurred.
    pub fn at(mut self, method: MethodRef, block: usize) -> Self {
        self.method = Some(method);
        self.location = Some(block);
        self
    }

    /// Sets only the method.
    pub fn method(mut self, method: MethodRef) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the class the event concerns.
    pub fn class(mut self, class: TypeRef) -> Self {
        self.class = Some(class);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            class: self.class.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events.
///
/// Events can be appended concurrently from several threads through shared
/// references (`&self`).
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method(&self, method: MethodRef) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.method == Some(method))
    }

    /// Returns an iterator over events for a specific class.
    pub fn filter_class(&self, class: TypeRef) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.class == Some(class))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.iter().filter(|e| e.kind.is_transformation()).count()
    }

    /// Returns the number of unique methods with events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.method)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::symbols::Symbols;

    #[test]
    fn test_builder_commits_on_drop() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let log = EventLog::new();

        log.record(EventKind::CandidateRejected)
            .class(color)
            .message("Color: Pinned");
        log.record(EventKind::MethodMoved);
        log.info("done");

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_class(color).count(), 1);
        assert_eq!(log.filter_kind(EventKind::MethodMoved).next().unwrap().message, "method moved");
        assert_eq!(log.transformation_count(), 1);
        assert_eq!(log.summary(), "1 method moved");
    }

    #[test]
    fn test_clone_keeps_events() {
        let log = EventLog::new();
        log.warn("w");
        let copy = log.clone();
        assert_eq!(copy.warnings().count(), 1);
    }
}
