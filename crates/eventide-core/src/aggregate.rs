//! Event-sourced aggregate roots.

use std::fmt::Display;

use crate::error::DomainError;
use crate::event::{DomainEvent, UncommittedEvent};
use crate::stream::NO_STREAM_VERSION;

/// Version counters and the uncommitted queue every aggregate carries.
///
/// Until a save, `current_version - original_version` equals the number of
/// queued events.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateChanges<E> {
    original_version: i64,
    current_version: i64,
    uncommitted: Vec<UncommittedEvent<E>>,
}

impl<E> AggregateChanges<E> {
    /// Bookkeeping for an aggregate with no history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            original_version: NO_STREAM_VERSION,
            current_version: NO_STREAM_VERSION,
            uncommitted: Vec::new(),
        }
    }

    /// Version as last loaded or committed.
    #[must_use]
    pub fn original_version(&self) -> i64 {
        self.original_version
    }

    /// Version including uncommitted events.
    #[must_use]
    pub fn current_version(&self) -> i64 {
        self.current_version
    }

    /// The queued events, oldest first.
    #[must_use]
    pub fn uncommitted(&self) -> &[UncommittedEvent<E>] {
        &self.uncommitted
    }

    fn contains(&self, event: &UncommittedEvent<E>) -> bool {
        self.uncommitted.iter().any(|e| e.event_id == event.event_id)
    }
}

impl<E> Default for AggregateChanges<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A predicate guarding a state change.
pub trait BusinessRule {
    /// Returns `true` if the change must be refused.
    fn is_broken(&self) -> bool;

    /// Explains the rule to the caller.
    fn message(&self) -> String;
}

/// Trait for aggregate roots that reconstitute from event history.
///
/// Implementors supply identity, the `when` projection and access to their
/// `AggregateChanges`; the provided methods implement the versioning rules.
pub trait AggregateRoot: Send + Sync + Sized {
    /// Identifier type.
    type Id: Clone + Display + Send + Sync;

    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent + 'static;

    /// Name used in stream ids and diagnostics.
    const AGGREGATE_TYPE: &'static str;

    /// A fresh instance at version `-1`: the seed for both creation and
    /// replay.
    fn new(id: Self::Id) -> Self;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &Self::Id;

    /// Mutates state for one event. Must not fail for well-formed history;
    /// return `DomainError::FoldHandlerMissing` for an event it cannot apply.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::FoldHandlerMissing` when the event is unknown.
    fn when(&mut self, event: &Self::Event) -> Result<(), DomainError>;

    /// Versioning bookkeeping.
    fn changes(&self) -> &AggregateChanges<Self::Event>;

    /// Mutable versioning bookkeeping.
    fn changes_mut(&mut self) -> &mut AggregateChanges<Self::Event>;

    /// The stream this aggregate's events live in.
    fn stream_id(id: &Self::Id) -> String {
        format!("{}-{id}", Self::AGGREGATE_TYPE)
    }

    /// Version as last loaded or committed.
    fn original_version(&self) -> i64 {
        self.changes().original_version
    }

    /// Version including uncommitted events.
    fn current_version(&self) -> i64 {
        self.changes().current_version
    }

    /// Applies a new event: folds it and queues it for persistence.
    ///
    /// An event whose id is already queued is ignored entirely: `when` is not
    /// called again and the version does not move, so the queue and the
    /// version counters stay in step.
    ///
    /// # Errors
    ///
    /// Propagates a `when` failure; nothing is queued in that case.
    fn apply_event(&mut self, event: UncommittedEvent<Self::Event>) -> Result<(), DomainError> {
        if self.changes().contains(&event) {
            tracing::trace!(
                aggregate_type = Self::AGGREGATE_TYPE,
                event_id = %event.event_id,
                "event already queued; ignoring"
            );
            return Ok(());
        }
        self.when(&event.payload)?;
        let changes = self.changes_mut();
        changes.uncommitted.push(event);
        changes.current_version += 1;
        Ok(())
    }

    /// Folds one historical event. Replayed history is already committed, so
    /// both counters advance.
    ///
    /// # Errors
    ///
    /// Propagates a `when` failure.
    fn fold(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        self.when(event)?;
        let changes = self.changes_mut();
        changes.original_version += 1;
        changes.current_version += 1;
        Ok(())
    }

    /// Folds every event in stream order.
    ///
    /// # Errors
    ///
    /// Stops at the first `when` failure.
    fn load_from_history<'a, I>(&mut self, events: I) -> Result<(), DomainError>
    where
        I: IntoIterator<Item = &'a Self::Event>,
    {
        events.into_iter().try_for_each(|event| self.fold(event))
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[UncommittedEvent<Self::Event>] {
        &self.changes().uncommitted
    }

    /// Takes the uncommitted events out of the queue. The version counters
    /// are left alone; call `mark_uncommitted_as_committed` once they are
    /// durable.
    fn dequeue_uncommitted_events(&mut self) -> Vec<UncommittedEvent<Self::Event>> {
        std::mem::take(&mut self.changes_mut().uncommitted)
    }

    /// Clears the queue and collapses the counters. Call only after a
    /// successful append.
    fn mark_uncommitted_as_committed(&mut self) {
        let changes = self.changes_mut();
        changes.uncommitted.clear();
        changes.original_version = changes.current_version;
    }

    /// Fails fast if `rule` is broken.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRuleBroken` with the rule's message.
    fn check_rule(&self, rule: &dyn BusinessRule) -> Result<(), DomainError> {
        if rule.is_broken() {
            return Err(DomainError::BusinessRuleBroken(rule.message()));
        }
        Ok(())
    }
}
