//! Structured resolution events
//!
//! Resolution stages report what they decide through an explicit
//! [`ResolutionObserver`] handle instead of writing to a global output.
//! [`TracingObserver`] forwards events to `tracing`; [`EventRecorder`] keeps
//! them for callers that want to inspect or replay them.

use crate::binary::BinaryStatus;
use crate::primitives::Context;
use std::sync::Mutex;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    NodeResolved {
        reference: String,
        context: Context,
        origin: String,
    },
    DiamondCollapsed {
        reference: String,
        context: Context,
        requested_by: String,
    },
    ConflictDetected {
        name: String,
        context: Context,
        fixed: String,
        requested: String,
        requested_by: String,
    },
    OverrideApplied {
        name: String,
        context: Context,
        requested: String,
        forced: String,
    },
    RemoteUnavailable {
        remote: String,
        reason: String,
    },
    LockfileFallback {
        requirement: String,
        context: Context,
    },
    LockedPackageIdMismatch {
        reference: String,
        context: Context,
        locked: String,
        computed: String,
    },
    PackageIdComputed {
        reference: String,
        context: Context,
        package_id: String,
    },
    BinaryClassified {
        reference: String,
        context: Context,
        status: BinaryStatus,
        remote: Option<String>,
    },
    BinaryLookupFailed {
        reference: String,
        source: String,
        reason: String,
    },
}

impl ResolutionEvent {
    /// Events that deserve a user-visible warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::OverrideApplied { .. }
                | Self::RemoteUnavailable { .. }
                | Self::LockfileFallback { .. }
                | Self::LockedPackageIdMismatch { .. }
                | Self::BinaryLookupFailed { .. }
        )
    }
}

/// Receiver of resolution events
pub trait ResolutionObserver: Send + Sync {
    fn on_event(&self, event: &ResolutionEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ResolutionObserver for NullObserver {
    fn on_event(&self, _event: &ResolutionEvent) {}
}

/// Forwards events to the `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResolutionObserver for TracingObserver {
    fn on_event(&self, event: &ResolutionEvent) {
        match event {
            ResolutionEvent::NodeResolved {
                reference,
                context,
                origin,
            } => debug!(%reference, %context, %origin, "Resolved node"),
            ResolutionEvent::DiamondCollapsed {
                reference,
                context,
                requested_by,
            } => trace!(%reference, %context, %requested_by, "Reusing existing node"),
            ResolutionEvent::ConflictDetected {
                name,
                context,
                fixed,
                requested,
                requested_by,
            } => debug!(%name, %context, %fixed, %requested, %requested_by, "Version conflict"),
            ResolutionEvent::OverrideApplied {
                name,
                context,
                requested,
                forced,
            } => warn!(%name, %context, %requested, %forced, "Requirement overridden by profile"),
            ResolutionEvent::RemoteUnavailable { remote, reason } => {
                warn!(%remote, %reason, "Remote unavailable for the rest of this resolution")
            }
            ResolutionEvent::LockfileFallback {
                requirement,
                context,
            } => warn!(%requirement, %context, "Requirement not satisfied by lockfile, resolving freely"),
            ResolutionEvent::LockedPackageIdMismatch {
                reference,
                context,
                locked,
                computed,
            } => warn!(%reference, %context, %locked, %computed, "Package ID differs from lockfile"),
            ResolutionEvent::PackageIdComputed {
                reference,
                context,
                package_id,
            } => trace!(%reference, %context, %package_id, "Package ID computed"),
            ResolutionEvent::BinaryClassified {
                reference,
                context,
                status,
                remote,
            } => debug!(%reference, %context, %status, remote = ?remote, "Binary classified"),
            ResolutionEvent::BinaryLookupFailed {
                reference,
                source,
                reason,
            } => warn!(%reference, %source, %reason, "Binary lookup failed, treating as absent"),
        }
    }
}

/// Collects events in arrival order
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ResolutionEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResolutionEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn warnings(&self) -> Vec<ResolutionEvent> {
        self.events().into_iter().filter(|e| e.is_warning()).collect()
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ResolutionObserver for EventRecorder {
    fn on_event(&self, event: &ResolutionEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
