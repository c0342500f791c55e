//! Page events and the subscription interface the proctoring session uses to
//! receive them.
//!
//! The session never talks to a concrete UI. It subscribes to [`EventKind`]s on
//! an [`EventSource`] and receives [`HostEvent`]s through a channel, so it can
//! run headless in tests and inside the stdin runner alike.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    VisibilityChange,
    Blur,
    Focus,
    PointerMove,
    KeyPress,
    Click,
    /// Submission of the exam form. Only present on pages that have one.
    FormSubmit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    VisibilityChanged(Visibility),
    Blur,
    Focus,
    PointerMove,
    KeyPress,
    Click,
    FormSubmit,
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::VisibilityChanged(_) => EventKind::VisibilityChange,
            HostEvent::Blur => EventKind::Blur,
            HostEvent::Focus => EventKind::Focus,
            HostEvent::PointerMove => EventKind::PointerMove,
            HostEvent::KeyPress => EventKind::KeyPress,
            HostEvent::Click => EventKind::Click,
            HostEvent::FormSubmit => EventKind::FormSubmit,
        }
    }

    /// Input that counts as the user being present.
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            HostEvent::PointerMove | HostEvent::KeyPress | HostEvent::Click | HostEvent::Focus
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait EventSource: Send + Sync {
    /// Registers `sink` for events of `kind`.
    ///
    /// Returns `None` when the page has no target for that kind (no exam form,
    /// for instance). Callers treat that as "not applicable here".
    fn subscribe(&self, kind: EventKind, sink: UnboundedSender<HostEvent>)
        -> Option<SubscriptionId>;

    /// Returns `false` if the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// In-process [`EventSource`] that fans emitted events out to subscribers.
pub struct EventHub {
    has_exam_form: bool,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, (EventKind, UnboundedSender<HostEvent>)>>,
}

impl EventHub {
    pub fn new(has_exam_form: bool) -> Self {
        Self {
            has_exam_form,
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers `event` to every subscriber of its kind and returns how many
    /// received it. Subscribers whose receiver has been dropped are pruned.
    pub fn emit(&self, event: HostEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        self.subscribers().retain(|_, (subscribed, sink)| {
            if *subscribed != kind {
                return !sink.is_closed();
            }
            match sink.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(
        &self,
    ) -> MutexGuard<'_, HashMap<SubscriptionId, (EventKind, UnboundedSender<HostEvent>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSource for EventHub {
    fn subscribe(
        &self,
        kind: EventKind,
        sink: UnboundedSender<HostEvent>,
    ) -> Option<SubscriptionId> {
        if kind == EventKind::FormSubmit && !self.has_exam_form {
            return None;
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers().insert(id, (kind, sink));
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers().remove(&id).is_some()
    }
}
