//! One handler slot per event kind.

use std::collections::HashMap;
use std::fmt;

use crate::{ClientEvent, EventKind};

/// A registered event handler.
///
/// Handlers only see the event, never the client, so they cannot re-enter
/// `update` from inside a dispatch.
pub type Handler = Box<dyn FnMut(&ClientEvent) + Send + 'static>;

/// Maps each [`EventKind`] to at most one handler.
///
/// Registering a handler for a kind replaces the previous one.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: HashMap<EventKind, Handler>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `kind`, returning the one it replaced.
    pub fn set(&mut self, kind: EventKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    /// Removes the handler for `kind`. Returns whether one was registered.
    pub fn clear(&mut self, kind: EventKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Invokes the handler for the event's kind, if any.
    /// Returns whether a handler ran.
    pub fn emit(&mut self, event: &ClientEvent) -> bool {
        match self.handlers.get_mut(&event.kind()) {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                tracing::trace!(kind = %event.kind(), "no handler registered");
                false
            }
        }
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("CallbackRegistry")
            .field("registered", &kinds)
            .finish()
    }
}
