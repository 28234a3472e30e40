//! Event Bus - Synchronous Publish/Subscribe
//!
//! One bus is built per session and handed by reference to every component
//! that posts or listens. Dispatch happens on the poster's stack, in
//! subscription order.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

use crate::asset::Asset;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Rc<dyn Fn(&Event) -> HandlerResult>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Subscriber to '{event}' failed: {source}")]
    Handler {
        event: EventKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssetCreated,
    AssetOpenClicked,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetCreated => "asset_created",
            Self::AssetOpenClicked => "asset_open_clicked",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    AssetCreated(Asset),
    AssetOpenClicked { path: PathBuf, asset: Asset },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AssetCreated(_) => EventKind::AssetCreated,
            Self::AssetOpenClicked { .. } => EventKind::AssetOpenClicked,
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> HandlerResult + 'static,
    {
        self.subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(handler));
    }

    /// Deliver `event` to every subscriber of its kind. Stops at the first failing subscriber.
    ///
    /// Returns the number of subscribers that ran.
    pub fn post(&self, event: &Event) -> Result<usize, EventError> {
        let kind = event.kind();
        // snapshot so handlers may subscribe or post while we dispatch
        let handlers: Vec<Handler> = match self.subscribers.borrow().get(&kind) {
            Some(list) => list.clone(),
            None => return Ok(0),
        };
        trace!("Posting {} to {} subscribers", kind, handlers.len());

        for handler in &handlers {
            handler(event).map_err(|source| EventError::Handler { event: kind, source })?;
        }
        Ok(handlers.len())
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.borrow().get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.borrow();
        let mut map = f.debug_map();
        for (kind, handlers) in subscribers.iter() {
            map.entry(kind, &handlers.len());
        }
        map.finish()
    }
}
