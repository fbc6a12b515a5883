//! Item event feed
//!
//! Item state events enter through the [`EventBus`], which forwards the
//! kinds a subscriber asked for. The [`ItemEventDispatcher`] is the single
//! process-wide subscriber that fans each event out to the managers that
//! registered the item.

use crate::value::ItemValue;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod bus;
pub mod dispatcher;

pub use bus::EventBus;
pub use dispatcher::{InputCallback, ItemEventDispatcher, input_callback};

/// Kind of an item event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventKind {
    ItemState,
    ItemStateUpdated,
    #[default]
    ItemStateChanged,
    ItemCommand,
    ItemTimeSeries,
    GroupStateUpdated,
}

impl EventKind {
    /// Kinds that carry a new item state
    pub const STATE_KINDS: [EventKind; 3] = [
        EventKind::ItemState,
        EventKind::ItemStateUpdated,
        EventKind::ItemStateChanged,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One event from the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    /// Item name
    pub item: String,
    #[serde(default)]
    pub kind: EventKind,
    pub value: ItemValue,
}

impl ItemEvent {
    pub fn new(item: impl Into<String>, kind: EventKind, value: ItemValue) -> Self {
        Self {
            item: item.into(),
            kind,
            value,
        }
    }

    /// State change event, the common case
    pub fn state_changed(item: impl Into<String>, value: ItemValue) -> Self {
        Self::new(item, EventKind::ItemStateChanged, value)
    }
}

/// Something that consumes events from an [`EventBus`]
pub trait EventSubscriber: Send + Sync {
    /// Kinds this subscriber wants; the bus drops everything else
    fn subscribed_kinds(&self) -> &[EventKind];

    fn receive(&self, event: &ItemEvent);
}
