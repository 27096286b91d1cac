//! Producer-side adapters feeding the store and the event hub

pub mod updater;

pub use updater::{BlockData, LiveUpdater, MempoolSnapshot, PendingNotification};
