//! Navigation bridge between rendered segments and the player
//!
//! The facade hands out a `SeekHandle` once per "becomes ready" transition.
//! The bridge stores the latest one and turns segment clicks into seeks.
//! Callers never touch the player instance directly.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::player::facade::SeekHandle;
use crate::player::PlayerFacade;
use crate::transcript::Segment;

/// Single-slot holder for the latest registered handler
///
/// Writers replace the slot unconditionally; readers fetch the current value
/// at the moment the triggering condition fires, so long-lived listeners
/// never call a stale handler.
pub struct HandlerCell<T: ?Sized> {
    slot: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: ?Sized> HandlerCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set(&self, handler: Arc<T>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl<T: ?Sized> Clone for HandlerCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> Default for HandlerCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outward-facing seek capability
#[derive(Clone, Default)]
pub struct NavigationBridge {
    seek: Arc<RwLock<Option<SeekHandle>>>,
}

impl NavigationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the bridge to a facade so every ready transition re-registers
    /// the seek capability for the new instance
    pub fn attach(&self, facade: &PlayerFacade) {
        let bridge = self.clone();
        facade.set_on_ready(move |handle| bridge.register(handle));
    }

    /// Setter invoked by the playback owner once per ready transition
    pub fn register(&self, handle: SeekHandle) {
        debug!("🔗 Seek capability registered");
        *self.seek.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn clear(&self) {
        *self.seek.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_ready(&self) -> bool {
        self.seek
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SeekHandle::is_live)
    }

    /// Move playback to `seconds`; a no-op until a player is ready
    pub fn seek(&self, seconds: f64) -> bool {
        let handle = self.seek.read().unwrap_or_else(PoisonError::into_inner).clone();
        match handle {
            Some(handle) => handle.seek(seconds),
            None => {
                debug!("Seek to {:.2}s ignored: no player ready", seconds);
                false
            }
        }
    }

    /// A click on any rendered segment seeks to its start
    pub fn click(&self, segment: &Segment) -> bool {
        self.seek(segment.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_cell_reads_latest_value() {
        let cell: HandlerCell<dyn Fn() -> u32 + Send + Sync> = HandlerCell::new();
        assert!(cell.get().is_none());

        let reader = cell.clone();
        cell.set(Arc::new(|| 1));
        cell.set(Arc::new(|| 2));
        assert_eq!(reader.get().map(|f| f()), Some(2));

        cell.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn test_seek_before_ready_is_noop() {
        let bridge = NavigationBridge::new();
        assert!(!bridge.is_ready());
        assert!(!bridge.seek(12.0));
        assert!(!bridge.click(&Segment::new(5.0, 5.0, "b")));
    }
}
