//! Single-occupancy claim cell for the open capture line

use std::sync::{Arc, Mutex as StdMutex};

use super::lock;

/// Holds at most one shared device handle.
///
/// Doubles as the "is a device open" check and as the ownership token: only the
/// caller whose claim succeeded may later release and close the handle.
pub struct DeviceSlot<T: ?Sized> {
    inner: StdMutex<Option<Arc<T>>>,
}

impl<T: ?Sized> DeviceSlot<T> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(None),
        }
    }

    /// Store `handle` if the slot is empty (compare-and-set against empty).
    ///
    /// On a lost race the handle is handed back so the caller can close it.
    pub fn try_claim(&self, handle: Arc<T>) -> Result<(), Arc<T>> {
        let mut slot = lock(&self.inner);
        if slot.is_some() {
            return Err(handle);
        }
        *slot = Some(handle);
        Ok(())
    }

    /// Empty the slot, returning whatever it held
    pub fn release(&self) -> Option<Arc<T>> {
        lock(&self.inner).take()
    }

    /// Borrow a clone of the current handle
    pub fn current(&self) -> Option<Arc<T>> {
        lock(&self.inner).clone()
    }

    pub fn is_occupied(&self) -> bool {
        lock(&self.inner).is_some()
    }
}

impl<T: ?Sized> Default for DeviceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn new_slot_is_empty() {
        let slot: DeviceSlot<u32> = DeviceSlot::new();
        assert!(!slot.is_occupied());
        assert!(slot.current().is_none());
        assert!(slot.release().is_none());
    }

    #[test]
    fn second_claim_gets_handle_back() {
        let slot = DeviceSlot::new();
        slot.try_claim(Arc::new(1u32)).unwrap();

        let rejected = slot.try_claim(Arc::new(2u32)).unwrap_err();
        assert_eq!(*rejected, 2);
        assert_eq!(slot.current().map(|h| *h), Some(1));
    }

    #[test]
    fn release_empties_slot() {
        let slot = DeviceSlot::new();
        slot.try_claim(Arc::new(7u32)).unwrap();
        assert_eq!(slot.release().map(|h| *h), Some(7));
        assert!(!slot.is_occupied());
        assert!(slot.try_claim(Arc::new(8u32)).is_ok());
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let slot = Arc::new(DeviceSlot::new());
        let winners: usize = (0..8)
            .map(|i| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || slot.try_claim(Arc::new(i)).is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
