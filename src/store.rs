//! FIFO stores: bounded or unbounded queues of values shared by processes.
//!
//! `put` and `get` return request events. A put fires once the store has
//! room for its item; a get fires with the oldest item once one is
//! available. Requests are served strictly in the order they were made.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::error::{KernelError, KernelResult};
use crate::event::{EventId, EventKind};
use crate::simulation::Kernel;
use crate::value::Value;

/// Handle to a store within one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreId(usize);

impl StoreId {
    #[inline]
    pub fn new(raw: usize) -> Self {
        StoreId(raw)
    }

    #[inline]
    pub fn raw(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Store {
    pub(crate) capacity: usize,
    pub(crate) items: VecDeque<Value>,
    /// Put requests not yet accepted, oldest first.
    pub(crate) puts: VecDeque<(EventId, Value)>,
    /// Get requests not yet served, oldest first.
    pub(crate) gets: VecDeque<EventId>,
}

impl Store {
    fn new(capacity: usize) -> Self {
        Store {
            capacity,
            items: VecDeque::new(),
            puts: VecDeque::new(),
            gets: VecDeque::new(),
        }
    }
}

impl Kernel {
    /// Create a store. `None` means unbounded.
    pub(crate) fn create_store(&mut self, capacity: Option<usize>) -> KernelResult<StoreId> {
        match capacity {
            Some(0) => Err(KernelError::InvalidCapacity),
            Some(n) => Ok(self.add_store(n)),
            None => Ok(self.add_store(usize::MAX)),
        }
    }

    pub(crate) fn add_store(&mut self, capacity: usize) -> StoreId {
        let id = StoreId(self.stores.len());
        self.stores.push(Store::new(capacity));
        debug!(store = %id, capacity, "store created");
        id
    }

    fn store_mut(&mut self, id: StoreId) -> KernelResult<&mut Store> {
        self.stores.get_mut(id.0).ok_or(KernelError::UnknownStore(id))
    }

    /// Request that `item` be added to the store.
    pub(crate) fn put(&mut self, store: StoreId, item: Value) -> KernelResult<EventId> {
        self.store_mut(store)?;
        let request = self.new_event(EventKind::StorePut { store });
        self.store_mut(store)?.puts.push_back((request, item));
        self.settle(store)?;
        Ok(request)
    }

    /// Request the oldest item from the store.
    pub(crate) fn get(&mut self, store: StoreId) -> KernelResult<EventId> {
        self.store_mut(store)?;
        let request = self.new_event(EventKind::StoreGet { store });
        self.store_mut(store)?.gets.push_back(request);
        self.settle(store)?;
        Ok(request)
    }

    /// Withdraw a request that has not been served yet.
    ///
    /// Returns `false` if the request was already served or is not a
    /// request on this store. A withdrawn request never fires.
    pub(crate) fn cancel(&mut self, store: StoreId, request: EventId) -> KernelResult<bool> {
        let s = self.store_mut(store)?;
        let before = s.puts.len() + s.gets.len();
        s.puts.retain(|(id, _)| *id != request);
        s.gets.retain(|id| *id != request);
        let removed = s.puts.len() + s.gets.len() < before;
        if removed {
            debug!(%store, %request, "request cancelled");
            // A withdrawn put may have been blocking the ones behind it.
            self.settle(store)?;
        }
        Ok(removed)
    }

    /// Number of items currently held.
    pub(crate) fn store_len(&self, store: StoreId) -> KernelResult<usize> {
        self.stores
            .get(store.0)
            .map(|s| s.items.len())
            .ok_or(KernelError::UnknownStore(store))
    }

    /// Accept puts while there is room and serve gets while there are
    /// items, until neither side can make progress.
    fn settle(&mut self, store: StoreId) -> KernelResult<()> {
        loop {
            let s = self.store_mut(store)?;
            let mut served = Vec::new();

            while s.items.len() < s.capacity {
                let Some((request, item)) = s.puts.pop_front() else {
                    break;
                };
                s.items.push_back(item);
                served.push((request, Value::Unit));
            }
            while !s.gets.is_empty() {
                let Some(item) = s.items.pop_front() else {
                    break;
                };
                if let Some(request) = s.gets.pop_front() {
                    served.push((request, item));
                }
            }

            if served.is_empty() {
                return Ok(());
            }
            for (request, value) in served {
                trace!(%store, %request, "request served");
                self.queue_now(request, Ok(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::time::VirtualTime;

    fn kernel() -> Kernel {
        Kernel::new(EnvironmentConfig::default())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut k = kernel();
        assert_eq!(k.create_store(Some(0)), Err(KernelError::InvalidCapacity));
        assert!(k.create_store(Some(1)).is_ok());
        assert!(k.create_store(None).is_ok());
    }

    #[test]
    fn test_unknown_store() {
        let mut k = kernel();
        let bogus = StoreId::new(4);
        assert_eq!(k.put(bogus, Value::Unit), Err(KernelError::UnknownStore(bogus)));
        assert_eq!(k.store_len(bogus), Err(KernelError::UnknownStore(bogus)));
    }

    #[test]
    fn test_fifo_order() {
        let mut k = kernel();
        let s = k.create_store(None).unwrap();
        for n in 1..=3 {
            k.put(s, Value::Int(n)).unwrap();
        }
        assert_eq!(k.store_len(s).unwrap(), 3);

        let gets: Vec<EventId> = (0..3).map(|_| k.get(s).unwrap()).collect();
        k.run(None).unwrap();
        let values: Vec<Value> = gets
            .iter()
            .map(|g| k.events[g].outcome.clone().unwrap().unwrap())
            .collect();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(k.store_len(s).unwrap(), 0);
    }

    #[test]
    fn test_get_waits_for_put() {
        let mut k = kernel();
        let s = k.create_store(None).unwrap();
        let get = k.get(s).unwrap();
        assert!(!k.events[&get].is_triggered());

        let t = k.timeout(4, Value::Unit).unwrap();
        assert_eq!(k.run_until_event(t).unwrap(), Ok(Value::Unit));
        k.put(s, Value::text("parcel")).unwrap();

        assert_eq!(k.run_until_event(get).unwrap(), Ok(Value::text("parcel")));
        assert_eq!(k.events[&get].trigger_time, Some(VirtualTime::new(4)));
    }

    #[test]
    fn test_bounded_store_blocks_put() {
        let mut k = kernel();
        let s = k.create_store(Some(1)).unwrap();
        let first = k.put(s, Value::Int(1)).unwrap();
        let second = k.put(s, Value::Int(2)).unwrap();
        assert!(k.events[&first].is_triggered());
        assert!(!k.events[&second].is_triggered());

        k.get(s).unwrap();
        // Taking the first item makes room for the second.
        assert!(k.events[&second].is_triggered());
        assert_eq!(k.store_len(s).unwrap(), 1);
    }

    #[test]
    fn test_cancel_pending_get() {
        let mut k = kernel();
        let s = k.create_store(None).unwrap();
        let stale = k.get(s).unwrap();
        let live = k.get(s).unwrap();
        assert!(k.cancel(s, stale).unwrap());
        assert!(!k.cancel(s, stale).unwrap());

        k.put(s, Value::Int(9)).unwrap();
        k.run(None).unwrap();
        assert!(!k.events[&stale].is_triggered());
        assert_eq!(k.events[&live].outcome, Some(Ok(Value::Int(9))));
    }
}
