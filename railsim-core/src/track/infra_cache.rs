//! Process-wide registry of loaded infras

use super::infra::{Infra, RawInfra};
use crate::imports::*;
use std::sync::{Mutex, OnceLock};

type Slot = Arc<OnceLock<Result<Arc<Infra>, Error>>>;

/// Loaded infras shared by concurrent simulations.  Each infra is built at most once, even when
/// several callers request it at the same time; callers of a different id never wait on it.
#[derive(Debug, Default)]
pub struct InfraCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl InfraCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &str) -> Result<Slot, Error> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Other("infra cache lock poisoned".into()))?;
        Ok(slots.entry(id.to_string()).or_default().clone())
    }

    /// Returns the infra registered under `id`, loading it from `fetch` on first use.
    /// A failed load is cached as well; [InfraCache::unload] clears it.
    pub fn load<F>(&self, id: &str, fetch: F) -> Result<Arc<Infra>, Error>
    where
        F: FnOnce() -> Result<RawInfra, Error>,
    {
        let slot = self.slot(id)?;
        slot.get_or_init(|| {
            debug!("loading infra `{id}`");
            fetch().and_then(Infra::load).map(Arc::new)
        })
        .clone()
    }

    /// Already loaded infra, if any
    pub fn get(&self, id: &str) -> Option<Arc<Infra>> {
        let slots = self.slots.lock().ok()?;
        slots.get(id)?.get()?.as_ref().ok().cloned()
    }

    /// Drops the cached infra.  Simulations still holding an `Arc` keep their copy.
    pub fn unload(&self, id: &str) -> Result<bool, Error> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Other("infra cache lock poisoned".into()))?;
        Ok(slots.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::small_raw_infra;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_loads_once() {
        let cache = InfraCache::new();
        let loads = AtomicUsize::new(0);
        let infras: Vec<Arc<Infra>> = (0..16)
            .into_par_iter()
            .map(|_| {
                cache
                    .load("small", || {
                        loads.fetch_add(1, AtomicOrdering::SeqCst);
                        Ok(small_raw_infra())
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(loads.load(AtomicOrdering::SeqCst), 1);
        assert!(infras.iter().all(|infra| Arc::ptr_eq(infra, &infras[0])));
        assert!(cache.get("small").is_some());
    }

    #[test]
    fn test_failed_load_and_unload() {
        let cache = InfraCache::new();
        let res = cache.load("bad", || Err(Error::Other("no such file".into())));
        assert!(res.is_err());
        assert!(cache.get("bad").is_none());
        assert!(cache.unload("bad").unwrap());
        let res = cache.load("bad", || Ok(small_raw_infra()));
        assert!(res.is_ok());
        assert!(!cache.unload("missing").unwrap());
    }
}
