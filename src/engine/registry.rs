//! Registry of live deals
//!
//! Each deal sits behind its own lock, so mutations on different deals run in
//! parallel while mutations on one deal are serialized. Readers always see a
//! committed state because a deal only swaps in a fully computed rollup.

use super::deal::DealEngine;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::forecast::Scorecard;
use crate::graph::DealId;
use crate::persistence::GraphSnapshot;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

pub type SharedDeal = Arc<RwLock<DealEngine>>;

/// All deals known to one process
#[derive(Debug)]
pub struct DealRegistry {
    deals: RwLock<HashMap<DealId, SharedDeal>>,
    config: Arc<EngineConfig>,
}

/// A panicking writer never leaves a half-applied mutation behind, so the
/// data under a poisoned lock is still a committed state.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("recovering poisoned lock");
        PoisonError::into_inner(poisoned)
    })
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("recovering poisoned lock");
        PoisonError::into_inner(poisoned)
    })
}

impl DealRegistry {
    pub fn new(config: EngineConfig) -> Self {
        DealRegistry {
            deals: RwLock::new(HashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_deal(&self, id: impl Into<DealId>, name: impl Into<String>) -> EngineResult<()> {
        let id = id.into();
        let mut deals = write(&self.deals);
        if deals.contains_key(&id) {
            return Err(EngineError::DealExists(id));
        }
        let deal = DealEngine::new(id.clone(), name, Arc::clone(&self.config))?;
        deals.insert(id.clone(), Arc::new(RwLock::new(deal)));
        info!(deal = %id, "deal registered");
        Ok(())
    }

    /// Load a deal from its snapshot; replaces nothing
    pub fn import(&self, snapshot: &GraphSnapshot) -> EngineResult<DealId> {
        let deal = DealEngine::import(snapshot, Arc::clone(&self.config))?;
        let id = deal.id().clone();
        let mut deals = write(&self.deals);
        if deals.contains_key(&id) {
            return Err(EngineError::DealExists(id));
        }
        deals.insert(id.clone(), Arc::new(RwLock::new(deal)));
        info!(deal = %id, "deal imported into registry");
        Ok(id)
    }

    pub fn get(&self, id: &DealId) -> EngineResult<SharedDeal> {
        read(&self.deals)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::DealNotFound(id.clone()))
    }

    pub fn remove(&self, id: &DealId) -> EngineResult<()> {
        if write(&self.deals).remove(id).is_none() {
            return Err(EngineError::DealNotFound(id.clone()));
        }
        info!(deal = %id, "deal removed");
        Ok(())
    }

    /// Registered deal ids, sorted
    pub fn list(&self) -> Vec<DealId> {
        let mut ids: Vec<DealId> = read(&self.deals).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        read(&self.deals).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a query against one deal's committed state
    pub fn with_deal<R>(&self, id: &DealId, f: impl FnOnce(&DealEngine) -> R) -> EngineResult<R> {
        let deal = self.get(id)?;
        let guard = read(&deal);
        Ok(f(&guard))
    }

    /// Run a mutation with exclusive access to one deal
    pub fn with_deal_mut<R>(
        &self,
        id: &DealId,
        f: impl FnOnce(&mut DealEngine) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let deal = self.get(id)?;
        let mut guard = write(&deal);
        f(&mut guard)
    }

    /// Forecast scorecards of every deal, computed in parallel
    pub fn scorecards(&self) -> Vec<Scorecard> {
        let deals: Vec<SharedDeal> = read(&self.deals).values().cloned().collect();
        let mut cards: Vec<Scorecard> = deals
            .par_iter()
            .map(|deal| read(deal).forecast_scorecard())
            .collect();
        cards.sort_by(|a, b| a.deal.cmp(&b.deal));
        cards
    }

    pub fn export(&self, id: &DealId) -> EngineResult<GraphSnapshot> {
        self.with_deal(id, DealEngine::export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StepAttributes;
    use crate::graph::StepId;
    use std::thread;

    #[test]
    fn test_create_get_remove() {
        let registry = DealRegistry::new(EngineConfig::default());
        registry.create_deal("acme", "Acme").unwrap();
        assert_eq!(
            registry.create_deal("acme", "Acme again").unwrap_err(),
            EngineError::DealExists(DealId::new("acme"))
        );
        assert_eq!(registry.list(), vec![DealId::new("acme")]);
        assert_eq!(
            registry.with_deal(&DealId::new("acme"), |d| d.name().to_string()).unwrap(),
            "Acme"
        );

        registry.remove(&DealId::new("acme")).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(&DealId::new("acme")),
            Err(EngineError::DealNotFound(_))
        ));
    }

    #[test]
    fn test_deals_mutate_in_parallel() {
        let registry = Arc::new(DealRegistry::new(EngineConfig::default()));
        for i in 0..4 {
            registry.create_deal(format!("deal-{}", i), format!("Deal {}", i)).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let id = DealId::new(format!("deal-{}", i));
                    for n in 0..10 {
                        registry
                            .with_deal_mut(&id, |deal| {
                                deal.create_step(format!("s{}", n), StepAttributes::named("Step"))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in registry.list() {
            let steps = registry.with_deal(&id, |d| d.snapshot().steps.len()).unwrap();
            assert_eq!(steps, 10);
        }
        assert_eq!(registry.scorecards().len(), 4);
        assert!(registry
            .with_deal(&DealId::new("deal-0"), |d| d.step_status(&StepId::new("s9")).is_ok())
            .unwrap());
    }

    #[test]
    fn test_import_rejects_duplicate() {
        let registry = DealRegistry::new(EngineConfig::default());
        registry.create_deal("acme", "Acme").unwrap();
        let snapshot = registry.export(&DealId::new("acme")).unwrap();
        assert!(matches!(
            registry.import(&snapshot),
            Err(EngineError::DealExists(_))
        ));

        let other = DealRegistry::new(EngineConfig::default());
        assert_eq!(other.import(&snapshot).unwrap(), DealId::new("acme"));
    }
}
