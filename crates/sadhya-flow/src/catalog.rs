// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The live catalog: an immutable snapshot swapped atomically.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use sadhya_config::model::CatalogConfig;
use sadhya_core::{Catalog, CatalogSnapshot, MAX_PRICE, SadhyaError};

/// Lock-free catalog reads with atomic replacement.
///
/// Conversations hold on to the snapshot they started a step with; admin
/// changes only affect steps that begin afterwards.
#[derive(Debug)]
pub struct SnapshotCatalog {
    current: ArcSwap<CatalogSnapshot>,
}

impl SnapshotCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.to_snapshot())
    }

    /// Replaces the whole catalog, e.g. after the config file was re-read.
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        info!(
            menu_items = snapshot.menu.len(),
            locations = snapshot.locations.len(),
            "catalog replaced"
        );
        self.current.store(Arc::new(snapshot));
    }

    /// Marks a location as orderable or not.
    pub fn set_location_active(&self, id: &str, active: bool) -> Result<(), SadhyaError> {
        self.update_location(id, |l| l.active = active)?;
        info!(location = id, active, "location availability changed");
        Ok(())
    }

    /// Changes the delivery fee of a location. Pickup stays free regardless.
    pub fn set_location_fee(&self, id: &str, fee: u64) -> Result<(), SadhyaError> {
        if fee > MAX_PRICE {
            return Err(SadhyaError::Config(format!(
                "delivery fee {fee} exceeds the maximum of {MAX_PRICE}"
            )));
        }
        self.update_location(id, |l| l.fee = fee)?;
        info!(location = id, fee, "location fee changed");
        Ok(())
    }

    fn update_location(
        &self,
        id: &str,
        change: impl Fn(&mut sadhya_core::Location),
    ) -> Result<(), SadhyaError> {
        let mut found = false;
        self.current.rcu(|current| {
            let mut next = CatalogSnapshot::clone(current);
            found = false;
            if let Some(location) = next.locations.iter_mut().find(|l| l.id == id) {
                change(location);
                found = true;
            }
            next
        });
        if found {
            Ok(())
        } else {
            Err(SadhyaError::NotFound {
                kind: "location".into(),
                id: id.to_string(),
            })
        }
    }
}

impl Catalog for SnapshotCatalog {
    fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }
}
