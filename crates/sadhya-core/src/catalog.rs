// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Menu and location catalog types.
//!
//! A [`CatalogSnapshot`] is immutable; changes produce a new snapshot that
//! replaces the old one atomically (see `sadhya-flow::catalog`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Junction, JunctionKind};

/// Upper bound for a menu price or a delivery fee, in rupees.
pub const MAX_PRICE: u64 = 1_000_000;

/// An orderable menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub number: u32,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub description: Option<String>,
    pub active: bool,
}

/// A delivery zone or the pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub kind: JunctionKind,
    pub fee: u64,
    pub active: bool,
}

impl Location {
    /// Freezes this location into the junction stored on a draft order.
    pub fn to_junction(&self) -> Junction {
        Junction {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            delivery_fee: match self.kind {
                JunctionKind::Delivery => self.fee,
                JunctionKind::Pickup => 0,
            },
        }
    }
}

/// Point-in-time view of the menu and locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub menu: Vec<MenuItem>,
    pub locations: Vec<Location>,
}

impl CatalogSnapshot {
    pub fn new(menu: Vec<MenuItem>, locations: Vec<Location>) -> Self {
        Self { menu, locations }
    }

    /// Active menu items in item-number order.
    pub fn active_menu(&self) -> Vec<&MenuItem> {
        let mut items: Vec<&MenuItem> = self.menu.iter().filter(|m| m.active).collect();
        items.sort_by_key(|m| m.number);
        items
    }

    /// Active locations with delivery zones first, then pickup.
    pub fn active_locations(&self) -> Vec<&Location> {
        let mut delivery: Vec<&Location> = self
            .locations
            .iter()
            .filter(|l| l.active && l.kind == JunctionKind::Delivery)
            .collect();
        delivery.extend(
            self.locations
                .iter()
                .filter(|l| l.active && l.kind == JunctionKind::Pickup),
        );
        delivery
    }

    /// Looks up an active menu item by its number.
    pub fn menu_item(&self, number: u32) -> Option<&MenuItem> {
        self.menu.iter().find(|m| m.active && m.number == number)
    }

    /// Matches an active location by id or by name, ignoring case.
    pub fn find_location(&self, query: &str) -> Option<&Location> {
        let query = query.trim();
        self.active_locations()
            .into_iter()
            .find(|l| l.id.eq_ignore_ascii_case(query) || l.name.eq_ignore_ascii_case(query))
    }

    /// Any location by id, active or not.
    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }
}

/// Read access to the current catalog.
pub trait Catalog: Send + Sync + 'static {
    /// Returns the snapshot in effect right now. Callers keep using the
    /// returned snapshot even if the catalog is replaced meanwhile.
    fn snapshot(&self) -> Arc<CatalogSnapshot>;
}
