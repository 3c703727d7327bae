use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{MenuError, OrderError};

/// A published menu entry. Immutable once published; the catalog may mark
/// an item unavailable but never deletes it, so orders holding snapshots
/// stay valid.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price_cents: u32,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Read-mostly store of menu items.
///
/// Readers take an `Arc` snapshot; admin writes clone the published list
/// and swap the `Arc`, so an in-flight [`MenuStream`] never observes a
/// concurrent update.
#[derive(Debug)]
pub struct Catalog {
    items: RwLock<Arc<Vec<Item>>>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        Catalog {
            items: RwLock::new(Arc::new(items)),
        }
    }

    /// Load the published menu from a JSON file.
    pub fn load(path: &Path) -> Result<Self, MenuError> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<Item> = serde_json::from_str(&raw)?;
        Ok(Catalog::new(items))
    }

    /// A fresh, finite pass over the menu as of this instant. Restartable:
    /// every call takes its own snapshot. Dropping the stream releases it.
    pub fn list_menu(&self) -> MenuStream {
        MenuStream {
            snapshot: self.snapshot(),
            pos: 0,
        }
    }

    /// Look up a single item by id in the current snapshot.
    pub fn item(&self, id: &str) -> Option<Item> {
        self.snapshot().iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Publish a new item, or replace the entry with the same id.
    /// Copy-on-write: in-flight menu streams are unaffected.
    pub fn publish(&self, item: Item) {
        let mut guard = self.items.write().expect("catalog lock poisoned");
        let mut next: Vec<Item> = guard.as_ref().clone();
        match next.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => next.push(item),
        }
        *guard = Arc::new(next);
    }

    /// Flip availability of a published item.
    pub fn set_available(&self, id: &str, available: bool) -> Result<(), OrderError> {
        let mut guard = self.items.write().expect("catalog lock poisoned");
        let mut next: Vec<Item> = guard.as_ref().clone();
        match next.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => existing.available = available,
            None => return Err(OrderError::InvalidItem(id.to_string())),
        }
        *guard = Arc::new(next);
        Ok(())
    }

    fn snapshot(&self) -> Arc<Vec<Item>> {
        self.items.read().expect("catalog lock poisoned").clone()
    }
}

/// A lazy, finite sequence of menu items over one consistent snapshot.
#[derive(Debug)]
pub struct MenuStream {
    snapshot: Arc<Vec<Item>>,
    pos: usize,
}

impl Iterator for MenuStream {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        let item = self.snapshot.get(self.pos).cloned();
        self.pos += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MenuStream {}
