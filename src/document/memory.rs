//! In-memory schematic with snapshot transactions

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{DocumentError, Item, ItemId, ItemKind, SchematicDocument};

/// One committed transaction
#[derive(Debug, Clone, Serialize)]
pub struct CommitRecord {
    pub description: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MemorySchematic {
    items: Vec<Item>,
    #[serde(skip)]
    snapshot: Option<Vec<Item>>,
    #[serde(skip)]
    selection: Vec<ItemId>,
    history: Vec<CommitRecord>,
}

impl MemorySchematic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits applied so far, oldest first
    pub fn history(&self) -> &[CommitRecord] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Selection is owned by the host editor, not by transactions
    pub fn set_selection(&mut self, ids: Vec<ItemId>) {
        self.selection = ids;
    }

    fn ensure_open(&self) -> Result<(), DocumentError> {
        if self.snapshot.is_some() {
            Ok(())
        } else {
            Err(DocumentError::NoTransaction)
        }
    }

    fn position(&self, id: ItemId) -> Result<usize, DocumentError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(DocumentError::ItemNotFound(id))
    }
}

impl SchematicDocument for MemorySchematic {
    fn open_transaction(&mut self) -> Result<(), DocumentError> {
        if self.snapshot.is_some() {
            return Err(DocumentError::TransactionAlreadyOpen);
        }
        self.snapshot = Some(self.items.clone());
        Ok(())
    }

    fn commit(&mut self, description: &str) -> Result<(), DocumentError> {
        self.ensure_open()?;
        self.snapshot = None;
        self.history.push(CommitRecord {
            description: description.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    fn discard(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.items = snapshot;
        }
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn items(&self) -> Vec<&Item> {
        self.items.iter().collect()
    }

    fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    fn selection(&self) -> Vec<ItemId> {
        // Drop stale ids left behind by deletions
        self.selection
            .iter()
            .copied()
            .filter(|id| self.item(*id).is_some())
            .collect()
    }

    fn add_item(&mut self, kind: ItemKind) -> Result<ItemId, DocumentError> {
        self.ensure_open()?;
        let id = Uuid::new_v4();
        self.items.push(Item { id, kind });
        Ok(id)
    }

    fn replace_item(&mut self, id: ItemId, kind: ItemKind) -> Result<(), DocumentError> {
        self.ensure_open()?;
        let index = self.position(id)?;
        self.items[index].kind = kind;
        Ok(())
    }

    fn remove_item(&mut self, id: ItemId) -> Result<Item, DocumentError> {
        self.ensure_open()?;
        let index = self.position(id)?;
        Ok(self.items.remove(index))
    }
}
