//! Schematic document contract
//!
//! The editor that owns the real schematic is an external collaborator. Tools
//! only see it through [`SchematicDocument`]: a transaction-scoped mutation API
//! plus read access to the elements on the sheet. [`MemorySchematic`] is the
//! in-process implementation used by the replay CLI and the tests.

mod geometry;
mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use geometry::{Orientation, Point, Rect, Rotation, EPSILON_MM};
pub use memory::{CommitRecord, MemorySchematic};

/// Identifier of an element on the sheet
pub type ItemId = Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("no transaction is open")]
    NoTransaction,
    #[error("a transaction is already open")]
    TransactionAlreadyOpen,
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error("{0}")]
    Rejected(String),
}

/// A pin of a placed symbol, in absolute sheet coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub number: String,
    pub name: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub lib_id: String,
    pub reference: String,
    pub value: String,
    pub unit: u32,
    pub position: Point,
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasheet: Option<String>,
    pub bounding_box: Rect,
    pub pins: Vec<Pin>,
}

impl Symbol {
    /// Find a pin by number first, then by name
    pub fn pin(&self, key: &str) -> Option<&Pin> {
        self.pins
            .iter()
            .find(|p| p.number == key)
            .or_else(|| self.pins.iter().find(|p| p.name == key))
    }

    /// Move the anchor, carrying pins and body with it
    pub fn move_to(&mut self, position: Point) {
        let delta = position.delta_from(self.position);
        self.position = position;
        self.bounding_box = self.bounding_box.translate(delta);
        for pin in &mut self.pins {
            pin.position = pin.position.offset(delta);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    #[default]
    Local,
    Global,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub net: String,
    pub kind: LabelKind,
    pub position: Point,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Symbol(Symbol),
    Wire(Wire),
    Label(Label),
    Junction { position: Point },
    Text(Text),
}

impl ItemKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Symbol(_) => "symbol",
            ItemKind::Wire(_) => "wire",
            ItemKind::Label(_) => "label",
            ItemKind::Junction { .. } => "junction",
            ItemKind::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub kind: ItemKind,
}

/// Mutation and lookup contract of a live schematic.
///
/// Mutations are only legal between `open_transaction` and either `commit`
/// or `discard`, and at most one transaction may be open at a time.
pub trait SchematicDocument: Send {
    fn open_transaction(&mut self) -> Result<(), DocumentError>;

    /// Apply every staged mutation atomically
    fn commit(&mut self, description: &str) -> Result<(), DocumentError>;

    /// Roll back every staged mutation. A no-op when nothing is open.
    fn discard(&mut self);

    fn in_transaction(&self) -> bool;

    fn items(&self) -> Vec<&Item>;

    fn item(&self, id: ItemId) -> Option<&Item>;

    /// Identifiers of the currently selected items
    fn selection(&self) -> Vec<ItemId>;

    fn add_item(&mut self, kind: ItemKind) -> Result<ItemId, DocumentError>;

    fn replace_item(&mut self, id: ItemId, kind: ItemKind) -> Result<(), DocumentError>;

    fn remove_item(&mut self, id: ItemId) -> Result<Item, DocumentError>;

    fn symbol_by_reference(&self, reference: &str) -> Option<(ItemId, &Symbol)> {
        self.items().into_iter().find_map(|item| match &item.kind {
            ItemKind::Symbol(symbol) if symbol.reference == reference => Some((item.id, symbol)),
            _ => None,
        })
    }

    /// Symbol bodies, used as routing obstacles
    fn obstacles(&self) -> Vec<Rect> {
        self.items()
            .into_iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Symbol(symbol) => Some(symbol.bounding_box),
                _ => None,
            })
            .collect()
    }
}
