//! Sample record types.

use recbolt_core::{Model, Rec, Record, Slot};
use serde::{Deserialize, Serialize};

/// A record with an inline identity slot.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Widget {
    /// Identity slot.
    #[serde(skip)]
    pub model: Model,
    /// Display name.
    pub name: String,
    /// Price in cents.
    pub price: i64,
}

impl Widget {
    /// Creates a bare widget.
    pub fn new(name: impl Into<String>, price: i64) -> Self {
        Self {
            model: Model::new(),
            name: name.into(),
            price,
        }
    }

    /// Creates a bare widget wrapped in a record handle.
    pub fn rec(name: impl Into<String>, price: i64) -> Rec<Self> {
        Rec::new(Self::new(name, price))
    }
}

impl Record for Widget {
    fn slot(&mut self) -> Option<Slot<'_>> {
        Some(Slot::Inline(&mut self.model))
    }
}

/// A record with a boxed identity slot and nested fields.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Gadget {
    /// Identity slot, allocated on embedding.
    #[serde(skip)]
    pub model: Option<Box<Model>>,
    /// Label.
    pub label: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Optional weight in grams.
    pub weight: Option<u32>,
}

impl Gadget {
    /// Creates a bare gadget wrapped in a record handle.
    pub fn rec(label: impl Into<String>, tags: &[&str]) -> Rec<Self> {
        Rec::new(Self {
            model: None,
            label: label.into(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            weight: None,
        })
    }
}

impl Record for Gadget {
    fn slot(&mut self) -> Option<Slot<'_>> {
        Some(Slot::Boxed(&mut self.model))
    }
}
