//! Product and kios master data as seen by the ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product that can be stocked at a kios
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Package description, e.g. "Sachet 50 gr"
    pub package_unit: String,
    /// Unit of measure, e.g. "pcs"
    pub unit: Option<String>,
    pub is_deleted: bool,
}

/// An outlet stock is delivered to and dispatched from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Kios {
    pub id: Uuid,
    pub name: String,
    pub is_deleted: bool,
}

/// Product fields embedded in availability listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub package_unit: String,
    pub unit: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            package_unit: p.package_unit.clone(),
            unit: p.unit.clone(),
        }
    }
}

/// Kios fields embedded in availability listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KiosSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Kios> for KiosSummary {
    fn from(k: &Kios) -> Self {
        Self {
            id: k.id,
            name: k.name.clone(),
        }
    }
}
