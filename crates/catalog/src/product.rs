use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopforge_core::{DomainError, DomainResult, Entity, ProductId};

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// A catalog listing. Purchasable stock lives on its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id: ProductId::new(),
            name: name.trim().to_string(),
            description: description.into(),
            status: ProductStatus::Active,
            created_at: now,
        })
    }

    /// Check if the product can be sold (must not be archived).
    pub fn can_be_sold(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_is_active() {
        let product = Product::new("Mug", "A ceramic mug", Utc::now()).unwrap();
        assert_eq!(product.status, ProductStatus::Active);
        assert!(product.can_be_sold());
    }

    #[test]
    fn new_product_rejects_empty_name() {
        let err = Product::new("   ", "", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn archived_product_cannot_be_sold() {
        let mut product = Product::new("Mug", "", Utc::now()).unwrap();
        product.status = ProductStatus::Archived;
        assert!(!product.can_be_sold());
    }
}
