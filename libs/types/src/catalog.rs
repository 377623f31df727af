//! Catalog records owned by the catalog collaborator
//!
//! The fan-out core only reads these: product names for event construction
//! and store ids for the `store` tag. Recipes and stock back the ingredient
//! reservation done before an order is accepted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, ProductId, StoreId};

/// A menu item as listed on `GET /menu`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Price in the smallest currency unit
    pub price: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A store (branch) that can receive orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

/// One ingredient line of a product recipe, per unit ordered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub product_id: ProductId,
    pub ingredient: String,
    pub amount: Decimal,
}

/// Stock of one ingredient at one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub store_id: StoreId,
    pub ingredient: String,
    pub stock: Decimal,
}

/// Everything needed to build an in-memory catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub recipes: Vec<RecipeLine>,
    #[serde(default)]
    pub stock: Vec<StockLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_seed_deserializes_with_defaults() {
        let json = r#"{
            "stores": [{"id": 1, "name": "District 1"}],
            "products": [{"id": 5, "name": "Latte", "price": 45000, "category_id": 1}],
            "recipes": [{"product_id": 5, "ingredient": "milk", "amount": "150"}],
            "stock": [{"store_id": 1, "ingredient": "milk", "stock": "1000.5"}]
        }"#;
        let seed: CatalogSeed = serde_json::from_str(json).unwrap();

        assert_eq!(seed.stores[0].address, "");
        assert!(seed.products[0].is_active);
        assert_eq!(seed.products[0].image_url, None);
        assert_eq!(seed.recipes[0].amount, Decimal::from(150));
        assert_eq!(seed.stock[0].stock, Decimal::from_str("1000.5").unwrap());
    }

    #[test]
    fn test_product_price_is_numeric_on_the_wire() {
        let product = Product {
            id: ProductId::new(5),
            name: "Latte".to_string(),
            price: 45000,
            image_url: None,
            category_id: CategoryId::new(1),
            is_active: true,
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["price"], 45000);
        assert_eq!(value["id"], 5);
        assert!(value["image_url"].is_null());
    }
}
