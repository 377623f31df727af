//! Catalog collaborator: menu, store lookup and ingredient reservation.
//!
//! Ingress depends only on the [`Catalog`] trait. The in-memory
//! implementation is seeded from a JSON file or from [`demo_seed`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use types::catalog::{CatalogSeed, Product, RecipeLine, StockLevel, Store};
use types::ids::{CategoryId, ProductId, StoreId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Product '{product}' has no recipe")]
    NoRecipe { product: String },

    #[error("Out of stock: {ingredient}")]
    OutOfStock { ingredient: String },

    #[error("Catalog seed {path}: {reason}")]
    Seed { path: String, reason: String },
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Active products, ordered by id.
    async fn menu(&self) -> Vec<Product>;

    async fn product(&self, id: ProductId) -> Option<Product>;

    async fn store(&self, id: StoreId) -> Option<Store>;

    /// Deduct the ingredients for `quantity` units of `product` at `store`.
    ///
    /// All-or-nothing: stock is untouched unless every recipe line fits.
    async fn reserve(
        &self,
        store: StoreId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError>;
}

pub struct InMemoryCatalog {
    stores: BTreeMap<StoreId, Store>,
    products: BTreeMap<ProductId, Product>,
    recipes: BTreeMap<ProductId, Vec<RecipeLine>>,
    stock: Mutex<HashMap<(StoreId, String), Decimal>>,
}

impl InMemoryCatalog {
    pub fn from_seed(seed: CatalogSeed) -> Self {
        let stores = seed.stores.into_iter().map(|s| (s.id, s)).collect();
        let products = seed.products.into_iter().map(|p| (p.id, p)).collect();

        let mut recipes: BTreeMap<ProductId, Vec<RecipeLine>> = BTreeMap::new();
        for line in seed.recipes {
            recipes.entry(line.product_id).or_default().push(line);
        }

        let stock = seed
            .stock
            .into_iter()
            .map(|level| ((level.store_id, level.ingredient), level.stock))
            .collect();

        Self {
            stores,
            products,
            recipes,
            stock: Mutex::new(stock),
        }
    }

    /// Load a [`CatalogSeed`] from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let seed_error = |reason: String| CatalogError::Seed {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        let seed: CatalogSeed =
            serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))?;
        Ok(Self::from_seed(seed))
    }

    pub fn demo() -> Self {
        Self::from_seed(demo_seed())
    }

    /// Current stock of one ingredient at one store.
    pub fn stock_of(&self, store: StoreId, ingredient: &str) -> Option<Decimal> {
        let stock = self.stock.lock().unwrap_or_else(PoisonError::into_inner);
        stock.get(&(store, ingredient.to_string())).copied()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn menu(&self) -> Vec<Product> {
        self.products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect()
    }

    async fn product(&self, id: ProductId) -> Option<Product> {
        self.products.get(&id).cloned()
    }

    async fn store(&self, id: StoreId) -> Option<Store> {
        self.stores.get(&id).cloned()
    }

    async fn reserve(
        &self,
        store: StoreId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        let lines = match self.recipes.get(&product) {
            Some(lines) if !lines.is_empty() => lines,
            _ => {
                let name = self
                    .products
                    .get(&product)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| product.to_string());
                return Err(CatalogError::NoRecipe { product: name });
            }
        };

        let units = Decimal::from(quantity);
        let mut stock = self.stock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut needed: Vec<((StoreId, String), Decimal)> = Vec::with_capacity(lines.len());
        for line in lines {
            let key = (store, line.ingredient.clone());
            let required = line.amount * units;
            let available = stock.get(&key).copied().unwrap_or(Decimal::ZERO);
            if available < required {
                return Err(CatalogError::OutOfStock {
                    ingredient: line.ingredient.clone(),
                });
            }
            needed.push((key, required));
        }

        for (key, required) in needed {
            if let Some(level) = stock.get_mut(&key) {
                *level -= required;
            }
        }
        Ok(())
    }
}

/// Built-in catalog used when no seed file is configured.
pub fn demo_seed() -> CatalogSeed {
    let coffee = CategoryId::new(1);
    let tea = CategoryId::new(2);

    let product = |id: u32, name: &str, price: u64, category: CategoryId, active: bool| Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price,
        image_url: None,
        category_id: category,
        is_active: active,
    };

    let products = vec![
        product(1, "Americano", 35_000, coffee, true),
        product(2, "Espresso", 30_000, coffee, true),
        product(3, "Cappuccino", 45_000, coffee, true),
        product(4, "Coconut Latte", 55_000, coffee, true),
        product(5, "Latte", 45_000, coffee, true),
        product(6, "Matcha Latte", 50_000, tea, true),
        product(7, "Peach Tea", 40_000, tea, true),
        product(8, "Seasonal Cold Brew", 60_000, coffee, false),
    ];

    let recipe = |product: u32, ingredient: &str, amount: i64| RecipeLine {
        product_id: ProductId::new(product),
        ingredient: ingredient.to_string(),
        amount: Decimal::from(amount),
    };

    // Peach Tea is on the menu but has no recipe yet.
    let recipes = vec![
        recipe(1, "coffee_beans", 18),
        recipe(1, "cup", 1),
        recipe(2, "coffee_beans", 18),
        recipe(2, "cup", 1),
        recipe(3, "coffee_beans", 18),
        recipe(3, "milk", 120),
        recipe(3, "cup", 1),
        recipe(4, "coffee_beans", 18),
        recipe(4, "coconut_cream", 60),
        recipe(4, "milk", 80),
        recipe(4, "cup", 1),
        recipe(5, "coffee_beans", 18),
        recipe(5, "milk", 150),
        recipe(5, "cup", 1),
        recipe(6, "matcha", 4),
        recipe(6, "milk", 150),
        recipe(6, "cup", 1),
        recipe(8, "coffee_beans", 25),
        recipe(8, "cup", 1),
    ];

    let stores = vec![
        Store {
            id: StoreId::new(1),
            name: "District 1".to_string(),
            address: "12 Nguyen Hue, District 1".to_string(),
        },
        Store {
            id: StoreId::new(2),
            name: "Thu Duc".to_string(),
            address: "1 Vo Van Ngan, Thu Duc".to_string(),
        },
    ];

    let level = |store: u32, ingredient: &str, stock: i64| StockLevel {
        store_id: StoreId::new(store),
        ingredient: ingredient.to_string(),
        stock: Decimal::from(stock),
    };

    // Store 2 has not received its coconut cream delivery.
    let stock = vec![
        level(1, "coffee_beans", 20_000),
        level(1, "milk", 50_000),
        level(1, "coconut_cream", 5_000),
        level(1, "matcha", 1_000),
        level(1, "cup", 1_000),
        level(2, "coffee_beans", 10_000),
        level(2, "milk", 20_000),
        level(2, "matcha", 500),
        level(2, "cup", 500),
    ];

    CatalogSeed {
        stores,
        products,
        recipes,
        stock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_seed(CatalogSeed {
            stores: vec![Store {
                id: StoreId::new(1),
                name: "Test".into(),
                address: String::new(),
            }],
            products: vec![Product {
                id: ProductId::new(5),
                name: "Latte".into(),
                price: 45_000,
                image_url: None,
                category_id: CategoryId::new(1),
                is_active: true,
            }],
            recipes: vec![
                RecipeLine {
                    product_id: ProductId::new(5),
                    ingredient: "milk".into(),
                    amount: Decimal::from(150),
                },
                RecipeLine {
                    product_id: ProductId::new(5),
                    ingredient: "cup".into(),
                    amount: Decimal::ONE,
                },
            ],
            stock: vec![
                StockLevel {
                    store_id: StoreId::new(1),
                    ingredient: "milk".into(),
                    stock: Decimal::from(400),
                },
                StockLevel {
                    store_id: StoreId::new(1),
                    ingredient: "cup".into(),
                    stock: Decimal::from(1),
                },
            ],
        })
    }

    #[tokio::test]
    async fn test_reserve_deducts_every_line() {
        let catalog = small_catalog();
        catalog
            .reserve(StoreId::new(1), ProductId::new(5), 1)
            .await
            .unwrap();

        assert_eq!(catalog.stock_of(StoreId::new(1), "milk"), Some(Decimal::from(250)));
        assert_eq!(catalog.stock_of(StoreId::new(1), "cup"), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let catalog = small_catalog();

        // Enough milk for two, but only one cup.
        let err = catalog
            .reserve(StoreId::new(1), ProductId::new(5), 2)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::OutOfStock {
                ingredient: "cup".into()
            }
        );
        assert_eq!(catalog.stock_of(StoreId::new(1), "milk"), Some(Decimal::from(400)));
        assert_eq!(catalog.stock_of(StoreId::new(1), "cup"), Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn test_missing_stock_row_is_out_of_stock() {
        let catalog = small_catalog();
        let err = catalog
            .reserve(StoreId::new(2), ProductId::new(5), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::OutOfStock { .. }));
    }

    #[tokio::test]
    async fn test_no_recipe() {
        let catalog = InMemoryCatalog::demo();
        let err = catalog
            .reserve(StoreId::new(1), ProductId::new(7), 1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::NoRecipe {
                product: "Peach Tea".into()
            }
        );
    }

    #[tokio::test]
    async fn test_demo_menu_lists_active_products_in_order() {
        let catalog = InMemoryCatalog::demo();
        let menu = catalog.menu().await;

        let ids: Vec<u32> = menu.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(catalog.product(ProductId::new(5)).await.unwrap().name, "Latte");
        assert!(catalog.store(StoreId::new(1)).await.is_some());
        assert!(catalog.store(StoreId::new(99)).await.is_none());
    }

    #[test]
    fn test_load_reports_bad_seed_file() {
        let path = std::env::temp_dir().join(format!("kitchen-seed-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let err = InMemoryCatalog::load(&path).err().unwrap();
        assert!(matches!(err, CatalogError::Seed { .. }));

        std::fs::remove_file(&path).ok();
        let err = InMemoryCatalog::load(&path).err().unwrap();
        assert!(matches!(err, CatalogError::Seed { .. }));
    }
}
