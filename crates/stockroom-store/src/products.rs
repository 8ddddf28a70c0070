//! # Product Store
//!
//! CRUD over the catalogue. Availability arithmetic lives in the
//! reservation engine; this store only owns the rows.

use crate::{time, Database, StoreError};
use rusqlite::{OptionalExtension, Row};
use shared_types::Product;
use uuid::Uuid;

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Merchant SKU, unique.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Minor-unit price.
    pub unit_price: i64,
    /// Stock count, `-1` for unlimited.
    pub stock: i64,
    /// Purchasable flag.
    pub active: bool,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub unit_price: Option<i64>,
    pub stock: Option<i64>,
    pub active: Option<bool>,
}

/// Store over the `products` table.
#[derive(Clone)]
pub struct ProductStore {
    db: Database,
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        sku: row.get(1)?,
        name: row.get(2)?,
        unit_price: row.get(3)?,
        stock: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        created: time::from_iso(&row.get::<_, String>(6)?).unwrap_or_default(),
    })
}

const PRODUCT_COLS: &str = "id, sku, name, unit_price, stock, active, created";

impl ProductStore {
    /// Create a store over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new product, generating its id.
    ///
    /// # Errors
    ///
    /// A duplicate SKU surfaces as a uniqueness violation.
    pub fn insert(&self, new: &NewProduct) -> Result<Product, StoreError> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.clone(),
            name: new.name.clone(),
            unit_price: new.unit_price,
            stock: new.stock,
            active: new.active,
            created: chrono::Utc::now(),
        };
        self.db.with(|c| {
            c.execute(
                "INSERT INTO products (id, sku, name, unit_price, stock, active, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    product.id,
                    product.sku,
                    product.name,
                    product.unit_price,
                    product.stock,
                    product.active as i64,
                    time::to_iso(product.created),
                ],
            )
        })?;
        Ok(product)
    }

    /// Fetch by id.
    pub fn get(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.db.with(|c| {
            c.query_row(
                &format!("SELECT {PRODUCT_COLS} FROM products WHERE id = ?1"),
                [id],
                row_to_product,
            )
            .optional()
        })
    }

    /// Fetch by SKU.
    pub fn get_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        self.db.with(|c| {
            c.query_row(
                &format!("SELECT {PRODUCT_COLS} FROM products WHERE sku = ?1"),
                [sku],
                row_to_product,
            )
            .optional()
        })
    }

    /// All active products, SKU order.
    pub fn list_active(&self) -> Result<Vec<Product>, StoreError> {
        self.db.with(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {PRODUCT_COLS} FROM products WHERE active = 1 ORDER BY sku"
            ))?;
            let rows = stmt.query_map([], row_to_product)?;
            rows.collect()
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when the id does not exist.
    pub fn update(&self, id: &str, update: &ProductUpdate) -> Result<(), StoreError> {
        let changed = self.db.with(|c| {
            c.execute(
                "UPDATE products SET
                     name       = COALESCE(?2, name),
                     unit_price = COALESCE(?3, unit_price),
                     stock      = COALESCE(?4, stock),
                     active     = COALESCE(?5, active)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.name,
                    update.unit_price,
                    update.stock,
                    update.active.map(|a| a as i64),
                ],
            )
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a product row.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .db
            .with(|c| c.execute("DELETE FROM products WHERE id = ?1", [id]))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn store() -> ProductStore {
        let db = Database::open_in_memory().unwrap();
        migrations::migrate(&db).unwrap();
        ProductStore::new(db)
    }

    fn widget() -> NewProduct {
        NewProduct {
            sku: "WID-1".into(),
            name: "Widget".into(),
            unit_price: 1_000,
            stock: 5,
            active: true,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = store();
        let created = store.insert(&widget()).unwrap();

        let by_id = store.get(&created.id).unwrap().unwrap();
        let by_sku = store.get_by_sku("WID-1").unwrap().unwrap();
        assert_eq!(by_id, by_sku);
        assert_eq!(by_id.unit_price, 1_000);
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let store = store();
        store.insert(&widget()).unwrap();
        let err = store.insert(&widget()).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_list_active_excludes_inactive() {
        let store = store();
        let product = store.insert(&widget()).unwrap();
        assert_eq!(store.list_active().unwrap().len(), 1);

        store
            .update(
                &product.id,
                &ProductUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_partial_update_preserves_fields() {
        let store = store();
        let product = store.insert(&widget()).unwrap();
        store
            .update(
                &product.id,
                &ProductUpdate {
                    stock: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = store.get(&product.id).unwrap().unwrap();
        assert_eq!(updated.stock, 9);
        assert_eq!(updated.name, "Widget");
    }

    #[test]
    fn test_update_missing_row() {
        let store = store();
        assert!(matches!(
            store.update("nope", &ProductUpdate::default()),
            Err(StoreError::NotFound)
        ));
    }
}
