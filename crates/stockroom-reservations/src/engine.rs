//! # Reservation Engine
//!
//! All mutual exclusion lives in the store: `reserve_one` is a single
//! conditional insert whose `WHERE` subquery re-reads authoritative stock
//! within the same statement, and `reserve_batch` wraps the same insert in
//! one transaction per batch, so partial progress is never observable.

use crate::ReservationError;
use chrono::{Duration, Utc};
use shared_types::{Product, Reservation, ReservationStatus, UNLIMITED_STOCK};
use stockroom_store::{time, Database};
use tracing::debug;
use uuid::Uuid;

/// Conditional insert: succeeds only while the product is active and the
/// requested quantity fits inside `stock - held(pending + confirmed)`.
/// Unlimited products (`stock = -1`) always pass the availability arm.
const RESERVE_SQL: &str = "INSERT INTO reservations
     (id, product_id, quantity, provider_session_id, status, created)
 SELECT ?1, p.id, ?3, ?4, 'pending', ?5
 FROM products p
 WHERE p.id = ?2
   AND p.active = 1
   AND (p.stock = -1 OR ?3 <= p.stock - COALESCE((
        SELECT SUM(r.quantity) FROM reservations r
        WHERE r.product_id = p.id AND r.status IN ('pending', 'confirmed')), 0))";

/// One item of a checkout batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Product to reserve.
    pub product_id: String,
    /// SKU, reported back on failure.
    pub sku: String,
    /// Units requested. Must be positive.
    pub quantity: i64,
}

/// Outcome of [`ReservationEngine::reserve_batch`].
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every item reserved; ids in item order.
    Reserved(Vec<String>),
    /// The batch rolled back; `sku` names the first item that failed.
    Failed {
        /// SKU of the first failing item.
        sku: String,
    },
}

/// Internal abort reason threaded through the batch transaction.
enum BatchAbort {
    Sku(String),
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for BatchAbort {
    fn from(e: rusqlite::Error) -> Self {
        BatchAbort::Db(e)
    }
}

/// The engine. Cheap to clone; all state is in the store.
#[derive(Clone)]
pub struct ReservationEngine {
    db: Database,
}

impl ReservationEngine {
    /// Create an engine over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Reserve `quantity` units of one product for a provider session.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown or inactive product, `OutOfStock` when
    /// available stock is insufficient. Both are expected outcomes; only
    /// database faults are logged above debug.
    pub fn reserve_one(
        &self,
        product_id: &str,
        quantity: i64,
        session_id: &str,
    ) -> Result<String, ReservationError> {
        if quantity <= 0 {
            return Err(ReservationError::InvalidQuantity);
        }
        let id = Uuid::new_v4().to_string();
        let inserted = self.db.with(|c| {
            c.execute(
                RESERVE_SQL,
                rusqlite::params![id, product_id, quantity, session_id, time::now_iso()],
            )
        })?;
        if inserted == 1 {
            return Ok(id);
        }

        // The insert matched nothing: distinguish a dead product from an
        // oversell for the caller's error shape.
        let active: Option<bool> = self.db.with(|c| {
            use rusqlite::OptionalExtension;
            c.query_row(
                "SELECT active FROM products WHERE id = ?1",
                [product_id],
                |r| r.get::<_, i64>(0).map(|a| a != 0),
            )
            .optional()
        })?;
        match active {
            Some(true) => {
                debug!(product_id, quantity, "reservation rejected: insufficient stock");
                Err(ReservationError::OutOfStock)
            }
            _ => Err(ReservationError::NotFound),
        }
    }

    /// Reserve every item of a batch inside one transaction.
    ///
    /// Later items observe stock net of the batch's own earlier inserts.
    /// On the first failing item the transaction rolls back, leaving no
    /// row from this batch in any state, and the failing SKU is reported.
    ///
    /// # Errors
    ///
    /// Database faults roll the batch back and propagate; they are never
    /// reported as a failed SKU.
    pub fn reserve_batch(
        &self,
        items: &[BatchItem],
        session_id: &str,
    ) -> Result<BatchOutcome, ReservationError> {
        if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
            debug!(sku = %bad.sku, "batch rejected: non-positive quantity");
            return Err(ReservationError::InvalidQuantity);
        }

        let now = time::now_iso();
        let result: Result<Vec<String>, BatchAbort> = self.db.transaction(|tx| {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                let id = Uuid::new_v4().to_string();
                let inserted = tx.execute(
                    RESERVE_SQL,
                    rusqlite::params![id, item.product_id, item.quantity, session_id, now],
                )?;
                if inserted == 0 {
                    return Err(BatchAbort::Sku(item.sku.clone()));
                }
                ids.push(id);
            }
            Ok(ids)
        });

        match result {
            Ok(ids) => Ok(BatchOutcome::Reserved(ids)),
            Err(BatchAbort::Sku(sku)) => {
                debug!(%sku, session_id, "batch rolled back at first unavailable item");
                Ok(BatchOutcome::Failed { sku })
            }
            Err(BatchAbort::Db(e)) => Err(e.into()),
        }
    }

    /// Move every `pending` reservation for this session to `confirmed`.
    /// Returns the number of rows moved; already-confirmed rows are
    /// untouched and uncounted.
    pub fn confirm(&self, session_id: &str) -> Result<usize, ReservationError> {
        self.transition(session_id, ReservationStatus::Pending, ReservationStatus::Confirmed)
    }

    /// Move every `pending` reservation for this session to `expired`,
    /// releasing its units. Confirmed rows are untouched.
    pub fn expire(&self, session_id: &str) -> Result<usize, ReservationError> {
        self.transition(session_id, ReservationStatus::Pending, ReservationStatus::Expired)
    }

    /// Move every `confirmed` reservation for this session to `expired`
    /// (refund: the units return to stock). Pending rows are untouched;
    /// repeat calls return 0.
    pub fn restock_from_refund(&self, session_id: &str) -> Result<usize, ReservationError> {
        self.transition(session_id, ReservationStatus::Confirmed, ReservationStatus::Expired)
    }

    fn transition(
        &self,
        session_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<usize, ReservationError> {
        let changed = self.db.with(|c| {
            c.execute(
                "UPDATE reservations SET status = ?3
                 WHERE provider_session_id = ?1 AND status = ?2",
                rusqlite::params![session_id, from.as_str(), to.as_str()],
            )
        })?;
        Ok(changed)
    }

    /// Expire every `pending` reservation older than `age_threshold`.
    /// Returns the number of rows swept.
    pub fn sweep_stale(&self, age_threshold: Duration) -> Result<usize, ReservationError> {
        let cutoff = time::to_iso(Utc::now() - age_threshold);
        let swept = self.db.with(|c| {
            c.execute(
                "UPDATE reservations SET status = 'expired'
                 WHERE status = 'pending' AND created < ?1",
                [cutoff],
            )
        })?;
        if swept > 0 {
            debug!(swept, "stale pending reservations expired");
        }
        Ok(swept)
    }

    /// All reservations for a session, oldest first.
    pub fn list_by_session(&self, session_id: &str) -> Result<Vec<Reservation>, ReservationError> {
        self.db
            .with(|c| {
                let mut stmt = c.prepare(
                    "SELECT id, product_id, quantity, provider_session_id, status, created
                     FROM reservations WHERE provider_session_id = ?1 ORDER BY created, id",
                )?;
                let rows = stmt.query_map([session_id], row_to_reservation)?;
                rows.collect()
            })
            .map_err(Into::into)
    }

    /// Available stock for a product: `stock - held(pending + confirmed)`,
    /// clamped at zero. The unlimited sentinel passes through verbatim.
    pub fn available(&self, product: &Product) -> Result<i64, ReservationError> {
        if product.stock == UNLIMITED_STOCK {
            return Ok(UNLIMITED_STOCK);
        }
        let held: i64 = self.db.with(|c| {
            c.query_row(
                "SELECT COALESCE(SUM(quantity), 0) FROM reservations
                 WHERE product_id = ?1 AND status IN ('pending', 'confirmed')",
                [&product.id],
                |r| r.get(0),
            )
        })?;
        Ok((product.stock - held).max(0))
    }
}

fn row_to_reservation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: row.get(0)?,
        product_id: row.get(1)?,
        quantity: row.get(2)?,
        provider_session_id: row.get(3)?,
        status: ReservationStatus::parse(&row.get::<_, String>(4)?)
            .unwrap_or(ReservationStatus::Expired),
        created: time::from_iso(&row.get::<_, String>(5)?).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_store::{migrations, NewProduct, ProductStore};

    struct Fixture {
        engine: ReservationEngine,
        products: ProductStore,
        db: Database,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        migrations::migrate(&db).unwrap();
        Fixture {
            engine: ReservationEngine::new(db.clone()),
            products: ProductStore::new(db.clone()),
            db,
        }
    }

    fn product(f: &Fixture, sku: &str, stock: i64) -> Product {
        f.products
            .insert(&NewProduct {
                sku: sku.into(),
                name: format!("{sku} name"),
                unit_price: 1_000,
                stock,
                active: true,
            })
            .unwrap()
    }

    #[test]
    fn test_reserve_decrements_availability() {
        let f = fixture();
        let p = product(&f, "A", 5);

        f.engine.reserve_one(&p.id, 2, "cs_1").unwrap();
        assert_eq!(f.engine.available(&p).unwrap(), 3);
    }

    #[test]
    fn test_oversell_rejected() {
        let f = fixture();
        let p = product(&f, "A", 5);
        f.engine.reserve_one(&p.id, 4, "cs_1").unwrap();

        assert!(matches!(
            f.engine.reserve_one(&p.id, 2, "cs_2"),
            Err(ReservationError::OutOfStock)
        ));
        // The held units are intact.
        assert_eq!(f.engine.available(&p).unwrap(), 1);
    }

    #[test]
    fn test_unknown_and_inactive_products() {
        let f = fixture();
        assert!(matches!(
            f.engine.reserve_one("ghost", 1, "cs_1"),
            Err(ReservationError::NotFound)
        ));

        let p = product(&f, "A", 5);
        f.products
            .update(
                &p.id,
                &stockroom_store::ProductUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            f.engine.reserve_one(&p.id, 1, "cs_1"),
            Err(ReservationError::NotFound)
        ));
    }

    #[test]
    fn test_unlimited_stock_never_exhausts() {
        let f = fixture();
        let p = product(&f, "A", UNLIMITED_STOCK);

        f.engine.reserve_one(&p.id, 1_000_000, "cs_1").unwrap();
        assert_eq!(f.engine.available(&p).unwrap(), UNLIMITED_STOCK);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let f = fixture();
        let p = product(&f, "A", 5);
        assert!(matches!(
            f.engine.reserve_one(&p.id, 0, "cs_1"),
            Err(ReservationError::InvalidQuantity)
        ));
        assert!(matches!(
            f.engine.reserve_one(&p.id, -3, "cs_1"),
            Err(ReservationError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_concurrent_reservers_of_last_unit() {
        let f = fixture();
        let p = product(&f, "A", 1);

        let mut handles = Vec::new();
        for i in 0..4 {
            let engine = f.engine.clone();
            let product_id = p.id.clone();
            handles.push(std::thread::spawn(move || {
                engine.reserve_one(&product_id, 1, &format!("cs_{i}"))
            }));
        }
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let won = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(won, 1, "exactly one reserver may win the last unit");
        assert!(outcomes
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(ReservationError::OutOfStock))));
        assert_eq!(f.engine.available(&p).unwrap(), 0);
    }

    #[test]
    fn test_batch_reserves_in_order() {
        let f = fixture();
        let a = product(&f, "A", 5);
        let b = product(&f, "B", 5);

        let outcome = f
            .engine
            .reserve_batch(
                &[
                    BatchItem {
                        product_id: a.id.clone(),
                        sku: "A".into(),
                        quantity: 2,
                    },
                    BatchItem {
                        product_id: b.id.clone(),
                        sku: "B".into(),
                        quantity: 3,
                    },
                ],
                "cs_1",
            )
            .unwrap();

        let ids = match outcome {
            BatchOutcome::Reserved(ids) => ids,
            BatchOutcome::Failed { sku } => panic!("batch failed at {sku}"),
        };
        assert_eq!(ids.len(), 2);
        assert_eq!(f.engine.available(&a).unwrap(), 3);
        assert_eq!(f.engine.available(&b).unwrap(), 2);
    }

    #[test]
    fn test_batch_rolls_back_completely() {
        let f = fixture();
        let a = product(&f, "A", 5);
        let b = product(&f, "B", 1);

        let outcome = f
            .engine
            .reserve_batch(
                &[
                    BatchItem {
                        product_id: a.id.clone(),
                        sku: "A".into(),
                        quantity: 2,
                    },
                    BatchItem {
                        product_id: b.id.clone(),
                        sku: "B".into(),
                        quantity: 2,
                    },
                ],
                "cs_1",
            )
            .unwrap();

        assert!(matches!(outcome, BatchOutcome::Failed { ref sku } if sku == "B"));

        // No partial progress is observable.
        let rows: i64 = f
            .db
            .with(|c| c.query_row("SELECT COUNT(*) FROM reservations", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(f.engine.available(&a).unwrap(), 5);
    }

    #[test]
    fn test_batch_observes_its_own_inserts() {
        let f = fixture();
        let p = product(&f, "A", 3);

        let item = |qty| BatchItem {
            product_id: p.id.clone(),
            sku: "A".into(),
            quantity: qty,
        };

        // 2 + 2 exceeds stock 3 even though each alone fits.
        let outcome = f.engine.reserve_batch(&[item(2), item(2)], "cs_1").unwrap();
        assert!(matches!(outcome, BatchOutcome::Failed { .. }));

        // 2 + 1 fits exactly.
        let outcome = f.engine.reserve_batch(&[item(2), item(1)], "cs_2").unwrap();
        assert!(matches!(outcome, BatchOutcome::Reserved(_)));
        assert_eq!(f.engine.available(&p).unwrap(), 0);
    }

    #[test]
    fn test_confirm_counts_only_pending() {
        let f = fixture();
        let p = product(&f, "A", 5);
        f.engine.reserve_one(&p.id, 1, "cs_1").unwrap();
        f.engine.reserve_one(&p.id, 1, "cs_1").unwrap();

        assert_eq!(f.engine.confirm("cs_1").unwrap(), 2);
        // Replay: nothing pending remains.
        assert_eq!(f.engine.confirm("cs_1").unwrap(), 0);

        // Confirmed rows still hold stock.
        assert_eq!(f.engine.available(&p).unwrap(), 3);
    }

    #[test]
    fn test_expire_releases_stock_and_spares_confirmed() {
        let f = fixture();
        let p = product(&f, "A", 5);
        f.engine.reserve_one(&p.id, 2, "cs_1").unwrap();
        f.engine.confirm("cs_1").unwrap();
        f.engine.reserve_one(&p.id, 1, "cs_1").unwrap();

        // Only the new pending row expires.
        assert_eq!(f.engine.expire("cs_1").unwrap(), 1);
        assert_eq!(f.engine.available(&p).unwrap(), 3);

        let statuses: Vec<_> = f
            .engine
            .list_by_session("cs_1")
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert!(statuses.contains(&ReservationStatus::Confirmed));
        assert!(statuses.contains(&ReservationStatus::Expired));
    }

    #[test]
    fn test_refund_restock_is_idempotent() {
        let f = fixture();
        let p = product(&f, "A", 10);
        f.engine.reserve_one(&p.id, 3, "cs_1").unwrap();
        f.engine.confirm("cs_1").unwrap();
        assert_eq!(f.engine.available(&p).unwrap(), 7);

        assert_eq!(f.engine.restock_from_refund("cs_1").unwrap(), 1);
        assert_eq!(f.engine.available(&p).unwrap(), 10);

        // Second refund is a no-op with identical end state.
        assert_eq!(f.engine.restock_from_refund("cs_1").unwrap(), 0);
        assert_eq!(f.engine.available(&p).unwrap(), 10);
    }

    #[test]
    fn test_refund_spares_pending() {
        let f = fixture();
        let p = product(&f, "A", 10);
        f.engine.reserve_one(&p.id, 3, "cs_1").unwrap();

        assert_eq!(f.engine.restock_from_refund("cs_1").unwrap(), 0);
        let rows = f.engine.list_by_session("cs_1").unwrap();
        assert_eq!(rows[0].status, ReservationStatus::Pending);
    }

    #[test]
    fn test_sweep_stale_expires_only_old_pending() {
        let f = fixture();
        let p = product(&f, "A", 10);
        f.engine.reserve_one(&p.id, 1, "cs_new").unwrap();
        f.engine.reserve_one(&p.id, 1, "cs_old").unwrap();
        f.engine.reserve_one(&p.id, 1, "cs_done").unwrap();
        f.engine.confirm("cs_done").unwrap();

        // Age two of the rows past the threshold.
        let old = time::to_iso(Utc::now() - Duration::hours(2));
        f.db
            .with(|c| {
                c.execute(
                    "UPDATE reservations SET created = ?1
                     WHERE provider_session_id IN ('cs_old', 'cs_done')",
                    [&old],
                )
            })
            .unwrap();

        assert_eq!(f.engine.sweep_stale(Duration::hours(1)).unwrap(), 1);
        assert_eq!(
            f.engine.list_by_session("cs_old").unwrap()[0].status,
            ReservationStatus::Expired
        );
        // Fresh pending and old confirmed rows are untouched.
        assert_eq!(
            f.engine.list_by_session("cs_new").unwrap()[0].status,
            ReservationStatus::Pending
        );
        assert_eq!(
            f.engine.list_by_session("cs_done").unwrap()[0].status,
            ReservationStatus::Confirmed
        );
    }

    #[test]
    fn test_available_clamps_at_zero() {
        let f = fixture();
        let p = product(&f, "A", 3);
        f.engine.reserve_one(&p.id, 3, "cs_1").unwrap();

        // Shrink stock below what is already held.
        f.products
            .update(
                &p.id,
                &stockroom_store::ProductUpdate {
                    stock: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        let p = f.products.get(&p.id).unwrap().unwrap();
        assert_eq!(f.engine.available(&p).unwrap(), 0);
    }
}
