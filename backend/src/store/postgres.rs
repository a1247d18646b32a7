//! PostgreSQL entity store
//!
//! Enumerations are stored as TEXT and parsed back through `FromStr`. Stock
//! credits and debits are single statements so the quantity check and the
//! write can never be split by another transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    ActionSummary, DraftPurchaseOrder, HistoryFilter, LocatedStock, Pagination, Product,
    ProductFilter, PurchaseOrderFilter, ReorderSuggestion, Shipment, ShipmentFilter,
    StockHistory, StockLocation, StorageLocation, SuggestionStatus, Warehouse, WarehouseStockRow,
};
use sqlx::{postgres::Postgres, FromRow, PgPool, Transaction};
use uuid::Uuid;

use super::{Debit, LedgerStore, StoreTx};
use crate::error::{AppError, AppResult};

/// Entity store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
    statement_timeout_ms: u64,
}

impl PgLedgerStore {
    pub fn new(db: PgPool, statement_timeout_ms: u64) -> Self {
        Self { db, statement_timeout_ms }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let mut tx = self.db.begin().await?;
        // SET LOCAL does not accept bind parameters
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    sku: String,
    category: String,
    price: Decimal,
    total_quantity: i64,
    unassigned_quantity: i64,
    reorder_threshold: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> AppResult<Self> {
        Ok(Product {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            sku: row.sku,
            category: row.category,
            price: row.price,
            total_quantity: row.total_quantity,
            unassigned_quantity: row.unassigned_quantity,
            reorder_threshold: row.reorder_threshold,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    address: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    owner_id: Uuid,
    warehouse_id: Uuid,
    rack: String,
    bin: String,
    zone: String,
    capacity: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<LocationRow> for StorageLocation {
    fn from(row: LocationRow) -> Self {
        StorageLocation {
            id: row.id,
            owner_id: row.owner_id,
            warehouse_id: row.warehouse_id,
            rack: row.rack,
            bin: row.bin,
            zone: row.zone,
            capacity: row.capacity,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    owner_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockLocation {
    fn from(row: StockRow) -> Self {
        StockLocation {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            location_id: row.location_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    owner_id: Uuid,
    product_id: Uuid,
    from_location_id: Option<Uuid>,
    to_location_id: Option<Uuid>,
    quantity: i64,
    action: String,
    user_id: Uuid,
    reference: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StockHistory {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> AppResult<Self> {
        Ok(StockHistory {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            from_location_id: row.from_location_id,
            to_location_id: row.to_location_id,
            quantity: row.quantity,
            action: row.action.parse()?,
            user_id: row.user_id,
            reference: row.reference,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SuggestionRow {
    id: Uuid,
    owner_id: Uuid,
    product_id: Uuid,
    suggested_quantity: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SuggestionRow> for ReorderSuggestion {
    type Error = AppError;

    fn try_from(row: SuggestionRow) -> AppResult<Self> {
        Ok(ReorderSuggestion {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            suggested_quantity: row.suggested_quantity,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    owner_id: Uuid,
    suggestion_id: Uuid,
    product_id: Uuid,
    approved_quantity: i64,
    supplier: Option<String>,
    estimated_cost: Option<Decimal>,
    status: String,
    created_by: Uuid,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for DraftPurchaseOrder {
    type Error = AppError;

    fn try_from(row: PurchaseOrderRow) -> AppResult<Self> {
        Ok(DraftPurchaseOrder {
            id: row.id,
            owner_id: row.owner_id,
            suggestion_id: row.suggestion_id,
            product_id: row.product_id,
            approved_quantity: row.approved_quantity,
            supplier: row.supplier,
            estimated_cost: row.estimated_cost,
            status: row.status.parse()?,
            created_by: row.created_by,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    owner_id: Uuid,
    shipment_type: String,
    product_id: Uuid,
    quantity: i64,
    status: String,
    handled_by: Uuid,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = AppError;

    fn try_from(row: ShipmentRow) -> AppResult<Self> {
        Ok(Shipment {
            id: row.id,
            owner_id: row.owner_id,
            shipment_type: row.shipment_type.parse()?,
            product_id: row.product_id,
            quantity: row.quantity,
            status: row.status.parse()?,
            handled_by: row.handled_by,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn like_pattern(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", q.replace('%', "\\%").replace('_', "\\_")))
}

const PRODUCT_COLUMNS: &str = "id, owner_id, name, sku, category, price, total_quantity, \
     unassigned_quantity, reorder_threshold, status, created_at, updated_at";

const SUGGESTION_COLUMNS: &str =
    "id, owner_id, product_id, suggested_quantity, status, created_at, updated_at";

const PURCHASE_ORDER_COLUMNS: &str = "id, owner_id, suggestion_id, product_id, approved_quantity, \
     supplier, estimated_cost, status, created_by, approved_by, approved_at, notes, \
     created_at, updated_at";

const SHIPMENT_COLUMNS: &str = "id, owner_id, shipment_type, product_id, quantity, status, \
     handled_by, notes, created_at, updated_at";

// ============================================================================
// Transaction
// ============================================================================

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_id, name, sku, category, price, total_quantity,
                unassigned_quantity, reorder_threshold, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(product.id)
        .bind(product.owner_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.total_quantity)
        .bind(product.unassigned_quantity)
        .bind(product.reorder_threshold)
        .bind(product.status.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND owner_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn lock_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $3, sku = $4, category = $5, price = $6, total_quantity = $7,
                unassigned_quantity = $8, reorder_threshold = $9, status = $10, updated_at = $11
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(product.id)
        .bind(product.owner_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.total_quantity)
        .bind(product.unassigned_quantity)
        .bind(product.reorder_threshold)
        .bind(product.status.as_str())
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Product"));
        }
        Ok(())
    }

    async fn list_products(
        &mut self,
        owner_id: Uuid,
        filter: &ProductFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let pattern = like_pattern(filter.query.as_deref());
        let predicate = r#"
            owner_id = $1 AND status = 'Active'
            AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2 OR category ILIKE $2)
            AND (NOT $3 OR total_quantity <= reorder_threshold)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products WHERE {}",
            predicate
        ))
        .bind(owner_id)
        .bind(&pattern)
        .bind(filter.low_stock)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE {} ORDER BY name LIMIT $4 OFFSET $5",
            PRODUCT_COLUMNS, predicate
        ))
        .bind(owner_id)
        .bind(&pattern)
        .bind(filter.low_stock)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((convert_all(rows)?, total as u64))
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, owner_id, name, address, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(warehouse.id)
        .bind(warehouse.owner_id)
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            SELECT id, owner_id, name, address, is_active, created_at, updated_at
            FROM warehouses
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Warehouse::from))
    }

    async fn update_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses
            SET name = $3, address = $4, is_active = $5, updated_at = $6
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(warehouse.id)
        .bind(warehouse.owner_id)
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(warehouse.is_active)
        .bind(warehouse.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Warehouse"));
        }
        Ok(())
    }

    async fn list_warehouses(
        &mut self,
        owner_id: Uuid,
        query: Option<&str>,
        page: &Pagination,
    ) -> AppResult<(Vec<Warehouse>, u64)> {
        let pattern = like_pattern(query);

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM warehouses
            WHERE owner_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR address ILIKE $2)
            "#,
        )
        .bind(owner_id)
        .bind(&pattern)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, WarehouseRow>(
            r#"
            SELECT id, owner_id, name, address, is_active, created_at, updated_at
            FROM warehouses
            WHERE owner_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR address ILIKE $2)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner_id)
        .bind(&pattern)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((rows.into_iter().map(Warehouse::from).collect(), total as u64))
    }

    async fn delete_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        // storage_locations and stock_locations cascade
        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_location(&mut self, location: &StorageLocation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO storage_locations (
                id, owner_id, warehouse_id, rack, bin, zone, capacity, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(location.id)
        .bind(location.owner_id)
        .bind(location.warehouse_id)
        .bind(&location.rack)
        .bind(&location.bin)
        .bind(&location.zone)
        .bind(location.capacity)
        .bind(location.is_active)
        .bind(location.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, owner_id, warehouse_id, rack, bin, zone, capacity, is_active, created_at
            FROM storage_locations
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(StorageLocation::from))
    }

    async fn list_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<StorageLocation>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, owner_id, warehouse_id, rack, bin, zone, capacity, is_active, created_at
            FROM storage_locations
            WHERE owner_id = $1 AND warehouse_id = $2
            ORDER BY rack, bin
            "#,
        )
        .bind(owner_id)
        .bind(warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(StorageLocation::from).collect())
    }

    async fn lock_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>> {
        // New stock rows take FOR KEY SHARE on their location and wait here
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, owner_id, warehouse_id, rack, bin, zone, capacity, is_active, created_at
            FROM storage_locations
            WHERE id = $1 AND owner_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(StorageLocation::from))
    }

    async fn lock_warehouse_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM storage_locations
            WHERE owner_id = $1 AND warehouse_id = $2
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .bind(warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn delete_location(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM storage_locations WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<StockLocation>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, owner_id, product_id, location_id, quantity, created_at, updated_at
            FROM stock_locations
            WHERE owner_id = $1 AND product_id = $2 AND location_id = $3
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(StockLocation::from))
    }

    async fn credit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let new_quantity = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stock_locations (
                id, owner_id, product_id, location_id, quantity, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (product_id, location_id) DO UPDATE
            SET quantity = stock_locations.quantity + EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            RETURNING quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(new_quantity)
    }

    async fn debit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Debit> {
        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE stock_locations
            SET quantity = quantity - $4, updated_at = $5
            WHERE owner_id = $1 AND product_id = $2 AND location_id = $3 AND quantity >= $4
            RETURNING quantity
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;

        match remaining {
            Some(0) => {
                sqlx::query(
                    "DELETE FROM stock_locations WHERE product_id = $1 AND location_id = $2 AND quantity = 0",
                )
                .bind(product_id)
                .bind(location_id)
                .execute(&mut *self.tx)
                .await?;
                Ok(Debit::Applied { remaining: 0 })
            }
            Some(remaining) => Ok(Debit::Applied { remaining }),
            None => {
                let available = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT quantity FROM stock_locations
                    WHERE owner_id = $1 AND product_id = $2 AND location_id = $3
                    "#,
                )
                .bind(owner_id)
                .bind(product_id)
                .bind(location_id)
                .fetch_optional(&mut *self.tx)
                .await?;
                Ok(match available {
                    Some(available) => Debit::Insufficient { available },
                    None => Debit::Missing,
                })
            }
        }
    }

    async fn list_product_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockLocation>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, owner_id, product_id, location_id, quantity, created_at, updated_at
            FROM stock_locations
            WHERE owner_id = $1 AND product_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(StockLocation::from).collect())
    }

    async fn sum_product_stock(&mut self, owner_id: Uuid, product_id: Uuid) -> AppResult<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM stock_locations
            WHERE owner_id = $1 AND product_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(sum)
    }

    async fn located_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<LocatedStock>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, i64)>(
            r#"
            SELECT l.id, l.warehouse_id, l.rack, l.bin, s.quantity
            FROM stock_locations s
            JOIN storage_locations l ON l.id = s.location_id
            WHERE s.owner_id = $1 AND s.product_id = $2
            ORDER BY s.created_at, s.id
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(location_id, warehouse_id, rack, bin, quantity)| LocatedStock {
                location_id,
                warehouse_id,
                rack,
                bin,
                quantity,
            })
            .collect())
    }

    async fn list_location_stock(
        &mut self,
        owner_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Vec<StockLocation>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, owner_id, product_id, location_id, quantity, created_at, updated_at
            FROM stock_locations
            WHERE owner_id = $1 AND location_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(owner_id)
        .bind(location_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(StockLocation::from).collect())
    }

    async fn products_in_warehouse(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT s.product_id
            FROM stock_locations s
            JOIN storage_locations l ON l.id = s.location_id
            WHERE s.owner_id = $1 AND l.warehouse_id = $2
            ORDER BY s.product_id
            "#,
        )
        .bind(owner_id)
        .bind(warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn warehouse_stock_rows(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<WarehouseStockRow>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, Uuid, String, String, i64)>(
            r#"
            SELECT p.id, p.name, p.sku, l.id, l.rack, l.bin, s.quantity
            FROM stock_locations s
            JOIN storage_locations l ON l.id = s.location_id
            JOIN products p ON p.id = s.product_id
            WHERE s.owner_id = $1 AND l.warehouse_id = $2
            ORDER BY p.name, l.rack, l.bin
            "#,
        )
        .bind(owner_id)
        .bind(warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(product_id, product_name, product_sku, location_id, rack, bin, quantity)| {
                    WarehouseStockRow {
                        product_id,
                        product_name,
                        product_sku,
                        location_id,
                        rack,
                        bin,
                        quantity,
                    }
                },
            )
            .collect())
    }

    async fn insert_history(&mut self, entry: &StockHistory) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_history (
                id, owner_id, product_id, from_location_id, to_location_id, quantity,
                action, user_id, reference, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(entry.product_id)
        .bind(entry.from_location_id)
        .bind(entry.to_location_id)
        .bind(entry.quantity)
        .bind(entry.action.as_str())
        .bind(entry.user_id)
        .bind(&entry.reference)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_history(
        &mut self,
        owner_id: Uuid,
        filter: &HistoryFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<StockHistory>, u64)> {
        let predicate = r#"
            owner_id = $1
            AND ($2::uuid IS NULL OR product_id = $2)
            AND ($3::text IS NULL OR action = $3)
            AND ($4::uuid IS NULL OR user_id = $4)
            AND ($5::timestamptz IS NULL OR created_at >= $5)
            AND ($6::timestamptz IS NULL OR created_at <= $6)
        "#;
        let action = filter.action.map(|a| a.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM stock_history WHERE {}",
            predicate
        ))
        .bind(owner_id)
        .bind(filter.product_id)
        .bind(action)
        .bind(filter.user_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            r#"
            SELECT id, owner_id, product_id, from_location_id, to_location_id, quantity,
                   action, user_id, reference, metadata, created_at
            FROM stock_history
            WHERE {}
            ORDER BY created_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#,
            predicate
        ))
        .bind(owner_id)
        .bind(filter.product_id)
        .bind(action)
        .bind(filter.user_id)
        .bind(filter.start)
        .bind(filter.end)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((convert_all(rows)?, total as u64))
    }

    async fn history_summary(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<ActionSummary>> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT action, COALESCE(SUM(quantity), 0)::BIGINT, COUNT(*)
            FROM stock_history
            WHERE owner_id = $1 AND product_id = $2
            GROUP BY action
            ORDER BY action
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|(action, total_quantity, count)| -> AppResult<ActionSummary> {
                Ok(ActionSummary {
                    action: action.parse()?,
                    total_quantity,
                    count,
                })
            })
            .collect()
    }

    async fn find_pending_suggestion(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>> {
        let row = sqlx::query_as::<_, SuggestionRow>(&format!(
            "SELECT {} FROM reorder_suggestions \
             WHERE owner_id = $1 AND product_id = $2 AND status = 'Pending'",
            SUGGESTION_COLUMNS
        ))
        .bind(owner_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(ReorderSuggestion::try_from).transpose()
    }

    async fn insert_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reorder_suggestions (
                id, owner_id, product_id, suggested_quantity, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(suggestion.id)
        .bind(suggestion.owner_id)
        .bind(suggestion.product_id)
        .bind(suggestion.suggested_quantity)
        .bind(suggestion.status.as_str())
        .bind(suggestion.created_at)
        .bind(suggestion.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn resolve_pending_suggestions(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reorder_suggestions
            SET status = 'Resolved', updated_at = $3
            WHERE owner_id = $1 AND product_id = $2 AND status = 'Pending'
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn lock_suggestion(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>> {
        let row = sqlx::query_as::<_, SuggestionRow>(&format!(
            "SELECT {} FROM reorder_suggestions WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            SUGGESTION_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(ReorderSuggestion::try_from).transpose()
    }

    async fn update_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE reorder_suggestions
            SET suggested_quantity = $3, status = $4, updated_at = $5
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(suggestion.id)
        .bind(suggestion.owner_id)
        .bind(suggestion.suggested_quantity)
        .bind(suggestion.status.as_str())
        .bind(suggestion.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Reorder suggestion"));
        }
        Ok(())
    }

    async fn list_suggestions(
        &mut self,
        owner_id: Uuid,
        status: Option<SuggestionStatus>,
        page: &Pagination,
    ) -> AppResult<(Vec<ReorderSuggestion>, u64)> {
        let status = status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reorder_suggestions WHERE owner_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(owner_id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, SuggestionRow>(&format!(
            "SELECT {} FROM reorder_suggestions \
             WHERE owner_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            SUGGESTION_COLUMNS
        ))
        .bind(owner_id)
        .bind(status)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((convert_all(rows)?, total as u64))
    }

    async fn insert_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, owner_id, suggestion_id, product_id, approved_quantity, supplier,
                estimated_cost, status, created_by, approved_by, approved_at, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id)
        .bind(order.owner_id)
        .bind(order.suggestion_id)
        .bind(order.product_id)
        .bind(order.approved_quantity)
        .bind(&order.supplier)
        .bind(order.estimated_cost)
        .bind(order.status.as_str())
        .bind(order.created_by)
        .bind(order.approved_by)
        .bind(order.approved_at)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 AND owner_id = $2",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(DraftPurchaseOrder::try_from).transpose()
    }

    async fn lock_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(DraftPurchaseOrder::try_from).transpose()
    }

    async fn find_open_purchase_order(
        &mut self,
        owner_id: Uuid,
        suggestion_id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders \
             WHERE owner_id = $1 AND suggestion_id = $2 \
             AND status IN ('Draft', 'Pending_Approval')",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(owner_id)
        .bind(suggestion_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(DraftPurchaseOrder::try_from).transpose()
    }

    async fn update_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET approved_quantity = $3, supplier = $4, estimated_cost = $5, status = $6,
                approved_by = $7, approved_at = $8, notes = $9, updated_at = $10
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(order.id)
        .bind(order.owner_id)
        .bind(order.approved_quantity)
        .bind(&order.supplier)
        .bind(order.estimated_cost)
        .bind(order.status.as_str())
        .bind(order.approved_by)
        .bind(order.approved_at)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Purchase order"));
        }
        Ok(())
    }

    async fn list_purchase_orders(
        &mut self,
        owner_id: Uuid,
        filter: &PurchaseOrderFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<DraftPurchaseOrder>, u64)> {
        let predicate = r#"
            owner_id = $1
            AND ($2::text IS NULL OR status = $2)
            AND ($3::uuid IS NULL OR suggestion_id = $3)
        "#;
        let status = filter.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM purchase_orders WHERE {}",
            predicate
        ))
        .bind(owner_id)
        .bind(status)
        .bind(filter.suggestion_id)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5",
            PURCHASE_ORDER_COLUMNS, predicate
        ))
        .bind(owner_id)
        .bind(status)
        .bind(filter.suggestion_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((convert_all(rows)?, total as u64))
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shipments (
                id, owner_id, shipment_type, product_id, quantity, status,
                handled_by, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.owner_id)
        .bind(shipment.shipment_type.as_str())
        .bind(shipment.product_id)
        .bind(shipment.quantity)
        .bind(shipment.status.as_str())
        .bind(shipment.handled_by)
        .bind(&shipment.notes)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE id = $1 AND owner_id = $2",
            SHIPMENT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Shipment::try_from).transpose()
    }

    async fn lock_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            SHIPMENT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Shipment::try_from).transpose()
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $3, handled_by = $4, notes = $5, updated_at = $6
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.owner_id)
        .bind(shipment.status.as_str())
        .bind(shipment.handled_by)
        .bind(&shipment.notes)
        .bind(shipment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Shipment"));
        }
        Ok(())
    }

    async fn delete_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shipments WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_shipments(
        &mut self,
        owner_id: Uuid,
        filter: &ShipmentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Shipment>, u64)> {
        let shipment_type = filter.shipment_type.map(|t| t.as_str());
        let predicate = r#"
            owner_id = $1
            AND ($2::text IS NULL OR shipment_type = $2)
            AND ($3::uuid IS NULL OR product_id = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM shipments WHERE {}",
            predicate
        ))
        .bind(owner_id)
        .bind(shipment_type)
        .bind(filter.product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE {} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5",
            SHIPMENT_COLUMNS, predicate
        ))
        .bind(owner_id)
        .bind(shipment_type)
        .bind(filter.product_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((convert_all(rows)?, total as u64))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
