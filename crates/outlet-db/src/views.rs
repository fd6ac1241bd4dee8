//! # Read-Only Store Views
//!
//! Every entity is exposed once per store, bound to that store's database,
//! with a fixed column list and no write permissions.
//!
//! ## View Matrix
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      store1 (Do‘kon 1)      store2 (Do‘kon 2)          │
//! │  category            Kategoriya (Do‘kon 1)  Kategoriya (Do‘kon 2)      │
//! │  product             Mahsulot (Do‘kon 1)    Mahsulot (Do‘kon 2)        │
//! │  productbatch        ...                    ...                        │
//! │  sale                                                                   │
//! │  saleitem                                                               │
//! │  returnsale                                                             │
//! │  returnitem                                                             │
//! │                                                                         │
//! │  add = change = delete = false for every cell                          │
//! │  list(page, per_page) / detail(id) issue SELECTs only                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Foreign-key columns show the related row's display string
//! (`Non - 4780001`, `Savdo #S-20260114-9F1C2A7B - 44.80 so'm`). Choice
//! columns show their label (`Naqd`), money columns show `12.50`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::stores::StoreInfo;
use outlet_core::{PaymentMethod, SaleStatus, Unit};

/// Largest page a list call will return.
pub const MAX_PER_PAGE: u32 = 500;

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminEntity {
    Category,
    Product,
    ProductBatch,
    Sale,
    SaleItem,
    ReturnSale,
    ReturnItem,
}

impl AdminEntity {
    pub const ALL: [AdminEntity; 7] = [
        AdminEntity::Category,
        AdminEntity::Product,
        AdminEntity::ProductBatch,
        AdminEntity::Sale,
        AdminEntity::SaleItem,
        AdminEntity::ReturnSale,
        AdminEntity::ReturnItem,
    ];

    /// URL segment.
    pub fn slug(&self) -> &'static str {
        match self {
            AdminEntity::Category => "category",
            AdminEntity::Product => "product",
            AdminEntity::ProductBatch => "productbatch",
            AdminEntity::Sale => "sale",
            AdminEntity::SaleItem => "saleitem",
            AdminEntity::ReturnSale => "returnsale",
            AdminEntity::ReturnItem => "returnitem",
        }
    }

    pub fn verbose_name(&self) -> &'static str {
        match self {
            AdminEntity::Category => "Kategoriya",
            AdminEntity::Product => "Mahsulot",
            AdminEntity::ProductBatch => "Mahsulot partiyasi",
            AdminEntity::Sale => "Savdo",
            AdminEntity::SaleItem => "Savdo elementi",
            AdminEntity::ReturnSale => "Qaytarish",
            AdminEntity::ReturnItem => "Qaytarish elementi",
        }
    }

    pub fn verbose_name_plural(&self) -> &'static str {
        match self {
            AdminEntity::Category => "Kategoriyalar",
            AdminEntity::Product => "Mahsulotlar",
            AdminEntity::ProductBatch => "Mahsulot partiyalari",
            AdminEntity::Sale => "Savdolar",
            AdminEntity::SaleItem => "Savdo elementlari",
            AdminEntity::ReturnSale => "Qaytarishlar",
            AdminEntity::ReturnItem => "Qaytarish elementlari",
        }
    }

    /// List display columns, in display order.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            AdminEntity::Category => CATEGORY_COLUMNS,
            AdminEntity::Product => PRODUCT_COLUMNS,
            AdminEntity::ProductBatch => BATCH_COLUMNS,
            AdminEntity::Sale => SALE_COLUMNS,
            AdminEntity::SaleItem => SALE_ITEM_COLUMNS,
            AdminEntity::ReturnSale => RETURN_SALE_COLUMNS,
            AdminEntity::ReturnItem => RETURN_ITEM_COLUMNS,
        }
    }

    /// FROM clause; the entity's own table is always aliased `t`.
    fn from_clause(&self) -> &'static str {
        match self {
            AdminEntity::Category => "categories t",
            AdminEntity::Product => "products t LEFT JOIN categories c ON c.id = t.category_id",
            AdminEntity::ProductBatch => "product_batches t LEFT JOIN products p ON p.id = t.product_id",
            AdminEntity::Sale => "sales t LEFT JOIN users u ON u.id = t.cashier_id",
            AdminEntity::SaleItem => {
                "sale_items t \
                 LEFT JOIN sales s ON s.id = t.sale_id \
                 LEFT JOIN products p ON p.id = t.product_id \
                 LEFT JOIN product_batches b ON b.id = t.batch_id"
            }
            AdminEntity::ReturnSale => {
                "return_sales t \
                 LEFT JOIN sales s ON s.id = t.original_sale_id \
                 LEFT JOIN users u ON u.id = t.cashier_id"
            }
            AdminEntity::ReturnItem => {
                "return_items t \
                 LEFT JOIN return_sales r ON r.id = t.return_sale_id \
                 LEFT JOIN sale_items si ON si.id = t.sale_item_id \
                 LEFT JOIN products p ON p.id = si.product_id \
                 LEFT JOIN product_batches b ON b.id = si.batch_id"
            }
        }
    }

    fn ordering(&self) -> &'static str {
        match self {
            AdminEntity::Product | AdminEntity::Sale | AdminEntity::ReturnSale => {
                "t.created_at DESC, t.id DESC"
            }
            // FIFO
            AdminEntity::ProductBatch => "t.arrival_date, t.created_at, t.id",
            AdminEntity::Category | AdminEntity::SaleItem | AdminEntity::ReturnItem => "t.id DESC",
        }
    }

    fn select_list(&self) -> String {
        self.columns()
            .iter()
            .map(|c| format!("{} AS {}", c.source.sql(), c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AdminEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AdminEntity {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminEntity::ALL
            .into_iter()
            .find(|e| e.slug() == s)
            .ok_or_else(|| DbError::not_found("Entity", s))
    }
}

// =============================================================================
// Columns
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Text,
    Money,
    Date,
    DateTime,
    Choice,
    /// Display string of a related row.
    ForeignKey,
}

/// Where a column's value comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Field(&'static str),
    Money(&'static str),
    Choice(&'static str, fn() -> Vec<(&'static str, &'static str)>),
    Related(&'static str),
}

impl Source {
    fn sql(&self) -> String {
        match self {
            Source::Field(expr) | Source::Related(expr) => (*expr).to_string(),
            Source::Money(column) => money_sql(column),
            Source::Choice(column, choices) => {
                let arms: String = choices()
                    .into_iter()
                    .map(|(code, label)| format!(" WHEN '{}' THEN '{}'", quote(code), quote(label)))
                    .collect();
                format!("CASE {}{} ELSE {} END", column, arms, column)
            }
        }
    }
}

/// One list display column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ColumnKind,
    source: Source,
}

impl Column {
    const fn new(name: &'static str, label: &'static str, kind: ColumnKind, source: Source) -> Self {
        Column {
            name,
            label,
            kind,
            source,
        }
    }

    const fn id() -> Self {
        Column::new("id", "ID", ColumnKind::Integer, Source::Field("t.id"))
    }
}

/// Column header as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    pub label: String,
    pub kind: ColumnKind,
}

impl From<&Column> for ColumnHeader {
    fn from(c: &Column) -> Self {
        ColumnHeader {
            name: c.name.to_string(),
            label: c.label.to_string(),
            kind: c.kind,
        }
    }
}

fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// SQL rendering of a cents column as `12.50` / `-5.50`.
fn money_sql(column: &str) -> String {
    format!(
        "(CASE WHEN {c} < 0 THEN '-' ELSE '' END || (abs({c}) / 100) || '.' || printf('%02d', abs({c}) % 100))",
        c = column
    )
}

fn unit_choices() -> Vec<(&'static str, &'static str)> {
    Unit::ALL.iter().map(|u| (u.code(), u.label())).collect()
}

fn payment_choices() -> Vec<(&'static str, &'static str)> {
    PaymentMethod::ALL.iter().map(|m| (m.code(), m.label())).collect()
}

fn status_choices() -> Vec<(&'static str, &'static str)> {
    SaleStatus::ALL.iter().map(|s| (s.code(), s.label())).collect()
}

const SALE_DISPLAY: &str =
    "'Savdo #' || s.sale_number || ' - ' || (s.total_amount_cents / 100) || '.' || printf('%02d', s.total_amount_cents % 100) || ' so''m'";

const PRODUCT_DISPLAY: &str = "p.name || ' - ' || p.barcode";

static CATEGORY_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("name", "Kategoriya nomi", ColumnKind::Text, Source::Field("t.name")),
    Column::new("created_at", "Created at", ColumnKind::DateTime, Source::Field("t.created_at")),
];

static PRODUCT_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("name", "Mahsulot nomi", ColumnKind::Text, Source::Field("t.name")),
    Column::new("barcode", "Shtrix kod", ColumnKind::Text, Source::Field("t.barcode")),
    Column::new("category", "Kategoriya", ColumnKind::ForeignKey, Source::Related("c.name")),
    Column::new("unit", "O'lchov birligi", ColumnKind::Choice, Source::Choice("t.unit", unit_choices)),
    Column::new("created_at", "Created at", ColumnKind::DateTime, Source::Field("t.created_at")),
];

static BATCH_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("product", "Mahsulot", ColumnKind::ForeignKey, Source::Related(PRODUCT_DISPLAY)),
    Column::new("batch_number", "Partiya raqami", ColumnKind::Text, Source::Field("t.batch_number")),
    Column::new("purchase_price", "Sotib olish narxi", ColumnKind::Money, Source::Money("t.purchase_price_cents")),
    Column::new("selling_price", "Sotuv narxi", ColumnKind::Money, Source::Money("t.selling_price_cents")),
    Column::new("initial_quantity", "Boshlang'ich miqdor", ColumnKind::Integer, Source::Field("t.initial_quantity")),
    Column::new("remaining_quantity", "Qolgan miqdor", ColumnKind::Integer, Source::Field("t.remaining_quantity")),
    Column::new("arrival_date", "Kelgan sana", ColumnKind::Date, Source::Field("t.arrival_date")),
    Column::new("expiry_date", "Yaroqlilik muddati", ColumnKind::Date, Source::Field("t.expiry_date")),
];

static SALE_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("sale_number", "Savdo raqami", ColumnKind::Text, Source::Field("t.sale_number")),
    Column::new("cashier", "Kassir", ColumnKind::ForeignKey, Source::Related("u.username")),
    Column::new("total_amount", "Umumiy summa", ColumnKind::Money, Source::Money("t.total_amount_cents")),
    Column::new("payment_method", "To'lov usuli", ColumnKind::Choice, Source::Choice("t.payment_method", payment_choices)),
    Column::new("status", "Holati", ColumnKind::Choice, Source::Choice("t.status", status_choices)),
    Column::new("created_at", "Yaratilgan vaqt", ColumnKind::DateTime, Source::Field("t.created_at")),
];

static SALE_ITEM_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("sale", "Savdo", ColumnKind::ForeignKey, Source::Related(SALE_DISPLAY)),
    Column::new("product", "Mahsulot", ColumnKind::ForeignKey, Source::Related(PRODUCT_DISPLAY)),
    Column::new(
        "batch",
        "Partiya",
        ColumnKind::ForeignKey,
        Source::Related(
            "p.name || ' - ' || b.batch_number || ' (' || b.remaining_quantity || '/' || b.initial_quantity || ')'",
        ),
    ),
    Column::new("quantity", "Miqdori", ColumnKind::Integer, Source::Field("t.quantity")),
    Column::new("unit_price", "Birlik narxi", ColumnKind::Money, Source::Money("t.unit_price_cents")),
    Column::new("total_price", "Umumiy narx", ColumnKind::Money, Source::Money("t.total_price_cents")),
    Column::new("returned_quantity", "Qaytarilgan miqdor", ColumnKind::Integer, Source::Field("t.returned_quantity")),
];

static RETURN_SALE_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("original_sale", "Asl savdo", ColumnKind::ForeignKey, Source::Related(SALE_DISPLAY)),
    Column::new("return_number", "Qaytarish raqami", ColumnKind::Text, Source::Field("t.return_number")),
    Column::new("cashier", "Kassir", ColumnKind::ForeignKey, Source::Related("u.username")),
    Column::new(
        "total_return_amount",
        "Qaytarilgan summa",
        ColumnKind::Money,
        Source::Money("t.total_return_amount_cents"),
    ),
    Column::new("created_at", "Qaytarilgan vaqt", ColumnKind::DateTime, Source::Field("t.created_at")),
];

static RETURN_ITEM_COLUMNS: &[Column] = &[
    Column::id(),
    Column::new("return_sale", "Return sale", ColumnKind::ForeignKey, Source::Related("'Qaytarish #' || r.return_number")),
    Column::new(
        "sale_item",
        "Sale item",
        ColumnKind::ForeignKey,
        Source::Related("p.name || ' x ' || si.quantity || ' (' || b.batch_number || ')'"),
    ),
    Column::new("returned_quantity", "Qaytarilgan miqdor", ColumnKind::Integer, Source::Field("t.returned_quantity")),
    Column::new("return_amount", "Qaytarilgan summa", ColumnKind::Money, Source::Money("t.return_amount_cents")),
];

// =============================================================================
// Views
// =============================================================================

/// What a user may do through a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub add: bool,
    pub change: bool,
    pub delete: bool,
}

impl Permissions {
    pub const READ_ONLY: Permissions = Permissions {
        add: false,
        change: false,
        delete: false,
    };
}

/// One page of a list view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage {
    pub columns: Vec<ColumnHeader>,
    /// One array per row, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// A single record, keyed by column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDetail {
    pub columns: Vec<ColumnHeader>,
    pub values: serde_json::Map<String, Value>,
}

/// An entity bound to one store's database.
#[derive(Debug, Clone)]
pub struct ReadOnlyView {
    store: StoreInfo,
    entity: AdminEntity,
    db: Database,
}

impl ReadOnlyView {
    pub fn new(store: StoreInfo, entity: AdminEntity, db: Database) -> Self {
        ReadOnlyView { store, entity, db }
    }

    pub fn store(&self) -> &StoreInfo {
        &self.store
    }

    pub fn entity(&self) -> AdminEntity {
        self.entity
    }

    /// `Kategoriya (Do‘kon 1)`
    pub fn verbose_name(&self) -> String {
        format!("{} ({})", self.entity.verbose_name(), self.store.display_name)
    }

    /// `Kategoriyalar (Do‘kon 1)`
    pub fn verbose_name_plural(&self) -> String {
        format!("{} ({})", self.entity.verbose_name_plural(), self.store.display_name)
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::READ_ONLY
    }

    pub fn headers(&self) -> Vec<ColumnHeader> {
        self.entity.columns().iter().map(ColumnHeader::from).collect()
    }

    /// One page of rows. `page` is 1-based; 0 is treated as 1, and
    /// `per_page` is clamped to `1..=MAX_PER_PAGE`.
    pub async fn list(&self, page: u32, per_page: u32) -> DbResult<ListPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let offset = i64::from(page - 1) * i64::from(per_page);

        debug!(
            store = %self.store.alias,
            entity = %self.entity,
            page = page,
            per_page = per_page,
            "Listing records"
        );

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            self.entity.from_clause()
        ))
        .fetch_one(self.db.pool())
        .await?;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT ?1 OFFSET ?2",
            self.entity.select_list(),
            self.entity.from_clause(),
            self.entity.ordering()
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(per_page))
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        let rows = rows
            .iter()
            .map(|row| self.decode_row(row))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(ListPage {
            columns: self.headers(),
            rows,
            page,
            per_page,
            total,
        })
    }

    /// One record by primary key.
    pub async fn detail(&self, id: i64) -> DbResult<RecordDetail> {
        debug!(store = %self.store.alias, entity = %self.entity, id = id, "Fetching record");

        let sql = format!(
            "SELECT {} FROM {} WHERE t.id = ?1",
            self.entity.select_list(),
            self.entity.from_clause()
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| DbError::not_found(self.verbose_name(), id))?;

        let values = self
            .entity
            .columns()
            .iter()
            .map(|c| c.name.to_string())
            .zip(self.decode_row(&row)?)
            .collect();

        Ok(RecordDetail {
            columns: self.headers(),
            values,
        })
    }

    fn decode_row(&self, row: &SqliteRow) -> DbResult<Vec<Value>> {
        self.entity
            .columns()
            .iter()
            .map(|column| {
                let value = match column.kind {
                    ColumnKind::Integer => row
                        .try_get::<Option<i64>, _>(column.name)?
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    _ => row
                        .try_get::<Option<String>, _>(column.name)?
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                };
                Ok(value)
            })
            .collect()
    }
}
