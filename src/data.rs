//! Data loading for the Olist e-commerce tables using Polars
//!
//! The CSV tables are scanned lazily, joined into one row per order item and
//! materialised as plain structs. Order-level records for the segmentation
//! engine come from the orders table joined with customers and the payment
//! totals.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

use crate::error::{DashboardError, Result};
use crate::rfm::Segment;

pub const ORDERS_FILE: &str = "olist_orders_dataset.csv";
pub const ORDER_ITEMS_FILE: &str = "olist_order_items_dataset.csv";
pub const PRODUCTS_FILE: &str = "olist_products_dataset.csv";
pub const CUSTOMERS_FILE: &str = "olist_customers_dataset.csv";
pub const PAYMENTS_FILE: &str = "olist_order_payments_dataset.csv";
pub const CATEGORY_TRANSLATION_FILE: &str = "product_category_name_translation.csv";
/// Precomputed orders-per-category aggregate, optional
pub const CATEGORY_COUNTS_FILE: &str = "category_order_counts.csv";

/// Category label for products without an English category name
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const REQUIRED_FILES: [&str; 6] = [
    ORDERS_FILE,
    ORDER_ITEMS_FILE,
    PRODUCTS_FILE,
    CUSTOMERS_FILE,
    PAYMENTS_FILE,
    CATEGORY_TRANSLATION_FILE,
];

/// Olist order status
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Created,
    Approved,
    Invoiced,
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Unavailable,
    Other(String),
}

impl OrderStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "created" => OrderStatus::Created,
            "approved" => OrderStatus::Approved,
            "invoiced" => OrderStatus::Invoiced,
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            "unavailable" => OrderStatus::Unavailable,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Approved => "approved",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Unavailable => "unavailable",
            OrderStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order, the input unit of RFM segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    /// Stable customer identifier (Olist `customer_unique_id`)
    pub customer_id: String,
    /// `None` when missing or unparseable
    pub purchased_at: Option<NaiveDateTime>,
    pub status: OrderStatus,
    /// Sum of all payments for the order
    pub payment_value: f64,
    /// English category of the order's first item
    pub category: String,
}

/// One order item joined with its order, product and customer
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    /// Stable customer identifier (Olist `customer_unique_id`)
    pub customer_id: String,
    pub purchased_at: Option<NaiveDateTime>,
    pub status: OrderStatus,
    pub category: String,
    /// Customer state (region)
    pub state: String,
    /// Item price plus freight
    pub revenue: f64,
    /// Filled in by [`Dataset::attach_segments`]
    pub segment: Option<Segment>,
}

/// Row of the precomputed orders-per-category table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub order_count: u64,
}

/// Everything the dashboard reads, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub lines: Vec<OrderLine>,
    pub orders: Vec<Order>,
    pub category_counts: Vec<CategoryCount>,
}

impl Dataset {
    /// Load and join the Olist tables found in `data_dir`
    ///
    /// # Arguments
    /// * `data_dir` - Directory holding the Olist CSV files
    ///
    /// # Returns
    /// * `Dataset` with order lines, order records and category counts
    pub fn load(data_dir: &Path) -> Result<Self> {
        for file in REQUIRED_FILES {
            let path = data_dir.join(file);
            if !path.is_file() {
                return Err(DashboardError::data_load(path, "file not found"));
            }
        }

        let orders = scan(&data_dir.join(ORDERS_FILE))?;
        let items = scan(&data_dir.join(ORDER_ITEMS_FILE))?;
        let products = scan(&data_dir.join(PRODUCTS_FILE))?;
        let customers = scan(&data_dir.join(CUSTOMERS_FILE))?;
        let payments = scan(&data_dir.join(PAYMENTS_FILE))?;
        let translation = scan(&data_dir.join(CATEGORY_TRANSLATION_FILE))?;

        let lines_df = orders
            .clone()
            .join(
                items,
                [col("order_id")],
                [col("order_id")],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                products,
                [col("product_id")],
                [col("product_id")],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                customers.clone(),
                [col("customer_id")],
                [col("customer_id")],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                translation,
                [col("product_category_name")],
                [col("product_category_name")],
                JoinArgs::new(JoinType::Left),
            )
            .select([
                col("order_id"),
                col("customer_unique_id"),
                col("order_status"),
                col("order_purchase_timestamp"),
                col("product_category_name_english")
                    .fill_null(lit(UNKNOWN_CATEGORY))
                    .alias("category"),
                col("customer_state"),
                (col("price").cast(DataType::Float64)
                    + col("freight_value").cast(DataType::Float64))
                .alias("revenue"),
            ])
            .collect()
            .map_err(|e| DashboardError::data_load(data_dir, e))?;

        let payment_totals = payments
            .group_by([col("order_id")])
            .agg([col("payment_value")
                .cast(DataType::Float64)
                .sum()
                .alias("payment_value")]);

        let orders_df = orders
            .join(
                customers,
                [col("customer_id")],
                [col("customer_id")],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                payment_totals,
                [col("order_id")],
                [col("order_id")],
                JoinArgs::new(JoinType::Left),
            )
            .select([
                col("order_id"),
                col("customer_unique_id"),
                col("order_status"),
                col("order_purchase_timestamp"),
                col("payment_value").fill_null(lit(0.0)),
            ])
            .collect()
            .map_err(|e| DashboardError::data_load(data_dir, e))?;

        let lines = lines_from_frame(&lines_df)?;
        let orders = orders_from_frame(&orders_df, &lines)?;

        let counts_path = data_dir.join(CATEGORY_COUNTS_FILE);
        let category_counts = if counts_path.is_file() {
            load_category_counts(&counts_path)?
        } else {
            tracing::debug!(path = %counts_path.display(), "no precomputed category counts");
            Vec::new()
        };

        tracing::info!(
            lines = lines.len(),
            orders = orders.len(),
            categories = category_counts.len(),
            "dataset loaded"
        );

        Ok(Self {
            lines,
            orders,
            category_counts,
        })
    }

    /// Attach each customer's segment to their order lines
    pub fn attach_segments(&mut self, segments: &HashMap<String, Segment>) {
        for line in &mut self.lines {
            line.segment = segments.get(&line.customer_id).copied();
        }
    }

    /// Earliest and latest purchase timestamp across all lines
    pub fn date_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut timestamps = self.lines.iter().filter_map(|l| l.purchased_at);
        let first = timestamps.next()?;
        Some(timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.lines.iter().map(|l| l.category.as_str()).collect()
    }

    pub fn states(&self) -> BTreeSet<&str> {
        self.lines.iter().map(|l| l.state.as_str()).collect()
    }
}

/// Load the precomputed orders-per-category table, largest first
pub fn load_category_counts(path: &Path) -> Result<Vec<CategoryCount>> {
    let df = scan(path)?
        .select([
            col("product_category_name_english").fill_null(lit(UNKNOWN_CATEGORY)),
            col("order_count").cast(DataType::Float64),
        ])
        .collect()
        .map_err(|e| DashboardError::data_load(path, e))?;

    let categories = string_values(&df, "product_category_name_english")?;
    let counts = float_values(&df, "order_count")?;

    let mut rows: Vec<CategoryCount> = categories
        .into_iter()
        .zip(counts)
        .map(|(category, count)| CategoryCount {
            category: category.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            order_count: count.unwrap_or(0.0).max(0.0) as u64,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(rows)
}

/// Parse an Olist purchase timestamp
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Lazily scan a CSV with every column read as a string
fn scan(path: &Path) -> Result<LazyFrame> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .map_err(|e| DashboardError::data_load(path, e))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let values = df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn lines_from_frame(df: &DataFrame) -> Result<Vec<OrderLine>> {
    let order_ids = string_values(df, "order_id")?;
    let customer_ids = string_values(df, "customer_unique_id")?;
    let statuses = string_values(df, "order_status")?;
    let timestamps = string_values(df, "order_purchase_timestamp")?;
    let categories = string_values(df, "category")?;
    let states = string_values(df, "customer_state")?;
    let revenues = float_values(df, "revenue")?;

    let mut lines = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        let (Some(order_id), Some(customer_id)) = (&order_ids[i], &customer_ids[i]) else {
            skipped += 1;
            continue;
        };
        lines.push(OrderLine {
            order_id: order_id.clone(),
            customer_id: customer_id.clone(),
            purchased_at: timestamps[i].as_deref().and_then(parse_timestamp),
            status: OrderStatus::parse(statuses[i].as_deref().unwrap_or_default()),
            category: categories[i]
                .clone()
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            state: states[i].clone().unwrap_or_default(),
            revenue: revenues[i].unwrap_or(0.0),
            segment: None,
        });
    }
    if skipped > 0 {
        tracing::warn!(skipped, "order lines without order or customer id");
    }
    Ok(lines)
}

fn orders_from_frame(df: &DataFrame, lines: &[OrderLine]) -> Result<Vec<Order>> {
    let mut first_category: HashMap<&str, &str> = HashMap::new();
    for line in lines {
        first_category
            .entry(line.order_id.as_str())
            .or_insert(line.category.as_str());
    }

    let order_ids = string_values(df, "order_id")?;
    let customer_ids = string_values(df, "customer_unique_id")?;
    let statuses = string_values(df, "order_status")?;
    let timestamps = string_values(df, "order_purchase_timestamp")?;
    let payments = float_values(df, "payment_value")?;

    let mut orders = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(order_id), Some(customer_id)) = (&order_ids[i], &customer_ids[i]) else {
            continue;
        };
        let category = first_category
            .get(order_id.as_str())
            .copied()
            .unwrap_or(UNKNOWN_CATEGORY);
        orders.push(Order {
            order_id: order_id.clone(),
            customer_id: customer_id.clone(),
            purchased_at: timestamps[i].as_deref().and_then(parse_timestamp),
            status: OrderStatus::parse(statuses[i].as_deref().unwrap_or_default()),
            payment_value: payments[i].unwrap_or(0.0),
            category: category.to_string(),
        });
    }
    Ok(orders)
}
