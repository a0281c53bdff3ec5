//! olistboard: an exploratory dashboard over the Olist e-commerce dataset
//!
//! Loads the order, customer and product tables, segments customers with RFM
//! (Recency, Frequency, Monetary) scoring, applies the user's filters and
//! aggregates the filtered slice into KPIs, rankings and charts.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod rfm;
pub mod summary;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{load_config, DashboardConfig, DisplayConfig};
pub use data::{Dataset, Order, OrderLine, OrderStatus};
pub use error::{DashboardError, Result};
pub use filter::{DateRange, FilterSet};
pub use rfm::{
    compute_profiles, compute_profiles_at, segment_index, AnalysisDate, RfmProfile, RfmScores,
    Segment, SegmentationConfig, StatusPolicy,
};
pub use summary::{preview, summarize, PreviewRow, Summary};
pub use viz::{dashboard_charts, print_preview, print_report, render_charts, BarChart};
