//! Console report and Plotters charts for a dashboard summary

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::data::CategoryCount;
use crate::error::{DashboardError, Result};
use crate::filter::{DateRange, FilterSet};
use crate::summary::{MetricStats, PreviewRow, Summary};

pub const MONTHLY_ORDERS_CHART: &str = "monthly_orders.png";
pub const MONTHLY_REVENUE_CHART: &str = "monthly_revenue.png";
pub const TOP_CATEGORIES_CHART: &str = "top_categories.png";
pub const TOP_CATEGORIES_ORDERS_CHART: &str = "top_categories_orders.png";
pub const SEGMENTS_CHART: &str = "segments.png";
pub const SEGMENT_REVENUE_CHART: &str = "segment_revenue.png";
pub const STATES_CHART: &str = "states.png";
pub const STATE_REVENUE_PER_CUSTOMER_CHART: &str = "state_revenue_per_customer.png";

const ORDERS_COLOR: RGBColor = RGBColor(6, 167, 125);
const REVENUE_COLOR: RGBColor = RGBColor(214, 40, 40);
const SEGMENT_COLOR: RGBColor = RGBColor(69, 183, 209);
const STATE_COLOR: RGBColor = RGBColor(46, 134, 171);
const HIGHLIGHT_COLOR: RGBColor = RGBColor(241, 143, 1);

fn render_err(e: impl std::fmt::Display) -> DashboardError {
    DashboardError::Render(e.to_string())
}

/// A vertical bar chart, one bar per label
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub file_name: &'static str,
    pub title: String,
    pub y_desc: &'static str,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub color: RGBColor,
    /// Bars drawn in the highlight color, same length as `labels` when set
    pub highlighted: Vec<bool>,
    /// Horizontal line drawn across the chart
    pub reference: Option<f64>,
}

impl BarChart {
    fn new(
        file_name: &'static str,
        title: String,
        y_desc: &'static str,
        bars: impl IntoIterator<Item = (String, f64)>,
        color: RGBColor,
    ) -> Self {
        let (labels, values) = bars.into_iter().unzip();
        Self {
            file_name,
            title,
            y_desc,
            labels,
            values,
            color,
            highlighted: Vec::new(),
            reference: None,
        }
    }

    fn highlight(mut self, flags: Vec<bool>) -> Self {
        self.highlighted = flags;
        self
    }

    fn reference_line(mut self, value: f64) -> Self {
        self.reference = Some(value);
        self
    }

    fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.get(index).copied().unwrap_or(false)
    }

    /// Draw the chart as a PNG at `path`
    pub fn draw(&self, path: &Path) -> Result<()> {
        let max_value = self
            .values
            .iter()
            .copied()
            .chain(self.reference)
            .fold(0.0, f64::max);
        let y_max = if max_value > 0.0 { max_value * 1.1 } else { 1.0 };

        let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, ("sans-serif", 26))
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d((0..self.labels.len()).into_segmented(), 0f64..y_max)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(self.labels.len())
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => self.labels.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .x_label_style(("sans-serif", 11))
            .y_desc(self.y_desc)
            .axis_desc_style(("sans-serif", 15))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style_func(|x, _| {
                        let index = match x {
                            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => *i,
                            SegmentValue::Last => usize::MAX,
                        };
                        if self.is_highlighted(index) {
                            HIGHLIGHT_COLOR.filled()
                        } else {
                            self.color.filled()
                        }
                    })
                    .margin(8)
                    .data(self.values.iter().enumerate().map(|(i, &v)| (i, v))),
            )
            .map_err(render_err)?;

        if let Some(reference) = self.reference {
            chart
                .draw_series(LineSeries::new(
                    [
                        (SegmentValue::Exact(0), reference),
                        (SegmentValue::Last, reference),
                    ],
                    BLACK.stroke_width(2),
                ))
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
        tracing::debug!(path = %path.display(), bars = self.labels.len(), "chart written");
        Ok(())
    }
}

/// Describe every chart for a summary, in render order
pub fn dashboard_charts(summary: &Summary) -> Vec<BarChart> {
    let months = || summary.monthly.iter().map(|p| p.month.clone());
    let mut charts = vec![
        BarChart::new(
            MONTHLY_ORDERS_CHART,
            format!(
                "Monthly orders (total {})",
                summary.monthly.iter().map(|p| p.orders).sum::<usize>()
            ),
            "Orders",
            months().zip(summary.monthly.iter().map(|p| p.orders as f64)),
            ORDERS_COLOR,
        ),
        BarChart::new(
            MONTHLY_REVENUE_CHART,
            format!("Monthly revenue (total {:.2})", summary.kpis.revenue),
            "Revenue",
            months().zip(summary.monthly.iter().map(|p| p.revenue)),
            REVENUE_COLOR,
        ),
        BarChart::new(
            TOP_CATEGORIES_ORDERS_CHART,
            format!(
                "Top {} categories by volume (total {} orders)",
                summary.categories_by_orders.len(),
                summary
                    .categories_by_orders
                    .iter()
                    .map(|c| c.orders)
                    .sum::<usize>()
            ),
            "Orders",
            summary
                .categories_by_orders
                .iter()
                .map(|c| (c.category.clone(), c.orders as f64)),
            ORDERS_COLOR,
        ),
        BarChart::new(
            TOP_CATEGORIES_CHART,
            format!("Top {} categories by revenue", summary.categories.len()),
            "Revenue",
            summary
                .categories
                .iter()
                .map(|c| (c.category.clone(), c.revenue)),
            REVENUE_COLOR,
        ),
        BarChart::new(
            SEGMENTS_CHART,
            format!(
                "Customers by segment (total {})",
                summary.segments.iter().map(|s| s.customers).sum::<usize>()
            ),
            "Customers",
            summary
                .segments
                .iter()
                .map(|s| (s.segment.to_string(), s.customers as f64)),
            SEGMENT_COLOR,
        ),
        BarChart::new(
            SEGMENT_REVENUE_CHART,
            format!(
                "Revenue contribution by segment (total {:.2})",
                summary.segments.iter().map(|s| s.revenue).sum::<f64>()
            ),
            "Revenue",
            summary
                .segments
                .iter()
                .map(|s| (s.segment.to_string(), s.revenue)),
            SEGMENT_COLOR,
        ),
        BarChart::new(
            STATES_CHART,
            format!("Top {} states by revenue", summary.states.len()),
            "Revenue",
            summary.states.iter().map(|s| (s.state.clone(), s.revenue)),
            REVENUE_COLOR,
        ),
    ];

    let per_customer = BarChart::new(
        STATE_REVENUE_PER_CUSTOMER_CHART,
        "Revenue per customer by state (highlighted: above 110% of average)".to_string(),
        "Revenue per customer",
        summary
            .states
            .iter()
            .map(|s| (s.state.clone(), s.revenue_per_customer)),
        STATE_COLOR,
    )
    .highlight(summary.states.iter().map(|s| s.above_average).collect());
    charts.push(match summary.state_average_revenue_per_customer() {
        Some(mean) => per_customer.reference_line(mean),
        None => per_customer,
    });

    charts
}

/// Render every chart for a summary into `output_dir`
///
/// # Returns
/// * Paths of the written charts, empty when nothing survived the filters
pub fn render_charts(summary: &Summary, output_dir: &Path) -> Result<Vec<PathBuf>> {
    if summary.is_empty() {
        tracing::info!("no data for current filters, skipping charts");
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(output_dir)
        .map_err(|e| DashboardError::Render(format!("{}: {}", output_dir.display(), e)))?;

    let mut written = Vec::new();
    for chart in dashboard_charts(summary) {
        let path = output_dir.join(chart.file_name);
        chart.draw(&path)?;
        written.push(path);
    }
    Ok(written)
}

/// Print the first rows of the filtered data
pub fn print_preview(rows: &[PreviewRow], total: usize) {
    if rows.is_empty() {
        return;
    }
    println!("\n=== Filtered Data ({} of {} rows) ===", rows.len(), total);
    println!(
        "  {:<32} {:<32} {:<28} {:<5} {:<10} {:>10}  {}",
        "order_id", "customer", "category", "state", "segment", "revenue", "purchased_at"
    );
    for row in rows {
        println!(
            "  {:<32} {:<32} {:<28} {:<5} {:<10} {:>10.2}  {}",
            row.order_id,
            row.customer_id,
            row.category,
            row.state,
            row.segment.map(|s| s.label()).unwrap_or("-"),
            row.revenue,
            row.purchased_at
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

/// Print the dashboard report to stdout
pub fn print_report(
    summary: &Summary,
    filters: &FilterSet,
    period: Option<DateRange>,
    category_counts: &[CategoryCount],
) {
    let kpis = &summary.kpis;
    println!("\n=== Key Figures ===");
    println!(
        "Orders:           {:>12} ({:.1}% of total)",
        kpis.orders,
        kpis.order_share()
    );
    println!(
        "Unique customers: {:>12} ({:.1}% of total)",
        kpis.customers,
        kpis.customer_share()
    );
    println!(
        "Revenue:          {:>12.2} ({:.1}% of total)",
        kpis.revenue,
        kpis.revenue_share()
    );
    match (kpis.mean_revenue, kpis.total_mean_revenue) {
        (Some(mean), Some(total)) => {
            println!("Mean revenue/item: {:>11.2} (overall {:.2})", mean, total)
        }
        (None, _) => println!("Mean revenue/item: {:>11}", "-"),
        (Some(mean), None) => println!("Mean revenue/item: {:>11.2}", mean),
    }

    if summary.is_empty() {
        println!("\nNo data for current filters.");
    } else {
        println!("\n=== Monthly Trend ===");
        println!("  Month   |   Orders |      Revenue");
        println!("  --------|----------|-------------");
        for point in &summary.monthly {
            println!("  {:7} | {:8} | {:12.2}", point.month, point.orders, point.revenue);
        }

        println!("\n=== Top Categories ===");
        for (rank, stat) in summary.categories.iter().enumerate() {
            println!(
                "  {:2}. {:<40} {:6} orders {:12.2}",
                rank + 1,
                stat.category,
                stat.orders,
                stat.revenue
            );
        }

        println!("\n=== Customer Segments ===");
        let segment_customers: usize = summary.segments.iter().map(|s| s.customers).sum();
        for stat in &summary.segments {
            let share = if segment_customers > 0 {
                stat.customers as f64 / segment_customers as f64 * 100.0
            } else {
                0.0
            };
            println!(
                "  {:<10} {:8} customers ({:5.1}%) {:12.2}",
                stat.segment.label(),
                stat.customers,
                share,
                stat.revenue
            );
        }

        println!("\n=== Top States ===");
        for stat in &summary.states {
            println!(
                "  {:<3} {:8} customers {:12.2} {:10.2}/customer{}",
                stat.state,
                stat.customers,
                stat.revenue,
                stat.revenue_per_customer,
                if stat.above_average { " *" } else { "" }
            );
        }
    }

    if let Some(rfm) = &summary.rfm {
        println!("\n=== RFM Statistics ===");
        println!("  Metric    |  count |     mean |      std |      min |      25% |      50% |      75% |      max");
        print_metric("Recency", &rfm.recency);
        print_metric("Frequency", &rfm.frequency);
        print_metric("Monetary", &rfm.monetary);
    }

    if !category_counts.is_empty() {
        println!("\n=== All-time Orders per Category ===");
        for count in category_counts.iter().take(10) {
            println!("  {:<40} {:8}", count.category, count.order_count);
        }
    }

    println!("\n=== Active Filters ===");
    let active = filters.active_filters();
    if active.is_empty() {
        println!("  none");
    }
    for filter in active {
        println!("  {}", filter);
    }

    if let Some(period) = period {
        println!("\n=== Analysis Period ===");
        println!("  From:     {}", period.start);
        println!("  To:       {}", period.end);
        println!("  Duration: {} days", period.days());
    }
}

fn print_metric(name: &str, stats: &MetricStats) {
    println!(
        "  {:<9} | {:6} | {:8.2} | {:8.2} | {:8.2} | {:8.2} | {:8.2} | {:8.2} | {:8.2}",
        name,
        stats.count,
        stats.mean,
        stats.std,
        stats.min,
        stats.q1,
        stats.median,
        stats.q3,
        stats.max
    );
}
