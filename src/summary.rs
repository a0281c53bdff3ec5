//! Display-oriented aggregation over a filtered slice of the dataset
//!
//! Everything here is a plain group-and-sum over order lines; descriptive
//! statistics over RFM profiles use `ndarray`.

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::Array1;

use chrono::NaiveDateTime;

use crate::config::DisplayConfig;
use crate::data::OrderLine;
use crate::rfm::{RfmProfile, Segment};

/// Headline numbers for the filtered slice next to the unfiltered totals
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub orders: usize,
    pub customers: usize,
    pub revenue: f64,
    /// Mean revenue per order line
    pub mean_revenue: Option<f64>,
    pub total_orders: usize,
    pub total_customers: usize,
    pub total_revenue: f64,
    pub total_mean_revenue: Option<f64>,
}

impl Kpis {
    pub fn order_share(&self) -> f64 {
        percentage(self.orders as f64, self.total_orders as f64)
    }

    pub fn customer_share(&self) -> f64 {
        percentage(self.customers as f64, self.total_customers as f64)
    }

    pub fn revenue_share(&self) -> f64 {
        percentage(self.revenue, self.total_revenue)
    }
}

fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPoint {
    /// `YYYY-MM`
    pub month: String,
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStat {
    pub category: String,
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStat {
    pub segment: Segment,
    pub customers: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateStat {
    pub state: String,
    pub customers: usize,
    pub revenue: f64,
    pub revenue_per_customer: f64,
    /// More than 10% above the mean revenue per customer of the listed states
    pub above_average: bool,
}

/// Descriptive statistics for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, 0 for a single value
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RfmStats {
    pub recency: MetricStats,
    pub frequency: MetricStats,
    pub monetary: MetricStats,
}

/// One row of the filtered-data preview table
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    pub order_id: String,
    pub customer_id: String,
    pub category: String,
    pub state: String,
    pub segment: Option<Segment>,
    pub revenue: f64,
    pub purchased_at: Option<NaiveDateTime>,
}

/// All aggregates the report renders
#[derive(Debug, Clone)]
pub struct Summary {
    pub kpis: Kpis,
    pub monthly: Vec<MonthlyPoint>,
    /// Ranked by revenue
    pub categories: Vec<CategoryStat>,
    /// Ranked by distinct orders
    pub categories_by_orders: Vec<CategoryStat>,
    pub segments: Vec<SegmentStat>,
    pub states: Vec<StateStat>,
    pub rfm: Option<RfmStats>,
}

impl Summary {
    /// Nothing survived the filters
    pub fn is_empty(&self) -> bool {
        self.kpis.orders == 0
    }

    /// Mean revenue per customer over the ranked states
    pub fn state_average_revenue_per_customer(&self) -> Option<f64> {
        mean_revenue_per_customer(&self.states)
    }
}

/// Aggregate a filtered slice for display
///
/// # Arguments
/// * `filtered` - Lines that passed the filters
/// * `all` - Every line in the dataset, for share-of-total figures
/// * `profiles` - Profiles that passed the segment filter
/// * `display` - Ranking sizes
pub fn summarize(
    filtered: &[&OrderLine],
    all: &[OrderLine],
    profiles: &[&RfmProfile],
    display: &DisplayConfig,
) -> Summary {
    Summary {
        kpis: kpis(filtered, all),
        monthly: monthly_trend(filtered),
        categories: top_categories(filtered, display.top_categories),
        categories_by_orders: top_categories_by_orders(filtered, display.top_categories),
        segments: segment_distribution(filtered),
        states: top_states(filtered, display.top_states),
        rfm: rfm_statistics(profiles),
    }
}

pub fn kpis(filtered: &[&OrderLine], all: &[OrderLine]) -> Kpis {
    let (orders, customers, revenue, mean_revenue) = headline(filtered.iter().copied());
    let (total_orders, total_customers, total_revenue, total_mean_revenue) = headline(all.iter());
    Kpis {
        orders,
        customers,
        revenue,
        mean_revenue,
        total_orders,
        total_customers,
        total_revenue,
        total_mean_revenue,
    }
}

fn headline<'a>(
    lines: impl Iterator<Item = &'a OrderLine>,
) -> (usize, usize, f64, Option<f64>) {
    let mut orders = HashSet::new();
    let mut customers = HashSet::new();
    let mut revenue = 0.0;
    let mut count = 0usize;
    for line in lines {
        orders.insert(line.order_id.as_str());
        customers.insert(line.customer_id.as_str());
        revenue += line.revenue;
        count += 1;
    }
    let mean = (count > 0).then(|| revenue / count as f64);
    (orders.len(), customers.len(), revenue, mean)
}

/// Distinct orders and revenue per purchase month, oldest first
pub fn monthly_trend(lines: &[&OrderLine]) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<String, (HashSet<&str>, f64)> = BTreeMap::new();
    for line in lines {
        let Some(ts) = line.purchased_at else {
            continue;
        };
        let entry = months
            .entry(ts.format("%Y-%m").to_string())
            .or_default();
        entry.0.insert(line.order_id.as_str());
        entry.1 += line.revenue;
    }
    months
        .into_iter()
        .map(|(month, (orders, revenue))| MonthlyPoint {
            month,
            orders: orders.len(),
            revenue,
        })
        .collect()
}

/// Categories ranked by revenue
pub fn top_categories(lines: &[&OrderLine], limit: usize) -> Vec<CategoryStat> {
    let mut stats = category_stats(lines);
    stats.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.category.cmp(&b.category))
    });
    stats.truncate(limit);
    stats
}

/// Categories ranked by order volume
pub fn top_categories_by_orders(lines: &[&OrderLine], limit: usize) -> Vec<CategoryStat> {
    let mut stats = category_stats(lines);
    stats.sort_by(|a, b| {
        b.orders
            .cmp(&a.orders)
            .then_with(|| a.category.cmp(&b.category))
    });
    stats.truncate(limit);
    stats
}

fn category_stats(lines: &[&OrderLine]) -> Vec<CategoryStat> {
    let mut groups: HashMap<&str, (HashSet<&str>, f64)> = HashMap::new();
    for line in lines {
        let entry = groups.entry(line.category.as_str()).or_default();
        entry.0.insert(line.order_id.as_str());
        entry.1 += line.revenue;
    }
    groups
        .into_iter()
        .map(|(category, (orders, revenue))| CategoryStat {
            category: category.to_string(),
            orders: orders.len(),
            revenue,
        })
        .collect()
}

/// Distinct customers and revenue per segment; unsegmented lines are skipped
pub fn segment_distribution(lines: &[&OrderLine]) -> Vec<SegmentStat> {
    let mut groups: BTreeMap<Segment, (HashSet<&str>, f64)> = BTreeMap::new();
    for line in lines {
        let Some(segment) = line.segment else {
            continue;
        };
        let entry = groups.entry(segment).or_default();
        entry.0.insert(line.customer_id.as_str());
        entry.1 += line.revenue;
    }
    groups
        .into_iter()
        .map(|(segment, (customers, revenue))| SegmentStat {
            segment,
            customers: customers.len(),
            revenue,
        })
        .collect()
}

/// States ranked by revenue, with revenue per customer
pub fn top_states(lines: &[&OrderLine], limit: usize) -> Vec<StateStat> {
    let mut groups: HashMap<&str, (HashSet<&str>, f64)> = HashMap::new();
    for line in lines {
        let entry = groups.entry(line.state.as_str()).or_default();
        entry.0.insert(line.customer_id.as_str());
        entry.1 += line.revenue;
    }
    let mut stats: Vec<StateStat> = groups
        .into_iter()
        .map(|(state, (customers, revenue))| StateStat {
            state: state.to_string(),
            customers: customers.len(),
            revenue,
            revenue_per_customer: revenue / customers.len().max(1) as f64,
            above_average: false,
        })
        .collect();
    stats.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.state.cmp(&b.state))
    });
    stats.truncate(limit);

    if let Some(mean) = mean_revenue_per_customer(&stats) {
        for stat in &mut stats {
            stat.above_average = stat.revenue_per_customer > mean * 1.1;
        }
    }
    stats
}

fn mean_revenue_per_customer(states: &[StateStat]) -> Option<f64> {
    if states.is_empty() {
        return None;
    }
    Some(states.iter().map(|s| s.revenue_per_customer).sum::<f64>() / states.len() as f64)
}

/// The first `limit` filtered lines, in dataset order
pub fn preview(lines: &[&OrderLine], limit: usize) -> Vec<PreviewRow> {
    lines
        .iter()
        .take(limit)
        .map(|line| PreviewRow {
            order_id: line.order_id.clone(),
            customer_id: line.customer_id.clone(),
            category: line.category.clone(),
            state: line.state.clone(),
            segment: line.segment,
            revenue: line.revenue,
            purchased_at: line.purchased_at,
        })
        .collect()
}

/// Descriptive statistics of recency, frequency and monetary
pub fn rfm_statistics(profiles: &[&RfmProfile]) -> Option<RfmStats> {
    Some(RfmStats {
        recency: describe(profiles.iter().map(|p| p.recency as f64).collect())?,
        frequency: describe(profiles.iter().map(|p| p.frequency as f64).collect())?,
        monetary: describe(profiles.iter().map(|p| p.monetary).collect())?,
    })
}

fn describe(mut values: Vec<f64>) -> Option<MetricStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let array = Array1::from(values);
    let mean = array.mean()?;
    let std = if count > 1 { array.std(1.0) } else { 0.0 };
    let sorted = array.as_slice()?;

    Some(MetricStats {
        count,
        mean,
        std,
        min: sorted[0],
        q1: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q3: quantile(sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Linear interpolation between closest ranks of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OrderStatus;
    use crate::rfm::RfmScores;
    use chrono::NaiveDate;

    const CHAMPIONS: Option<Segment> = Some(Segment::Champions);
    const LOYAL: Option<Segment> = Some(Segment::Loyal);

    fn line(
        order: &str,
        customer: &str,
        date: &str,
        category: &str,
        state: &str,
        revenue: f64,
        segment: Option<Segment>,
    ) -> OrderLine {
        OrderLine {
            order_id: order.to_string(),
            customer_id: customer.to_string(),
            purchased_at: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(12, 0, 0)),
            status: OrderStatus::Delivered,
            category: category.to_string(),
            state: state.to_string(),
            revenue,
            segment,
        }
    }

    fn sample_lines() -> Vec<OrderLine> {
        vec![
            line("o1", "a", "2018-01-03", "toys", "SP", 100.0, CHAMPIONS),
            line("o1", "a", "2018-01-03", "auto", "SP", 50.0, CHAMPIONS),
            line("o2", "b", "2018-01-20", "toys", "RJ", 30.0, LOYAL),
            line("o3", "c", "2018-02-11", "garden", "RJ", 20.0, None),
            line("o4", "a", "2018-03-01", "toys", "SP", 200.0, CHAMPIONS),
        ]
    }

    fn profile(id: &str, recency: i64, frequency: u32, monetary: f64) -> RfmProfile {
        RfmProfile {
            customer_id: id.to_string(),
            recency,
            frequency,
            monetary,
            scores: RfmScores::new(1, 1, 1),
            segment: Segment::Potential,
        }
    }

    #[test]
    fn test_kpis_against_totals() {
        let lines = sample_lines();
        let filtered: Vec<&OrderLine> = lines.iter().filter(|l| l.state == "SP").collect();

        let kpis = kpis(&filtered, &lines);
        assert_eq!(kpis.orders, 2);
        assert_eq!(kpis.customers, 1);
        assert_eq!(kpis.revenue, 350.0);
        assert_eq!(kpis.total_orders, 4);
        assert_eq!(kpis.total_customers, 3);
        assert_eq!(kpis.total_revenue, 400.0);
        assert_eq!(kpis.order_share(), 50.0);
        assert_eq!(kpis.revenue_share(), 87.5);
        assert_eq!(kpis.mean_revenue, Some(350.0 / 3.0));
    }

    #[test]
    fn test_kpis_empty_slice() {
        let lines = sample_lines();
        let kpis = kpis(&[], &lines);
        assert_eq!(kpis.orders, 0);
        assert_eq!(kpis.mean_revenue, None);
        assert_eq!(kpis.order_share(), 0.0);
    }

    #[test]
    fn test_monthly_trend() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let trend = monthly_trend(&all);
        assert_eq!(
            trend,
            vec![
                MonthlyPoint {
                    month: "2018-01".to_string(),
                    orders: 2,
                    revenue: 180.0,
                },
                MonthlyPoint {
                    month: "2018-02".to_string(),
                    orders: 1,
                    revenue: 20.0,
                },
                MonthlyPoint {
                    month: "2018-03".to_string(),
                    orders: 1,
                    revenue: 200.0,
                },
            ]
        );
    }

    #[test]
    fn test_top_categories_ranked_by_revenue() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let top = top_categories(&all, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].category, "toys");
        assert_eq!(top[0].orders, 3);
        assert_eq!(top[0].revenue, 330.0);
        assert_eq!(top[1].category, "auto");
    }

    #[test]
    fn test_top_categories_ranked_by_orders() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let top = top_categories_by_orders(&all, 10);
        let names: Vec<&str> = top.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["toys", "auto", "garden"]);
        assert_eq!(top[0].orders, 3);
        assert_eq!(top[1].orders, 1);

        assert_eq!(top_categories_by_orders(&all, 1).len(), 1);
    }

    #[test]
    fn test_preview_limits_rows() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        assert_eq!(preview(&all, 100).len(), 5);
        assert!(preview(&all, 0).is_empty());

        let rows = preview(&all, 3);
        assert_eq!(rows.len(), 3);
        let orders: Vec<&str> = rows.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(orders, vec!["o1", "o1", "o2"]);
    }

    #[test]
    fn test_preview_columns() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let rows = preview(&all[2..], 2);
        assert_eq!(
            rows[0],
            PreviewRow {
                order_id: "o2".to_string(),
                customer_id: "b".to_string(),
                category: "toys".to_string(),
                state: "RJ".to_string(),
                segment: LOYAL,
                revenue: 30.0,
                purchased_at: NaiveDate::from_ymd_opt(2018, 1, 20)
                    .and_then(|d| d.and_hms_opt(12, 0, 0)),
            }
        );
        assert_eq!(rows[1].segment, None);
        assert_eq!(rows[1].category, "garden");
    }

    #[test]
    fn test_segment_distribution_skips_unsegmented() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let segments = segment_distribution(&all);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment, Segment::Champions);
        assert_eq!(segments[0].customers, 1);
        assert_eq!(segments[0].revenue, 350.0);
        assert_eq!(segments[1].segment, Segment::Loyal);
    }

    #[test]
    fn test_top_states_flags_above_average() {
        let lines = sample_lines();
        let all: Vec<&OrderLine> = lines.iter().collect();

        let states = top_states(&all, 15);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].state, "SP");
        assert_eq!(states[0].revenue_per_customer, 350.0);
        assert!(states[0].above_average);
        assert_eq!(states[1].state, "RJ");
        assert_eq!(states[1].revenue_per_customer, 25.0);
        assert!(!states[1].above_average);
    }

    #[test]
    fn test_rfm_statistics() {
        let profiles = vec![
            profile("a", 10, 1, 100.0),
            profile("b", 20, 2, 200.0),
            profile("c", 30, 3, 300.0),
            profile("d", 40, 4, 400.0),
        ];
        let refs: Vec<&RfmProfile> = profiles.iter().collect();

        let stats = rfm_statistics(&refs).unwrap();
        assert_eq!(stats.recency.count, 4);
        assert_eq!(stats.recency.mean, 25.0);
        assert_eq!(stats.recency.min, 10.0);
        assert_eq!(stats.recency.max, 40.0);
        assert_eq!(stats.recency.median, 25.0);
        assert_eq!(stats.recency.q1, 17.5);
        assert_eq!(stats.recency.q3, 32.5);
        assert!((stats.frequency.std - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(stats.monetary.mean, 250.0);
    }

    #[test]
    fn test_rfm_statistics_edge_cases() {
        assert!(rfm_statistics(&[]).is_none());

        let single = profile("a", 5, 1, 9.5);
        let stats = rfm_statistics(&[&single]).unwrap();
        assert_eq!(stats.monetary.std, 0.0);
        assert_eq!(stats.monetary.median, 9.5);
    }

    #[test]
    fn test_summarize_empty_filter_result() {
        let lines = sample_lines();
        let summary = summarize(&[], &lines, &[], &DisplayConfig::default());
        assert!(summary.is_empty());
        assert!(summary.monthly.is_empty());
        assert!(summary.categories.is_empty());
        assert!(summary.categories_by_orders.is_empty());
        assert!(summary.rfm.is_none());
    }
}
