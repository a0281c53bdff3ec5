//! RFM (Recency, Frequency, Monetary) customer segmentation
//!
//! Groups qualifying orders by customer, measures how recently, how often and
//! how much each customer bought, turns the three measures into quantile
//! scores and maps the scores to a segment through a rule table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::data::{Order, OrderStatus};
use crate::error::{DashboardError, Result};

/// Customer segment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    Loyal,
    #[serde(rename = "At Risk")]
    AtRisk,
    Potential,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::Champions,
        Segment::Loyal,
        Segment::AtRisk,
        Segment::Potential,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::AtRisk => "At Risk",
            Segment::Potential => "Potential",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Segment {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "champions" | "champion" => Ok(Segment::Champions),
            "loyal" => Ok(Segment::Loyal),
            "atrisk" => Ok(Segment::AtRisk),
            "potential" => Ok(Segment::Potential),
            _ => Err(DashboardError::InvalidFilter(format!(
                "unknown segment '{}', expected one of: Champions, Loyal, At Risk, Potential",
                s
            ))),
        }
    }
}

/// Which order statuses count towards a customer's profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusPolicy {
    /// Every status qualifies
    All,
    /// Cancelled and unavailable orders are dropped
    #[default]
    ExcludeCancelled,
    /// Only delivered orders qualify
    DeliveredOnly,
}

impl StatusPolicy {
    pub fn accepts(&self, status: &OrderStatus) -> bool {
        match self {
            StatusPolicy::All => true,
            StatusPolicy::ExcludeCancelled => {
                !matches!(status, OrderStatus::Canceled | OrderStatus::Unavailable)
            }
            StatusPolicy::DeliveredOnly => matches!(status, OrderStatus::Delivered),
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "all" => Ok(StatusPolicy::All),
            "exclude-cancelled" | "exclude-canceled" => Ok(StatusPolicy::ExcludeCancelled),
            "delivered-only" | "delivered" => Ok(StatusPolicy::DeliveredOnly),
            other => Err(DashboardError::Config(format!(
                "unknown status policy '{}', expected all, exclude-cancelled or delivered-only",
                other
            ))),
        }
    }
}

/// Quantile scores for one customer, each in `1..=quantiles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RfmScores {
    pub r: u8,
    pub f: u8,
    pub m: u8,
}

impl RfmScores {
    pub fn new(r: u8, f: u8, m: u8) -> Self {
        Self { r, f, m }
    }
}

/// One row of the segment decision table. Unset bounds are open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub segment: Segment,
    #[serde(default)]
    pub min_r: Option<u8>,
    #[serde(default)]
    pub max_r: Option<u8>,
    #[serde(default)]
    pub min_f: Option<u8>,
    #[serde(default)]
    pub max_f: Option<u8>,
    #[serde(default)]
    pub min_m: Option<u8>,
    #[serde(default)]
    pub max_m: Option<u8>,
}

impl SegmentRule {
    fn new(segment: Segment) -> Self {
        Self {
            segment,
            min_r: None,
            max_r: None,
            min_f: None,
            max_f: None,
            min_m: None,
            max_m: None,
        }
    }

    pub fn matches(&self, scores: &RfmScores) -> bool {
        within(scores.r, self.min_r, self.max_r)
            && within(scores.f, self.min_f, self.max_f)
            && within(scores.m, self.min_m, self.max_m)
    }
}

fn within(score: u8, min: Option<u8>, max: Option<u8>) -> bool {
    min.map_or(true, |lo| score >= lo) && max.map_or(true, |hi| score <= hi)
}

/// Thresholds and policy for the segmentation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Number of quantile buckets per metric
    pub quantiles: u8,
    pub status_policy: StatusPolicy,
    /// Evaluated in order, first match wins
    pub rules: Vec<SegmentRule>,
    pub fallback: Segment,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            quantiles: 4,
            status_policy: StatusPolicy::default(),
            rules: vec![
                SegmentRule {
                    min_r: Some(3),
                    min_f: Some(3),
                    min_m: Some(3),
                    ..SegmentRule::new(Segment::Champions)
                },
                SegmentRule {
                    min_r: Some(3),
                    min_f: Some(2),
                    ..SegmentRule::new(Segment::Loyal)
                },
                SegmentRule {
                    max_r: Some(2),
                    min_m: Some(3),
                    ..SegmentRule::new(Segment::AtRisk)
                },
            ],
            fallback: Segment::Potential,
        }
    }
}

impl SegmentationConfig {
    /// Map a score triple to its segment
    pub fn segment_for(&self, scores: &RfmScores) -> Segment {
        self.rules
            .iter()
            .find(|rule| rule.matches(scores))
            .map(|rule| rule.segment)
            .unwrap_or(self.fallback)
    }

    /// Purchase time of the order if it counts towards RFM aggregation
    pub fn qualifying_timestamp(&self, order: &Order) -> Option<NaiveDateTime> {
        let purchased_at = order.purchased_at?;
        let qualifies = order.payment_value > 0.0
            && order.payment_value.is_finite()
            && self.status_policy.accepts(&order.status);
        qualifies.then_some(purchased_at)
    }
}

/// Reference point recency is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisDate {
    Fixed(NaiveDateTime),
    /// One day after the latest qualifying order
    DayAfterLatest,
}

impl AnalysisDate {
    /// Concrete timestamp for this order set, `None` when `DayAfterLatest`
    /// has no qualifying order to anchor on
    pub fn resolve(&self, orders: &[Order], config: &SegmentationConfig) -> Option<NaiveDateTime> {
        match self {
            AnalysisDate::Fixed(ts) => Some(*ts),
            AnalysisDate::DayAfterLatest => orders
                .iter()
                .filter_map(|order| config.qualifying_timestamp(order))
                .max()
                .map(|latest| latest + Duration::days(1)),
        }
    }
}

impl FromStr for AnalysisDate {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(AnalysisDate::DayAfterLatest);
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(AnalysisDate::Fixed(date.and_time(NaiveTime::MIN)));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(AnalysisDate::Fixed(ts));
            }
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(AnalysisDate::Fixed(ts.naive_utc()));
        }
        Err(DashboardError::InvalidReferenceDate(format!(
            "'{}' is not a date (YYYY-MM-DD), a timestamp or 'latest'",
            s
        )))
    }
}

/// RFM profile of one customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmProfile {
    pub customer_id: String,
    /// Whole days since the latest qualifying order
    pub recency: i64,
    /// Distinct qualifying orders
    pub frequency: u32,
    /// Total payment value of qualifying orders
    pub monetary: f64,
    pub scores: RfmScores,
    pub segment: Segment,
}

/// Compute one profile per customer with at least one qualifying order
///
/// # Arguments
/// * `orders` - Order records, any order
/// * `reference` - Analysis date: `YYYY-MM-DD`, a timestamp, or `latest`
/// * `config` - Quantiles, status policy and segment rules
///
/// # Returns
/// * Profiles sorted by customer id, empty when nothing qualifies
pub fn compute_profiles(
    orders: &[Order],
    reference: &str,
    config: &SegmentationConfig,
) -> Result<Vec<RfmProfile>> {
    let analysis_date: AnalysisDate = reference.parse()?;
    Ok(compute_profiles_at(orders, analysis_date, config))
}

struct CustomerOrders<'a> {
    latest: NaiveDateTime,
    order_ids: BTreeSet<&'a str>,
    payments: Vec<f64>,
}

/// Typed variant of [`compute_profiles`]
pub fn compute_profiles_at(
    orders: &[Order],
    analysis_date: AnalysisDate,
    config: &SegmentationConfig,
) -> Vec<RfmProfile> {
    let Some(reference) = analysis_date.resolve(orders, config) else {
        tracing::debug!("no qualifying orders to anchor the analysis date");
        return Vec::new();
    };

    let mut groups: BTreeMap<&str, CustomerOrders> = BTreeMap::new();
    let mut excluded = 0usize;
    for order in orders {
        let Some(purchased_at) = config.qualifying_timestamp(order) else {
            excluded += 1;
            continue;
        };
        let group = groups
            .entry(order.customer_id.as_str())
            .or_insert_with(|| CustomerOrders {
                latest: purchased_at,
                order_ids: BTreeSet::new(),
                payments: Vec::new(),
            });
        group.latest = group.latest.max(purchased_at);
        group.order_ids.insert(order.order_id.as_str());
        group.payments.push(order.payment_value);
    }

    tracing::debug!(
        customers = groups.len(),
        excluded,
        %reference,
        "grouped qualifying orders"
    );

    if groups.is_empty() {
        return Vec::new();
    }

    // (customer, recency, frequency, monetary), ordered by customer id
    let measures: Vec<(&str, i64, u32, f64)> = groups
        .into_iter()
        .map(|(customer_id, mut group)| {
            // summing in sorted order keeps the total independent of input order
            group.payments.sort_by(f64::total_cmp);
            let monetary: f64 = group.payments.iter().sum();
            let recency = (reference - group.latest).num_days();
            (customer_id, recency, group.order_ids.len() as u32, monetary)
        })
        .collect();

    let quantiles = config.quantiles.max(1);
    let recency_values: Vec<f64> = measures.iter().map(|m| m.1 as f64).collect();
    let frequency_values: Vec<f64> = measures.iter().map(|m| m.2 as f64).collect();
    let monetary_values: Vec<f64> = measures.iter().map(|m| m.3).collect();

    let recency_scores = quantile_scores(&recency_values, quantiles);
    let frequency_scores = quantile_scores(&frequency_values, quantiles);
    let monetary_scores = quantile_scores(&monetary_values, quantiles);

    measures
        .into_iter()
        .enumerate()
        .map(|(i, (customer_id, recency, frequency, monetary))| {
            // the most recent buyers get the highest recency score
            let scores = RfmScores::new(
                quantiles - recency_scores[i] + 1,
                frequency_scores[i],
                monetary_scores[i],
            );
            RfmProfile {
                customer_id: customer_id.to_string(),
                recency,
                frequency,
                monetary,
                scores,
                segment: config.segment_for(&scores),
            }
        })
        .collect()
}

/// Quantile buckets over ascending rank, with bucket edges placed at equal
/// steps between the lowest and highest rank. The lowest rank is always 1 and
/// the highest always `quantiles`. Ties are broken by position, and callers
/// pass values ordered by customer id.
fn quantile_scores(values: &[f64], quantiles: u8) -> Vec<u8> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut scores = vec![1u8; n];
    if n < 2 {
        return scores;
    }
    let q = quantiles as usize;
    let span = n - 1;
    for (rank, idx) in order.into_iter().enumerate() {
        // ceil(rank * q / span), at least 1
        let bucket = (rank * q).div_ceil(span).max(1);
        scores[idx] = bucket as u8;
    }
    scores
}

/// Segment lookup by customer id
pub fn segment_index(profiles: &[RfmProfile]) -> HashMap<String, Segment> {
    profiles
        .iter()
        .map(|p| (p.customer_id.clone(), p.segment))
        .collect()
}
