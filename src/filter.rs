//! Filter selection over order lines and RFM profiles
//!
//! Dimensions combine with AND, values within a multiselect dimension combine
//! with OR, and an empty selection leaves that dimension unfiltered.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::data::OrderLine;
use crate::error::{DashboardError, Result};
use crate::rfm::{RfmProfile, Segment};

/// Calendar-day range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(DashboardError::InvalidFilter(format!(
                "date range ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD,YYYY-MM-DD`
    pub fn parse(s: &str) -> Result<Self> {
        let (start, end) = s.split_once(',').ok_or_else(|| {
            DashboardError::InvalidFilter(format!(
                "date range '{}' must look like 2017-01-01,2017-12-31",
                s
            ))
        })?;
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let day = ts.date();
        day >= self.start && day <= self.end
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl FromStr for DateRange {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DashboardError::InvalidFilter(format!("bad date '{}': {}", s.trim(), e)))
}

/// The user's current filter selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub date_range: Option<DateRange>,
    pub categories: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub segments: BTreeSet<Segment>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    /// State codes are matched upper-case
    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states.extend(states.into_iter().map(|s| {
            let s: String = s.into();
            s.trim().to_uppercase()
        }));
        self
    }

    pub fn with_segments<I>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = Segment>,
    {
        self.segments.extend(segments);
        self
    }

    /// True when no dimension is restricted
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none()
            && self.categories.is_empty()
            && self.states.is_empty()
            && self.segments.is_empty()
    }

    pub fn matches(&self, line: &OrderLine) -> bool {
        if let Some(range) = &self.date_range {
            match line.purchased_at {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }
        if !self.categories.is_empty() && !self.categories.contains(&line.category) {
            return false;
        }
        if !self.states.is_empty() && !self.states.contains(&line.state) {
            return false;
        }
        if !self.segments.is_empty() {
            match line.segment {
                Some(segment) if self.segments.contains(&segment) => {}
                _ => return false,
            }
        }
        true
    }

    /// Lines satisfying every active dimension
    pub fn apply<'a, I>(&self, lines: I) -> Vec<&'a OrderLine>
    where
        I: IntoIterator<Item = &'a OrderLine>,
    {
        lines.into_iter().filter(|line| self.matches(line)).collect()
    }

    /// Profiles in the selected segments; other dimensions do not apply to profiles
    pub fn apply_profiles<'a, I>(&self, profiles: I) -> Vec<&'a RfmProfile>
    where
        I: IntoIterator<Item = &'a RfmProfile>,
    {
        profiles
            .into_iter()
            .filter(|p| self.segments.is_empty() || self.segments.contains(&p.segment))
            .collect()
    }

    /// Human-readable description of the restricted dimensions
    pub fn active_filters(&self) -> Vec<String> {
        let mut active = Vec::new();
        if !self.categories.is_empty() {
            active.push(format!("Categories: {} selected", self.categories.len()));
        }
        if !self.states.is_empty() {
            active.push(format!("States: {} selected", self.states.len()));
        }
        if !self.segments.is_empty() {
            active.push(format!("Segments: {} selected", self.segments.len()));
        }
        if let Some(range) = &self.date_range {
            active.push(format!("Dates: {} to {}", range.start, range.end));
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OrderStatus;

    const CHAMPIONS: Option<Segment> = Some(Segment::Champions);
    const LOYAL: Option<Segment> = Some(Segment::Loyal);
    const AT_RISK: Option<Segment> = Some(Segment::AtRisk);

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn line(
        order_id: &str,
        date: Option<&str>,
        category: &str,
        state: &str,
        segment: Option<Segment>,
    ) -> OrderLine {
        OrderLine {
            order_id: order_id.to_string(),
            customer_id: format!("cust-{}", order_id),
            purchased_at: date.map(|d| day(d).and_hms_opt(15, 30, 0).unwrap()),
            status: OrderStatus::Delivered,
            category: category.to_string(),
            state: state.to_string(),
            revenue: 10.0,
            segment,
        }
    }

    fn sample_lines() -> Vec<OrderLine> {
        vec![
            line("1", Some("2018-01-05"), "toys", "SP", CHAMPIONS),
            line("2", Some("2018-01-31"), "auto", "RJ", LOYAL),
            line("3", Some("2018-02-01"), "toys", "RJ", AT_RISK),
            line("4", None, "toys", "SP", CHAMPIONS),
            line("5", Some("2018-03-10"), "garden", "MG", None),
        ]
    }

    fn ids(lines: &[&OrderLine]) -> Vec<String> {
        lines.iter().map(|l| l.order_id.clone()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let lines = sample_lines();
        let filter = FilterSet::new();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&lines).len(), lines.len());
    }

    #[test]
    fn test_or_within_dimension() {
        let lines = sample_lines();
        let filter = FilterSet::new().with_categories(["auto", "garden"]);
        assert_eq!(ids(&filter.apply(&lines)), vec!["2", "5"]);
    }

    #[test]
    fn test_and_across_dimensions() {
        let lines = sample_lines();
        let filter = FilterSet::new()
            .with_categories(["toys"])
            .with_states(["rj"]);
        assert_eq!(ids(&filter.apply(&lines)), vec!["3"]);
    }

    #[test]
    fn test_date_range_end_day_inclusive() {
        let lines = sample_lines();
        let range = DateRange::new(day("2018-01-01"), day("2018-01-31")).unwrap();
        let filter = FilterSet::new().with_date_range(range);
        // line 4 has no timestamp and drops out
        assert_eq!(ids(&filter.apply(&lines)), vec!["1", "2"]);
    }

    #[test]
    fn test_segment_filter_requires_segment() {
        let lines = sample_lines();
        let filter = FilterSet::new()
            .with_segments([Segment::Champions, Segment::AtRisk]);
        assert_eq!(ids(&filter.apply(&lines)), vec!["1", "3", "4"]);
    }

    #[test]
    fn test_filter_idempotent() {
        let lines = sample_lines();
        let filter = FilterSet::new()
            .with_categories(["toys", "auto"])
            .with_date_range(DateRange::parse("2018-01-01,2018-02-28").unwrap());

        let once = filter.apply(&lines);
        let twice = filter.apply(once.iter().copied());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let lines = sample_lines();
        let filter = FilterSet::new().with_states(["AC"]);
        assert!(filter.apply(&lines).is_empty());
    }

    #[test]
    fn test_apply_profiles_by_segment() {
        let profile = |id: &str, segment| RfmProfile {
            customer_id: id.to_string(),
            recency: 1,
            frequency: 1,
            monetary: 1.0,
            scores: crate::rfm::RfmScores::new(1, 1, 1),
            segment,
        };
        let profiles = vec![
            profile("a", Segment::Loyal),
            profile("b", Segment::Potential),
        ];

        let all = FilterSet::new()
            .with_categories(["toys"])
            .apply_profiles(&profiles);
        assert_eq!(all.len(), 2);

        let loyal = FilterSet::new()
            .with_segments([Segment::Loyal])
            .apply_profiles(&profiles);
        assert_eq!(loyal.len(), 1);
        assert_eq!(loyal[0].customer_id, "a");
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse("2017-01-01, 2017-01-31").unwrap();
        assert_eq!(range.days(), 31);
        assert!(DateRange::parse("2017-02-01,2017-01-01").is_err());
        assert!(DateRange::parse("2017-02-01").is_err());
        assert!(DateRange::parse("yesterday,today").is_err());
    }

    #[test]
    fn test_active_filters() {
        let filter = FilterSet::new()
            .with_states(["SP", "RJ"])
            .with_date_range(DateRange::parse("2018-01-01,2018-01-31").unwrap());
        assert_eq!(
            filter.active_filters(),
            vec![
                "States: 2 selected".to_string(),
                "Dates: 2018-01-01 to 2018-01-31".to_string(),
            ]
        );
    }
}
