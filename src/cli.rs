//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::filter::{DateRange, FilterSet};
use crate::rfm::{Segment, StatusPolicy};

/// E-commerce dashboard: RFM customer segments, filters, KPIs and charts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the Olist CSV files
    #[arg(short, long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Analysis date for recency: YYYY-MM-DD, a timestamp, or "latest"
    /// (one day after the most recent qualifying order)
    #[arg(short, long, default_value = "latest")]
    pub reference_date: String,

    /// Purchase date range, both days inclusive
    /// Example: --date-range 2017-01-01,2017-12-31
    #[arg(long)]
    pub date_range: Option<String>,

    /// Product categories (English names) to keep; repeat or comma-separate
    #[arg(short, long = "category", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Customer states to keep, e.g. SP,RJ
    #[arg(short, long = "state", value_delimiter = ',')]
    pub states: Vec<String>,

    /// Customer segments to keep: Champions, Loyal, "At Risk", Potential
    #[arg(long = "segment", value_delimiter = ',')]
    pub segments: Vec<String>,

    /// Which order statuses count towards RFM: all, exclude-cancelled, delivered-only
    #[arg(long)]
    pub status_policy: Option<String>,

    /// Dashboard config file (TOML); the embedded default is used otherwise
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of filtered rows to print as a preview table (0 hides it)
    #[arg(long, default_value_t = 100)]
    pub preview: usize,

    /// Directory the PNG charts are written to
    #[arg(short, long, default_value = "charts")]
    pub output_dir: PathBuf,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the filter selection from the command line
    pub fn filter_set(&self) -> crate::Result<FilterSet> {
        let segments = self
            .segments
            .iter()
            .map(|s| s.parse::<Segment>())
            .collect::<crate::Result<Vec<_>>>()?;

        let mut filters = FilterSet::new()
            .with_categories(self.categories.iter().map(|c| c.trim().to_string()))
            .with_states(self.states.iter().cloned())
            .with_segments(segments);

        if let Some(range) = &self.date_range {
            filters = filters.with_date_range(DateRange::parse(range)?);
        }
        Ok(filters)
    }

    /// Status policy override, if one was given
    pub fn status_policy(&self) -> crate::Result<Option<StatusPolicy>> {
        self.status_policy
            .as_deref()
            .map(str::parse::<StatusPolicy>)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["olistboard"]).unwrap();
        assert_eq!(args.data_dir, PathBuf::from("data"));
        assert_eq!(args.reference_date, "latest");
        assert!(!args.no_charts);
        assert_eq!(args.preview, 100);
        assert!(args.filter_set().unwrap().is_empty());
        assert_eq!(args.status_policy().unwrap(), None);
    }

    #[test]
    fn test_filter_set_from_args() {
        let args = Args::try_parse_from([
            "olistboard",
            "--category",
            "toys,auto",
            "--category",
            "garden_tools",
            "-s",
            "sp",
            "--segment",
            "At Risk",
            "--segment",
            "champions",
            "--date-range",
            "2017-01-01,2017-06-30",
        ])
        .unwrap();

        let filters = args.filter_set().unwrap();
        assert_eq!(filters.categories.len(), 3);
        assert!(filters.categories.contains("garden_tools"));
        assert!(filters.states.contains("SP"));
        assert!(filters.segments.contains(&Segment::AtRisk));
        assert!(filters.segments.contains(&Segment::Champions));
        assert_eq!(filters.date_range.unwrap().days(), 181);
    }

    #[test]
    fn test_invalid_filter_values() {
        let args = Args::try_parse_from(["olistboard", "--segment", "whales"]).unwrap();
        assert!(args.filter_set().is_err());

        let args = Args::try_parse_from(["olistboard", "--date-range", "2017-06-30"]).unwrap();
        assert!(args.filter_set().is_err());
    }

    #[test]
    fn test_preview_rows() {
        let args = Args::try_parse_from(["olistboard", "--preview", "0"]).unwrap();
        assert_eq!(args.preview, 0);

        assert!(Args::try_parse_from(["olistboard", "--preview", "-3"]).is_err());
    }

    #[test]
    fn test_status_policy_override() {
        let args =
            Args::try_parse_from(["olistboard", "--status-policy", "delivered-only"]).unwrap();
        assert_eq!(
            args.status_policy().unwrap(),
            Some(StatusPolicy::DeliveredOnly)
        );

        let args = Args::try_parse_from(["olistboard", "--status-policy", "maybe"]).unwrap();
        assert!(args.status_policy().is_err());
    }
}
