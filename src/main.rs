//! olistboard: E-commerce dashboard over the Olist dataset
//!
//! This is the main entrypoint that orchestrates data loading, customer
//! segmentation, filtering, the console report and chart rendering.

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use olistboard::{
    compute_profiles, load_config, preview, print_preview, print_report, render_charts,
    segment_index, summarize, Args, DashboardError, Dataset, DateRange, FilterSet, RfmProfile,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        println!("olistboard - E-Commerce Dashboard");
        println!("=================================\n");
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(policy) = args.status_policy()? {
        config.segmentation.status_policy = policy;
    }
    let filters = args.filter_set()?;

    let start_time = Instant::now();

    // Step 1: Load data
    let mut dataset = Dataset::load(&args.data_dir)
        .with_context(|| format!("loading data from {}", args.data_dir.display()))?;
    println!(
        "✓ Data loaded: {} order lines, {} orders",
        dataset.lines.len(),
        dataset.orders.len()
    );
    if args.verbose {
        println!("  Loading time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    // Step 2: Segment customers
    let profiles = match compute_profiles(
        &dataset.orders,
        &args.reference_date,
        &config.segmentation,
    ) {
        Ok(profiles) => profiles,
        Err(err @ DashboardError::InvalidReferenceDate(_)) => {
            tracing::error!(%err, "customer segmentation skipped");
            eprintln!("⚠ {}. Customer segments are unavailable for this run.", err);
            Vec::new()
        }
        Err(err) => return Err(err.into()),
    };
    println!("✓ Customers segmented: {} profiles", profiles.len());
    dataset.attach_segments(&segment_index(&profiles));

    // Step 3: Apply filters
    warn_unknown_selections(&dataset, &filters);
    let filtered = filters.apply(&dataset.lines);
    let visible_customers: HashSet<&str> =
        filtered.iter().map(|l| l.customer_id.as_str()).collect();
    let selected_profiles: Vec<&RfmProfile> = filters
        .apply_profiles(&profiles)
        .into_iter()
        .filter(|p| visible_customers.contains(p.customer_id.as_str()))
        .collect();
    tracing::info!(
        lines = filtered.len(),
        profiles = selected_profiles.len(),
        "filters applied"
    );

    // Step 4: Report
    let summary = summarize(
        &filtered,
        &dataset.lines,
        &selected_profiles,
        &config.display,
    );
    let period = filters.date_range.or_else(|| {
        dataset
            .date_bounds()
            .and_then(|(first, last)| DateRange::new(first.date(), last.date()).ok())
    });
    print_report(&summary, &filters, period, &dataset.category_counts);
    print_preview(&preview(&filtered, args.preview), filtered.len());

    // Step 5: Charts
    if !args.no_charts {
        let written = render_charts(&summary, &args.output_dir)?;
        if !written.is_empty() {
            println!("\n✓ Charts written to {}", args.output_dir.display());
            for path in written {
                println!("  {}", path.display());
            }
        }
    }

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Logs go to stderr so the report on stdout stays clean. `RUST_LOG` wins
/// over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn warn_unknown_selections(dataset: &Dataset, filters: &FilterSet) {
    let categories = dataset.categories();
    for category in filters
        .categories
        .iter()
        .filter(|c| !categories.contains(c.as_str()))
    {
        tracing::warn!(%category, "selected category does not occur in the data");
    }
    let states = dataset.states();
    for state in filters
        .states
        .iter()
        .filter(|s| !states.contains(s.as_str()))
    {
        tracing::warn!(%state, "selected state does not occur in the data");
    }
}
