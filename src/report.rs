//! Human-readable rendering of [`SummaryStatistics`].

use std::fmt::Write;

use crate::pipeline::clean::RejectionCounts;
use crate::stats::{GroupStats, SummaryStatistics};

/// Renders the analysis report as Markdown-flavoured text.
///
/// `rejections` is `None` when the report is rebuilt from a persisted enhanced
/// table, where cleaning figures are no longer known.
pub fn render_report(stats: &SummaryStatistics, rejections: Option<&RejectionCounts>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, stats, rejections);
    out
}

fn write_report(
    out: &mut String,
    s: &SummaryStatistics,
    rejections: Option<&RejectionCounts>,
) -> std::fmt::Result {
    writeln!(out, "# Ride Fare Analysis Report")?;
    writeln!(out)?;

    writeln!(out, "## Dataset Overview")?;
    writeln!(out, "- **Total Records**: {}", s.record_count)?;
    match (s.first_pickup, s.last_pickup) {
        (Some(first), Some(last)) => writeln!(
            out,
            "- **Time Period**: {} to {}",
            first.format("%Y-%m-%d %H:%M:%S %:z"),
            last.format("%Y-%m-%d %H:%M:%S %:z")
        )?,
        _ => writeln!(out, "- **Time Period**: n/a")?,
    }
    writeln!(out)?;

    writeln!(out, "## Fare Statistics")?;
    writeln!(out, "- **Average Fare**: ${:.2}", s.fare.mean)?;
    writeln!(out, "- **Median Fare**: ${:.2}", s.fare.median)?;
    writeln!(out, "- **Fare Range**: ${:.2} - ${:.2}", s.fare.min, s.fare.max)?;
    writeln!(out, "- **Standard Deviation**: ${:.2}", s.fare.std_dev)?;
    writeln!(
        out,
        "- **Interquartile Range**: ${:.2} - ${:.2}",
        s.fare.q1, s.fare.q3
    )?;
    writeln!(out)?;

    writeln!(out, "## Time-based Patterns")?;
    writeln!(
        out,
        "- **Peak Hours (07-09, 17-19)**: {} rides, ${:.2} avg",
        s.peak.count, s.peak.mean_fare
    )?;
    writeln!(
        out,
        "- **Off-Peak**: {} rides, ${:.2} avg",
        s.off_peak.count, s.off_peak.mean_fare
    )?;
    if let Some((day, g)) = s.busiest_weekday() {
        writeln!(out, "- **Busiest Day**: {day} ({} rides)", g.count)?;
    }
    if let Some((day, g)) = s.highest_fare_weekday() {
        writeln!(
            out,
            "- **Highest Fare Day**: {day} (${:.2} avg)",
            g.mean_fare
        )?;
    }
    if let Some((hour, g)) = s.busiest_hour() {
        writeln!(out, "- **Busiest Hour**: {hour:02}:00 ({} rides)", g.count)?;
    }
    if let Some((hour, g)) = s.highest_fare_hour() {
        writeln!(out, "- **Highest Fare Hour**: {hour:02}:00 (${:.2} avg)", g.mean_fare)?;
    }
    writeln!(out)?;

    writeln!(out, "### By Season")?;
    for (season, g) in &s.by_season {
        write_group(out, season.as_str(), g)?;
    }
    writeln!(out)?;

    writeln!(out, "### By Time of Day")?;
    for (category, g) in &s.by_time_category {
        write_group(out, category.as_str(), g)?;
    }
    writeln!(out)?;

    writeln!(out, "### By Day of Week")?;
    for (day, g) in &s.by_weekday {
        write_group(out, day.name(), g)?;
    }
    writeln!(out)?;

    writeln!(out, "### By Hour")?;
    for (hour, g) in &s.by_hour {
        write_group(out, &format!("{hour:02}:00"), g)?;
    }
    writeln!(out)?;

    writeln!(out, "### By Month")?;
    for (month, g) in &s.by_month {
        write_group(out, &format!("{month:02}"), g)?;
    }
    writeln!(out)?;

    writeln!(out, "## Passenger Patterns")?;
    writeln!(out, "- **Most Common**: {} passenger(s) per ride", s.passengers.mode)?;
    writeln!(out, "- **Average Passengers**: {:.1}", s.passengers.mean)?;
    writeln!(out, "- **Max Passengers**: {}", s.passengers.max)?;
    for (count, g) in &s.by_passenger_count {
        write_group(out, &format!("{count} passenger(s)"), g)?;
    }
    writeln!(out)?;

    writeln!(out, "## Distance Analysis")?;
    writeln!(
        out,
        "- **Average Distance**: {:.4} degrees ({:.2} km)",
        s.distance.mean_degrees, s.distance.mean_km
    )?;
    writeln!(
        out,
        "- **Correlation with Fare**: {:.3}",
        s.distance.fare_correlation
    )?;
    writeln!(out)?;

    writeln!(out, "## Data Quality")?;
    if let Some(r) = rejections {
        let raw_total = s.record_count + r.total();
        writeln!(out, "- **Raw Records**: {raw_total}")?;
        writeln!(
            out,
            "- **Rejected Records**: {} ({:.1}%)",
            r.total(),
            SummaryStatistics::pct(r.total(), raw_total)
        )?;
        writeln!(out, "  - fare out of range: {}", r.fare_range)?;
        writeln!(out, "  - invalid coordinates: {}", r.coordinate_range)?;
        writeln!(out, "  - outside operating area: {}", r.operating_area)?;
        writeln!(out, "  - passenger count out of range: {}", r.passenger_count)?;
        writeln!(out, "  - unparseable timestamp: {}", r.timestamp)?;
    }
    writeln!(
        out,
        "- **Outliers**: {} records ({:.1}%), fences ${:.2} - ${:.2}",
        s.outliers.count, s.outliers.percent, s.outliers.lower_fence, s.outliers.upper_fence
    )?;

    Ok(())
}

fn write_group(out: &mut String, label: &str, g: &GroupStats) -> std::fmt::Result {
    writeln!(out, "- {label}: {} rides, ${:.2} avg", g.count, g.mean_fare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::enhance::enhance_record;
    use crate::pipeline::types::CleanRecord;
    use crate::stats::summarize;
    use chrono::DateTime;

    fn ride(timestamp: &str, fare: f64) -> crate::pipeline::types::EnhancedRecord {
        enhance_record(&CleanRecord {
            key: None,
            fare_amount: fare,
            pickup_datetime: DateTime::parse_from_rfc3339(timestamp).unwrap(),
            pickup_longitude: -73.99,
            pickup_latitude: 40.75,
            dropoff_longitude: -73.98,
            dropoff_latitude: 40.76,
            passenger_count: 1,
        })
    }

    #[test]
    fn test_report_contains_key_figures() {
        let records = vec![
            ride("2012-01-06T08:00:00+00:00", 10.0),
            ride("2012-01-06T09:00:00+00:00", 20.0),
            ride("2012-01-07T22:00:00+00:00", 30.0),
        ];
        let stats = summarize(&records);
        let rejections = RejectionCounts {
            fare_range: 1,
            coordinate_range: 2,
            ..Default::default()
        };

        let report = render_report(&stats, Some(&rejections));

        assert!(report.contains("- **Total Records**: 3"));
        assert!(report.contains("- **Average Fare**: $20.00"));
        assert!(report.contains("- **Busiest Day**: Friday (2 rides)"));
        assert!(report.contains("- **Highest Fare Day**: Saturday ($30.00 avg)"));
        assert!(report.contains("- **Raw Records**: 6"));
        assert!(report.contains("- **Rejected Records**: 3 (50.0%)"));
        assert!(report.contains("  - invalid coordinates: 2"));
        assert!(report.contains("- winter: 3 rides, $20.00 avg"));
        assert!(report.contains("- **Outliers**: 0 records (0.0%)"));
    }

    #[test]
    fn test_report_without_rejections() {
        let stats = summarize(&[ride("2012-06-06T12:00:00+00:00", 8.0)]);
        let report = render_report(&stats, None);

        assert!(!report.contains("Rejected Records"));
        assert!(report.contains("## Data Quality"));
    }

    #[test]
    fn test_report_for_empty_summary() {
        let report = render_report(&SummaryStatistics::default(), None);
        assert!(report.contains("- **Time Period**: n/a"));
        assert!(!report.contains("Busiest Day"));
    }

    #[test]
    fn test_day_of_week_section_runs_monday_first() {
        let records = vec![
            ride("2012-01-08T10:00:00+00:00", 10.0), // Sunday
            ride("2012-01-04T10:00:00+00:00", 10.0), // Wednesday
            ride("2012-01-02T10:00:00+00:00", 10.0), // Monday
        ];
        let report = render_report(&summarize(&records), None);

        let section = report.split("### By Day of Week").nth(1).unwrap();
        let monday = section.find("- Monday:").unwrap();
        let wednesday = section.find("- Wednesday:").unwrap();
        let sunday = section.find("- Sunday:").unwrap();
        assert!(monday < wednesday && wednesday < sunday);
    }
}
