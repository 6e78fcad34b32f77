use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::pipeline::types::{DayOfWeek, EnhancedRecord, Season, TimeCategory};
use crate::pipeline::utility::{mean, pearson, quantile_sorted, sample_stddev};

/// Multiplier applied to the interquartile range to place the outlier fences.
pub const IQR_FENCE_FACTOR: f64 = 1.5;

/// Aggregate view over a full set of enhanced rides.
///
/// Every grouped map is ordered, so two summaries of the same records compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub record_count: usize,
    pub first_pickup: Option<DateTime<FixedOffset>>,
    pub last_pickup: Option<DateTime<FixedOffset>>,

    pub fare: FareStats,
    pub outliers: OutlierStats,

    // grouped by time
    pub by_hour: BTreeMap<u32, GroupStats>,
    /// Monday first.
    pub by_weekday: BTreeMap<DayOfWeek, GroupStats>,
    pub by_month: BTreeMap<u32, GroupStats>,
    pub by_season: BTreeMap<Season, GroupStats>,
    pub by_time_category: BTreeMap<TimeCategory, GroupStats>,
    pub peak: GroupStats,
    pub off_peak: GroupStats,

    // passengers and distance
    pub by_passenger_count: BTreeMap<u8, GroupStats>,
    pub passengers: PassengerStats,
    pub distance: DistanceStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FareStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
}

/// Fare outliers under the `[Q1 − 1.5·IQR, Q3 + 1.5·IQR]` rule, fenced once over the whole set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierStats {
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub count: usize,
    pub percent: f64,
}

impl OutlierStats {
    pub fn is_outlier(&self, fare: f64) -> bool {
        fare < self.lower_fence || fare > self.upper_fence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub mean_fare: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassengerStats {
    /// Most common passenger count; the smallest wins a tie.
    pub mode: u8,
    pub mean: f64,
    pub max: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistanceStats {
    pub mean_degrees: f64,
    pub mean_km: f64,
    /// Pearson correlation between fare and distance in degrees.
    pub fare_correlation: f64,
}

#[derive(Default)]
struct GroupAccumulator {
    count: usize,
    fare_sum: f64,
}

impl GroupAccumulator {
    fn push(&mut self, fare: f64) {
        self.count += 1;
        self.fare_sum += fare;
    }

    fn finish(&self) -> GroupStats {
        GroupStats {
            count: self.count,
            mean_fare: if self.count == 0 {
                0.0
            } else {
                self.fare_sum / self.count as f64
            },
        }
    }
}

fn finish_groups<K: Ord + Copy>(groups: &BTreeMap<K, GroupAccumulator>) -> BTreeMap<K, GroupStats> {
    groups.iter().map(|(k, acc)| (*k, acc.finish())).collect()
}

/// Computes [`SummaryStatistics`] over `records`. Does not modify them.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn summarize(records: &[EnhancedRecord]) -> SummaryStatistics {
    let stats = SummaryStatistics::from_records(records);
    info!(
        records = stats.record_count,
        mean_fare = stats.fare.mean,
        outliers = stats.outliers.count,
        "Summary statistics computed"
    );
    stats
}

impl SummaryStatistics {
    pub fn from_records(records: &[EnhancedRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let fares: Vec<f64> = records.iter().map(|r| r.fare_amount).collect();
        let distances: Vec<f64> = records.iter().map(|r| r.distance).collect();
        let distances_km: Vec<f64> = records.iter().map(|r| r.distance_km).collect();
        let passenger_counts: Vec<f64> = records.iter().map(|r| r.passenger_count as f64).collect();

        let mut sorted = fares.clone();
        sorted.sort_by(f64::total_cmp);

        let fare_mean = mean(&fares);
        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let fare = FareStats {
            mean: fare_mean,
            median: quantile_sorted(&sorted, 0.5),
            std_dev: sample_stddev(&fares, fare_mean),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            q1,
            q3,
        };

        let iqr = q3 - q1;
        let mut outliers = OutlierStats {
            lower_fence: q1 - IQR_FENCE_FACTOR * iqr,
            upper_fence: q3 + IQR_FENCE_FACTOR * iqr,
            ..Default::default()
        };
        outliers.count = fares.iter().filter(|f| outliers.is_outlier(**f)).count();
        outliers.percent = Self::pct(outliers.count, records.len());

        let mut by_hour: BTreeMap<u32, GroupAccumulator> = BTreeMap::new();
        let mut by_weekday: BTreeMap<DayOfWeek, GroupAccumulator> = BTreeMap::new();
        let mut by_month: BTreeMap<u32, GroupAccumulator> = BTreeMap::new();
        let mut by_season: BTreeMap<Season, GroupAccumulator> = BTreeMap::new();
        let mut by_time_category: BTreeMap<TimeCategory, GroupAccumulator> = BTreeMap::new();
        let mut by_passenger_count: BTreeMap<u8, GroupAccumulator> = BTreeMap::new();
        let mut peak = GroupAccumulator::default();
        let mut off_peak = GroupAccumulator::default();

        let mut first_pickup = records[0].pickup_datetime;
        let mut last_pickup = records[0].pickup_datetime;

        for r in records {
            let fare = r.fare_amount;
            by_hour.entry(r.hour).or_default().push(fare);
            by_weekday.entry(DayOfWeek(r.weekday)).or_default().push(fare);
            by_month.entry(r.month).or_default().push(fare);
            by_season.entry(r.season).or_default().push(fare);
            by_time_category.entry(r.time_category).or_default().push(fare);
            by_passenger_count
                .entry(r.passenger_count)
                .or_default()
                .push(fare);

            if r.is_peak {
                peak.push(fare);
            } else {
                off_peak.push(fare);
            }

            first_pickup = first_pickup.min(r.pickup_datetime);
            last_pickup = last_pickup.max(r.pickup_datetime);
        }

        let by_passenger_count = finish_groups(&by_passenger_count);
        let mut mode = (0u8, 0usize);
        for (count, group) in &by_passenger_count {
            if group.count > mode.1 {
                mode = (*count, group.count);
            }
        }
        let passengers = PassengerStats {
            mode: mode.0,
            mean: mean(&passenger_counts),
            max: by_passenger_count.keys().next_back().copied().unwrap_or(0),
        };

        let distance = DistanceStats {
            mean_degrees: mean(&distances),
            mean_km: mean(&distances_km),
            fare_correlation: pearson(&fares, &distances),
        };

        SummaryStatistics {
            record_count: records.len(),
            first_pickup: Some(first_pickup),
            last_pickup: Some(last_pickup),
            fare,
            outliers,
            by_hour: finish_groups(&by_hour),
            by_weekday: finish_groups(&by_weekday),
            by_month: finish_groups(&by_month),
            by_season: finish_groups(&by_season),
            by_time_category: finish_groups(&by_time_category),
            peak: peak.finish(),
            off_peak: off_peak.finish(),
            by_passenger_count,
            passengers,
            distance,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Weekday with the most rides.
    pub fn busiest_weekday(&self) -> Option<(DayOfWeek, &GroupStats)> {
        max_group_by(&self.by_weekday, |g| g.count as f64)
    }

    /// Weekday with the highest mean fare.
    pub fn highest_fare_weekday(&self) -> Option<(DayOfWeek, &GroupStats)> {
        max_group_by(&self.by_weekday, |g| g.mean_fare)
    }

    pub fn busiest_hour(&self) -> Option<(u32, &GroupStats)> {
        max_group_by(&self.by_hour, |g| g.count as f64)
    }

    pub fn highest_fare_hour(&self) -> Option<(u32, &GroupStats)> {
        max_group_by(&self.by_hour, |g| g.mean_fare)
    }
}

/// First key (in map order) whose group maximizes `metric`.
fn max_group_by<K: Copy, F: Fn(&GroupStats) -> f64>(
    groups: &BTreeMap<K, GroupStats>,
    metric: F,
) -> Option<(K, &GroupStats)> {
    let mut best: Option<(K, &GroupStats)> = None;
    for (k, g) in groups {
        match best {
            Some((_, b)) if metric(g) <= metric(b) => {}
            _ => best = Some((*k, g)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::enhance::enhance_record;
    use crate::pipeline::types::CleanRecord;
    use chrono::Weekday;

    fn ride(timestamp: &str, fare: f64, passengers: u8) -> EnhancedRecord {
        enhance_record(&CleanRecord {
            key: None,
            fare_amount: fare,
            pickup_datetime: DateTime::parse_from_rfc3339(timestamp).unwrap(),
            pickup_longitude: -73.99,
            pickup_latitude: 40.75,
            dropoff_longitude: -73.99 + fare / 1000.0,
            dropoff_latitude: 40.75,
            passenger_count: passengers,
        })
    }

    fn sample() -> Vec<EnhancedRecord> {
        vec![
            // Monday 2012-01-02
            ride("2012-01-02T08:10:00+00:00", 10.0, 1),
            ride("2012-01-02T08:40:00+00:00", 12.0, 1),
            // Friday 2012-07-06
            ride("2012-07-06T13:00:00+00:00", 8.0, 2),
            ride("2012-07-06T18:30:00+00:00", 14.0, 1),
            // Saturday 2012-10-13
            ride("2012-10-13T23:00:00+00:00", 100.0, 5),
        ]
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(SummaryStatistics::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(SummaryStatistics::pct(50, 100), 50.0);
        assert_eq!(SummaryStatistics::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_records_empty() {
        let stats = summarize(&[]);
        assert_eq!(stats.record_count, 0);
        assert!(stats.first_pickup.is_none());
        assert!(stats.by_hour.is_empty());
    }

    #[test]
    fn test_fare_statistics() {
        let stats = summarize(&sample());

        assert_eq!(stats.record_count, 5);
        assert!((stats.fare.mean - 28.8).abs() < 1e-9);
        assert_eq!(stats.fare.median, 12.0);
        assert_eq!(stats.fare.min, 8.0);
        assert_eq!(stats.fare.max, 100.0);
        assert_eq!(stats.fare.q1, 10.0);
        assert_eq!(stats.fare.q3, 14.0);
        // sum of squared deviations = 6356.8, / 4
        assert!((stats.fare.std_dev - 1589.2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_outliers_use_global_fences() {
        let records = sample();
        let stats = summarize(&records);

        assert_eq!(stats.outliers.lower_fence, 4.0);
        assert_eq!(stats.outliers.upper_fence, 20.0);
        assert_eq!(stats.outliers.count, 1);
        assert_eq!(stats.outliers.percent, 20.0);
        let flags: Vec<bool> = records
            .iter()
            .map(|r| stats.outliers.is_outlier(r.fare_amount))
            .collect();
        assert_eq!(flags, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_grouped_aggregates() {
        let stats = summarize(&sample());

        let eight = &stats.by_hour[&8];
        assert_eq!(eight.count, 2);
        assert_eq!(eight.mean_fare, 11.0);

        assert_eq!(stats.by_weekday[&DayOfWeek(Weekday::Mon)].count, 2);
        assert_eq!(stats.by_weekday[&DayOfWeek(Weekday::Fri)].count, 2);
        assert_eq!(stats.by_weekday[&DayOfWeek(Weekday::Sat)].count, 1);
        let days: Vec<_> = stats.by_weekday.keys().map(|d| d.name()).collect();
        assert_eq!(days, vec!["Monday", "Friday", "Saturday"]);

        assert_eq!(stats.by_season[&Season::Winter].count, 2);
        assert_eq!(stats.by_season[&Season::Summer].count, 2);
        assert_eq!(stats.by_season[&Season::Autumn].count, 1);
        assert!(!stats.by_season.contains_key(&Season::Spring));

        assert_eq!(stats.peak.count, 3);
        assert_eq!(stats.off_peak.count, 2);
        assert_eq!(stats.by_time_category[&TimeCategory::Night].mean_fare, 100.0);
    }

    #[test]
    fn test_top_groups() {
        let stats = summarize(&sample());

        // Monday and Friday tie on count; the earlier day wins.
        assert_eq!(stats.busiest_weekday().unwrap().0, DayOfWeek(Weekday::Mon));
        assert_eq!(
            stats.highest_fare_weekday().unwrap().0,
            DayOfWeek(Weekday::Sat)
        );
        assert_eq!(stats.busiest_hour().unwrap().0, 8);
        assert_eq!(stats.highest_fare_hour().unwrap().0, 23);
    }

    #[test]
    fn test_passenger_and_distance_stats() {
        let stats = summarize(&sample());

        assert_eq!(stats.passengers.mode, 1);
        assert_eq!(stats.passengers.max, 5);
        assert_eq!(stats.passengers.mean, 2.0);
        // dropoff offset is proportional to fare, so correlation is perfect
        assert!((stats.distance.fare_correlation - 1.0).abs() < 1e-9);
        assert!(stats.distance.mean_km > 0.0);
    }

    #[test]
    fn test_period_bounds() {
        let stats = summarize(&sample());
        assert_eq!(
            stats.first_pickup.unwrap().to_rfc3339(),
            "2012-01-02T08:10:00+00:00"
        );
        assert_eq!(
            stats.last_pickup.unwrap().to_rfc3339(),
            "2012-10-13T23:00:00+00:00"
        );
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let records = sample();
        assert_eq!(summarize(&records), summarize(&records));
    }
}
