//! Statistics over readings and bills
//!
//! Every function here is total: empty or malformed input gives a zero,
//! an empty vector or an all-zero record, never a panic. Non-finite
//! values are read as 0.
//!
//! Rounding follows the figures shown on reports: 2 decimals for most
//! values, 3 for correlation, whole percent for the payment rate.

use crate::core::{
    coerce_number, round2, round3, Bill, BillingStats, ConsumptionStats, MeterReading,
    MonthlyTotal, PaymentStatus, TrendAnalysis, TrendDirection,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Slope magnitude below which a series counts as stable
const TREND_THRESHOLD: f64 = 0.1;

/// Arithmetic mean, rounded to 2 decimals
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let sum: f64 = xs.iter().copied().map(coerce_number).sum();
    round2(sum / xs.len() as f64)
}

/// Median, rounded to 2 decimals
pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let sorted = sorted_values(xs);
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        round2((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        round2(sorted[mid])
    }
}

/// Population standard deviation.
///
/// Deviations are taken from the rounded mean and the variance is itself
/// a rounded mean, so results match the figures already on reports.
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let avg = mean(xs);
    let squared: Vec<f64> = xs
        .iter()
        .map(|&x| (coerce_number(x) - avg).powi(2))
        .collect();
    round2(mean(&squared).sqrt())
}

/// Percentage change from `old` to `new`.
///
/// From zero, any increase counts as 100%.
pub fn percentage_change(old: f64, new: f64) -> f64 {
    let (old, new) = (coerce_number(old), coerce_number(new));
    if old == 0.0 {
        return if new > 0.0 { 100.0 } else { 0.0 };
    }
    round2((new - old) / old * 100.0)
}

/// Percentage change between the first and last value
pub fn growth_rate(values: &[f64]) -> f64 {
    match values {
        [first, .., last] => percentage_change(*first, *last),
        _ => 0.0,
    }
}

/// Trailing moving average; one value per full window
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values.windows(window).map(mean).collect()
}

/// Percentile by linear interpolation between closest ranks.
///
/// `p` is clamped to `[0, 100]`. Exact ranks return the element as is;
/// interpolated values are rounded to 2 decimals.
pub fn percentile(xs: &[f64], p: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let sorted = sorted_values(xs);
    let p = coerce_number(p).clamp(0.0, 100.0);
    let index = (p / 100.0) * (sorted.len() - 1) as f64;

    if index.fract() == 0.0 {
        return sorted[index as usize];
    }

    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let weight = index - index.floor();
    round2(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

/// Pearson correlation coefficient, rounded to 3 decimals
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return 0.0;
    }
    let n = x.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for (&a, &b) in x.iter().zip(y) {
        let (a, b) = (coerce_number(a), coerce_number(b));
        sum_x += a;
        sum_y += b;
        sum_xy += a * b;
        sum_x2 += a * a;
        sum_y2 += b * b;
    }

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();

    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    round3(numerator / denominator)
}

/// Linear trend over an ordered series
pub fn trend(values: &[f64]) -> TrendAnalysis {
    if values.len() < 2 {
        return TrendAnalysis {
            trend: TrendDirection::Stable,
            slope: 0.0,
            strength: 0.0,
        };
    }

    let index: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let r = correlation(&index, values);
    let index_spread = std_dev(&index);
    let slope = if index_spread == 0.0 {
        0.0
    } else {
        r * std_dev(values) / index_spread
    };

    let trend = if slope > TREND_THRESHOLD {
        TrendDirection::Increasing
    } else if slope < -TREND_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    TrendAnalysis {
        trend,
        slope,
        strength: r.abs(),
    }
}

/// Summary of units consumed across readings
pub fn consumption_stats(readings: &[MeterReading]) -> ConsumptionStats {
    if readings.is_empty() {
        return ConsumptionStats::default();
    }
    let units: Vec<f64> = readings.iter().map(MeterReading::effective_units).collect();

    ConsumptionStats {
        count: units.len(),
        total: round2(units.iter().sum()),
        mean: mean(&units),
        median: median(&units),
        min: units.iter().copied().fold(f64::INFINITY, f64::min),
        max: units.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev: std_dev(&units),
        q25: percentile(&units, 25.0),
        q75: percentile(&units, 75.0),
    }
}

/// Summary of amounts across bills, split by payment status
pub fn billing_stats(bills: &[Bill]) -> BillingStats {
    if bills.is_empty() {
        return BillingStats::default();
    }
    let amounts: Vec<f64> = bills.iter().map(|b| coerce_number(b.amount)).collect();
    let amount_with = |status: PaymentStatus| -> f64 {
        round2(
            bills
                .iter()
                .filter(|b| b.payment_status == status)
                .map(|b| coerce_number(b.amount))
                .sum(),
        )
    };
    let paid_count = bills
        .iter()
        .filter(|b| b.payment_status == PaymentStatus::Paid)
        .count();

    BillingStats {
        total_bills: bills.len(),
        total_amount: round2(amounts.iter().sum()),
        average_amount: mean(&amounts),
        paid_amount: amount_with(PaymentStatus::Paid),
        unpaid_amount: amount_with(PaymentStatus::Unpaid),
        overdue_amount: amount_with(PaymentStatus::Overdue),
        payment_rate: (paid_count as f64 / bills.len() as f64 * 100.0).round(),
    }
}

/// Units consumed per calendar month, oldest first
pub fn monthly_consumption(readings: &[MeterReading]) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for reading in readings {
        let key = reading.reading_date.format("%Y-%m").to_string();
        let entry = months.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += reading.effective_units();
    }

    months
        .into_iter()
        .map(|(month, (count, units))| MonthlyTotal {
            month,
            readings: count,
            units: round2(units),
        })
        .collect()
}

/// Units consumed per connection. Readings without a connection are skipped.
pub fn consumption_by_connection(readings: &[MeterReading]) -> BTreeMap<i64, f64> {
    let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
    for reading in readings {
        if let Some(id) = reading.connection_id {
            *totals.entry(id).or_insert(0.0) += reading.effective_units();
        }
    }
    for total in totals.values_mut() {
        *total = round2(*total);
    }
    totals
}

fn sorted_values(xs: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = xs.iter().copied().map(coerce_number).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn reading(connection: i64, date: &str, units: f64) -> MeterReading {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        MeterReading::new(connection, date, units)
    }

    fn bill(amount: f64, status: PaymentStatus) -> Bill {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Bill {
            id: None,
            bill_number: "BILL-TEST".into(),
            bill_date: date,
            due_date: date,
            units_consumed: 0.0,
            rate_per_unit: 5.5,
            base_amount: 0.0,
            tax_amount: 0.0,
            service_charge: 10.0,
            amount,
            payment_status: status,
            meter_reading_id: None,
            connection_id: None,
            user_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[10.0, 20.0]), 15.0);
        assert_eq!(mean(&[1.0, 2.0, 2.0]), 1.67);
    }

    #[test]
    fn test_mean_coerces_nan() {
        assert_eq!(mean(&[f64::NAN, 10.0]), 5.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[1.234]), 1.23);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(std_dev(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        // Variance 2/3 is rounded to 0.67 before the square root
        assert_eq!(std_dev(&[1.0, 2.0, 3.0]), round2(0.67f64.sqrt()));
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(0.0, 5.0), 100.0);
        assert_eq!(percentage_change(0.0, 0.0), 0.0);
        assert_eq!(percentage_change(0.0, -3.0), 0.0);
        assert_eq!(percentage_change(100.0, 150.0), 50.0);
        assert_eq!(percentage_change(200.0, 150.0), -25.0);
    }

    #[test]
    fn test_growth_rate() {
        assert_eq!(growth_rate(&[]), 0.0);
        assert_eq!(growth_rate(&[42.0]), 0.0);
        assert_eq!(growth_rate(&[100.0, 10.0, 125.0]), 25.0);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), vec![2.0, 3.0, 4.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 3), Vec::<f64>::new());
        assert_eq!(moving_average(&[1.0, 2.0], 0), Vec::<f64>::new());
        assert_eq!(moving_average(&[1.0, 2.0, 3.0], 3), vec![2.0]);
    }

    #[test]
    fn test_percentile() {
        let xs = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&xs, 0.0), 1.0);
        assert_eq!(percentile(&xs, 25.0), 2.0);
        assert_eq!(percentile(&xs, 100.0), 5.0);
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 90.0), 37.0);
        assert_eq!(percentile(&xs, 250.0), 5.0);
    }

    #[test]
    fn test_percentile_50_agrees_with_median() {
        let samples: [&[f64]; 4] = [
            &[1.0, 2.0, 3.0],
            &[1.0, 2.0, 3.0, 4.0],
            &[12.5, 3.25, 8.0, 40.75, 19.5, 7.0],
            &[0.0],
        ];
        for xs in samples {
            assert!((percentile(xs, 50.0) - median(xs)).abs() <= 0.005, "{:?}", xs);
        }
    }

    #[test]
    fn test_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let linear: Vec<f64> = x.iter().map(|v| 2.0 * v + 3.0).collect();
        let negated: Vec<f64> = x.iter().map(|v| -v).collect();

        assert_eq!(correlation(&x, &linear), 1.0);
        assert_eq!(correlation(&x, &negated), -1.0);
        assert_eq!(correlation(&x, &[1.0, 1.0, 1.0, 1.0, 1.0]), 0.0);
        assert_eq!(correlation(&x, &[1.0, 2.0]), 0.0);
        assert_eq!(correlation(&[], &[]), 0.0);
    }

    #[test]
    fn test_correlation_rounds_to_three_places() {
        let r = correlation(&[1.0, 2.0, 3.0, 4.0], &[2.0, 1.0, 4.0, 3.0]);
        assert_eq!(r, 0.6);
        let r = correlation(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0]);
        assert_eq!(r, 0.5);
    }

    #[test]
    fn test_trend_increasing() {
        let t = trend(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(t.trend, TrendDirection::Increasing);
        assert_eq!(t.slope, 1.0);
        assert_eq!(t.strength, 1.0);
    }

    #[test]
    fn test_trend_decreasing() {
        let t = trend(&[10.0, 8.0, 6.0, 4.0]);
        assert_eq!(t.trend, TrendDirection::Decreasing);
        assert!((t.slope + 2.0).abs() < 1e-9);
        assert_eq!(t.strength, 1.0);
    }

    #[test]
    fn test_trend_stable() {
        let t = trend(&[7.0, 7.0, 7.0]);
        assert_eq!(t.trend, TrendDirection::Stable);
        assert_eq!(t.slope, 0.0);

        let t = trend(&[3.0]);
        assert_eq!(t.trend, TrendDirection::Stable);
        assert_eq!(t.strength, 0.0);
    }

    #[test]
    fn test_consumption_stats() {
        let readings = vec![
            reading(1, "2024-01-10", 10.0),
            reading(1, "2024-02-10", 20.0),
            reading(2, "2024-01-12", 30.0),
            reading(2, "2024-02-12", 40.0),
            reading(3, "2024-01-05", 50.0),
        ];
        let stats = consumption_stats(&readings);

        assert_eq!(stats.count, 5);
        assert_eq!(stats.total, 150.0);
        assert_eq!(stats.mean, 30.0);
        assert_eq!(stats.median, 30.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.std_dev, round2(200f64.sqrt()));
        assert_eq!(stats.q25, 20.0);
        assert_eq!(stats.q75, 40.0);
    }

    #[test]
    fn test_consumption_stats_empty() {
        assert_eq!(consumption_stats(&[]), ConsumptionStats::default());
    }

    #[test]
    fn test_billing_stats() {
        let bills = vec![
            bill(100.0, PaymentStatus::Paid),
            bill(50.5, PaymentStatus::Paid),
            bill(20.25, PaymentStatus::Unpaid),
            bill(30.0, PaymentStatus::Overdue),
        ];
        let stats = billing_stats(&bills);

        assert_eq!(stats.total_bills, 4);
        assert_eq!(stats.total_amount, 200.75);
        assert_eq!(stats.average_amount, 50.19);
        assert_eq!(stats.paid_amount, 150.5);
        assert_eq!(stats.unpaid_amount, 20.25);
        assert_eq!(stats.overdue_amount, 30.0);
        assert_eq!(stats.payment_rate, 50.0);
    }

    #[test]
    fn test_billing_stats_payment_rate_is_whole_percent() {
        let bills = vec![
            bill(10.0, PaymentStatus::Paid),
            bill(10.0, PaymentStatus::Unpaid),
            bill(10.0, PaymentStatus::Unpaid),
        ];
        assert_eq!(billing_stats(&bills).payment_rate, 33.0);
    }

    #[test]
    fn test_billing_stats_empty() {
        let stats = billing_stats(&[]);
        assert_eq!(stats, BillingStats::default());
        assert_eq!(stats.total_bills, 0);
        assert_eq!(stats.payment_rate, 0.0);
    }

    #[test]
    fn test_monthly_consumption() {
        let readings = vec![
            reading(1, "2024-02-10", 20.0),
            reading(2, "2024-01-12", 30.5),
            reading(1, "2024-01-10", 10.25),
        ];
        let months = monthly_consumption(&readings);

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[0].readings, 2);
        assert_eq!(months[0].units, 40.75);
        assert_eq!(months[1].month, "2024-02");
        assert_eq!(months[1].units, 20.0);
    }

    #[test]
    fn test_consumption_by_connection() {
        let mut orphan = reading(0, "2024-01-01", 99.0);
        orphan.connection_id = None;
        let readings = vec![
            reading(1, "2024-01-10", 10.0),
            reading(2, "2024-01-12", 5.5),
            reading(1, "2024-02-10", 2.5),
            orphan,
        ];
        let totals = consumption_by_connection(&readings);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&1], 12.5);
        assert_eq!(totals[&2], 5.5);
    }
}
