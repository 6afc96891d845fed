//! Figures the dashboard shows next to the chart.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::models::{AggregateRow, VesselRate};

#[derive(Debug, Clone, PartialEq)]
pub struct RateSummary {
    pub count: usize,
    /// Rounded to whole currency units; `None` when there are no rows.
    pub avg_hire: Option<f64>,
    pub avg_market: Option<f64>,
}

pub fn summarize(rows: &[VesselRate]) -> RateSummary {
    let count = rows.len();
    if count == 0 {
        return RateSummary {
            count,
            avg_hire: None,
            avg_market: None,
        };
    }
    let n = count as f64;
    let hire: f64 = rows.iter().map(|r| r.hire_rate).sum();
    let market: f64 = rows.iter().map(|r| r.market_rate).sum();
    RateSummary {
        count,
        avg_hire: Some((hire / n).round()),
        avg_market: Some((market / n).round()),
    }
}

/// Sum hire and market rates across vessels for each date, oldest first.
pub fn aggregate_by_date(rows: &[VesselRate]) -> Vec<AggregateRow> {
    let mut by_date: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in rows {
        let totals = by_date.entry(r.date).or_insert((0.0, 0.0));
        totals.0 += r.hire_rate;
        totals.1 += r.market_rate;
    }
    by_date
        .into_iter()
        .map(|(date, (total_hire, total_market))| AggregateRow {
            date,
            total_hire,
            total_market,
        })
        .collect()
}

/// Distinct vessel names in the order they first appear.
pub fn vessel_names(rows: &[VesselRate]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.vessel_name.as_str()))
        .map(|r| r.vessel_name.clone())
        .collect()
}

/// Two decimals with Indian digit grouping: `1234567.5` -> `12,34,567.50`.
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let digits: Vec<char> = int_part.chars().collect();

    let mut groups: Vec<String> = Vec::new();
    let split = digits.len().saturating_sub(3);
    let (head, tail) = digits.split_at(split);
    groups.push(tail.iter().collect());
    let mut rest = head;
    while !rest.is_empty() {
        let cut = rest.len().saturating_sub(2);
        let (front, pair) = rest.split_at(cut);
        groups.push(pair.iter().collect());
        rest = front;
    }
    groups.reverse();

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, groups.join(","), frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(vessel: &str, date: &str, hire: f64, market: f64) -> VesselRate {
        VesselRate {
            id: None,
            vessel_name: vessel.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            hire_rate: hire,
            market_rate: market,
        }
    }

    #[test]
    fn aggregate_sums_across_vessels_per_date() {
        let rows = vec![
            row("East India", "2024-01-02", 10.0, 20.0),
            row("East India", "2024-01-01", 100.0, 200.0),
            row("West Ocean", "2024-01-01", 50.0, 30.0),
        ];
        let agg = aggregate_by_date(&rows);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[0].date.to_string(), "2024-01-01");
        assert_eq!(agg[0].total_hire, 150.0);
        assert_eq!(agg[0].total_market, 230.0);
        assert_eq!(agg[1].total_hire, 10.0);
    }

    #[test]
    fn summary_rounds_averages() {
        let rows = vec![row("A", "2024-01-01", 100.0, 201.0), row("B", "2024-01-01", 51.0, 30.0)];
        let s = summarize(&rows);
        assert_eq!(s.count, 2);
        assert_eq!(s.avg_hire, Some(76.0)); // 75.5 rounds up
        assert_eq!(s.avg_market, Some(116.0)); // 115.5 rounds up
        assert_eq!(summarize(&[]).avg_hire, None);
    }

    #[test]
    fn vessel_names_keep_first_seen_order() {
        let rows = vec![
            row("Poseidon", "2024-01-01", 1.0, 1.0),
            row("Evergreen", "2024-01-01", 1.0, 1.0),
            row("Poseidon", "2024-01-02", 1.0, 1.0),
        ];
        assert_eq!(vessel_names(&rows), vec!["Poseidon".to_string(), "Evergreen".to_string()]);
    }

    #[test]
    fn inr_grouping() {
        assert_eq!(format_inr(0.0), "0.00");
        assert_eq!(format_inr(999.0), "999.00");
        assert_eq!(format_inr(1000.0), "1,000.00");
        assert_eq!(format_inr(123456.0), "1,23,456.00");
        assert_eq!(format_inr(1234567.5), "12,34,567.50");
        assert_eq!(format_inr(-25000.0), "-25,000.00");
    }
}
