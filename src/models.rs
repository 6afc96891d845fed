use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One hire/market observation for a vessel on a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRate {
    /// The list endpoint omits ids; the create endpoint returns them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub vessel_name: String,
    pub date: NaiveDate,
    pub hire_rate: f64,
    pub market_rate: f64,
}

/// Per-date totals across all vessels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub date: NaiveDate,
    pub total_hire: f64,
    pub total_market: f64,
}

/// Body of a vessel submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVesselRate {
    pub vessel_name: String,
    pub date: NaiveDate,
    pub hire_rate: f64,
    pub market_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VesselFilter {
    pub vessel: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl VesselFilter {
    pub fn vessel(name: impl Into<String>) -> Self {
        Self {
            vessel: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Query pairs in the backend's parameter names. Absent or blank values
    /// are left out entirely.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(vessel) = self.vessel.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            query.push(("vessel".to_string(), vessel.to_string()));
        }
        push_date_range(&mut query, self.start_date, self.end_date);
        query
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AggregateFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        push_date_range(&mut query, self.start_date, self.end_date);
        query
    }
}

fn push_date_range(query: &mut Vec<(String, String)>, start: Option<NaiveDate>, end: Option<NaiveDate>) {
    if let Some(start) = start {
        query.push(("start_date".to_string(), start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = end {
        query.push(("end_date".to_string(), end.format("%Y-%m-%d").to_string()));
    }
}

/// The create endpoint may answer with the bare record or with
/// `{"message": ..., "data": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedRecord {
    Wrapped { data: VesselRate },
    Bare(VesselRate),
}

impl CreatedRecord {
    pub(crate) fn into_rate(self) -> VesselRate {
        match self {
            CreatedRecord::Wrapped { data } => data,
            CreatedRecord::Bare(rate) => rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn list_rows_parse_without_id() {
        let body = r#"[{"vessel_name":"Evergreen","date":"2024-01-01","hire_rate":18000,"market_rate":17500.5}]"#;
        let rows: Vec<VesselRate> = serde_json::from_str(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, None);
        assert_eq!(rows[0].date, day("2024-01-01"));
        assert_eq!(rows[0].hire_rate, 18000.0);
        assert_eq!(rows[0].market_rate, 17500.5);
    }

    #[test]
    fn created_record_accepts_wrapped_and_bare() {
        let wrapped = r#"{"message":"Vessel data added successfully","data":{"id":7,"vessel_name":"Poseidon","date":"2024-02-03","hire_rate":100,"market_rate":200}}"#;
        let bare = r#"{"id":7,"vessel_name":"Poseidon","date":"2024-02-03","hire_rate":100,"market_rate":200}"#;
        let a = serde_json::from_str::<CreatedRecord>(wrapped).unwrap().into_rate();
        let b = serde_json::from_str::<CreatedRecord>(bare).unwrap().into_rate();
        assert_eq!(a, b);
        assert_eq!(a.id, Some(7));
    }

    #[test]
    fn filter_skips_absent_and_blank_params() {
        assert!(VesselFilter::default().to_query().is_empty());
        assert!(VesselFilter::vessel("  ").to_query().is_empty());

        let q = VesselFilter::vessel("East India").between(Some(day("2024-01-01")), None).to_query();
        assert_eq!(
            q,
            vec![
                ("vessel".to_string(), "East India".to_string()),
                ("start_date".to_string(), "2024-01-01".to_string()),
            ]
        );

        let agg = AggregateFilter {
            start_date: None,
            end_date: Some(day("2024-03-31")),
        };
        assert_eq!(agg.to_query(), vec![("end_date".to_string(), "2024-03-31".to_string())]);
    }

    #[test]
    fn submission_serializes_backend_field_names() {
        let body = serde_json::to_value(NewVesselRate {
            vessel_name: "East India".to_string(),
            date: day("2024-01-01"),
            hire_rate: 100.0,
            market_rate: 200.0,
        })
        .unwrap();
        assert_eq!(body["vessel_name"], "East India");
        assert_eq!(body["date"], "2024-01-01");
        assert_eq!(body["hire_rate"], 100.0);
    }
}
