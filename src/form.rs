use chrono::NaiveDate;

use crate::models::NewVesselRate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please fill in all fields")]
    MissingFields(Vec<&'static str>),
    #[error("Date must be in YYYY-MM-DD format")]
    BadDate(String),
    #[error("{field} must be a number")]
    BadNumber { field: &'static str, value: String },
}

/// Raw admin entry as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryForm {
    pub vessel_name: String,
    pub date: String,
    pub hire_rate: String,
    pub market_rate: String,
}

impl EntryForm {
    /// Check presence and shape only. Whether a rate is acceptable (for
    /// instance non-negative) is left to the backend.
    pub fn validate(&self) -> Result<NewVesselRate, FormError> {
        let fields = [
            ("vessel_name", self.vessel_name.trim()),
            ("date", self.date.trim()),
            ("hire_rate", self.hire_rate.trim()),
            ("market_rate", self.market_rate.trim()),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(FormError::MissingFields(missing));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| FormError::BadDate(self.date.trim().to_string()))?;
        Ok(NewVesselRate {
            vessel_name: self.vessel_name.trim().to_string(),
            date,
            hire_rate: parse_rate("hire_rate", &self.hire_rate)?,
            market_rate: parse_rate("market_rate", &self.market_rate)?,
        })
    }
}

fn parse_rate(field: &'static str, raw: &str) -> Result<f64, FormError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FormError::BadNumber {
            field,
            value: raw.trim().to_string(),
        }),
    }
}
