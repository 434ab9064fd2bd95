use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Raw search parameters as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteQuery {
    pub from_city: Option<String>,
    pub to_city: Option<String>,
    pub date: Option<String>,
}

/// A validated search: normalised city names and a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSearch {
    pub from_city: String,
    pub to_city: String,
    pub date: NaiveDate,
}

impl RouteQuery {
    pub fn validate(&self) -> CoreResult<RouteSearch> {
        let from_city = required(&self.from_city);
        let to_city = required(&self.to_city);
        let date = required(&self.date);

        let (Some(from_city), Some(to_city), Some(date)) = (from_city, to_city, date) else {
            return Err(CoreError::ValidationError(
                "from_city, to_city, and date are required".to_string(),
            ));
        };

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            CoreError::ValidationError(format!("date must be YYYY-MM-DD, got {}", date))
        })?;

        Ok(RouteSearch {
            from_city: normalize_city(from_city),
            to_city: normalize_city(to_city),
            date,
        })
    }
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// City matching is case-insensitive and ignores surrounding whitespace.
/// Stores must apply the same folding to the stored city column.
pub fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_id: i64,
    pub route_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<NaiveDateTime>,
    pub price_minor: i64,
    /// Total seats on the train. Not a per-date count.
    pub available_seats: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: Option<&str>, to: Option<&str>, date: Option<&str>) -> RouteQuery {
        RouteQuery {
            from_city: from.map(String::from),
            to_city: to.map(String::from),
            date: date.map(String::from),
        }
    }

    #[test]
    fn test_validate_normalises_cities() {
        let search = query(Some("  Минск "), Some("БРЕСТ"), Some("2025-06-01"))
            .validate()
            .unwrap();
        assert_eq!(search.from_city, "минск");
        assert_eq!(search.to_city, "брест");
        assert_eq!(search.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_missing_parameters_are_rejected() {
        assert!(matches!(
            query(None, Some("Брест"), Some("2025-06-01")).validate(),
            Err(CoreError::ValidationError(_))
        ));
        assert!(query(Some("Минск"), Some("   "), Some("2025-06-01")).validate().is_err());
        assert!(query(Some("Минск"), Some("Брест"), None).validate().is_err());
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let err = query(Some("Минск"), Some("Брест"), Some("01.06.2025"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }
}
