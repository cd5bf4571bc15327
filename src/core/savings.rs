use crate::core::{QuoteError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};

/// Longest projection horizon accepted.
pub const MAX_YEARS: u32 = 100;

/// Inputs for a multi-year membership savings projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsScenario {
    pub membership_cost: f64,
    /// Retail price of one trip in the first year.
    pub retail_price: f64,
    /// Member price of the same trip; stays fixed.
    pub member_price: f64,
    pub trips_per_year: f64,
    pub years: u32,
    /// Yearly retail inflation as a fraction (0.03 = 3%).
    #[serde(default)]
    pub retail_inflation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: u32,
    pub retail_price: f64,
    pub member_price: f64,
    pub retail_spend: f64,
    pub member_spend: f64,
    pub cumulative_retail: f64,
    pub cumulative_member: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsProjection {
    pub rows: Vec<YearRow>,
    pub break_even_year: Option<u32>,
    pub total_retail: f64,
    pub total_member: f64,
    pub total_savings: f64,
}

impl Validate for SavingsScenario {
    fn validate(&self) -> Result<()> {
        let amounts = [
            ("membership_cost", self.membership_cost),
            ("retail_price", self.retail_price),
            ("member_price", self.member_price),
            ("trips_per_year", self.trips_per_year),
            ("retail_inflation", self.retail_inflation),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(QuoteError::validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(1..=MAX_YEARS).contains(&self.years) {
            return Err(QuoteError::validation(format!(
                "years must be between 1 and {}, got {}",
                MAX_YEARS, self.years
            )));
        }
        Ok(())
    }
}

impl SavingsScenario {
    pub fn project(&self) -> Result<SavingsProjection> {
        self.validate()?;

        let mut cumulative_retail = 0.0;
        // 會費在第一年初一次付清
        let mut cumulative_member = self.membership_cost;
        let mut break_even_year = None;
        let mut rows = Vec::new();

        for year in 1..=self.years {
            let retail_price = self.retail_price * (1.0 + self.retail_inflation).powi(year as i32 - 1);
            let retail_spend = retail_price * self.trips_per_year;
            let member_spend = self.member_price * self.trips_per_year;

            cumulative_retail += retail_spend;
            cumulative_member += member_spend;
            let savings = cumulative_retail - cumulative_member;

            if break_even_year.is_none() && savings >= 0.0 {
                break_even_year = Some(year);
            }

            rows.push(YearRow {
                year,
                retail_price,
                member_price: self.member_price,
                retail_spend,
                member_spend,
                cumulative_retail,
                cumulative_member,
                savings,
            });
        }

        Ok(SavingsProjection {
            rows,
            break_even_year,
            total_retail: cumulative_retail,
            total_member: cumulative_member,
            total_savings: cumulative_retail - cumulative_member,
        })
    }
}

impl SavingsProjection {
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| QuoteError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| QuoteError::validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> SavingsScenario {
        SavingsScenario {
            membership_cost: 6500.0,
            retail_price: 5000.0,
            member_price: 2500.0,
            trips_per_year: 1.0,
            years: 5,
            retail_inflation: 0.0,
        }
    }

    #[test]
    fn test_break_even_is_first_non_negative_year() {
        let projection = scenario().project().unwrap();

        // 每年省 2500，需三年才能攤平 6500 會費
        assert_eq!(projection.break_even_year, Some(3));
        assert_eq!(projection.rows.len(), 5);
        assert_eq!(projection.rows[0].savings, -4000.0);
        assert_eq!(projection.rows[2].savings, 1000.0);
        assert_eq!(projection.total_retail, 25000.0);
        assert_eq!(projection.total_member, 19000.0);
        assert_eq!(projection.total_savings, 6000.0);
    }

    #[test]
    fn test_inflation_compounds_retail_only() {
        let projection = SavingsScenario {
            retail_inflation: 0.10,
            years: 3,
            ..scenario()
        }
        .project()
        .unwrap();

        assert!((projection.rows[1].retail_price - 5500.0).abs() < 1e-9);
        assert!((projection.rows[2].retail_price - 6050.0).abs() < 1e-9);
        assert!(projection.rows.iter().all(|row| row.member_price == 2500.0));
    }

    #[test]
    fn test_no_break_even_within_horizon() {
        let projection = SavingsScenario {
            years: 2,
            ..scenario()
        }
        .project()
        .unwrap();

        assert_eq!(projection.break_even_year, None);
        assert!(projection.total_savings < 0.0);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert!(SavingsScenario { years: 0, ..scenario() }.project().is_err());
        assert!(SavingsScenario { years: MAX_YEARS, ..scenario() }.project().is_ok());
        let err = SavingsScenario {
            years: u32::MAX,
            ..scenario()
        }
        .project()
        .unwrap_err();
        assert!(matches!(err, QuoteError::ValidationError { .. }));
        assert!(SavingsScenario {
            retail_price: f64::NAN,
            ..scenario()
        }
        .project()
        .is_err());
        assert!(SavingsScenario {
            membership_cost: -1.0,
            ..scenario()
        }
        .project()
        .is_err());
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let csv = scenario().project().unwrap().to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("year,retail_price,member_price"));
        assert!(lines[1].starts_with("1,5000.0,2500.0"));
    }
}
