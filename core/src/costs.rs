use std::fmt;

use crate::model::{CENTS_PER_ACRE, PricingTier};

/// Display figures for one tier applied to one plot area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub price_per_acre: f64,
    pub price_per_cent: f64,
    pub total_price: f64,
    pub down_payment: f64,
    pub outstanding_amount: f64,
}

/// Pure: the same inputs always give the same figures. Area and percentage
/// ranges are not checked here.
pub fn compute_costs(
    tier: &PricingTier,
    area_in_acres: f64,
    down_payment_percent: Option<f64>,
) -> CostBreakdown {
    let percent = sanitize_percent(down_payment_percent);
    let total_price = area_in_acres * tier.cost_per_acre;
    let down_payment = total_price * (percent / 100.0);
    let outstanding_amount = total_price - down_payment;

    CostBreakdown {
        price_per_acre: round2(tier.cost_per_acre),
        price_per_cent: round2(tier.cost_per_acre / CENTS_PER_ACRE),
        total_price: round2(total_price),
        down_payment: round2(down_payment),
        outstanding_amount: round2(outstanding_amount),
    }
}

/// Missing or non-numeric percentages count as no down payment.
pub fn sanitize_percent(value: Option<f64>) -> f64 {
    value.filter(|percent| percent.is_finite()).unwrap_or(0.0)
}

/// Months of `emi_per_month` needed to clear `outstanding`.
pub fn installment_count(outstanding: f64, emi_per_month: Option<f64>) -> Option<u32> {
    let emi = emi_per_month.filter(|value| value.is_finite() && *value > 0.0)?;
    if !outstanding.is_finite() {
        return None;
    }
    if outstanding <= 0.0 {
        return Some(0);
    }
    let months = (outstanding / emi).ceil();
    Some(months.min(f64::from(u32::MAX)) as u32)
}

/// Two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNumber {
    pub input: String,
}

impl fmt::Display for InvalidNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a number", self.input)
    }
}

impl std::error::Error for InvalidNumber {}

/// Blank input is `Ok(None)`. Accepts a decimal comma.
pub fn parse_decimal_input(value: &str) -> Result<Option<f64>, InvalidNumber> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let normalized = trimmed.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(Some(parsed)),
        _ => Err(InvalidNumber {
            input: trimmed.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::catalog::tests::tier;

    #[test]
    fn three_acres_in_a_five_thousand_tier() {
        let costs = compute_costs(&tier("mid", 1.0, 5.0, 5000.0), 3.0, None);
        assert_abs_diff_eq!(costs.price_per_acre, 5000.0);
        assert_abs_diff_eq!(costs.price_per_cent, 50.0);
        assert_abs_diff_eq!(costs.total_price, 15000.0);
        assert_abs_diff_eq!(costs.outstanding_amount, 15000.0);
    }

    #[test]
    fn twenty_percent_down_payment() {
        let costs = compute_costs(&tier("mid", 1.0, 5.0, 5000.0), 3.0, Some(20.0));
        assert_abs_diff_eq!(costs.down_payment, 3000.0);
        assert_abs_diff_eq!(costs.outstanding_amount, 12000.0);
    }

    #[test]
    fn down_payment_bounds() {
        let tier = tier("odd", 0.0, 100.0, 3333.33);
        for area in [0.37, 2.5, 17.125] {
            let none = compute_costs(&tier, area, Some(0.0));
            assert_eq!(none.outstanding_amount, none.total_price);

            let full = compute_costs(&tier, area, Some(100.0));
            assert_eq!(full.outstanding_amount, 0.0);
        }
    }

    #[test]
    fn non_numeric_percent_counts_as_zero() {
        let tier = tier("mid", 1.0, 5.0, 5000.0);
        let nan = compute_costs(&tier, 3.0, Some(f64::NAN));
        assert!(nan.outstanding_amount.is_finite());
        assert_eq!(nan, compute_costs(&tier, 3.0, None));
        assert_eq!(
            compute_costs(&tier, 3.0, Some(f64::INFINITY)).outstanding_amount,
            15000.0
        );
    }

    #[test]
    fn repeated_calls_agree() {
        let tier = tier("mid", 1.0, 5.0, 4875.55);
        let first = compute_costs(&tier, 2.345, Some(12.5));
        let second = compute_costs(&tier, 2.345, Some(12.5));
        assert_eq!(first, second);
    }

    #[test]
    fn rounding_happens_once_at_the_end() {
        // 1.005 acres * 1000.5 = 1005.5025; rounding the area first would give 1000.50.
        let costs = compute_costs(&tier("t", 0.0, 10.0, 1000.5), 1.005, None);
        assert_abs_diff_eq!(costs.total_price, 1005.5);
    }

    #[test]
    fn installments_round_up() {
        assert_eq!(installment_count(12000.0, Some(2500.0)), Some(5));
        assert_eq!(installment_count(12000.0, Some(3000.0)), Some(4));
        assert_eq!(installment_count(0.0, Some(3000.0)), Some(0));
        assert_eq!(installment_count(12000.0, None), None);
        assert_eq!(installment_count(12000.0, Some(0.0)), None);
    }

    #[test]
    fn decimal_input_parsing() {
        assert_eq!(parse_decimal_input("  "), Ok(None));
        assert_eq!(parse_decimal_input("12,5"), Ok(Some(12.5)));
        assert_eq!(parse_decimal_input("3"), Ok(Some(3.0)));
        assert!(parse_decimal_input("abc").is_err());
        assert!(parse_decimal_input("NaN").is_err());
    }
}
