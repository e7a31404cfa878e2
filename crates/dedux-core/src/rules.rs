//! Deduction calculation
//!
//! Pure functions applying Thai personal-income-tax deduction rules:
//! - capped categories: deductible = min(total, max_limit)
//! - uncapped donation categories (max_limit = 0): multiplier instead,
//!   2x for education/sports donations, 1x otherwise

use crate::models::{Deduction, DeductionRule};

/// Seed table of deduction categories and their caps in THB for a tax year.
/// A cap of 0 marks the donation categories computed by multiplier.
pub const CATEGORY_CAPS: &[(&str, f64)] = &[
    ("Easy E-Receipt", 50_000.0),
    ("Thai ESG", 300_000.0),
    ("Life Insurance", 100_000.0),
    ("Health Insurance", 25_000.0),
    ("Pension Insurance", 200_000.0),
    ("Social Security", 9_000.0),
    ("Provident Fund", 500_000.0),
    ("SSF", 200_000.0),
    ("RMF", 500_000.0),
    ("Home Loan Interest", 100_000.0),
    ("Donation (General)", 0.0),
    ("Donation (Education/Sports)", 0.0),
];

/// Donation multiplier for education and sports donations.
pub const DOUBLE_DEDUCTION_MULTIPLIER: f64 = 2.0;

/// Whether a category name falls in the double-deduction donation subset.
/// Substring match so renamed donation rules keep working.
pub fn is_double_deduction(category_name: &str) -> bool {
    category_name.contains("Education") || category_name.contains("Sports")
}

/// Compute the deductible amount for a receipt total under a rule.
///
/// With no rule nothing is deductible. A positive `max_limit` caps the
/// amount and reports whether the cap bit. A zero `max_limit` applies the
/// category multiplier (2x for education/sports donations, 1x otherwise)
/// and never reports capping.
///
/// `total_amount` must be non-negative and finite; callers validate
/// amounts before computing.
pub fn compute_deduction(total_amount: f64, rule: Option<&DeductionRule>) -> Deduction {
    debug_assert!(total_amount.is_finite() && total_amount >= 0.0);

    let rule = match rule {
        Some(rule) => rule,
        None => {
            return Deduction {
                amount: 0.0,
                is_capped: false,
                max_limit: 0.0,
            }
        }
    };

    if rule.max_limit > 0.0 {
        Deduction {
            amount: total_amount.min(rule.max_limit),
            is_capped: total_amount > rule.max_limit,
            max_limit: rule.max_limit,
        }
    } else {
        let multiplier = if is_double_deduction(&rule.category_name) {
            DOUBLE_DEDUCTION_MULTIPLIER
        } else {
            1.0
        };
        Deduction {
            amount: total_amount * multiplier,
            is_capped: false,
            max_limit: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(category: &str, max_limit: f64) -> DeductionRule {
        DeductionRule {
            id: 1,
            category_name: category.to_string(),
            max_limit,
            tax_year: 2025,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_rule_means_nothing_deductible() {
        let d = compute_deduction(10_000.0, None);
        assert_eq!(d.amount, 0.0);
        assert!(!d.is_capped);
        assert_eq!(d.max_limit, 0.0);
    }

    #[test]
    fn test_under_cap_passes_through() {
        let r = rule("Health Insurance", 25_000.0);
        let d = compute_deduction(18_000.0, Some(&r));
        assert_eq!(d.amount, 18_000.0);
        assert!(!d.is_capped);
        assert_eq!(d.max_limit, 25_000.0);
    }

    #[test]
    fn test_over_cap_is_capped() {
        let r = rule("Health Insurance", 25_000.0);
        let d = compute_deduction(40_000.0, Some(&r));
        assert_eq!(d.amount, 25_000.0);
        assert!(d.is_capped);
    }

    #[test]
    fn test_exactly_at_cap_is_not_capped() {
        let r = rule("SSF", 200_000.0);
        let d = compute_deduction(200_000.0, Some(&r));
        assert_eq!(d.amount, 200_000.0);
        assert!(!d.is_capped);
    }

    #[test]
    fn test_education_donation_doubles() {
        let r = rule("Donation (Education/Sports)", 0.0);
        let d = compute_deduction(5_000.0, Some(&r));
        assert_eq!(d.amount, 10_000.0);
        assert!(!d.is_capped);
    }

    #[test]
    fn test_general_donation_passes_through() {
        let r = rule("Donation (General)", 0.0);
        let d = compute_deduction(5_000.0, Some(&r));
        assert_eq!(d.amount, 5_000.0);
        assert!(!d.is_capped);
    }

    #[test]
    fn test_double_deduction_subset_is_substring_based() {
        assert!(is_double_deduction("Donation (Education/Sports)"));
        assert!(is_double_deduction("Sports Donation 2025"));
        assert!(!is_double_deduction("Donation (General)"));
        assert!(!is_double_deduction("Health Insurance"));
    }

    #[test]
    fn test_zero_amount() {
        let r = rule("Life Insurance", 100_000.0);
        let d = compute_deduction(0.0, Some(&r));
        assert_eq!(d.amount, 0.0);
        assert!(!d.is_capped);
    }

    #[test]
    fn test_seed_table_covers_closed_set() {
        assert_eq!(CATEGORY_CAPS.len(), 12);
        let uncapped: Vec<&str> = CATEGORY_CAPS
            .iter()
            .filter(|(_, cap)| *cap == 0.0)
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(
            uncapped,
            vec!["Donation (General)", "Donation (Education/Sports)"]
        );
    }
}
