//! Keyword-frequency transaction classifier
//!
//! Assigns revenue/expense and a confidence score from curated keyword
//! lists, falling back to the sign of the amount when no keyword matches.
//! Pure computation - the keyword lists are data passed in at call time so
//! callers can substitute versioned lists without touching the algorithm.

use tracing::debug;

use crate::models::{ClassificationResult, TransactionType};

/// Revenue/expense keyword lists used for classification
///
/// Confidence per side is matches / list length, so list length is part of
/// the scoring contract - keep the lists curated, not exhaustive.
#[derive(Debug, Clone)]
pub struct KeywordConfig {
    pub revenue: Vec<&'static str>,
    pub expense: Vec<&'static str>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            revenue: vec![
                "payment received",
                "invoice",
                "sale",
                "deposit",
                "revenue",
                "income",
                "refund received",
                "client payment",
                "consulting fee",
                "interest earned",
                "royalty",
                "commission",
            ],
            expense: vec![
                "purchase",
                "supplies",
                "rent",
                "utilities",
                "subscription",
                "insurance",
                "payroll",
                "salary",
                "fuel",
                "travel",
                "equipment",
                "software",
                "advertising",
                "maintenance",
                "fee paid",
                "office",
            ],
        }
    }
}

/// Classify a line description and amount as revenue or expense
///
/// Counts keyword substring hits per side against the lowercased
/// description. When neither side matches, falls back to the sign of the
/// amount with confidence exactly 0.5. An exact non-zero tie classifies as
/// revenue because the expense branch requires strictly greater confidence.
pub fn classify(description: &str, amount: f64, keywords: &KeywordConfig) -> ClassificationResult {
    let text = description.to_lowercase();

    let revenue_matches = keywords.revenue.iter().filter(|k| text.contains(*k)).count();
    let expense_matches = keywords.expense.iter().filter(|k| text.contains(*k)).count();

    if revenue_matches == 0 && expense_matches == 0 {
        let tx_type = if amount >= 0.0 {
            TransactionType::Revenue
        } else {
            TransactionType::Expense
        };
        debug!(description, amount, "No keyword match, sign fallback");
        return ClassificationResult {
            tx_type,
            confidence: 0.5,
        };
    }

    let revenue_confidence = revenue_matches as f64 / keywords.revenue.len() as f64;
    let expense_confidence = expense_matches as f64 / keywords.expense.len() as f64;

    if expense_confidence > revenue_confidence {
        ClassificationResult {
            tx_type: TransactionType::Expense,
            confidence: expense_confidence,
        }
    } else {
        ClassificationResult {
            tx_type: TransactionType::Revenue,
            confidence: revenue_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_keywords_only() {
        let keywords = KeywordConfig::default();
        let result = classify("Office Supplies Purchase", -245.50, &keywords);
        assert_eq!(result.tx_type, TransactionType::Expense);
        // "purchase", "supplies", "office" all hit
        let expected = 3.0 / keywords.expense.len() as f64;
        assert!((result.confidence - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_revenue_keywords_only() {
        let keywords = KeywordConfig::default();
        let result = classify("Client payment for invoice #42", 1200.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Revenue);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_sign_fallback_positive() {
        let keywords = KeywordConfig::default();
        let result = classify("zzz unmatched text", 100.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Revenue);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_sign_fallback_negative() {
        let keywords = KeywordConfig::default();
        let result = classify("zzz unmatched text", -100.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Expense);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_sign_fallback_zero_is_revenue() {
        let keywords = KeywordConfig::default();
        let result = classify("zzz unmatched text", 0.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Revenue);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_exact_tie_favors_revenue() {
        // Equal-length lists with one hit per side produce an exact tie,
        // which falls to the revenue branch.
        let keywords = KeywordConfig {
            revenue: vec!["alpha", "beta"],
            expense: vec!["gamma", "delta"],
        };
        let result = classify("alpha gamma", -50.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Revenue);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_expense_wins_strictly_greater() {
        let keywords = KeywordConfig {
            revenue: vec!["alpha", "beta"],
            expense: vec!["gamma", "delta"],
        };
        let result = classify("gamma delta", 50.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Expense);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_case_insensitive() {
        let keywords = KeywordConfig::default();
        let result = classify("OFFICE SUPPLIES PURCHASE", -10.0, &keywords);
        assert_eq!(result.tx_type, TransactionType::Expense);
    }

    #[test]
    fn test_confidence_in_unit_interval() {
        let keywords = KeywordConfig::default();
        for (desc, amount) in [
            ("invoice sale deposit revenue income", 1.0),
            ("purchase supplies rent utilities", -1.0),
            ("nothing here", 5.0),
            ("", -5.0),
        ] {
            let result = classify(desc, amount, &keywords);
            assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
        }
    }
}
