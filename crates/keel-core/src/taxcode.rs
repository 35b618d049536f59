//! Expense-to-tax-code matching
//!
//! Maps an expense description to a jurisdiction-scoped tax code by
//! keyword-category lookup. Matching is first-match-wins by category
//! declaration order, not best-match - a description hitting both
//! Transportation and Travel keywords lands on whichever is declared first.

use tracing::debug;

use crate::db::Database;
use crate::error::Result;

/// Ordered (category, keywords) pairs used for expense categorization
///
/// Declaration order is part of the contract: the first category with a
/// substring hit wins.
#[derive(Debug, Clone)]
pub struct CategoryKeywords {
    pub categories: Vec<(&'static str, Vec<&'static str>)>,
}

impl Default for CategoryKeywords {
    fn default() -> Self {
        Self {
            categories: vec![
                (
                    "Transportation",
                    vec!["fuel", "car", "vehicle", "mileage", "parking", "toll"],
                ),
                (
                    "Office Supplies",
                    vec!["office", "supplies", "paper", "printer", "stationery"],
                ),
                (
                    "Meals & Entertainment",
                    vec!["meal", "restaurant", "lunch", "dinner", "catering", "coffee"],
                ),
                (
                    "Travel",
                    vec!["flight", "hotel", "airfare", "lodging", "travel"],
                ),
                (
                    "Utilities",
                    vec!["electric", "water", "gas bill", "internet", "phone", "utility"],
                ),
                (
                    "Professional Services",
                    vec!["legal", "accounting", "consulting", "attorney", "bookkeeping"],
                ),
                (
                    "Insurance",
                    vec!["insurance", "premium", "liability coverage"],
                ),
                ("Rent & Lease", vec!["rent", "lease"]),
                (
                    "Marketing",
                    vec!["advertising", "marketing", "promotion", "ads"],
                ),
                (
                    "Equipment",
                    vec!["equipment", "computer", "machinery", "hardware", "tools"],
                ),
            ],
        }
    }
}

/// Match a description to an expense category name
///
/// Returns the first category whose keyword list has a substring hit
/// against the lowercased description, or None when nothing matches.
pub fn match_category<'a>(description: &str, keywords: &'a CategoryKeywords) -> Option<&'a str> {
    let text = description.to_lowercase();
    keywords
        .categories
        .iter()
        .find(|(_, kws)| kws.iter().any(|k| text.contains(k)))
        .map(|(category, _)| *category)
}

/// Resolve an expense description to a tax code id for a jurisdiction
///
/// Category match first, then a tax-code row lookup scoped to that
/// category (state-specific row preferred, stateless fallback). Returns
/// Ok(None) when no category matched or no code row exists.
pub fn match_tax_code(
    db: &Database,
    description: &str,
    state: &str,
    keywords: &CategoryKeywords,
) -> Result<Option<i64>> {
    let category = match match_category(description, keywords) {
        Some(c) => c,
        None => return Ok(None),
    };

    let code_id = db.find_tax_code_for_category(category, state)?;
    debug!(description, category, ?code_id, "Tax code match");
    Ok(code_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_category_transportation() {
        let kw = CategoryKeywords::default();
        assert_eq!(
            match_category("Fuel for delivery vehicle", &kw),
            Some("Transportation")
        );
        assert_eq!(match_category("Airport parking", &kw), Some("Transportation"));
    }

    #[test]
    fn test_match_category_first_match_wins() {
        let kw = CategoryKeywords::default();
        // "car" (Transportation) and "rent" (Rent & Lease) both hit;
        // Transportation is declared first.
        assert_eq!(
            match_category("Monthly rental car", &kw),
            Some("Transportation")
        );
    }

    #[test]
    fn test_match_category_case_insensitive() {
        let kw = CategoryKeywords::default();
        assert_eq!(
            match_category("LEGAL RETAINER FEES", &kw),
            Some("Professional Services")
        );
    }

    #[test]
    fn test_match_category_none() {
        let kw = CategoryKeywords::default();
        assert_eq!(match_category("miscellaneous something", &kw), None);
    }
}
