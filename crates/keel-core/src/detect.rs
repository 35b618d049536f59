//! Statistical anomaly detection over audit items
//!
//! Three passes over a batch of audit items:
//! - Time clustering: too many items landing on one calendar date
//! - Amount outliers: items far from the mean in population std deviations
//! - Category concentration: one category dominating the batch
//!
//! The composite score sums three independently capped factors, so it is
//! bounded by [0, 1.2] rather than normalized to 1.0.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{Anomaly, AnomalyKind, AuditItem, RiskFactors, RiskReport, Severity};

/// Items on a single date beyond this count form a time cluster
const TIME_CLUSTER_THRESHOLD: usize = 20;

/// Std-deviation multiple marking a high-severity amount outlier
const OUTLIER_SIGMA: f64 = 3.0;

/// Std-deviation multiple feeding the large-transaction factor
const LARGE_TX_SIGMA: f64 = 2.0;

/// Per-factor contribution cap
const FACTOR_CAP: f64 = 0.4;

/// Score a batch of audit items
///
/// Pure computation - the caller decides whether to persist the report
/// alongside the audit record. An empty batch produces a zero report.
pub fn score_items(items: &[AuditItem]) -> RiskReport {
    if items.is_empty() {
        return RiskReport::default();
    }

    let mut anomalies = Vec::new();

    detect_time_clusters(items, &mut anomalies);
    let large_count = detect_amount_outliers(items, &mut anomalies);
    detect_category_concentration(items, &mut anomalies);

    let factors = RiskFactors {
        transaction_volume: (items.len() as f64 / 100.0).min(FACTOR_CAP),
        large_transactions: (large_count as f64 * 0.1).min(FACTOR_CAP),
        unusual_patterns: (anomalies.len() as f64 * 0.1).min(FACTOR_CAP),
    };
    let overall_score =
        factors.transaction_volume + factors.large_transactions + factors.unusual_patterns;

    debug!(
        items = items.len(),
        anomalies = anomalies.len(),
        overall_score,
        "Scored audit items"
    );

    RiskReport {
        factors,
        overall_score,
        anomalies,
    }
}

/// Flag dates carrying more than the threshold number of items
fn detect_time_clusters(items: &[AuditItem], anomalies: &mut Vec<Anomaly>) {
    let mut by_date: HashMap<NaiveDate, Vec<i64>> = HashMap::new();
    for item in items {
        by_date.entry(item.date).or_default().push(item.id);
    }

    let mut dates: Vec<_> = by_date.into_iter().collect();
    dates.sort_by_key(|(date, _)| *date);

    for (date, ids) in dates {
        if ids.len() > TIME_CLUSTER_THRESHOLD {
            anomalies.push(Anomaly {
                kind: AnomalyKind::TimeCluster,
                severity: Severity::Medium,
                description: format!("{} transactions recorded on {}", ids.len(), date),
                item_ids: ids,
            });
        }
    }
}

/// Flag items at or beyond 3 population std deviations from the mean
///
/// Returns the count of items beyond 2 std deviations, which feeds the
/// large-transaction risk factor. A zero std deviation (uniform amounts)
/// short-circuits to no outliers.
fn detect_amount_outliers(items: &[AuditItem], anomalies: &mut Vec<Anomaly>) -> usize {
    let n = items.len() as f64;
    let mean = items.iter().map(|i| i.amount).sum::<f64>() / n;
    let variance = items
        .iter()
        .map(|i| (i.amount - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0;
    }

    let mut large_count = 0;
    for item in items {
        let deviation = (item.amount - mean).abs();
        if deviation >= OUTLIER_SIGMA * std_dev {
            anomalies.push(Anomaly {
                kind: AnomalyKind::AmountOutlier,
                severity: Severity::High,
                description: format!(
                    "Amount ${:.2} deviates {:.1} std devs from the mean (${:.2})",
                    item.amount,
                    deviation / std_dev,
                    mean
                ),
                item_ids: vec![item.id],
            });
        }
        if deviation > LARGE_TX_SIGMA * std_dev {
            large_count += 1;
        }
    }
    large_count
}

/// Flag any category holding more than half of the batch
fn detect_category_concentration(items: &[AuditItem], anomalies: &mut Vec<Anomaly>) {
    let mut by_category: HashMap<&str, Vec<i64>> = HashMap::new();
    for item in items {
        by_category
            .entry(item.category.as_str())
            .or_default()
            .push(item.id);
    }

    let total = items.len();
    let mut categories: Vec<_> = by_category.into_iter().collect();
    categories.sort_by_key(|(category, _)| *category);

    for (category, ids) in categories {
        if ids.len() * 2 > total {
            anomalies.push(Anomaly {
                kind: AnomalyKind::CategoryConcentration,
                severity: Severity::Medium,
                description: format!(
                    "Category '{}' accounts for {} of {} items",
                    category,
                    ids.len(),
                    total
                ),
                item_ids: ids,
            });
        }
    }
}
