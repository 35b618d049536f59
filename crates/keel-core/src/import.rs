//! Document parsers for financial ingest
//!
//! Two formats share one output contract: a list of classified transactions
//! plus one human-readable finding string per accepted row.
//!
//! - Delimited text (CSV ledgers): header row locates the amount and
//!   description columns by synonym, each data row is classified and
//!   sign-normalized.
//! - Line text (receipts, free text): each line is scanned for a
//!   currency-like token and classified by the same keyword lists.

use csv::ReaderBuilder;
use regex::Regex;
use tracing::debug;

use crate::classify::{classify, KeywordConfig};
use crate::error::{Error, Result};
use crate::models::{ClassifiedTransaction, DocumentFormat, ParsedDocument, TransactionType};

/// Header synonyms for the amount column
const AMOUNT_HEADERS: &[&str] = &["amount", "value", "sum"];

/// Header synonyms for the description column
const DESCRIPTION_HEADERS: &[&str] = &["description", "details", "memo"];

/// Currency-like token: optional $, optional sign, thousands groups, decimals
const CURRENCY_PATTERN: &str = r"\$?-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?";

/// Detect the format of a document from its content
///
/// A first line that carries a field delimiter and recognizable amount and
/// description header synonyms is treated as delimited; everything else
/// falls back to line text.
pub fn detect_format(content: &str) -> DocumentFormat {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let lower = first_line.to_lowercase();

    if detect_delimiter(first_line).is_some()
        && AMOUNT_HEADERS.iter().any(|h| lower.contains(h))
        && DESCRIPTION_HEADERS.iter().any(|h| lower.contains(h))
    {
        DocumentFormat::Delimited
    } else {
        DocumentFormat::Lines
    }
}

/// Parse a document into classified transactions and findings
///
/// Empty input yields empty lists, not an error.
pub fn parse_document(
    content: &str,
    format: DocumentFormat,
    keywords: &KeywordConfig,
) -> Result<ParsedDocument> {
    if content.trim().is_empty() {
        return Ok(ParsedDocument::default());
    }

    match format {
        DocumentFormat::Delimited => parse_delimited(content, keywords),
        DocumentFormat::Lines => parse_lines(content, keywords),
    }
}

/// Pick the most frequent candidate delimiter in a header line
fn detect_delimiter(line: &str) -> Option<u8> {
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
}

/// Parse a delimited-text ledger
///
/// The header row must name an amount column (`amount|value|sum`) and a
/// description column (`description|details|memo`); a missing column is a
/// format error and nothing is emitted. Rows with unparseable amounts or
/// empty descriptions are skipped silently.
fn parse_delimited(content: &str, keywords: &KeywordConfig) -> Result<ParsedDocument> {
    let delimiter = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .and_then(detect_delimiter)
        .unwrap_or(b',');

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();

    let amount_col = find_column(&headers, AMOUNT_HEADERS)
        .ok_or_else(|| Error::Import("No amount column found (amount/value/sum)".into()))?;
    let description_col = find_column(&headers, DESCRIPTION_HEADERS).ok_or_else(|| {
        Error::Import("No description column found (description/details/memo)".into())
    })?;

    let mut parsed = ParsedDocument::default();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let source_line = i + 1;

        let description = record.get(description_col).unwrap_or("").trim();
        if description.is_empty() {
            continue;
        }

        let amount = match record.get(amount_col).and_then(|s| parse_amount(s).ok()) {
            Some(a) => a,
            None => continue,
        };

        let classification = classify(description, amount, keywords);
        push_transaction(
            &mut parsed,
            description,
            amount,
            classification.tx_type,
            classification.confidence,
            source_line,
        );
    }

    debug!(
        transactions = parsed.transactions.len(),
        "Parsed delimited document"
    );
    Ok(parsed)
}

/// Parse unstructured line text
///
/// Lines with no currency-like token are skipped, as are lines where
/// neither keyword list matches (no classification signal - the sign
/// fallback is not trusted for free text).
fn parse_lines(content: &str, keywords: &KeywordConfig) -> Result<ParsedDocument> {
    let currency_re = Regex::new(CURRENCY_PATTERN)?;
    let mut parsed = ParsedDocument::default();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let token = match currency_re.find(line) {
            Some(m) => m.as_str(),
            None => continue,
        };
        let amount = match parse_amount(token) {
            Ok(a) => a,
            Err(_) => continue,
        };

        let text = line.to_lowercase();
        let revenue_hits = keywords.revenue.iter().filter(|k| text.contains(*k)).count();
        let expense_hits = keywords.expense.iter().filter(|k| text.contains(*k)).count();
        if revenue_hits == 0 && expense_hits == 0 {
            continue;
        }

        let classification = classify(line, amount, keywords);
        push_transaction(
            &mut parsed,
            line,
            amount,
            classification.tx_type,
            classification.confidence,
            i + 1,
        );
    }

    debug!(
        transactions = parsed.transactions.len(),
        "Parsed line-text document"
    );
    Ok(parsed)
}

/// Locate a header column by substring against a synonym list
fn find_column(headers: &csv::StringRecord, synonyms: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.to_lowercase();
        synonyms.iter().any(|s| h.contains(s))
    })
}

/// Normalize sign, record the transaction, and emit its finding string
fn push_transaction(
    parsed: &mut ParsedDocument,
    description: &str,
    amount: f64,
    tx_type: TransactionType,
    confidence: f64,
    source_line: usize,
) {
    let normalized = match tx_type {
        TransactionType::Expense => -amount.abs(),
        TransactionType::Revenue => amount.abs(),
    };

    parsed.findings.push(format!(
        "Classified {} ({:.0}% confidence): ${:.2} - {}",
        tx_type,
        confidence * 100.0,
        amount.abs(),
        description
    ));
    parsed.transactions.push(ClassifiedTransaction {
        amount: normalized,
        description: description.to_string(),
        tx_type,
        confidence,
        source_line,
    });
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}
