//! Line item resolution within the entries of one statement.
//!
//! Callers pass entries of a single statement type; resolution across
//! statement types is done independently by the caller.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use fizz_core::{BalanceEntry, LineItem, ResolvedInput};

use crate::line_items::LineItemTable;

/// Entries that resolve to `item`, with the priority of the matching rule.
///
/// Entries without a finite value never qualify.
fn candidates<'a>(
    table: &'a LineItemTable,
    entries: &'a [BalanceEntry],
    item: LineItem,
) -> impl Iterator<Item = (&'a BalanceEntry, usize, f64)> + 'a {
    entries.iter().filter_map(move |entry| {
        let value = entry.value.filter(|v| v.is_finite())?;
        let found = table.classify(entry)?;
        (found.item == item).then_some((entry, found.priority, value))
    })
}

/// Orders two candidates of the same period: higher priority rule first, then by label.
fn same_period_order(a: (&BalanceEntry, usize), b: (&BalanceEntry, usize)) -> Ordering {
    a.1.cmp(&b.1)
        .then_with(|| a.0.category.cmp(&b.0.category))
        .then_with(|| a.0.subcategory.cmp(&b.0.subcategory))
}

fn to_input(item: LineItem, entry: &BalanceEntry, value: f64) -> ResolvedInput {
    ResolvedInput {
        item,
        statement: entry.statement,
        category: entry.category.clone(),
        subcategory: entry.subcategory.clone(),
        period_end: entry.period_end,
        value,
    }
}

/// The value of `item` at the latest period it was filed for.
pub(crate) fn latest(
    table: &LineItemTable,
    entries: &[BalanceEntry],
    item: LineItem,
) -> Option<ResolvedInput> {
    candidates(table, entries, item)
        .min_by(|a, b| {
            b.0.period_end
                .cmp(&a.0.period_end)
                .then_with(|| same_period_order((a.0, a.1), (b.0, b.1)))
        })
        .map(|(entry, _, value)| to_input(item, entry, value))
}

/// The value of `item` filed for exactly `period_end`.
pub(crate) fn at_period(
    table: &LineItemTable,
    entries: &[BalanceEntry],
    item: LineItem,
    period_end: NaiveDate,
) -> Option<ResolvedInput> {
    candidates(table, entries, item)
        .filter(|(entry, _, _)| entry.period_end == period_end)
        .min_by(|a, b| same_period_order((a.0, a.1), (b.0, b.1)))
        .map(|(entry, _, value)| to_input(item, entry, value))
}

/// One value of `item` per period, ascending by period end.
pub(crate) fn series(
    table: &LineItemTable,
    entries: &[BalanceEntry],
    item: LineItem,
) -> Vec<ResolvedInput> {
    let mut best: BTreeMap<NaiveDate, (&BalanceEntry, usize, f64)> = BTreeMap::new();
    for candidate in candidates(table, entries, item) {
        best.entry(candidate.0.period_end)
            .and_modify(|current| {
                if same_period_order((candidate.0, candidate.1), (current.0, current.1))
                    == Ordering::Less
                {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    best.into_values()
        .map(|(entry, _, value)| to_input(item, entry, value))
        .collect()
}

/// Latest period at which any of `items` resolves.
pub(crate) fn latest_period(
    table: &LineItemTable,
    entries: &[BalanceEntry],
    items: &[LineItem],
) -> Option<NaiveDate> {
    items
        .iter()
        .filter_map(|item| {
            candidates(table, entries, *item)
                .map(|(entry, _, _)| entry.period_end)
                .max()
        })
        .max()
}
