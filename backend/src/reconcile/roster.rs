//! Roster pairing: flat roster rows ↔ document roster entries.
//!
//! Within one side, every flat row is paired with the *first* document
//! entry whose shirt number equals the row's shirt number under
//! [`compare::equal`] (so `7`, `7.0` and `"7"` pair). A row without a
//! partner becomes a [`PairingFailure`]; it produces no comparison rows.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::compare;
use crate::error::{ReconcileError, ReconcileResult};
use crate::mapping::RosterKeys;
use crate::models::{FlatRecord, RowScope, Side};
use crate::path::{value_kind, FailureReason, ResolutionFailure};

/// A side's document roster, or why it could not be found.
pub type RosterEntries<'a> = Result<&'a [Value], ResolutionFailure>;

/// A document roster entry and its position in the side's collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedEntry<'a> {
    pub index: usize,
    pub entry: &'a Value,
}

/// Pairing outcome for one flat roster row.
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing<'a> {
    pub side: Side,
    /// Index of the row in the record set's roster
    pub row_index: usize,
    pub row: &'a FlatRecord,
    pub outcome: Result<PairedEntry<'a>, PairingFailure>,
}

/// Why a roster row has no document partner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnpairedReason {
    /// No entry of the side carries this shirt number.
    NoMatchingEntry,
    /// The row's shirt number is null.
    NullShirtNumber,
    /// The side's roster collection is absent from the document.
    RosterUnavailable { failure: ResolutionFailure },
}

impl fmt::Display for UnpairedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnpairedReason::NoMatchingEntry => f.write_str("no document entry with this shirt number"),
            UnpairedReason::NullShirtNumber => f.write_str("shirt number is null"),
            UnpairedReason::RosterUnavailable { failure } => write!(f, "roster unavailable ({})", failure),
        }
    }
}

/// A roster row that could not be paired. Diagnostic, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingFailure {
    pub side: Side,
    pub row_index: usize,
    pub shirt_number: Value,
    pub reason: UnpairedReason,
}

impl fmt::Display for PairingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} roster row {} (shirt {}): {}",
            self.side,
            self.row_index,
            compare::display_value(&self.shirt_number),
            self.reason
        )
    }
}

/// Side of a flat roster row.
pub fn side_of(row: &FlatRecord, row_index: usize, keys: &RosterKeys) -> ReconcileResult<Side> {
    let value = row.require(&keys.side_field, RowScope::RosterRow { row_index })?;

    Side::from_flat_value(value).ok_or_else(|| ReconcileError::InvalidSide {
        field: keys.side_field.clone(),
        value: compare::display_value(value),
        row_index,
    })
}

/// Locate a side's roster collection in the document.
pub fn roster_entries<'a>(document: &'a Value, side: Side, keys: &RosterKeys) -> RosterEntries<'a> {
    let path = keys.roster_path(side);
    let node = path.lookup(document)?;
    node.as_array().map(Vec::as_slice).ok_or_else(|| ResolutionFailure {
        path: path.to_string(),
        reason: FailureReason::NotASequence {
            key: keys.players_field.clone(),
            found: value_kind(node),
        },
    })
}

/// Pair every flat row of `side` with a document entry.
///
/// Rows of the other side are skipped. Output order is row order.
/// Contract violations (missing side or shirt field, unreadable side value)
/// abort the pairing.
pub fn pair<'a>(
    rows: &'a [FlatRecord],
    entries: &RosterEntries<'a>,
    side: Side,
    keys: &RosterKeys,
) -> ReconcileResult<Vec<Pairing<'a>>> {
    let mut pairings = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        if side_of(row, row_index, keys)? != side {
            continue;
        }
        let shirt = row.require(&keys.shirt_field, RowScope::Roster { side, row_index })?;

        let outcome = match entries {
            Err(failure) => Err(UnpairedReason::RosterUnavailable {
                failure: failure.clone(),
            }),
            Ok(_) if shirt.is_null() => Err(UnpairedReason::NullShirtNumber),
            Ok(list) => find_entry(*list, shirt, keys).ok_or(UnpairedReason::NoMatchingEntry),
        }
        .map_err(|reason| PairingFailure {
            side,
            row_index,
            shirt_number: shirt.clone(),
            reason,
        });

        pairings.push(Pairing {
            side,
            row_index,
            row,
            outcome,
        });
    }

    Ok(pairings)
}

fn find_entry<'a>(entries: &'a [Value], shirt: &Value, keys: &RosterKeys) -> Option<PairedEntry<'a>> {
    entries
        .iter()
        .enumerate()
        .find(|(_, entry)| {
            keys.entry_shirt_path
                .resolve(entry)
                .is_ok_and(|number| compare::equal(shirt, number))
        })
        .map(|(index, entry)| PairedEntry { index, entry })
}
