//! Row parser for the tabular script format.
//!
//! Columns: `id, opcode, actor, expression, position, speed, payload`. The first
//! non-blank row is a header. Bad rows are logged and dropped; parsing never fails
//! as a whole.

use crate::error::ScriptError;
use crate::record::{Opcode, Position, ScriptRecord};

/// Rows with fewer cells than this are rejected.
pub const MIN_CELLS: usize = 6;

/// Rows starting with this marker are comments.
pub const COMMENT_MARKER: &str = "//";

/// Parse raw script text into records, in input order.
pub fn parse(raw: &str) -> Vec<ScriptRecord> {
    let mut records = Vec::new();
    let mut dropped = 0usize;

    let rows = raw
        .lines()
        .enumerate()
        .filter(|(_, row)| !row.trim().is_empty())
        .skip(1);

    for (index, row) in rows {
        if row.trim_start().starts_with(COMMENT_MARKER) {
            continue;
        }
        match parse_row(row, index + 1) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                tracing::warn!(error = %e, "dropping script row");
            }
        }
    }

    tracing::debug!(records = records.len(), dropped, "parsed script");
    records
}

/// Parse a single data row. `line` is 1-based and only used for diagnostics.
pub fn parse_row(row: &str, line: usize) -> Result<ScriptRecord, ScriptError> {
    let cells = split_cells(row.trim_end_matches('\r'));
    if cells.len() < MIN_CELLS {
        return Err(ScriptError::MalformedRow {
            line,
            reason: format!("expected at least {MIN_CELLS} cells, found {}", cells.len()),
        });
    }

    let id = cells[0]
        .trim()
        .parse()
        .map_err(|_| ScriptError::MalformedRow {
            line,
            reason: format!("id '{}' is not an integer", cells[0].trim()),
        })?;

    let opcode = Opcode::from_token(cells[1]).unwrap_or_else(|| {
        tracing::debug!(line, token = cells[1].trim(), "unknown opcode, treating as DIALOG");
        Opcode::Dialog
    });

    let speed = cells[5].trim();
    let payload = cells.get(6).map(|cell| unquote(cell)).unwrap_or_default();

    Ok(ScriptRecord {
        id,
        opcode,
        actor_id: cells[2].trim().to_string(),
        expression: cells[3].trim().to_string(),
        position: Position::from_cell(cells[4]),
        speed: (!speed.is_empty()).then(|| speed.to_string()),
        payload,
    })
}

/// Split a row on commas that are outside double quotes. Quotes are kept in the cells.
pub fn split_cells(row: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in row.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(&row[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(&row[start..]);
    cells
}

/// Strip one enclosing quote pair and collapse doubled quotes.
fn unquote(cell: &str) -> String {
    let cell = cell.trim();
    let inner = cell
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(cell);
    inner.replace("\"\"", "\"")
}
