//! Listing parser.
//!
//! Turns the portal's exam table rows into [`ListingRecord`]s. Rows that
//! lack a code, a date or a parseable date start are dropped with a
//! warning; only surface failures abort the parse.

use tracing::{debug, warn};

use crate::config::PortalSettings;
use crate::surface::{PageSurface, SurfaceError};
use crate::types::{ListingRecord, ParseWarning, SlotStatus};

/// Canonical date of a raw date cell: the text before the first separator.
///
/// `"2024-05-01 - 10:00"` becomes `"2024-05-01"`.
pub fn parse_exam_date(raw: &str, separator: &str) -> Result<String, ParseWarning> {
    match raw.split_once(separator) {
        Some((start, _)) if !start.is_empty() => Ok(start.to_string()),
        Some(_) => Err(ParseWarning::EmptyDate(raw.to_string())),
        None => Err(ParseWarning::MissingSeparator(raw.to_string())),
    }
}

/// Signed-up wins over available; neither means unavailable.
pub fn resolve_status(signed: bool, available: bool) -> SlotStatus {
    if signed {
        SlotStatus::Claimed
    } else if available {
        SlotStatus::Open
    } else {
        SlotStatus::Unavailable
    }
}

/// Parse `rows` in page order. No deduplication, no sorting.
pub async fn parse_listing<S: PageSurface>(
    surface: &S,
    rows: Vec<S::Element>,
    settings: &PortalSettings,
) -> Result<Vec<ListingRecord<S::Element>>, SurfaceError> {
    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        match parse_row(surface, &row, settings).await? {
            Ok((code, date, status)) => records.push(ListingRecord {
                code,
                date,
                status,
                handle: row,
            }),
            Err(reason) => {
                warn!(row = index, reason = %reason, "Dropping invalid exam record");
            }
        }
    }

    debug!(count = records.len(), "Listing parsed");
    Ok(records)
}

async fn parse_row<S: PageSurface>(
    surface: &S,
    row: &S::Element,
    settings: &PortalSettings,
) -> Result<Result<(String, String, SlotStatus), ParseWarning>, SurfaceError> {
    let code = surface
        .read_field(row, &settings.code_field)
        .await?
        .filter(|c| !c.is_empty());
    let raw_date = surface
        .read_field(row, &settings.date_field)
        .await?
        .filter(|d| !d.is_empty());

    let Some(code) = code else {
        return Ok(Err(ParseWarning::MissingField("course code")));
    };
    let Some(raw_date) = raw_date else {
        return Ok(Err(ParseWarning::MissingField("date")));
    };

    let date = match parse_exam_date(&raw_date, &settings.date_separator) {
        Ok(date) => date,
        Err(reason) => return Ok(Err(reason)),
    };

    let signed = surface
        .read_field(row, &settings.signed_marker)
        .await?
        .is_some();
    let available = surface
        .read_field(row, &settings.available_marker)
        .await?
        .is_some();

    Ok(Ok((code, date, resolve_status(signed, available))))
}
