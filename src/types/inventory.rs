//! Criteria for checking a station's reported hourly data availability.

use chrono::NaiveDate;

/// Specifies which hourly inventory coverage a station must advertise to be
/// considered during station search.
///
/// These checks rely on the metadata reported by the upstream feed and do not
/// guarantee that every datapoint within a reported range actually exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredData {
    /// Any reported hourly coverage at all (start and end dates listed).
    Any,
    /// Reported coverage includes this specific date.
    SpecificDate(NaiveDate),
    /// Reported coverage fully encompasses this range (both ends inclusive).
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Reported coverage spans the whole calendar year.
    Year(i32),
}
