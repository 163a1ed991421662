//! Calendar arithmetic used by the occurrence generator.
//!
//! Every function returns `None` rather than panicking when a result would fall outside the
//! range of dates `chrono` can represent; the generator treats that as the end of a sequence.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::rule::{Frequency, WeekdaySet};

/// Step `date` forward by `interval` units of `frequency`.
///
/// Month and year steps keep the day of the month, clamped to the last day of the target month,
/// so Jan 31 + 1 month is Feb 28 (or 29) and Feb 29 + 1 year is Feb 28.
pub fn advance(date: NaiveDate, frequency: Frequency, interval: u32) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => date.checked_add_days(Days::new(u64::from(interval))),
        Frequency::Weekly => date.checked_add_days(Days::new(u64::from(interval) * 7)),
        Frequency::Monthly => date.checked_add_months(Months::new(interval)),
        Frequency::Yearly => date.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

/// Resolve `ordinal` `weekday` of a month, e.g. `(2, Fri)` is the second Friday and `(-1, Sun)`
/// the last Sunday. Returns `None` if the month has fewer than `|ordinal|` such weekdays.
pub fn resolve_relative_weekday(
    year: i32,
    month: u32,
    ordinal: i8,
    weekday: Weekday,
) -> Option<NaiveDate> {
    if ordinal > 0 {
        return NaiveDate::from_weekday_of_month_opt(year, month, weekday, ordinal.unsigned_abs());
    }
    if ordinal == 0 {
        return None;
    }

    let last = last_day_of_month(year, month)?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    let offset = back + 7 * (u32::from(ordinal.unsigned_abs()) - 1);
    let day = last.day().checked_sub(offset).filter(|day| *day > 0)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Membership test for weekly expansion.
pub fn matches_weekday_set(date: NaiveDate, set: WeekdaySet) -> bool {
    set.contains(date.weekday())
}

pub(crate) fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    (28..=31).rev().find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
}

pub(crate) fn first_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}
