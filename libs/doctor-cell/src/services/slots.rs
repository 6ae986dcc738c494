//! Open-slot computation over a weekly availability template.
//!
//! Everything here is synchronous and free of I/O. The storage-facing
//! [`AvailabilityService`](super::availability::AvailabilityService) loads the
//! template and booked intervals and hands them to these functions.

use std::vec;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{BookedInterval, BookingRejection, OpenSlot, WeeklyAvailabilitySlot};

/// Days covered by an availability lookup starting today.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Lazily yields the open slots of every date in `[window_start, window_end)`.
///
/// Each date is resolved on demand; slots within a date come out ordered by
/// `(start_time, end_time)`, and dates are visited in order, so the whole
/// sequence is ordered. The iterator only borrows its inputs and can be cloned
/// to replay from the current position.
#[derive(Debug, Clone)]
pub struct OpenSlots<'a> {
    template: &'a [WeeklyAvailabilitySlot],
    booked: &'a [BookedInterval],
    next_date: Option<NaiveDate>,
    window_end: NaiveDate,
    pending: vec::IntoIter<OpenSlot>,
}

impl<'a> Iterator for OpenSlots<'a> {
    type Item = OpenSlot;

    fn next(&mut self) -> Option<OpenSlot> {
        loop {
            if let Some(slot) = self.pending.next() {
                return Some(slot);
            }

            let date = self.next_date.filter(|date| *date < self.window_end)?;
            self.next_date = date.succ_opt();
            self.pending = open_slots_on(date, self.template, self.booked).into_iter();
        }
    }
}

/// Build the open-slot sequence for a doctor over `[window_start, window_end)`.
///
/// A template slot only counts on dates whose weekday matches its
/// `day_of_week` (0 = Monday) and only while `is_available` is set. Booked
/// intervals are subtracted from each materialised slot independently, so
/// overlapping template rows are not merged. An empty or inverted window
/// yields nothing.
pub fn compute_open_slots<'a>(
    template: &'a [WeeklyAvailabilitySlot],
    booked: &'a [BookedInterval],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> OpenSlots<'a> {
    OpenSlots {
        template,
        booked,
        next_date: Some(window_start),
        window_end,
        pending: Vec::new().into_iter(),
    }
}

/// Accept `[proposed_start, proposed_end)` only if a single open slot
/// contains it entirely.
pub fn validate_booking_request(
    proposed_start: DateTime<Utc>,
    proposed_end: DateTime<Utc>,
    open_slots: &[OpenSlot],
) -> Result<(), BookingRejection> {
    if proposed_end <= proposed_start {
        return Err(BookingRejection::InvalidRange);
    }

    if open_slots
        .iter()
        .any(|slot| slot.contains(proposed_start, proposed_end))
    {
        Ok(())
    } else {
        Err(BookingRejection::OutsideAvailability)
    }
}

fn open_slots_on(
    date: NaiveDate,
    template: &[WeeklyAvailabilitySlot],
    booked: &[BookedInterval],
) -> Vec<OpenSlot> {
    let weekday = date.weekday().num_days_from_monday() as i32;

    let mut slots: Vec<OpenSlot> = template
        .iter()
        .filter(|slot| slot.is_available && slot.day_of_week == weekday)
        .flat_map(|slot| {
            let start = at(date, slot.start_time);
            let end = at(date, slot.end_time);
            subtract_booked(start, end, booked)
        })
        .map(|(start, end)| OpenSlot::new(start, end))
        .collect();

    slots.sort_by_key(|slot| (slot.start_time, slot.end_time));
    slots
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Interval difference of `[start, end)` minus every booked interval.
fn subtract_booked(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    booked: &[BookedInterval],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if end <= start {
        return Vec::new();
    }

    let mut pieces = vec![(start, end)];

    for interval in booked {
        let (c, d) = (interval.start_datetime, interval.end_datetime);
        if d <= c {
            continue;
        }

        pieces = pieces
            .into_iter()
            .flat_map(|(a, b)| {
                if a < d && c < b {
                    let left = (a < c).then_some((a, c));
                    let right = (d < b).then_some((d, b));
                    left.into_iter().chain(right).collect::<Vec<_>>()
                } else {
                    vec![(a, b)]
                }
            })
            .collect();

        if pieces.is_empty() {
            break;
        }
    }

    pieces
}
