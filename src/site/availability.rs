//! Booking availability rules
//!
//! Availability is computed from static tables only: opening hours per
//! weekday, slot length, notice period, booking horizon and blackout dates.
//! Existing bookings are not consulted. `today` is always passed in so the
//! rules stay pure.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Timelike, Weekday};
use std::collections::BTreeSet;

use crate::config::{BookingConfig, OpeningHours, WeeklyHours};
use crate::site::catalog::ServiceOffering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRules {
    pub weekly_hours: WeeklyHours,
    pub slot_minutes: u32,
    pub min_notice_days: u32,
    pub horizon_days: u32,
    pub blackout_dates: BTreeSet<NaiveDate>,
}

impl Default for AvailabilityRules {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}

impl AvailabilityRules {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            weekly_hours: config.weekly_hours.clone(),
            slot_minutes: config.slot_minutes.max(1),
            min_notice_days: config.min_notice_days,
            horizon_days: config.horizon_days,
            blackout_dates: config.blackout_dates.iter().copied().collect(),
        }
    }

    pub fn hours_on(&self, date: NaiveDate) -> Option<OpeningHours> {
        let hours = &self.weekly_hours;
        match date.weekday() {
            Weekday::Mon => hours.monday,
            Weekday::Tue => hours.tuesday,
            Weekday::Wed => hours.wednesday,
            Weekday::Thu => hours.thursday,
            Weekday::Fri => hours.friday,
            Weekday::Sat => hours.saturday,
            Weekday::Sun => hours.sunday,
        }
    }

    /// First and last bookable dates, or `None` when the window is empty
    pub fn booking_window(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let first = today.checked_add_days(Days::new(self.min_notice_days.into()))?;
        let last = today.checked_add_days(Days::new(self.horizon_days.into()))?;
        (first <= last).then_some((first, last))
    }

    pub fn is_date_available(&self, service: &ServiceOffering, date: NaiveDate, today: NaiveDate) -> bool {
        let Some((first, last)) = self.booking_window(today) else {
            return false;
        };
        if date < first || date > last || self.blackout_dates.contains(&date) {
            return false;
        }
        if service.weekdays_only && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        self.hours_on(date).is_some()
    }

    /// Every bookable date in the window, ascending
    pub fn available_dates(&self, service: &ServiceOffering, today: NaiveDate) -> Vec<NaiveDate> {
        let Some((first, last)) = self.booking_window(today) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| self.is_date_available(service, *d, today))
            .collect()
    }

    /// Slot start times on `date` at which the whole service fits before
    /// closing. Empty when the date itself is not bookable.
    pub fn available_times(&self, service: &ServiceOffering, date: NaiveDate, today: NaiveDate) -> Vec<NaiveTime> {
        if !self.is_date_available(service, date, today) {
            return Vec::new();
        }
        let Some(hours) = self.hours_on(date) else {
            return Vec::new();
        };

        let open = minutes_of(hours.open);
        let close = minutes_of(hours.close);
        let mut times = Vec::new();
        let mut start = open;
        while start + service.duration_minutes <= close {
            if let Some(time) = NaiveTime::from_hms_opt(start / 60, start % 60, 0) {
                times.push(time);
            }
            start += self.slot_minutes;
        }
        times
    }

    pub fn is_slot_available(
        &self,
        service: &ServiceOffering,
        date: NaiveDate,
        time: NaiveTime,
        today: NaiveDate,
    ) -> bool {
        self.available_times(service, date, today).contains(&time)
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::catalog::find_service;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2030-03-04 is a Monday
    fn monday() -> NaiveDate {
        date(2030, 3, 4)
    }

    fn counseling() -> &'static ServiceOffering {
        find_service("individual-counseling").unwrap()
    }

    fn workshop() -> &'static ServiceOffering {
        find_service("wellbeing-workshop").unwrap()
    }

    #[test]
    fn test_notice_and_horizon() {
        let rules = AvailabilityRules::default();
        let today = monday();

        assert!(!rules.is_date_available(counseling(), today, today));
        assert!(rules.is_date_available(counseling(), date(2030, 3, 5), today));
        assert!(rules.is_date_available(counseling(), date(2030, 5, 3), today)); // today + 60, Friday
        assert!(!rules.is_date_available(counseling(), date(2030, 5, 6), today));
        assert!(!rules.is_date_available(counseling(), date(2030, 3, 1), today));
    }

    #[test]
    fn test_closed_days_blackouts_and_weekdays_only() {
        let mut rules = AvailabilityRules::default();
        rules.blackout_dates.insert(date(2030, 3, 6));
        let today = monday();
        let saturday = date(2030, 3, 9);
        let sunday = date(2030, 3, 10);

        assert!(!rules.is_date_available(counseling(), sunday, today));
        assert!(rules.is_date_available(counseling(), saturday, today));
        assert!(!rules.is_date_available(workshop(), saturday, today));
        assert!(!rules.is_date_available(counseling(), date(2030, 3, 6), today));
    }

    #[test]
    fn test_available_times_respect_duration() {
        let rules = AvailabilityRules::default();
        let today = monday();
        let tuesday = date(2030, 3, 5);

        let times = rules.available_times(counseling(), tuesday, today);
        assert_eq!(times.first(), Some(&time(9, 0)));
        assert_eq!(times.last(), Some(&time(16, 0)));
        assert_eq!(times.len(), 8);

        // 180 minutes must end by 17:00
        let workshop_times = rules.available_times(workshop(), tuesday, today);
        assert_eq!(workshop_times.last(), Some(&time(14, 0)));

        // Saturday 10:00-14:00 fits a 90 minute session at 10, 11 and 12
        let family = find_service("family-counseling").unwrap();
        let saturday_times = rules.available_times(family, date(2030, 3, 9), today);
        assert_eq!(saturday_times, vec![time(10, 0), time(11, 0), time(12, 0)]);

        assert!(rules.available_times(counseling(), date(2030, 3, 10), today).is_empty());
    }

    #[test]
    fn test_is_slot_available() {
        let rules = AvailabilityRules::default();
        let today = monday();
        let tuesday = date(2030, 3, 5);

        assert!(rules.is_slot_available(counseling(), tuesday, time(10, 0), today));
        assert!(!rules.is_slot_available(counseling(), tuesday, time(10, 30), today));
        assert!(!rules.is_slot_available(counseling(), tuesday, time(17, 0), today));
        assert!(!rules.is_slot_available(counseling(), today, time(10, 0), today));
    }

    #[test]
    fn test_empty_window() {
        let rules = AvailabilityRules {
            min_notice_days: 10,
            horizon_days: 5,
            ..AvailabilityRules::default()
        };
        assert!(rules.available_dates(counseling(), monday()).is_empty());
    }

    #[test]
    fn test_available_dates_default_week() {
        let rules = AvailabilityRules::default();
        let dates = rules.available_dates(counseling(), monday());
        // Tue..Sat of the first week
        assert_eq!(&dates[..5], &[
            date(2030, 3, 5),
            date(2030, 3, 6),
            date(2030, 3, 7),
            date(2030, 3, 8),
            date(2030, 3, 9),
        ]);
        assert_eq!(dates[5], date(2030, 3, 11));
    }

    mod property_tests {
        use super::*;
        use crate::site::catalog::SERVICES;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn dates_and_times_are_consistent(
                service_idx in 0..SERVICES.len(),
                day_offset in 0u64..3650,
                notice in 0u32..5,
                horizon in 0u32..90,
            ) {
                let service = &SERVICES[service_idx];
                let today = date(2025, 1, 1).checked_add_days(Days::new(day_offset)).unwrap();
                let rules = AvailabilityRules {
                    min_notice_days: notice,
                    horizon_days: horizon,
                    ..AvailabilityRules::default()
                };

                let dates = rules.available_dates(service, today);
                prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));

                for d in &dates {
                    prop_assert!(rules.is_date_available(service, *d, today));
                    prop_assert!(*d >= today.checked_add_days(Days::new(notice.into())).unwrap());
                    if service.weekdays_only {
                        prop_assert!(!matches!(d.weekday(), Weekday::Sat | Weekday::Sun));
                    }

                    let hours = rules.hours_on(*d).unwrap();
                    for t in rules.available_times(service, *d, today) {
                        prop_assert!(t >= hours.open);
                        prop_assert!(minutes_of(t) + service.duration_minutes <= minutes_of(hours.close));
                        prop_assert!(rules.is_slot_available(service, *d, t, today));
                    }
                }
            }
        }
    }
}
