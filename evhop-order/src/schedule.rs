use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minimum notice for a same-day pickup.
pub const MIN_LEAD_TIME_MINUTES: i64 = 60;

/// Night service runs 00:00 up to (not including) 06:00 local time.
pub const NIGHT_START_HOUR: u32 = 0;
pub const NIGHT_END_HOUR: u32 = 6;

/// Night slots closer than this are blocked outright.
pub const NIGHT_BLOCK_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Pickup,
    Return,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ScheduleError {
    #[error("Pickup time is in the past")]
    PickupInPast,
    #[error("Pickup must be at least 60 minutes from now (earliest {earliest})")]
    PickupTooSoon { earliest: NaiveDateTime },
    #[error("Return date must not be before the pickup date")]
    ReturnBeforePickupDate,
    #[error("Return time must be after the pickup time on the same day")]
    ReturnNotAfterPickup,
    #[error("Night service for the {leg:?} leg at {at} needs at least 24 hours notice; contact support")]
    NightServiceBlocked { leg: Leg, at: NaiveDateTime },
}

/// Non-blocking notice that a leg falls inside the night-service window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NightAdvisory {
    pub leg: Leg,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub pickup: NaiveDateTime,
    pub return_at: Option<NaiveDateTime>,
}

pub fn is_night_slot(at: NaiveDateTime) -> bool {
    (NIGHT_START_HOUR..NIGHT_END_HOUR).contains(&at.hour())
}

fn check_night(leg: Leg, at: NaiveDateTime, now: NaiveDateTime) -> Result<Option<NightAdvisory>, ScheduleError> {
    if !is_night_slot(at) {
        return Ok(None);
    }
    if at - now < Duration::hours(NIGHT_BLOCK_WINDOW_HOURS) {
        return Err(ScheduleError::NightServiceBlocked { leg, at });
    }
    Ok(Some(NightAdvisory { leg, at }))
}

impl Schedule {
    /// Check the schedule against hotel-local `now`.
    ///
    /// Returns night advisories for legs that are far enough out to be allowed.
    pub fn validate(&self, now: NaiveDateTime) -> Result<Vec<NightAdvisory>, ScheduleError> {
        let today = now.date();

        if self.pickup.date() < today {
            return Err(ScheduleError::PickupInPast);
        }
        if self.pickup.date() == today {
            let earliest = now + Duration::minutes(MIN_LEAD_TIME_MINUTES);
            if self.pickup < now {
                return Err(ScheduleError::PickupInPast);
            }
            if self.pickup < earliest {
                return Err(ScheduleError::PickupTooSoon { earliest });
            }
        }

        if let Some(return_at) = self.return_at {
            if return_at.date() < self.pickup.date() {
                return Err(ScheduleError::ReturnBeforePickupDate);
            }
            if return_at.date() == self.pickup.date() && return_at.time() <= self.pickup.time() {
                return Err(ScheduleError::ReturnNotAfterPickup);
            }
        }

        let mut advisories = Vec::new();
        if let Some(advisory) = check_night(Leg::Pickup, self.pickup, now)? {
            advisories.push(advisory);
        }
        if let Some(return_at) = self.return_at {
            if let Some(advisory) = check_night(Leg::Return, return_at, now)? {
                advisories.push(advisory);
            }
        }

        Ok(advisories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn one_way(pickup: NaiveDateTime) -> Schedule {
        Schedule { pickup, return_at: None }
    }

    #[test]
    fn test_same_day_lead_time() {
        let now = at(18, 10, 0);

        assert_eq!(
            one_way(at(18, 10, 30)).validate(now),
            Err(ScheduleError::PickupTooSoon { earliest: at(18, 11, 0) })
        );
        assert_eq!(one_way(at(18, 11, 0)).validate(now), Ok(vec![]));
        assert_eq!(one_way(at(18, 9, 0)).validate(now), Err(ScheduleError::PickupInPast));
        assert_eq!(one_way(at(17, 15, 0)).validate(now), Err(ScheduleError::PickupInPast));
    }

    #[test]
    fn test_future_date_has_no_time_floor() {
        let now = at(18, 23, 30);
        assert_eq!(one_way(at(19, 8, 0)).validate(now), Ok(vec![]));
    }

    #[test]
    fn test_return_rules() {
        let now = at(18, 8, 0);
        let pickup = at(20, 10, 0);

        let before = Schedule { pickup, return_at: Some(at(19, 12, 0)) };
        assert_eq!(before.validate(now), Err(ScheduleError::ReturnBeforePickupDate));

        let same_time = Schedule { pickup, return_at: Some(at(20, 10, 0)) };
        assert_eq!(same_time.validate(now), Err(ScheduleError::ReturnNotAfterPickup));

        let later = Schedule { pickup, return_at: Some(at(20, 18, 0)) };
        assert_eq!(later.validate(now), Ok(vec![]));

        let next_day_earlier_clock = Schedule { pickup, return_at: Some(at(21, 8, 0)) };
        assert_eq!(next_day_earlier_clock.validate(now), Ok(vec![]));
    }

    #[test]
    fn test_night_pickup_within_24h_is_blocked() {
        // 02:00 pickup, 10 hours away
        let now = at(18, 16, 0);
        let pickup = at(19, 2, 0);

        assert_eq!(
            one_way(pickup).validate(now),
            Err(ScheduleError::NightServiceBlocked { leg: Leg::Pickup, at: pickup })
        );
    }

    #[test]
    fn test_night_pickup_beyond_24h_is_advisory() {
        // Same 02:00 pickup, 30 hours away
        let now = at(17, 20, 0);
        let pickup = at(19, 2, 0);

        assert_eq!(
            one_way(pickup).validate(now),
            Ok(vec![NightAdvisory { leg: Leg::Pickup, at: pickup }])
        );
    }

    #[test]
    fn test_night_return_leg_is_checked() {
        let now = at(18, 8, 0);
        let schedule = Schedule { pickup: at(18, 20, 0), return_at: Some(at(19, 1, 0)) };

        assert!(matches!(
            schedule.validate(now),
            Err(ScheduleError::NightServiceBlocked { leg: Leg::Return, .. })
        ));
    }

    #[test]
    fn test_six_am_is_outside_night_window() {
        assert!(is_night_slot(at(19, 0, 0)));
        assert!(is_night_slot(at(19, 5, 59)));
        assert!(!is_night_slot(at(19, 6, 0)));
    }
}
