//! Time-window scheduling algorithm.
//!
//! Pure functions from `(base time, policy, random source)` to a future
//! fire time. All randomness flows through the injected `Rng`, so the
//! mapping is deterministic under a seeded generator.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hours of spread when clamping a fire time back into the daytime
/// window: the reset lands at a random point within the first few hours
/// of the window rather than piling up on its start.
const CLAMP_SPREAD_HOURS: u32 = 4;

/// An allowed daily posting window, in local hours. Half-open: the start
/// hour is inside the window, the end hour is not. Fractional hours are
/// supported (8:00 IST is 2.5 in UTC terms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DaytimeWindow {
    pub start_hour: f64,
    pub end_hour: f64,
}

/// Day-part-aware posting frequency policy.
///
/// The heavy window is the high-engagement band of the day; draws inside
/// it use the shorter interval range. Everything else is the light window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    /// Shift applied to UTC before any hour comparison (e.g. 330 for IST).
    pub utc_offset_minutes: i32,
    /// Heavy window start, local hours. Inclusive.
    pub heavy_start_hour: f64,
    /// Heavy window end, local hours. Exclusive.
    pub heavy_end_hour: f64,
    /// Whole-hour interval bounds drawn inside the heavy window.
    pub heavy_interval_hours: (u32, u32),
    /// Whole-hour interval bounds drawn inside the light window.
    pub light_interval_hours: (u32, u32),
    /// Optional clamp keeping fire times out of the quiet period.
    pub daytime: Option<DaytimeWindow>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        // 8:00-23:00 IST posting day, heavier pacing through the
        // afternoon engagement band.
        Self {
            utc_offset_minutes: 330,
            heavy_start_hour: 13.0,
            heavy_end_hour: 20.0,
            heavy_interval_hours: (1, 3),
            light_interval_hours: (3, 6),
            daytime: Some(DaytimeWindow {
                start_hour: 8.0,
                end_hour: 23.0,
            }),
        }
    }
}

impl SchedulingPolicy {
    /// True when `t`'s local hour falls inside the heavy window.
    pub fn in_heavy_window(&self, t: DateTime<Utc>) -> bool {
        let h = local_hour(t, self.utc_offset_minutes);
        h >= self.heavy_start_hour && h < self.heavy_end_hour
    }
}

/// Compute the next fire time from a base time.
///
/// Draws a whole-hour interval from the heavy or light range depending on
/// which window `base` falls in, plus a uniform 0-59 minute offset, then
/// clamps the result into the daytime window when one is configured.
pub fn next_fire_time<R: Rng + ?Sized>(
    base: DateTime<Utc>,
    policy: &SchedulingPolicy,
    rng: &mut R,
) -> DateTime<Utc> {
    let (lo, hi) = if policy.in_heavy_window(base) {
        policy.heavy_interval_hours
    } else {
        policy.light_interval_hours
    };

    let hours = rng.random_range(lo..=hi) as i64;
    let minutes = rng.random_range(0..60u32) as i64;
    let fire = base + Duration::hours(hours) + Duration::minutes(minutes);

    match policy.daytime {
        Some(window) => clamp_to_daytime(fire, window, policy.utc_offset_minutes, rng),
        None => fire,
    }
}

/// Force a fire time into the allowed daytime window.
///
/// Too early: reset the time-of-day to a random point in the first
/// `CLAMP_SPREAD_HOURS` of the window, same day. At or past the end:
/// roll to the next day and reset the same way.
pub fn clamp_to_daytime<R: Rng + ?Sized>(
    t: DateTime<Utc>,
    window: DaytimeWindow,
    utc_offset_minutes: i32,
    rng: &mut R,
) -> DateTime<Utc> {
    let shifted = t + Duration::minutes(utc_offset_minutes as i64);
    let h = hour_fraction(shifted);

    if h >= window.start_hour && h < window.end_hour {
        return t;
    }

    let date = if h < window.start_hour {
        shifted.date_naive()
    } else {
        shifted
            .date_naive()
            .succ_opt()
            .unwrap_or_else(|| shifted.date_naive())
    };

    let minutes_from_midnight = (window.start_hour * 60.0).round() as i64
        + rng.random_range(0..CLAMP_SPREAD_HOURS) as i64 * 60
        + rng.random_range(0..60u32) as i64;

    let local = date.and_time(NaiveTime::MIN) + Duration::minutes(minutes_from_midnight);
    DateTime::<Utc>::from_naive_utc_and_offset(local, Utc) - Duration::minutes(utc_offset_minutes as i64)
}

fn local_hour(t: DateTime<Utc>, utc_offset_minutes: i32) -> f64 {
    hour_fraction(t + Duration::minutes(utc_offset_minutes as i64))
}

fn hour_fraction(t: DateTime<Utc>) -> f64 {
    let time = t.time();
    time.hour() as f64 + time.minute() as f64 / 60.0
}
