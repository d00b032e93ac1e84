/// Campaign start, the day counter of the speed tiers begins here
pub const CAMPAIGN_START_TIMESTAMP: i64 = 1_724_760_000;

const SECONDS_PER_DAY: i64 = 86_400;
const BASE_INTERVAL: f64 = 1583.0;
const BOOST_WINDOW_SECONDS: i64 = 3600;

/// (referrals needed, days since campaign start needed, speed percent), richest first
const SPEED_TIERS: [(u64, i64, u32); 10] = [
    (300, 18, 250),
    (200, 16, 200),
    (100, 14, 175),
    (50, 12, 150),
    (25, 10, 125),
    (10, 8, 115),
    (5, 6, 100),
    (4, 4, 50),
    (3, 2, 25),
    (1, i64::MIN, 10),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed {
    pub percent: u32,
    pub interval: u64,
}

/// Whole days elapsed since the campaign start
pub fn days_since_start(now: i64) -> i64 {
    (now - CAMPAIGN_START_TIMESTAMP).div_euclid(SECONDS_PER_DAY)
}

/// Speed percent of the first tier satisfied by the inputs
pub fn speed_percent(referrals_count: u64, days_since_start: i64) -> u32 {
    SPEED_TIERS
        .iter()
        .find(|(referrals, days, _)| referrals_count >= *referrals && days_since_start >= *days)
        .map(|(_, _, percent)| *percent)
        .unwrap_or(0)
}

/// Speed for the display line and the per-tap interval derived from it
pub fn speed_calc(referrals_count: u64, time_since_last_boost: i64, now: i64) -> Speed {
    let percent = speed_percent(referrals_count, days_since_start(now));
    // Halves round to even
    let interval =
        (BASE_INTERVAL + BASE_INTERVAL * f64::from(percent) / 100.0).round_ties_even() as u64;

    Speed {
        percent,
        interval: if time_since_last_boost < BOOST_WINDOW_SECONDS {
            interval * 2
        } else {
            interval
        },
    }
}
