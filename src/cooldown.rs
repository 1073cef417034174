use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_COOLDOWN_SECS: i64 = 15 * 60;

/// Most recent refresh across all cities. The cooldown is global: one
/// refreshed city locks out every city, including ones added since.
pub fn last_refresh<I>(timestamps: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    timestamps.into_iter().flatten().max()
}

/// Time left before another refresh is allowed, or `None` if one is allowed now.
pub fn remaining<I>(timestamps: I, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    let last = last_refresh(timestamps)?;
    let elapsed = now - last;

    if elapsed >= cooldown {
        None
    } else {
        Some(cooldown.checked_sub(&elapsed).unwrap_or(Duration::MAX))
    }
}

pub fn can_refresh<I>(timestamps: I, now: DateTime<Utc>, cooldown: Duration) -> bool
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    remaining(timestamps, now, cooldown).is_none()
}
