// utils/timefmt.rs
use chrono::{DateTime, Utc};

/// Human form of a request's remaining bidding window, matching the client
/// copy: "Expired" or "<h>h <m>m remaining".
pub fn time_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = expires_at - now;

    if diff <= chrono::Duration::zero() {
        return "Expired".to_string();
    }

    let hours = diff.num_hours();
    let minutes = diff.num_minutes() % 60;
    format!("{}h {}m remaining", hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn formats_remaining_window() {
        let now = Utc::now();
        assert_eq!(
            time_remaining(now + Duration::hours(2) + Duration::minutes(30), now),
            "2h 30m remaining"
        );
        assert_eq!(
            time_remaining(now + Duration::minutes(5), now),
            "0h 5m remaining"
        );
    }

    #[test]
    fn past_and_exact_expiry_read_expired() {
        let now = Utc::now();
        assert_eq!(time_remaining(now - Duration::seconds(1), now), "Expired");
        assert_eq!(time_remaining(now, now), "Expired");
    }
}
