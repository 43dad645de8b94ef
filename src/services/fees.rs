//! Late fee policy

use chrono::NaiveDate;

use crate::config::LibraryConfig;

/// Outcome of assessing a return against its planned date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateFee {
    pub days_late: i64,
    pub fee: i64,
}

/// Flat per-day late fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateFeePolicy {
    pub enabled: bool,
    pub daily_rate: i64,
}

impl LateFeePolicy {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            enabled: config.fees_enabled,
            daily_rate: config.daily_late_fee,
        }
    }

    /// Whole days past `planned`, never negative
    pub fn days_late(planned: NaiveDate, actual: NaiveDate) -> i64 {
        (actual - planned).num_days().max(0)
    }

    pub fn assess(&self, planned: NaiveDate, actual: NaiveDate) -> LateFee {
        let days_late = Self::days_late(planned, actual);
        let fee = if self.enabled {
            days_late.saturating_mul(self.daily_rate)
        } else {
            0
        };
        LateFee { days_late, fee }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy() -> LateFeePolicy {
        LateFeePolicy::from_config(&LibraryConfig::default())
    }

    #[test]
    fn test_three_days_late() {
        let due = date(2024, 3, 8);
        let fee = policy().assess(due, date(2024, 3, 11));
        assert_eq!(fee, LateFee { days_late: 3, fee: 15000 });
    }

    #[test]
    fn test_early_and_on_time_returns_are_free() {
        let due = date(2024, 3, 8);
        assert_eq!(policy().assess(due, date(2024, 3, 6)), LateFee { days_late: 0, fee: 0 });
        assert_eq!(policy().assess(due, due), LateFee { days_late: 0, fee: 0 });
    }

    #[test]
    fn test_fee_never_decreases_as_return_moves_later() {
        let due = date(2024, 2, 25);
        let policy = policy();
        let mut previous = 0;
        for offset in -10..40 {
            let actual = due + chrono::Duration::days(offset);
            let fee = policy.assess(due, actual).fee;
            assert!(fee >= previous, "fee dropped at offset {}", offset);
            previous = fee;
        }
    }

    #[test]
    fn test_crosses_month_and_leap_day() {
        // 2024-02-28 -> 2024-03-02 spans Feb 29
        let fee = policy().assess(date(2024, 2, 28), date(2024, 3, 2));
        assert_eq!(fee.days_late, 3);
    }

    #[test]
    fn test_disabled_policy_still_counts_days() {
        let policy = LateFeePolicy {
            enabled: false,
            daily_rate: 5000,
        };
        let fee = policy.assess(date(2024, 1, 1), date(2024, 1, 5));
        assert_eq!(fee, LateFee { days_late: 4, fee: 0 });
    }
}
