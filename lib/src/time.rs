//! Universal time.
use std::{fmt, ops};

use serde::{Deserialize, Serialize};
use time::Duration;

/// Seconds since the start of the game's calendar, as a `Duration`.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UT(Duration);

impl UT {
    /// Construct a `UT` from floating-point seconds.
    ///
    /// Saturates at the ends of the representable range; NaN becomes zero.
    pub fn new_seconds(sec: f64) -> UT {
        UT(Duration::saturating_seconds_f64(sec))
    }

    /// Like [`UT::new_seconds`], but `None` for NaN, infinities and times
    /// too far out to represent.
    pub fn try_new_seconds(sec: f64) -> Option<UT> {
        Duration::checked_seconds_f64(sec).map(UT)
    }

    pub fn as_seconds_f64(self) -> f64 {
        self.0.as_seconds_f64()
    }

    #[must_use]
    pub fn add_seconds(self, sec: f64) -> UT {
        UT::new_seconds(self.as_seconds_f64() + sec)
    }

    pub fn checked_add_seconds(self, sec: f64) -> Option<UT> {
        UT::try_new_seconds(self.as_seconds_f64() + sec)
    }
}

impl ops::Sub<UT> for UT {
    type Output = Duration;

    fn sub(self, rhs: UT) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ops::Sub<Duration> for UT {
    type Output = UT;

    fn sub(self, rhs: Duration) -> Self::Output {
        UT(self.0 - rhs)
    }
}

impl ops::Add<Duration> for UT {
    type Output = UT;

    fn add(self, rhs: Duration) -> Self::Output {
        UT(self.0 + rhs)
    }
}

impl fmt::Display for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // Kerbin calendar: 6 hour days, 426 day years.
            let d = self.0;
            let days = d.whole_hours() / 6;
            write!(
                f,
                "Y{} D{:03} {:02}:{:02}:{:02}",
                days / 426 + 1,
                days % 426 + 1,
                (d.whole_hours() % 6).unsigned_abs(),
                (d.whole_minutes() % 60).unsigned_abs(),
                (d.whole_seconds() % 60).unsigned_abs(),
            )
        } else {
            write!(f, "UT({}s)", self.0.as_seconds_f64())
        }
    }
}

impl fmt::Debug for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[test]
fn seconds_round_trip() {
    let ut = UT::new_seconds(12_345.5);
    assert!((ut.as_seconds_f64() - 12_345.5).abs() < 1e-6);
    assert_eq!(UT::try_new_seconds(f64::NAN), None);
    assert!(ut.add_seconds(10.0) > ut);
}

#[test]
fn out_of_range_seconds() {
    assert_eq!(UT::try_new_seconds(f64::INFINITY), None);
    assert_eq!(UT::try_new_seconds(1e30), None);
    assert_eq!(UT::new_seconds(f64::NAN), UT::default());
    assert!(UT::new_seconds(1e30) > UT::new_seconds(1e18));
    assert_eq!(UT::new_seconds(100.0).checked_add_seconds(f64::NAN), None);
    assert!(UT::new_seconds(100.0).checked_add_seconds(1e6).is_some());
}
