use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, ValidationSnafu};

/// Lower bound the ease factor may never cross, per the SM-2 reference.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Ease factor assigned to a record on first contact.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// A recall grade in 0..=5. Grades below 3 count as a failed recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Result<Self> {
        snafu::ensure!(
            value <= 5,
            ValidationSnafu {
                message: format!("quality must be an integer in 0..=5, got {value}"),
            }
        );
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= 3
    }
}

/// The scheduling state produced by one application of SM-2.
#[derive(Debug, Clone, PartialEq)]
pub struct Sm2Outcome {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review_date: DateTime<Utc>,
}

/// One SM-2 state transition. Total over its input domain; callers validate
/// the grade by constructing [`Quality`] first.
///
/// On a failed recall the repetition streak and interval reset and the ease
/// factor is left untouched. On success the ease factor is recalculated
/// first, and the interval progression 1 → 6 → round(interval · ef') uses the
/// *new* ease factor. That ordering is observable (see the tests) and matches
/// the reference formula.
pub fn next_state(
    quality: Quality,
    ease_factor: f64,
    interval: u32,
    repetitions: u32,
    now: DateTime<Utc>,
) -> Sm2Outcome {
    let (ease_factor, interval, repetitions) = if quality.is_correct() {
        let q = f64::from(quality.value());
        let ease_factor =
            (ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);
        let repetitions = repetitions + 1;
        let interval = match repetitions {
            1 => 1,
            2 => 6,
            _ => (f64::from(interval) * ease_factor).round() as u32,
        };
        (ease_factor, interval, repetitions)
    } else {
        (ease_factor, 1, 0)
    };

    Sm2Outcome {
        ease_factor,
        interval,
        repetitions,
        // Whole days from the same clock instant, preserving time-of-day.
        next_review_date: now + Duration::days(i64::from(interval)),
    }
}
