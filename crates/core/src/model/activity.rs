use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::LearnerId;

/// One row per learner per UTC day on which they studied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerActivity {
    pub learner_id: LearnerId,
    pub active_on: NaiveDate,
    /// Latest activity seen on `active_on`.
    pub last_active_at: DateTime<Utc>,
}

impl LearnerActivity {
    #[must_use]
    pub fn at(learner_id: LearnerId, at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            active_on: at.date_naive(),
            last_active_at: at,
        }
    }
}

/// Number of consecutive active days ending today, or yesterday if today has no
/// activity yet. Duplicate and out-of-order dates are fine.
#[must_use]
pub fn current_streak(days: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = days.into_iter().collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.checked_sub_days(Days::new(1)) {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.checked_sub_days(Days::new(1)) {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}
