use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storage::repository::ActivityRepository;
use study_core::model::{LearnerActivity, LearnerId, current_streak};

use crate::Clock;
use crate::error::ActivityError;

/// How many past active days are inspected when computing a streak.
pub const STREAK_LOOKBACK_DAYS: u32 = 366;

/// Receives "learner was active at time T" events.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    /// # Errors
    ///
    /// Returns `ActivityError` if the event could not be stored. Emitters treat this
    /// as the recorder's own failure.
    async fn record_activity(
        &self,
        learner_id: LearnerId,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError>;
}

/// Stores learner activity per day and derives study streaks from it.
#[derive(Clone)]
pub struct ActivityService {
    clock: Clock,
    activity: Arc<dyn ActivityRepository>,
}

impl ActivityService {
    #[must_use]
    pub fn new(clock: Clock, activity: Arc<dyn ActivityRepository>) -> Self {
        Self { clock, activity }
    }

    /// Consecutive active days ending today (or yesterday, if today is still open).
    ///
    /// # Errors
    ///
    /// Returns `ActivityError::Storage` if activity cannot be read.
    pub async fn current_streak(&self, learner_id: LearnerId) -> Result<u32, ActivityError> {
        let days = self
            .activity
            .recent_activity(learner_id, STREAK_LOOKBACK_DAYS)
            .await?;
        let today = self.clock.now().date_naive();
        Ok(current_streak(days.into_iter().map(|d| d.active_on), today))
    }

    /// # Errors
    ///
    /// Returns `ActivityError::Storage` if activity cannot be read.
    pub async fn recent_activity(
        &self,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<LearnerActivity>, ActivityError> {
        Ok(self.activity.recent_activity(learner_id, limit).await?)
    }
}

#[async_trait]
impl ActivityRecorder for ActivityService {
    async fn record_activity(
        &self,
        learner_id: LearnerId,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        self.activity.record_activity(learner_id, at).await?;
        Ok(())
    }
}
