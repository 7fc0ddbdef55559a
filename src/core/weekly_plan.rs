//! Weekly practice goals and progress.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::model::DailyProgress;

pub const DEFAULT_MINUTES_GOAL: u32 = 105;
pub const DEFAULT_BODY_EXERCISES_GOAL: u32 = 7;
pub const DEFAULT_SPEECH_EXERCISES_GOAL: u32 = 14;

/// Minutes of practice in one day that count as that day's body exercise.
pub const BODY_EXERCISE_MINUTES: u32 = 5;

const ON_TRACK_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(default = "default_minutes_goal")]
    pub total_minutes_goal: u32,
    #[serde(default)]
    pub total_minutes_completed: u32,
    #[serde(default = "default_body_goal")]
    pub body_exercises_goal: u32,
    #[serde(default)]
    pub body_exercises_completed: u32,
    #[serde(default = "default_speech_goal")]
    pub speech_exercises_goal: u32,
    #[serde(default)]
    pub speech_exercises_completed: u32,
    #[serde(default)]
    pub weekly_streak: u32,
    #[serde(default)]
    pub is_completed: bool,
}

fn default_minutes_goal() -> u32 {
    DEFAULT_MINUTES_GOAL
}

fn default_body_goal() -> u32 {
    DEFAULT_BODY_EXERCISES_GOAL
}

fn default_speech_goal() -> u32 {
    DEFAULT_SPEECH_EXERCISES_GOAL
}

fn percent(completed: u32, goal: u32) -> f64 {
    if goal == 0 {
        return 0.0;
    }
    (completed as f64 / goal as f64 * 100.0).min(100.0)
}

/// Monday of the week containing `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

impl WeeklyPlan {
    /// Empty plan with the default goals for the week starting at `week_start`.
    pub fn new(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            week_end: week_start + Duration::days(6),
            total_minutes_goal: DEFAULT_MINUTES_GOAL,
            total_minutes_completed: 0,
            body_exercises_goal: DEFAULT_BODY_EXERCISES_GOAL,
            body_exercises_completed: 0,
            speech_exercises_goal: DEFAULT_SPEECH_EXERCISES_GOAL,
            speech_exercises_completed: 0,
            weekly_streak: 0,
            is_completed: false,
        }
    }

    /// Plan for the week containing `today`, with goals scaled to the
    /// difficulty level. Unknown levels get the default goals.
    pub fn for_difficulty(today: NaiveDate, difficulty: &str) -> Self {
        let mut plan = Self::new(week_start_for(today));
        let (minutes, body, speech) = match difficulty.to_lowercase().as_str() {
            "beginner" => (70, 5, 10),
            "advanced" => (140, 10, 21),
            _ => (
                DEFAULT_MINUTES_GOAL,
                DEFAULT_BODY_EXERCISES_GOAL,
                DEFAULT_SPEECH_EXERCISES_GOAL,
            ),
        };
        plan.total_minutes_goal = minutes;
        plan.body_exercises_goal = body;
        plan.speech_exercises_goal = speech;
        plan
    }

    pub fn minutes_progress(&self) -> f64 {
        percent(self.total_minutes_completed, self.total_minutes_goal)
    }

    pub fn body_exercises_progress(&self) -> f64 {
        percent(self.body_exercises_completed, self.body_exercises_goal)
    }

    pub fn speech_exercises_progress(&self) -> f64 {
        percent(self.speech_exercises_completed, self.speech_exercises_goal)
    }

    pub fn is_on_track(&self) -> bool {
        self.minutes_progress() >= ON_TRACK_PERCENT
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.week_start && date <= self.week_end
    }

    /// Fold one day's practice into the weekly totals.
    pub fn apply_daily(&mut self, day: &DailyProgress) {
        self.total_minutes_completed += day.minutes;
        self.speech_exercises_completed += day.speech_exercises;
        if day.minutes >= BODY_EXERCISE_MINUTES {
            self.body_exercises_completed += 1;
        }
        if self.total_minutes_completed >= self.total_minutes_goal {
            self.is_completed = true;
        }
    }

    /// Days left in the week after `today`, never negative.
    pub fn days_remaining(&self, today: NaiveDate) -> u32 {
        (self.week_end - today).num_days().clamp(0, 6) as u32
    }

    pub fn completion_estimate(&self, today: NaiveDate) -> &'static str {
        if self.is_completed {
            return "Completed this week!";
        }
        let progress = self.minutes_progress();
        if progress == 0.0 {
            return "Not started yet";
        }

        let remaining = self.days_remaining(today);
        let elapsed = 7 - remaining;
        let per_day = progress / elapsed as f64;
        let days_to_complete = (100.0 - progress) / per_day;

        if days_to_complete <= remaining as f64 {
            "On track to complete this week"
        } else {
            "May need additional time to complete goals"
        }
    }

    pub fn summary(&self, today: NaiveDate) -> ProgressSummary {
        ProgressSummary {
            total_progress: self.minutes_progress(),
            body_exercises_progress: self.body_exercises_progress(),
            speech_exercises_progress: self.speech_exercises_progress(),
            is_on_track: self.is_on_track(),
            days_remaining: self.days_remaining(today),
            estimated_completion: self.completion_estimate(today).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressSummary {
    pub total_progress: f64,
    pub body_exercises_progress: f64,
    pub speech_exercises_progress: f64,
    pub is_on_track: bool,
    pub days_remaining: u32,
    pub estimated_completion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyGoal {
    pub date: Option<NaiveDate>,
    pub day_name: String,
    pub minutes_goal: u32,
    pub minutes_completed: u32,
    pub body_exercise_goal: u32,
    pub body_exercises_completed: u32,
    pub speech_exercise_goal: u32,
    pub speech_exercises_completed: u32,
    pub is_completed: bool,
}

/// Response of the weekly plan service for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub weekly_plan: WeeklyPlan,
    #[serde(default)]
    pub body_exercises: Vec<serde_json::Value>,
    #[serde(default)]
    pub daily_goals: Vec<DailyGoal>,
    #[serde(default)]
    pub progress_summary: ProgressSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monday() -> NaiveDate {
        date(2024, 3, 4)
    }

    #[test]
    fn test_defaults_and_week_span() {
        let plan = WeeklyPlan::new(monday());
        assert_eq!(plan.week_end, date(2024, 3, 10));
        assert_eq!(plan.total_minutes_goal, 105);
        assert_eq!(plan.body_exercises_goal, 7);
        assert_eq!(plan.speech_exercises_goal, 14);
        assert_eq!(plan.minutes_progress(), 0.0);
    }

    #[test]
    fn test_week_start_is_monday() {
        assert_eq!(week_start_for(date(2024, 3, 7)), monday());
        assert_eq!(week_start_for(date(2024, 3, 10)), monday());
        assert_eq!(week_start_for(monday()), monday());
    }

    #[test]
    fn test_progress_is_capped_and_zero_goal_safe() {
        let mut plan = WeeklyPlan::new(monday());
        plan.total_minutes_completed = 500;
        assert_eq!(plan.minutes_progress(), 100.0);

        plan.speech_exercises_goal = 0;
        plan.speech_exercises_completed = 3;
        assert_eq!(plan.speech_exercises_progress(), 0.0);
    }

    #[test]
    fn test_on_track_threshold() {
        let mut plan = WeeklyPlan::new(monday());
        plan.total_minutes_completed = 85;
        assert!(plan.is_on_track());
        plan.total_minutes_completed = 83;
        assert!(!plan.is_on_track());
    }

    #[test]
    fn test_apply_daily_counts_body_exercise_and_completes() {
        let mut plan = WeeklyPlan::new(monday());
        plan.apply_daily(&DailyProgress {
            date: monday(),
            minutes: 4,
            speech_exercises: 1,
        });
        assert_eq!(plan.body_exercises_completed, 0);
        assert_eq!(plan.speech_exercises_completed, 1);

        plan.apply_daily(&DailyProgress {
            date: date(2024, 3, 5),
            minutes: 101,
            speech_exercises: 2,
        });
        assert_eq!(plan.body_exercises_completed, 1);
        assert_eq!(plan.total_minutes_completed, 105);
        assert!(plan.is_completed);
    }

    #[test]
    fn test_completion_estimates() {
        let mut plan = WeeklyPlan::new(monday());
        assert_eq!(plan.completion_estimate(monday()), "Not started yet");

        // 30 of 105 minutes by Wednesday: ~9.5%/day, needs ~7.5 more days.
        plan.total_minutes_completed = 30;
        assert_eq!(
            plan.completion_estimate(date(2024, 3, 6)),
            "May need additional time to complete goals"
        );

        // 60 of 105 minutes by Tuesday: ~28.6%/day, needs ~1.6 of 5 days.
        plan.total_minutes_completed = 60;
        assert_eq!(
            plan.completion_estimate(date(2024, 3, 5)),
            "On track to complete this week"
        );

        plan.is_completed = true;
        assert_eq!(plan.completion_estimate(date(2024, 3, 5)), "Completed this week!");
    }

    #[test]
    fn test_difficulty_goals() {
        let beginner = WeeklyPlan::for_difficulty(date(2024, 3, 6), "Beginner");
        assert_eq!(beginner.week_start, monday());
        assert_eq!(beginner.total_minutes_goal, 70);
        let unknown = WeeklyPlan::for_difficulty(monday(), "expert");
        assert_eq!(unknown.total_minutes_goal, 105);
    }

    #[test]
    fn test_schedule_deserializes_service_payload() {
        let payload = serde_json::json!({
            "weeklyPlan": {
                "weekStart": "2024-03-04",
                "weekEnd": "2024-03-10",
                "totalMinutesCompleted": 20,
                "weeklyStreak": 2
            },
            "progressSummary": { "totalProgress": 19.0, "isOnTrack": false }
        });
        let schedule: WeeklySchedule = serde_json::from_value(payload).unwrap();
        assert_eq!(schedule.weekly_plan.total_minutes_goal, 105);
        assert_eq!(schedule.weekly_plan.weekly_streak, 2);
        assert!(schedule.daily_goals.is_empty());
        assert!(!schedule.progress_summary.is_on_track);
    }
}
