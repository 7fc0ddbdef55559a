//! Local practice log with derived statistics, streaks and achievements.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ports::Storage;
use crate::utils::error::{PracticeError, Result};

pub const HISTORY_KEY: &str = "sessionHistory";
pub const ACHIEVEMENTS_KEY: &str = "achievements";

/// Oldest entries are dropped beyond this many sessions.
pub const MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSession {
    pub exercise_type: String,
    pub score: u8,
    pub duration_minutes: u32,
    pub points: u32,
    pub timestamp: DateTime<Utc>,
}

impl PracticeSession {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PracticeStatistics {
    pub total_sessions: usize,
    pub total_minutes: u32,
    /// Mean of the positive scores, one decimal.
    pub average_score: f64,
    pub practice_days: usize,
    /// Share of the window's days with practice, percent with one decimal.
    pub consistency_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExerciseStatistics {
    pub total_exercises: usize,
    pub sessions_by_type: BTreeMap<String, usize>,
    pub average_score_by_type: BTreeMap<String, f64>,
    /// Mean of the last three scores minus mean of the first three, for types
    /// with at least five scored sessions.
    pub improvement_by_type: BTreeMap<String, f64>,
    pub most_practiced: Option<String>,
    pub best_performing: Option<String>,
}

/// Aggregate progress the achievement table is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub exercises_completed: u32,
    pub streak_days: u32,
    pub total_points: u32,
    pub best_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub description: String,
    pub points: u32,
    pub earned_at: DateTime<Utc>,
}

struct Criterion {
    name: &'static str,
    description: &'static str,
    points: u32,
    earned: fn(&ProgressSnapshot) -> bool,
}

const ACHIEVEMENT_TABLE: [Criterion; 8] = [
    Criterion {
        name: "First Steps",
        description: "Complete your first exercise",
        points: 10,
        earned: |p| p.exercises_completed >= 1,
    },
    Criterion {
        name: "Getting Started",
        description: "Complete 10 exercises",
        points: 25,
        earned: |p| p.exercises_completed >= 10,
    },
    Criterion {
        name: "Dedicated Learner",
        description: "Complete 50 exercises",
        points: 100,
        earned: |p| p.exercises_completed >= 50,
    },
    Criterion {
        name: "Speech Master",
        description: "Complete 100 exercises",
        points: 250,
        earned: |p| p.exercises_completed >= 100,
    },
    Criterion {
        name: "3-Day Warrior",
        description: "Practice for 3 days straight",
        points: 50,
        earned: |p| p.streak_days >= 3,
    },
    Criterion {
        name: "Week Champion",
        description: "Practice for 7 days straight",
        points: 150,
        earned: |p| p.streak_days >= 7,
    },
    Criterion {
        name: "Point Collector",
        description: "Earn 500 points",
        points: 75,
        earned: |p| p.total_points >= 500,
    },
    Criterion {
        name: "High Scorer",
        description: "Score 90+ on any exercise",
        points: 100,
        earned: |p| p.best_score >= 90,
    },
];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Consecutive practice days ending today, or ending yesterday when there is
/// no practice yet today.
pub fn streak_from_dates(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut day = if dates.contains(&today) {
        today
    } else if dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

pub struct History<S: Storage> {
    storage: S,
}

impl<S: Storage> History<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn sessions(&self) -> Result<Vec<PracticeSession>> {
        match self.storage.read_file(HISTORY_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a session, keeping only the most recent [`MAX_SESSIONS`].
    pub async fn record(&self, session: PracticeSession) -> Result<()> {
        let mut sessions = self.sessions().await?;
        sessions.push(session);
        if sessions.len() > MAX_SESSIONS {
            let excess = sessions.len() - MAX_SESSIONS;
            sessions.drain(..excess);
        }

        let data = serde_json::to_vec_pretty(&sessions)?;
        self.storage.write_file(HISTORY_KEY, &data).await?;
        tracing::debug!("History now holds {} sessions", sessions.len());
        Ok(())
    }

    /// Sessions dated on or after `days` before `now`.
    pub async fn recent(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<PracticeSession>> {
        let cutoff = (now - Duration::days(days as i64)).date_naive();
        Ok(self
            .sessions()
            .await?
            .into_iter()
            .filter(|s| s.date() >= cutoff)
            .collect())
    }

    pub async fn statistics(&self, days: u32, now: DateTime<Utc>) -> Result<PracticeStatistics> {
        if days == 0 {
            return Err(PracticeError::ValidationError {
                message: "statistics window must be at least one day".to_string(),
            });
        }

        let recent = self.recent(days, now).await?;
        if recent.is_empty() {
            return Ok(PracticeStatistics::default());
        }

        let scores: Vec<u8> = recent.iter().map(|s| s.score).filter(|&s| s > 0).collect();
        let practice_days = recent.iter().map(PracticeSession::date).collect::<HashSet<_>>().len();

        Ok(PracticeStatistics {
            total_sessions: recent.len(),
            total_minutes: recent.iter().map(|s| s.duration_minutes).sum(),
            average_score: round1(mean(&scores)),
            practice_days,
            consistency_rate: round1(practice_days as f64 / days as f64 * 100.0),
        })
    }

    pub async fn exercise_statistics(&self) -> Result<ExerciseStatistics> {
        let sessions = self.sessions().await?;

        let mut sessions_by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut scores_by_type: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for session in &sessions {
            *sessions_by_type.entry(session.exercise_type.clone()).or_default() += 1;
            let scores = scores_by_type.entry(session.exercise_type.clone()).or_default();
            if session.score > 0 {
                scores.push(session.score);
            }
        }

        let average_score_by_type: BTreeMap<String, f64> = scores_by_type
            .iter()
            .filter(|(_, scores)| !scores.is_empty())
            .map(|(kind, scores)| (kind.clone(), round1(mean(scores))))
            .collect();

        let improvement_by_type = scores_by_type
            .iter()
            .filter(|(_, scores)| scores.len() >= 5)
            .map(|(kind, scores)| {
                let early = mean(&scores[..3]);
                let late = mean(&scores[scores.len() - 3..]);
                (kind.clone(), round1(late - early))
            })
            .collect();

        // Ties resolve to the alphabetically first type.
        let most_practiced = sessions_by_type
            .iter()
            .fold(None::<(&String, usize)>, |best, (kind, &count)| match best {
                Some((_, c)) if c >= count => best,
                _ => Some((kind, count)),
            })
            .map(|(kind, _)| kind.clone());
        let best_performing = average_score_by_type
            .iter()
            .fold(None::<(&String, f64)>, |best, (kind, &avg)| match best {
                Some((_, a)) if a >= avg => best,
                _ => Some((kind, avg)),
            })
            .map(|(kind, _)| kind.clone());

        Ok(ExerciseStatistics {
            total_exercises: sessions.len(),
            sessions_by_type,
            average_score_by_type,
            improvement_by_type,
            most_practiced,
            best_performing,
        })
    }

    pub async fn streak(&self, today: NaiveDate) -> Result<u32> {
        let dates: BTreeSet<NaiveDate> = self.sessions().await?.iter().map(PracticeSession::date).collect();
        Ok(streak_from_dates(&dates, today))
    }

    /// Totals over the whole log, as of `today`.
    pub async fn progress(&self, today: NaiveDate) -> Result<ProgressSnapshot> {
        let sessions = self.sessions().await?;
        let dates: BTreeSet<NaiveDate> = sessions.iter().map(PracticeSession::date).collect();
        Ok(ProgressSnapshot {
            exercises_completed: sessions.len() as u32,
            streak_days: streak_from_dates(&dates, today),
            total_points: sessions.iter().map(|s| s.points).sum(),
            best_score: sessions.iter().map(|s| s.score).max().unwrap_or(0),
        })
    }

    pub async fn achievements(&self) -> Result<Vec<Achievement>> {
        match self.storage.read_file(ACHIEVEMENTS_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Award every achievement whose criterion now holds and that was not
    /// earned before. Returns only the newly earned ones.
    pub async fn check_achievements(
        &self,
        progress: &ProgressSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<Achievement>> {
        let mut earned = self.achievements().await?;
        let known: HashSet<String> = earned.iter().map(|a| a.name.clone()).collect();

        let new: Vec<Achievement> = ACHIEVEMENT_TABLE
            .iter()
            .filter(|c| !known.contains(c.name) && (c.earned)(progress))
            .map(|c| Achievement {
                name: c.name.to_string(),
                description: c.description.to_string(),
                points: c.points,
                earned_at: now,
            })
            .collect();

        if !new.is_empty() {
            for achievement in &new {
                tracing::info!("Achievement unlocked: {} (+{} pts)", achievement.name, achievement.points);
            }
            earned.extend(new.iter().cloned());
            let data = serde_json::to_vec_pretty(&earned)?;
            self.storage.write_file(ACHIEVEMENTS_KEY, &data).await?;
        }

        Ok(new)
    }

    pub async fn export_csv(&self) -> Result<String> {
        let sessions = self.sessions().await?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        for session in &sessions {
            writer.serialize(session)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PracticeError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| PracticeError::ValidationError {
            message: format!("history export is not valid UTF-8: {}", e),
        })
    }

    /// Remove the log and earned achievements.
    pub async fn clear(&self) -> Result<()> {
        self.storage.remove_file(HISTORY_KEY).await?;
        self.storage.remove_file(ACHIEVEMENTS_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::tests::MockStorage;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn session(kind: &str, score: u8, minutes: u32, timestamp: DateTime<Utc>) -> PracticeSession {
        PracticeSession {
            exercise_type: kind.to_string(),
            score,
            duration_minutes: minutes,
            points: score as u32 / 10,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_empty_history() {
        let history = History::new(MockStorage::default());
        assert!(history.sessions().await.unwrap().is_empty());
        assert_eq!(
            history.statistics(30, at(10, 12)).await.unwrap(),
            PracticeStatistics::default()
        );
        assert_eq!(history.streak(at(10, 12).date_naive()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_log_is_capped() {
        let history = History::new(MockStorage::default());
        let many: Vec<PracticeSession> = (0..MAX_SESSIONS as u32 + 5)
            .map(|i| session("storytelling", (i % 100) as u8, 1, at(1, 0)))
            .collect();
        let data = serde_json::to_vec(&many[..MAX_SESSIONS]).unwrap();
        history.storage.write_file(HISTORY_KEY, &data).await.unwrap();

        history
            .record(session("storytelling", 77, 2, at(2, 0)))
            .await
            .unwrap();
        let stored = history.sessions().await.unwrap();
        assert_eq!(stored.len(), MAX_SESSIONS);
        assert_eq!(stored.last().unwrap().score, 77);
        assert_eq!(stored[0].score, 1);
    }

    #[tokio::test]
    async fn test_statistics_window() {
        let history = History::new(MockStorage::default());
        history.record(session("storytelling", 80, 3, at(1, 9))).await.unwrap();
        history.record(session("storytelling", 0, 2, at(8, 9))).await.unwrap();
        history.record(session("tongue", 71, 4, at(9, 9))).await.unwrap();
        history.record(session("tongue", 90, 1, at(9, 18))).await.unwrap();

        let stats = history.statistics(7, at(10, 12)).await.unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_minutes, 7);
        assert_eq!(stats.average_score, 80.5);
        assert_eq!(stats.practice_days, 2);
        assert_eq!(stats.consistency_rate, 28.6);

        assert!(history.statistics(0, at(10, 12)).await.is_err());
    }

    #[test]
    fn test_streak_ends_today_or_yesterday() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let dates: BTreeSet<NaiveDate> = [day(5), day(6), day(7), day(9)].into_iter().collect();

        assert_eq!(streak_from_dates(&dates, day(9)), 1);
        assert_eq!(streak_from_dates(&dates, day(8)), 3);
        assert_eq!(streak_from_dates(&dates, day(10)), 1);
        assert_eq!(streak_from_dates(&dates, day(11)), 0);
    }

    #[tokio::test]
    async fn test_achievements_are_awarded_once() {
        let history = History::new(MockStorage::default());
        let progress = ProgressSnapshot {
            exercises_completed: 12,
            streak_days: 3,
            total_points: 40,
            best_score: 92,
        };

        let first = history.check_achievements(&progress, at(10, 12)).await.unwrap();
        let names: Vec<_> = first.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["First Steps", "Getting Started", "3-Day Warrior", "High Scorer"]);

        let again = history.check_achievements(&progress, at(11, 12)).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(history.achievements().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_progress_snapshot() {
        let history = History::new(MockStorage::default());
        history.record(session("storytelling", 85, 3, at(8, 9))).await.unwrap();
        history.record(session("storytelling", 60, 3, at(9, 9))).await.unwrap();

        let progress = history.progress(at(9, 20).date_naive()).await.unwrap();
        assert_eq!(progress.exercises_completed, 2);
        assert_eq!(progress.streak_days, 2);
        assert_eq!(progress.total_points, 14);
        assert_eq!(progress.best_score, 85);
    }

    #[tokio::test]
    async fn test_exercise_statistics_trends() {
        let history = History::new(MockStorage::default());
        for (i, score) in [50u8, 55, 60, 70, 80, 90].iter().enumerate() {
            history
                .record(session("storytelling", *score, 2, at(1 + i as u32, 9)))
                .await
                .unwrap();
        }
        history.record(session("jaw", 95, 1, at(7, 9))).await.unwrap();

        let stats = history.exercise_statistics().await.unwrap();
        assert_eq!(stats.total_exercises, 7);
        assert_eq!(stats.sessions_by_type["storytelling"], 6);
        assert_eq!(stats.improvement_by_type["storytelling"], 25.0);
        assert!(!stats.improvement_by_type.contains_key("jaw"));
        assert_eq!(stats.most_practiced.as_deref(), Some("storytelling"));
        assert_eq!(stats.best_performing.as_deref(), Some("jaw"));
    }

    #[tokio::test]
    async fn test_export_csv() {
        let history = History::new(MockStorage::default());
        history.record(session("storytelling", 88, 2, at(3, 9))).await.unwrap();

        let csv = history.export_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("exercise_type,score,duration_minutes,points,timestamp")
        );
        assert!(lines.next().unwrap().starts_with("storytelling,88,2,8,2024-03-03T09:00:00"));
    }
}
