use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: serde_json::Value,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_goal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_goal: Option<u32>,
}

impl User {
    /// The user id as the services expect it in URL paths.
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Catalog entry as served by the exercise database (snake_case keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub exercise_name: String,
    #[serde(default)]
    pub exercise_type: String,
    #[serde(default)]
    pub difficulty_level: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_muscles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub total_exercises: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseStatisticsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub statistics: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub available_exercise_types: Vec<String>,
    #[serde(default)]
    pub available_difficulty_levels: Vec<String>,
    #[serde(default)]
    pub available_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScoreSubmission {
    pub user_id: String,
    pub game_id: String,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints_used: Option<u32>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds_completed: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScoreReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub score_id: Option<i64>,
    #[serde(default)]
    pub points: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    #[serde(default)]
    pub total_games: u32,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub average_accuracy: f64,
    #[serde(default)]
    pub games_played: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub accuracy: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub user_id: String,
    pub exercise_data: ExerciseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseResult {
    #[serde(rename = "type")]
    pub exercise_type: String,
    pub score: u8,
    /// Whole minutes.
    pub duration: u32,
    pub points: u32,
    pub timestamp: DateTime<Utc>,
}

/// Body sent to the speech-analysis service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAnalysisRequest {
    /// Base64 encoded WAV bytes.
    pub audio: String,
    pub audio_format: String,
    pub story_id: Option<String>,
    pub story_title: Option<String>,
    pub story_content: Option<String>,
    pub story_word_count: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub minutes: u32,
    pub speech_exercises: u32,
}

/// Text read aloud during a storytelling attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Story {
    pub fn word_count(&self) -> u32 {
        self.content.split_whitespace().count() as u32
    }
}
