//! REST client for the practice services.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::core::feedback::BackendAnalysis;
use crate::core::session::LoginData;
use crate::core::weekly_plan::WeeklySchedule;
use crate::domain::model::{
    AuthResponse, Credentials, Exercise, ExerciseListResponse, ExerciseStatisticsResponse,
    GameScoreReceipt, GameScoreSubmission, GameStats, LeaderboardEntry, ProgressUpdate,
    SignupRequest, SpeechAnalysisRequest, Story,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{PracticeError, Result};

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// Body of the speech-analysis response: the re-measured metrics are nested
/// under `analysis`, the service-only scores sit at the top level.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SpeechAnalysisResponse {
    analysis: BackendAnalysis,
    pronunciation_score: Option<f64>,
    fluency_score: Option<f64>,
    intonation_score: Option<f64>,
    stress_pattern_score: Option<f64>,
    word_accuracy: Option<f64>,
    confidence_level: Option<f64>,
    suggested_improvements: Vec<String>,
    detected_issues: Vec<String>,
}

impl From<SpeechAnalysisResponse> for BackendAnalysis {
    fn from(response: SpeechAnalysisResponse) -> Self {
        let mut analysis = response.analysis;
        analysis.pronunciation_score = response.pronunciation_score.or(analysis.pronunciation_score);
        analysis.fluency_score = response.fluency_score.or(analysis.fluency_score);
        analysis.intonation_score = response.intonation_score.or(analysis.intonation_score);
        analysis.stress_pattern_score = response.stress_pattern_score.or(analysis.stress_pattern_score);
        analysis.word_accuracy = response.word_accuracy.or(analysis.word_accuracy);
        analysis.confidence_level = response.confidence_level.or(analysis.confidence_level);
        if !response.suggested_improvements.is_empty() {
            analysis.suggested_improvements = response.suggested_improvements;
        }
        if !response.detected_issues.is_empty() {
            analysis.detected_issues = response.detected_issues;
        }
        analysis
    }
}

/// Pass 2xx responses through; anything else becomes `HttpStatus` carrying the
/// body's `message`, `error` or `error.message` text.
pub(crate) async fn ensure_success(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!("{} responded with {}", endpoint, status);

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            let error = v.get("error");
            v.get("message")
                .or(error)
                .and_then(|m| m.as_str())
                .or_else(|| error.and_then(|e| e.get("message")).and_then(|m| m.as_str()))
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(PracticeError::HttpStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    })
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| PracticeError::InvalidConfigValueError {
            field: "service.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(
            config.base_url(),
            Duration::from_secs(config.request_timeout_secs()),
        )
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        tracing::debug!("Calling {}", endpoint);
        let response = self.authorize(request).send().await?;
        ensure_success(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, path: &str) -> Result<T> {
        let response = self.send(endpoint, self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginData> {
        let request = self.client.post(self.url("/auth/login")).json(credentials);
        let auth: AuthResponse = self.send("auth/login", request).await?.json().await?;

        match (auth.token, auth.user) {
            (Some(token), Some(user)) => Ok(LoginData { token, user }),
            _ => Err(PracticeError::session(
                auth.message.unwrap_or_else(|| "login response carried no session".to_string()),
            )),
        }
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse> {
        let builder = self.client.post(self.url("/auth/signup")).json(request);
        Ok(self.send("auth/signup", builder).await?.json().await?)
    }

    pub async fn all_exercises(&self) -> Result<Vec<Exercise>> {
        let response: ExerciseListResponse = self
            .get_json("database-exercises/all", "/database-exercises/all")
            .await?;
        tracing::info!("Fetched {} exercises", response.exercises.len());
        Ok(response.exercises)
    }

    pub async fn exercise_statistics(&self) -> Result<ExerciseStatisticsResponse> {
        self.get_json("database-exercises/statistics", "/database-exercises/statistics")
            .await
    }

    pub async fn search_exercises(&self, query: &str) -> Result<Vec<Exercise>> {
        let request = self
            .client
            .get(self.url("/database-exercises/search"))
            .query(&[("q", query)]);
        let response: ExerciseListResponse =
            self.send("database-exercises/search", request).await?.json().await?;
        Ok(response.exercises)
    }

    pub async fn exercise_page(&self, page: usize, size: usize) -> Result<ExerciseListResponse> {
        let request = self
            .client
            .get(self.url("/database-exercises/page"))
            .query(&[("page", page), ("size", size)]);
        Ok(self.send("database-exercises/page", request).await?.json().await?)
    }

    pub async fn weekly_plan(&self, user_id: &str) -> Result<WeeklySchedule> {
        self.get_json("weekly-plan", &format!("/weekly-plan/{}", user_id))
            .await
    }

    pub async fn update_weekly_progress(&self, user_id: &str, date: NaiveDate) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/weekly-plan/{}/update-progress", user_id)))
            .query(&[("date", date.format("%Y-%m-%d").to_string())]);
        self.send("weekly-plan/update-progress", request).await?;
        Ok(())
    }

    pub async fn submit_game_score(&self, score: &GameScoreSubmission) -> Result<GameScoreReceipt> {
        let request = self.client.post(self.url("/games/score")).json(score);
        Ok(self.send("games/score", request).await?.json().await?)
    }

    /// Game statistics for a user. Any failure yields zeroed stats.
    pub async fn game_stats(&self, user_id: &str) -> GameStats {
        let path = format!("/games/user/{}/stats", user_id);
        match self.get_json::<GameStats>("games/stats", &path).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Could not load game stats for {}, using defaults: {}", user_id, e);
                GameStats::default()
            }
        }
    }

    pub async fn leaderboard(&self, game_id: &str, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let request = self
            .client
            .get(self.url(&format!("/games/leaderboard/{}", game_id)))
            .query(&[("limit", limit)]);
        Ok(self.send("games/leaderboard", request).await?.json().await?)
    }

    pub async fn update_progress(&self, update: &ProgressUpdate) -> Result<()> {
        let request = self.client.post(self.url("/progress/update")).json(update);
        self.send("progress/update", request).await?;
        Ok(())
    }

    /// Ask the speech-analysis service for a second opinion. Returns `None`
    /// when the service is unreachable or rejects the request.
    pub async fn analyze_speech(&self, wav: &[u8], story: Option<&Story>) -> Option<BackendAnalysis> {
        let body = SpeechAnalysisRequest {
            audio: general_purpose::STANDARD.encode(wav),
            audio_format: "wav".to_string(),
            story_id: story.map(|s| s.id.clone()),
            story_title: story.map(|s| s.title.clone()),
            story_content: story.map(|s| s.content.clone()),
            story_word_count: story.map(Story::word_count),
            timestamp: Utc::now(),
        };

        let request = self.client.post(self.url("/speech-analysis")).json(&body);
        let result = match self.send("speech-analysis", request).await {
            Ok(response) => response.json::<SpeechAnalysisResponse>().await.map_err(PracticeError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => Some(response.into()),
            Err(e) => {
                tracing::warn!("Speech analysis service failed, using local analysis only: {}", e);
                None
            }
        }
    }
}
