//! Scenario-based conversation practice against a chat-completions service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::chat::{describe_failure, ChatClient, ChatMessage, ChatRole};
use crate::core::recorder::SpeechQueue;
use crate::domain::ports::SpeechSynthesizer;
use crate::utils::error::{PracticeError, Result};

/// Turns sent along with each new message, oldest dropped first.
pub const HISTORY_WINDOW: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub id: &'static str,
    pub persona: &'static str,
    pub role: &'static str,
    pub context: &'static str,
    pub difficulty: &'static str,
}

pub static SCENARIOS: [Scenario; 6] = [
    Scenario {
        id: "meeting-new-people",
        persona: "Alex",
        role: "You are Alex, a friendly new neighbor who just moved to the area. You're outgoing and genuinely interested in meeting new people. Keep responses conversational, ask follow-up questions, and show enthusiasm about making new friends.",
        context: "Meeting new people at a neighborhood gathering",
        difficulty: "beginner",
    },
    Scenario {
        id: "job-interview",
        persona: "Sarah",
        role: "You are Sarah, a senior HR manager at TechCorp conducting a job interview. You're professional but warm, asking relevant questions about experience and skills. Provide constructive feedback and ask follow-up questions.",
        context: "Professional job interview setting",
        difficulty: "intermediate",
    },
    Scenario {
        id: "social-gathering",
        persona: "Mike",
        role: "You are Mike, a sociable person at a party. You're good at making small talk and helping people feel comfortable. Keep the conversation light and engaging, ask about interests and experiences.",
        context: "Casual party conversation",
        difficulty: "beginner",
    },
    Scenario {
        id: "customer-service",
        persona: "Lisa",
        role: "You are Lisa, a helpful customer service representative. You're patient, professional, and focused on solving customer needs. Ask clarifying questions and provide helpful solutions.",
        context: "Retail store customer service",
        difficulty: "intermediate",
    },
    Scenario {
        id: "academic-presentation",
        persona: "Professor Johnson",
        role: "You are Professor Johnson, an academic presenting research findings. You're knowledgeable and engaging, asking thoughtful questions about the research and providing academic insights.",
        context: "Academic presentation and discussion",
        difficulty: "advanced",
    },
    Scenario {
        id: "dating-conversation",
        persona: "Emma",
        role: "You are Emma, someone on a first date. You're interested in getting to know the other person, asking thoughtful questions about their life, interests, and experiences. Keep it respectful and engaging.",
        context: "First date conversation",
        difficulty: "intermediate",
    },
];

const GUIDELINES: &str = "Guidelines:
- Respond naturally and conversationally, like a real person
- Reference what the user just said and never repeat an earlier reply
- Ask a relevant follow-up question to keep the conversation going
- If the user shares something personal, acknowledge it and ask more about it
- Be empathetic and supportive when appropriate";

impl Scenario {
    pub fn find(id: &str) -> Option<&'static Scenario> {
        let id = id.trim();
        SCENARIOS.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "{}\n\n{}\n\nCurrent scenario: {}\nDifficulty level: {}",
            self.role, GUIDELINES, self.context, self.difficulty
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplySource {
    Service,
    /// The service failed; the reply came from the keyword table.
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReplySource::Fallback { .. })
    }
}

pub struct Conversation {
    scenario: &'static Scenario,
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(scenario: &'static Scenario) -> Self {
        Self {
            scenario,
            turns: Vec::new(),
        }
    }

    pub fn scenario(&self) -> &'static Scenario {
        self.scenario
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// System prompt, the last [`HISTORY_WINDOW`] turns, then the new message.
    pub fn prompt(&self, user_message: &str) -> Vec<ChatMessage> {
        let start = self.turns.len().saturating_sub(HISTORY_WINDOW);
        let mut messages = Vec::with_capacity(self.turns.len() - start + 2);
        messages.push(ChatMessage::new(ChatRole::System, self.scenario.system_prompt()));
        messages.extend(self.turns[start..].iter().map(|turn| {
            let role = match turn.speaker {
                Speaker::User => ChatRole::User,
                Speaker::Ai => ChatRole::Assistant,
            };
            ChatMessage::new(role, turn.text.clone())
        }));
        messages.push(ChatMessage::new(ChatRole::User, user_message));
        messages
    }

    /// Ask the service for the next line. A failed call never ends the
    /// conversation: the keyword fallback answers instead.
    pub async fn reply(&mut self, chat: &ChatClient, user_message: &str) -> Result<Reply> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(PracticeError::ValidationError {
                message: "message cannot be empty".to_string(),
            });
        }

        let prompt = self.prompt(user_message);
        self.push(Speaker::User, user_message);

        let reply = match chat.complete(&prompt).await {
            Ok(reply) => Reply {
                text: reply.content,
                source: ReplySource::Service,
            },
            Err(e) => {
                let reason = describe_failure(&e);
                tracing::warn!("Chat service failed ({}), using fallback reply", reason);
                Reply {
                    text: fallback_reply(user_message).to_string(),
                    source: ReplySource::Fallback { reason },
                }
            }
        };
        self.push(Speaker::Ai, &reply.text);
        Ok(reply)
    }

    /// Speak the latest AI line, replacing whatever is being spoken.
    pub fn read_aloud<T: SpeechSynthesizer>(&self, queue: &mut SpeechQueue<T>) {
        if let Some(turn) = self.turns.iter().rev().find(|t| t.speaker == Speaker::Ai) {
            queue.speak(&turn.text);
        }
    }

    pub fn analyze(&self) -> ConversationAnalysis {
        analyze(&self.turns)
    }

    fn push(&mut self, speaker: Speaker, text: &str) {
        self.turns.push(Turn {
            speaker,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Keyword-matched reply used when the chat service is unavailable.
pub fn fallback_reply(user_message: &str) -> &'static str {
    let lower = user_message.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["work", "job"]) {
        "That sounds like interesting work! What do you enjoy most about your job? I'd love to hear more about your experience."
    } else if has(&["family", "kids", "children"]) {
        "Family is so important! Tell me more about your family. What's something special about them that you'd like to share?"
    } else if has(&["hobby", "interest", "like to do"]) {
        "That's a fascinating hobby! How did you get into that? I'm curious to learn more about what makes it special to you."
    } else if has(&["travel", "visit", "been to"]) {
        "Traveling is wonderful! What was your favorite part of that experience? I'd love to hear about what made it memorable."
    } else if has(&["music", "song", "artist"]) {
        "Music is amazing! What is it about that music that speaks to you? I'm interested in hearing what draws you to it."
    } else {
        "That's really interesting! I'd love to hear more about that. What's something specific about it that you find most meaningful?"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationFlow {
    NeedsEncouragement,
    Good,
    Excellent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationAnalysis {
    pub total_messages: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    /// Mean seconds between a user line and the AI line right after it.
    pub average_response_secs: f64,
    pub flow: ConversationFlow,
    pub suggestions: Vec<String>,
}

pub fn analyze(turns: &[Turn]) -> ConversationAnalysis {
    let user_messages = turns.iter().filter(|t| t.speaker == Speaker::User).count();
    let ai_messages = turns.len() - user_messages;

    let response_times: Vec<f64> = turns
        .windows(2)
        .filter(|pair| pair[0].speaker == Speaker::User && pair[1].speaker == Speaker::Ai)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect();
    let average_response_secs = if response_times.is_empty() {
        0.0
    } else {
        response_times.iter().sum::<f64>() / response_times.len() as f64
    };

    let (flow, suggestions) = match user_messages {
        0..=2 => (
            ConversationFlow::NeedsEncouragement,
            vec!["Try to share more about yourself to keep the conversation going".to_string()],
        ),
        3..=10 => (ConversationFlow::Good, Vec::new()),
        _ => (
            ConversationFlow::Excellent,
            vec!["Great job maintaining an engaging conversation!".to_string()],
        ),
    };

    ConversationAnalysis {
        total_messages: turns.len(),
        user_messages,
        ai_messages,
        average_response_secs,
        flow,
        suggestions,
    }
}
