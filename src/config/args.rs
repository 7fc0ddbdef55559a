use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use super::toml_config::AppConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "speech-practice")]
#[command(about = "Speech practice client: exercises, scored storytelling and progress tracking")]
pub struct CliConfig {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `service.base_url`
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Overrides `storage.data_dir`
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Browse the exercise catalog
    Exercises {
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "type")]
        exercise_type: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Score a WAV recording locally without contacting any service
    Analyze {
        wav: PathBuf,
        /// Text that was read aloud, for reading metrics
        #[arg(long)]
        story_file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Run a full storytelling attempt from a WAV recording
    Practice {
        wav: PathBuf,
        #[arg(long)]
        story_file: Option<PathBuf>,
        #[arg(long, default_value = "Storytelling practice")]
        story_title: String,
        /// Skip the speech-analysis and progress services
        #[arg(long)]
        offline: bool,
    },
    /// Show this week's plan
    Plan,
    /// Practice statistics and achievements from the local log
    History {
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Write the log as CSV to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Game scores and leaderboards
    Games {
        #[command(subcommand)]
        action: GamesCommand,
    },
    /// Store (or clear, with an empty value) the chat service API key
    SetApiKey { key: String },
    /// Role-play a conversation scenario; lines are read from stdin
    Converse {
        /// Scenario id; omit to list the scenarios
        scenario: Option<String>,
        /// Speak each reply with a text-to-speech command
        #[arg(long)]
        read_aloud: bool,
        #[arg(long, default_value = "espeak")]
        speech_command: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum GamesCommand {
    Stats,
    Leaderboard {
        game_id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Submit {
        game_id: String,
        #[arg(long)]
        points: u32,
        #[arg(long)]
        accuracy: Option<u32>,
    },
}

impl CliConfig {
    /// Merge the optional TOML file with command-line overrides and validate.
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                AppConfig::from_file(path)?
            }
            None => AppConfig::default(),
        };
        config.apply_overrides(self.base_url.clone(), self.data_dir.clone());
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ConfigProvider;

    #[test]
    fn test_parse_practice_command() {
        let cli = CliConfig::try_parse_from([
            "speech-practice",
            "--base-url",
            "http://127.0.0.1:9000/api",
            "practice",
            "take.wav",
            "--offline",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Practice { offline: true, .. }
        ));
        let config = cli.resolve().unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/api");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = CliConfig::try_parse_from(["speech-practice", "whoami", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Whoami));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli =
            CliConfig::try_parse_from(["speech-practice", "--base-url", "ftp://x", "plan"]).unwrap();
        assert!(cli.resolve().is_err());
    }

    #[test]
    fn test_parse_converse_command() {
        let cli = CliConfig::try_parse_from([
            "speech-practice",
            "converse",
            "job-interview",
            "--read-aloud",
        ])
        .unwrap();
        match cli.command {
            Command::Converse {
                scenario,
                read_aloud,
                speech_command,
            } => {
                assert_eq!(scenario.as_deref(), Some("job-interview"));
                assert!(read_aloud);
                assert_eq!(speech_command, "espeak");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exercise_filters() {
        let cli = CliConfig::try_parse_from([
            "speech-practice",
            "exercises",
            "--type",
            "breathing",
            "--page",
            "2",
        ])
        .unwrap();
        match cli.command {
            Command::Exercises {
                exercise_type, page, ..
            } => {
                assert_eq!(exercise_type.as_deref(), Some("breathing"));
                assert_eq!(page, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
