use chrono::Utc;
use clap::Parser;
use speech_practice::adapters::audio::read_wav;
use speech_practice::adapters::speech::CommandSynthesizer;
use speech_practice::config::{Command, GamesCommand};
use speech_practice::core::catalog::{CatalogView, ExerciseFilter};
use speech_practice::core::conversation::{Conversation, Scenario, SCENARIOS};
use speech_practice::core::feedback::{Evaluation, Feedback, ReadingMetrics, ServiceMetrics};
use speech_practice::core::history::History;
use speech_practice::core::pagination::DEFAULT_WINDOW;
use speech_practice::core::recorder::SpeechQueue;
use speech_practice::core::scorer::SpeechScorer;
use speech_practice::core::session::AuthSession;
use speech_practice::core::weekly_plan::WeeklyPlan;
use speech_practice::domain::model::{Credentials, GameScoreSubmission, SignupRequest, Story};
use speech_practice::domain::ports::ConfigProvider;
use speech_practice::utils::error::ErrorSeverity;
use speech_practice::utils::{logger, validation};
use speech_practice::{
    ApiClient, AppConfig, ChatClient, CliConfig, FileCapture, LocalStorage, PracticeEngine,
    PracticeError, Result, StorytellingFlow,
};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let config = cli.resolve()?;
    let storage = LocalStorage::new(config.data_dir());
    let mut session = AuthSession::restore(storage.clone()).await?;
    let client = ApiClient::from_config(&config)?.with_token(session.token().map(str::to_string));

    match cli.command {
        Command::Login { email, password } => {
            let data = client.login(&Credentials { email, password }).await?;
            session.login(data).await?;
            if let Some(user) = session.user() {
                println!("✅ Logged in as {} <{}>", user.name, user.email);
            }
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            validation::validate_non_empty_string("name", &name)?;
            validation::validate_email("email", &email)?;
            validation::validate_non_empty_string("password", &password)?;
            let response = client
                .signup(&SignupRequest {
                    name,
                    email,
                    password,
                })
                .await?;
            println!(
                "✅ {}",
                response
                    .message
                    .unwrap_or_else(|| "Account created, you can now log in".to_string())
            );
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = session.require_user()?;
            println!("{} <{}> (id {})", user.name, user.email, user.id_string());
            if let Some(goal) = user.daily_goal {
                println!("Daily goal: {} minutes", goal);
            }
        }
        Command::Exercises {
            search,
            exercise_type,
            difficulty,
            category,
            page,
        } => {
            let exercises = client.all_exercises().await?;
            let mut view = CatalogView::new(exercises, config.page_size());
            view.set_filter(ExerciseFilter::new(search, exercise_type, difficulty, category));
            view.pager_mut().go_to(page.saturating_sub(1));
            print_catalog(&view);
        }
        Command::Analyze {
            wav,
            story_file,
            json,
        } => {
            let story = load_story(story_file.as_deref(), "Analysis")?;
            let evaluation = analyze_locally(&config, &wav, story.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&evaluation)?);
            } else {
                print_evaluation(&evaluation);
            }
        }
        Command::Practice {
            wav,
            story_file,
            story_title,
            offline,
        } => {
            let story = load_story(story_file.as_deref(), &story_title)?;
            let mut flow = StorytellingFlow::new(
                FileCapture::new(wav),
                SpeechScorer::new(config.scoring),
                History::new(storage.clone()),
            );
            if let Some(story) = story {
                flow = flow.with_story(story);
            }
            match (offline, session.user()) {
                (false, Some(user)) => flow = flow.with_service(client, user.id_string()),
                (false, None) => tracing::info!("Not logged in, practicing offline"),
                (true, _) => {}
            }

            let engine = PracticeEngine::new(flow);
            let evaluation = engine.run().await?;
            print_evaluation(&evaluation);
        }
        Command::Plan => {
            let user = session.require_user()?;
            let schedule = client.weekly_plan(&user.id_string()).await?;
            print_plan(&schedule.weekly_plan);
        }
        Command::History { days, export } => {
            let history = History::new(storage.clone());
            let now = Utc::now();
            let stats = history.statistics(days, now).await?;
            let streak = history.streak(now.date_naive()).await?;
            println!("Last {} days:", days);
            println!("  Sessions:        {}", stats.total_sessions);
            println!("  Minutes:         {}", stats.total_minutes);
            println!("  Average score:   {:.1}", stats.average_score);
            println!("  Practice days:   {} ({:.1}%)", stats.practice_days, stats.consistency_rate);
            println!("  Current streak:  {} day(s)", streak);

            let achievements = history.achievements().await?;
            if !achievements.is_empty() {
                println!("Achievements:");
                for a in &achievements {
                    println!("  🏆 {} - {} (+{} pts)", a.name, a.description, a.points);
                }
            }

            if let Some(path) = export {
                let csv = history.export_csv().await?;
                std::fs::write(&path, csv)?;
                println!("📁 History exported to {}", path.display());
            }
        }
        Command::Games { action } => run_games(&client, &session, action).await?,
        Command::SetApiKey { key } => {
            session.set_api_key(&key).await?;
            if key.trim().is_empty() {
                println!("API key cleared");
            } else {
                println!("API key saved");
            }
        }
        Command::Converse {
            scenario,
            read_aloud,
            speech_command,
        } => {
            let Some(id) = scenario else {
                for s in &SCENARIOS {
                    println!("  {:<22} {} ({}) - {}", s.id, s.persona, s.difficulty, s.context);
                }
                return Ok(());
            };
            let scenario = Scenario::find(&id).ok_or_else(|| PracticeError::ValidationError {
                message: format!("unknown scenario '{}'", id),
            })?;
            let chat = ChatClient::new(&config.chat, session.api_key().await?)?;
            let speech = read_aloud.then(|| SpeechQueue::new(CommandSynthesizer::new(speech_command)));
            run_conversation(Conversation::new(scenario), &chat, speech).await?;
        }
    }

    Ok(())
}

async fn run_games(
    client: &ApiClient,
    session: &AuthSession<LocalStorage>,
    action: GamesCommand,
) -> Result<()> {
    match action {
        GamesCommand::Stats => {
            let user = session.require_user()?;
            let stats = client.game_stats(&user.id_string()).await;
            println!("Games played:     {}", stats.total_games);
            println!("Total points:     {}", stats.total_points);
            println!("Average accuracy: {:.1}%", stats.average_accuracy);
        }
        GamesCommand::Leaderboard { game_id, limit } => {
            let entries = client.leaderboard(&game_id, limit).await?;
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>6} pts",
                    rank + 1,
                    entry.user_name.as_deref().unwrap_or("anonymous"),
                    entry.points
                );
            }
        }
        GamesCommand::Submit {
            game_id,
            points,
            accuracy,
        } => {
            let user = session.require_user()?;
            let receipt = client
                .submit_game_score(&GameScoreSubmission {
                    user_id: user.id_string(),
                    game_id,
                    points,
                    accuracy,
                    attempts: None,
                    hints_used: None,
                    total_time: None,
                    average_speed: None,
                    difficulty: None,
                    rounds_completed: None,
                })
                .await?;
            println!(
                "{}",
                receipt.message.unwrap_or_else(|| "Score submitted".to_string())
            );
        }
    }
    Ok(())
}

async fn run_conversation(
    mut conversation: Conversation,
    chat: &ChatClient,
    mut speech: Option<SpeechQueue<CommandSynthesizer>>,
) -> Result<()> {
    let scenario = conversation.scenario();
    println!("🗣  {} - talking with {}", scenario.context, scenario.persona);
    println!("Type a line and press Enter; an empty line or Ctrl-D ends the conversation.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        let reply = conversation.reply(chat, &line).await?;
        println!("{}: {}", scenario.persona, reply.text);
        if reply.is_fallback() {
            println!("  (offline reply, the chat service is unavailable)");
        }
        if let Some(queue) = speech.as_mut() {
            conversation.read_aloud(queue);
        }
    }
    if let Some(queue) = speech {
        queue.into_inner().wait();
    }

    let analysis = conversation.analyze();
    println!(
        "You sent {} message(s), average reply time {:.1}s, flow: {:?}",
        analysis.user_messages, analysis.average_response_secs, analysis.flow
    );
    for suggestion in &analysis.suggestions {
        println!("  💡 {}", suggestion);
    }
    Ok(())
}

fn load_story(path: Option<&Path>, title: &str) -> Result<Option<Story>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path)?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "story".to_string());
    Ok(Some(Story {
        id,
        title: title.to_string(),
        content,
    }))
}

fn analyze_locally(config: &AppConfig, wav: &Path, story: Option<&Story>) -> Result<Evaluation> {
    let audio = read_wav(wav)?;
    let scorer = SpeechScorer::new(config.scoring);
    let timestamp = Utc::now();

    let scored = scorer
        .analyze(&audio.samples, audio.sample_rate)
        .and_then(|analysis| scorer.score(&analysis).map(|score| (score, analysis)));

    Ok(match scored {
        Ok((score, analysis)) => Evaluation::Scored {
            score,
            feedback: Feedback::for_score(score, &analysis),
            metrics: ReadingMetrics::estimate(&analysis, story.map_or(0, Story::word_count)),
            analysis,
            service: ServiceMetrics::default(),
            timestamp,
        },
        Err(e) => Evaluation::Failed {
            feedback: Feedback::analysis_failed(&e),
            reason: e.to_string(),
            timestamp,
        },
    })
}

fn print_evaluation(evaluation: &Evaluation) {
    match evaluation {
        Evaluation::Scored {
            score,
            feedback,
            analysis,
            metrics,
            service,
            ..
        } => {
            println!("🎯 Score: {}/100 ({})", score, feedback.level.label());
            println!("{}", feedback.message);
            println!(
                "  Clarity {} | Consistency {} | Energy {} | {} wpm | {:.1}s",
                analysis.clarity,
                analysis.consistency,
                analysis.energy,
                analysis.speech_rate,
                analysis.duration
            );
            if metrics.word_count > 0 {
                println!(
                    "  Words read {} ({:.0}% of story), {} wpm, ~{} unclear",
                    metrics.word_count,
                    metrics.reading_progress,
                    metrics.reading_speed,
                    metrics.mispronounced_words
                );
            }
            for improvement in &service.suggested_improvements {
                println!("  💡 {}", improvement);
            }
        }
        Evaluation::Failed { feedback, .. } => {
            println!("⚠️  {}", feedback.message);
        }
    }
}

fn print_catalog(view: &CatalogView) {
    let pager = view.pager();
    println!("{} of {} exercises match", view.matching(), view.total());
    for exercise in view.current_page() {
        println!(
            "  • {} [{} / {} / {}]",
            exercise.exercise_name,
            exercise.exercise_type,
            exercise.difficulty_level,
            exercise.category
        );
        if let Some(description) = &exercise.description {
            println!("      {}", description);
        }
    }
    if pager.total_pages() > 1 {
        let buttons: Vec<String> = pager
            .window(DEFAULT_WINDOW)
            .into_iter()
            .map(|p| {
                if p == pager.current_page() {
                    format!("[{}]", p + 1)
                } else {
                    (p + 1).to_string()
                }
            })
            .collect();
        println!(
            "Page {}/{}: {}",
            pager.current_page() + 1,
            pager.total_pages(),
            buttons.join(" ")
        );
    }
}

fn print_plan(plan: &WeeklyPlan) {
    let today = Utc::now().date_naive();
    let summary = plan.summary(today);
    println!("Week {} to {}", plan.week_start, plan.week_end);
    println!(
        "  Minutes:          {}/{} ({:.0}%)",
        plan.total_minutes_completed, plan.total_minutes_goal, summary.total_progress
    );
    println!(
        "  Body exercises:   {}/{} ({:.0}%)",
        plan.body_exercises_completed, plan.body_exercises_goal, summary.body_exercises_progress
    );
    println!(
        "  Speech exercises: {}/{} ({:.0}%)",
        plan.speech_exercises_completed, plan.speech_exercises_goal, summary.speech_exercises_progress
    );
    println!("  Weekly streak:    {} week(s)", plan.weekly_streak);
    println!(
        "  {} ({} day(s) left)",
        summary.estimated_completion, summary.days_remaining
    );
    if !summary.is_on_track && !plan.is_completed {
        println!("  Below 80% of the minutes goal, a few extra sessions will catch you up.");
    }
}
