//! Text-to-speech through an external command such as `espeak` or `say`.

use std::process::{Child, Command, Stdio};

use crate::domain::ports::SpeechSynthesizer;

/// Runs `<program> <text>` per utterance; cancelling kills the running child.
pub struct CommandSynthesizer {
    program: String,
    child: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    /// Block until the current utterance finishes.
    pub fn wait(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.wait() {
                tracing::warn!("Speech command did not finish cleanly: {}", e);
            }
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            // 已結束的程序 kill 會失敗，忽略即可
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn speak(&mut self, text: &str) {
        match Command::new(&self.program)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.child = Some(child),
            Err(e) => tracing::warn!("Cannot start speech command '{}': {}", self.program, e),
        }
    }

    fn is_speaking(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}
