//! Dialog console
//!
//! Talks to a [`Brain`] over stdin and stdout with a handful of demo
//! skills. Configuration comes from the environment, see [`BrainConfig`].

use dialog_brain::api::{ApiExt, AssistantApi};
use dialog_brain::context::{CommandMap, Handled, Handler, Resume, Script, ScriptStep};
use dialog_brain::interaction::InteractionSource;
use dialog_brain::output::{AudioOutput, OutputChannel, OutputPool, StaticOutputPool, TextOutput};
use dialog_brain::{Brain, BrainConfig, DialogError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FORMAT_VAR: &str = "DIALOG_LOG_FORMAT";

struct Console;

impl TextOutput for Console {
    fn send(&self, text: &str) -> Result<(), DialogError> {
        println!("{text}");
        Ok(())
    }
}

impl AudioOutput for Console {
    fn send_file(&self, path: &Path) -> Result<(), DialogError> {
        println!("[play {}]", path.display());
        Ok(())
    }
}

fn console_outputs() -> Arc<dyn OutputPool> {
    let console = Arc::new(Console);
    Arc::new(StaticOutputPool::new(vec![
        OutputChannel::Text(Arc::clone(&console) as Arc<dyn TextOutput>),
        OutputChannel::Audio(console),
    ]))
}

/// First number in `text`, taken as seconds
fn parse_seconds(text: &str) -> Option<Duration> {
    text.split(' ')
        .find_map(|word| word.parse::<u64>().ok())
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

/// Asks for the duration unless the command already had one
struct TimerSetup {
    timers: mpsc::UnboundedSender<Duration>,
    duration: Option<Duration>,
}

impl TimerSetup {
    fn schedule(&self, duration: Duration) -> Result<ScriptStep, DialogError> {
        self.timers
            .send(duration)
            .map_err(|_| DialogError::handler("timer service stopped"))?;
        Ok(ScriptStep::done(format!(
            "ставлю таймер на {} секунд",
            duration.as_secs()
        )))
    }
}

impl Script for TimerSetup {
    fn start(&mut self, _api: &ApiExt<'_>) -> Result<ScriptStep, DialogError> {
        match self.duration {
            Some(duration) => self.schedule(duration),
            None => Ok(ScriptStep::ask("на сколько секунд?")),
        }
    }

    fn resume(&mut self, _api: &ApiExt<'_>, input: Resume) -> Result<ScriptStep, DialogError> {
        let answer = input.reply()?;
        match parse_seconds(&answer) {
            Some(duration) => self.schedule(duration),
            None => Ok(ScriptStep::done("не поняла, таймер не поставлен")),
        }
    }
}

fn timer_rings(api: &ApiExt<'_>) -> Result<Handled, DialogError> {
    api.play_audio(Path::new("media/timer.wav"))?;
    api.say("таймер сработал")?;
    Ok(Handled::Done)
}

fn skills(timers: mpsc::UnboundedSender<Duration>) -> Vec<CommandMap> {
    let greetings = CommandMap::new()
        .with("привет|здравствуй", Handler::reply("И тебе привет"))
        .with("как дела", json!("Отлично, а у тебя?"));

    let timer = CommandMap::new().with(
        "поставь таймер|таймер",
        Handler::named("timer", move |_, text| {
            Ok(Handled::script(TimerSetup {
                timers: timers.clone(),
                duration: parse_seconds(text),
            }))
        }),
    );

    let echo = CommandMap::new().with(
        "повтори|скажи",
        Handler::named("echo", |api, text| {
            if text.is_empty() {
                api.say("что повторить?")?;
            } else {
                api.say(text)?;
            }
            Ok(Handled::Done)
        }),
    );

    vec![greetings, timer, echo]
}

/// Ring every requested timer once it runs out
async fn run_timers(brain: Arc<Brain>, mut timers: mpsc::UnboundedReceiver<Duration>) {
    while let Some(duration) = timers.recv().await {
        let brain = Arc::clone(&brain);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let rang = tokio::task::spawn_blocking(move || {
                brain.submit_active_interaction(InteractionSource::function(timer_rings), None)
            })
            .await;
            match rang {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Timer interaction failed"),
                Err(e) => tracing::error!(error = %e, "Timer interaction panicked"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let json_logs = std::env::var(LOG_FORMAT_VAR).is_ok_and(|format| format == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialog_brain=info,dialog_console=info".into()),
        )
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = BrainConfig::from_env()?;
    let (timers_tx, timers_rx) = mpsc::unbounded_channel();
    let outputs = console_outputs();

    let brain = Arc::new(Brain::start(&config, skills(timers_tx), vec![Arc::clone(&outputs)])?);
    let timers = tokio::spawn(run_timers(Arc::clone(&brain), timers_rx));

    tracing::info!(
        brain_id = %brain.id(),
        triggers = ?config.trigger_phrases,
        "Dialog console ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let turn = Arc::clone(&brain);
        let outputs = Arc::clone(&outputs);
        match tokio::task::spawn_blocking(move || turn.process_text(&line, &outputs)).await? {
            Ok(()) => {}
            Err(e) => tracing::warn!(error = %e, "Command failed"),
        }
    }

    timers.abort();
    brain.kill().await;
    Ok(())
}
