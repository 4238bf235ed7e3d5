//! Test doubles and the scripted dialog harness
//!
//! Scenarios are written one step per line:
//!
//! ```text
//! > user says this
//! < assistant answers exactly this
//! ! wait 20
//! ! act timer_interaction
//! # comment
//! ```

use crate::api::{ApiExt, AssistantApi};
use crate::context::{construct_context, ContextSource, DialogContext, Handled, Next};
use crate::error::DialogError;
use crate::interaction::{construct_active_interaction, InteractionHandler, InteractionSource};
use crate::message::InboundMessage;
use crate::output::{AudioOutput, OutputChannel, OutputPool, StaticOutputPool, TextOutput};
use crate::state_machine::ConversationStateMachine;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

// ============================================================================
// Outputs
// ============================================================================

/// Everything the assistant said, space-joined
#[derive(Clone, Default)]
pub struct OutputLog(Arc<Mutex<String>>);

impl OutputLog {
    fn push(&self, text: &str) {
        let mut log = self.0.lock().unwrap();
        let joined = format!("{log} {text}");
        *log = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    /// Take the output collected so far
    pub fn pull(&self) -> String {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl TextOutput for OutputLog {
    fn send(&self, text: &str) -> Result<(), DialogError> {
        self.push(text);
        Ok(())
    }
}

impl AudioOutput for OutputLog {
    fn send_file(&self, path: &Path) -> Result<(), DialogError> {
        self.push(&format!("[play {}]", path.display()));
        Ok(())
    }
}

/// Pool with text and audio channels writing into one log
pub fn recording_outputs() -> (Arc<dyn OutputPool>, OutputLog) {
    let log = OutputLog::default();
    let pool = StaticOutputPool::new(vec![
        OutputChannel::Text(Arc::new(log.clone())),
        OutputChannel::Audio(Arc::new(log.clone())),
    ]);
    (Arc::new(pool), log)
}

/// Message without outputs of its own, replies go to the API's outputs
pub fn message(text: &str) -> InboundMessage {
    InboundMessage::plain(text, Arc::new(StaticOutputPool::new(Vec::new())))
}

// ============================================================================
// Stub API
// ============================================================================

pub struct StubApi {
    pub log: OutputLog,
    outputs: Arc<dyn OutputPool>,
    machine: OnceLock<Weak<ConversationStateMachine>>,
}

impl StubApi {
    pub fn new() -> Self {
        let (outputs, log) = recording_outputs();
        Self {
            log,
            outputs,
            machine: OnceLock::new(),
        }
    }

    /// Route active interactions to `machine`
    pub fn attach(&self, machine: &Arc<ConversationStateMachine>) {
        assert!(
            self.machine.set(Arc::downgrade(machine)).is_ok(),
            "stub API attached twice"
        );
    }
}

impl Default for StubApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AssistantApi for StubApi {
    fn outputs(&self) -> Arc<dyn OutputPool> {
        Arc::clone(&self.outputs)
    }

    fn submit_active_interaction(
        &self,
        interaction: InteractionSource,
        related_message: Option<InboundMessage>,
    ) -> Result<(), DialogError> {
        let machine = self
            .machine
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| DialogError::usage("stub API is not attached to a state machine"))?;
        let interaction = construct_active_interaction(interaction, related_message);
        machine.process_active_interaction(interaction.as_ref())
    }
}

// ============================================================================
// Context mock
// ============================================================================

#[derive(Default)]
struct Calls {
    messages: Vec<InboundMessage>,
    timeouts: usize,
    interrupts: usize,
    restores: usize,
}

/// Scriptable context recording every call it gets
pub struct ContextMock {
    on_command: HashMap<String, Arc<dyn DialogContext>>,
    on_timeout: Next,
    timeout: Option<Duration>,
    staying: bool,
    failing: bool,
    calls: Mutex<Calls>,
}

#[derive(Default)]
pub struct ContextMockBuilder {
    on_command: HashMap<String, Arc<dyn DialogContext>>,
    on_timeout: Next,
    timeout: Option<Duration>,
    staying: bool,
    failing: bool,
}

impl ContextMockBuilder {
    pub fn on_command(mut self, text: &str, next: Arc<dyn DialogContext>) -> Self {
        self.on_command.insert(text.to_string(), next);
        self
    }

    pub fn on_timeout(mut self, next: Arc<dyn DialogContext>) -> Self {
        self.on_timeout = Some(next);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stay on commands with no mapping instead of ending the dialog
    pub fn staying(mut self) -> Self {
        self.staying = true;
        self
    }

    /// Fail every command
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn build(self) -> Arc<ContextMock> {
        Arc::new(ContextMock {
            on_command: self.on_command,
            on_timeout: self.on_timeout,
            timeout: self.timeout,
            staying: self.staying,
            failing: self.failing,
            calls: Mutex::default(),
        })
    }
}

impl ContextMock {
    /// Ends the dialog on every command and timeout
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ContextMockBuilder {
        ContextMockBuilder::default()
    }

    pub fn messages(&self) -> Vec<InboundMessage> {
        self.calls.lock().unwrap().messages.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.messages().iter().map(|m| m.text().to_string()).collect()
    }

    pub fn timeouts(&self) -> usize {
        self.calls.lock().unwrap().timeouts
    }

    pub fn interrupts(&self) -> usize {
        self.calls.lock().unwrap().interrupts
    }

    pub fn restores(&self) -> usize {
        self.calls.lock().unwrap().restores
    }
}

impl fmt::Debug for ContextMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMock")
            .field("commands", &self.on_command.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DialogContext for ContextMock {
    fn handle_command(
        self: Arc<Self>,
        _api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        self.calls.lock().unwrap().messages.push(message.clone());
        if self.failing {
            return Err(DialogError::handler(format!("mock failed on {:?}", message.text())));
        }
        Ok(match self.on_command.get(message.text()) {
            Some(next) => Some(Arc::clone(next)),
            None if self.staying => Some(self),
            None => None,
        })
    }

    fn handle_timeout(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        self.calls.lock().unwrap().timeouts += 1;
        Ok(self.on_timeout.clone())
    }

    fn handle_interrupt(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        self.calls.lock().unwrap().interrupts += 1;
        Ok(Some(self))
    }

    fn handle_restore(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        self.calls.lock().unwrap().restores += 1;
        Ok(Some(self))
    }

    fn timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

// ============================================================================
// Dialog harness
// ============================================================================

/// Drives a conversation through scripted scenarios
pub struct DialogHarness {
    api: Arc<StubApi>,
    machine: Arc<ConversationStateMachine>,
    interactions: HashMap<String, InteractionHandler>,
}

impl DialogHarness {
    pub fn using_context(source: impl Into<ContextSource>) -> Self {
        let root = construct_context(source.into(), None).unwrap();
        let api = Arc::new(StubApi::new());
        let machine = Arc::new(ConversationStateMachine::new(
            Arc::clone(&api) as Arc<dyn AssistantApi>,
            root,
            Duration::from_secs(10),
        ));
        api.attach(&machine);
        api.log.pull();

        Self {
            api,
            machine,
            interactions: HashMap::new(),
        }
    }

    pub fn register_interaction<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ApiExt<'_>) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        self.interactions
            .insert(name.to_string(), InteractionHandler::named(name, f));
        self
    }

    pub fn try_say(&self, text: &str) -> Result<(), DialogError> {
        self.machine.process_command(&message(text))
    }

    pub fn say(&self, text: &str) {
        if let Err(e) = self.try_say(text) {
            panic!("command {text:?} failed: {e}");
        }
    }

    pub fn try_act(&self, name: &str) -> Result<(), DialogError> {
        let handler = self
            .interactions
            .get(name)
            .unwrap_or_else(|| panic!("no interaction named {name:?}"))
            .clone();
        self.api.submit_active_interaction(handler.into(), None)
    }

    pub fn wait(&self, seconds: f64) {
        self.machine
            .tick_timeout(Duration::from_secs_f64(seconds))
            .unwrap();
    }

    pub fn assert_reply(&self, expected: &str) {
        let reply = self.api.log.pull();
        assert_eq!(reply, expected, "unexpected reply");
    }

    pub fn play_scenario(&self, scenario: &str) {
        for line in scenario.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut chars = line.chars();
            let op = chars.next();
            let rest = chars.as_str().trim();
            match op {
                Some('>') => self.say(rest),
                Some('<') => self.assert_reply(rest),
                Some('#') => {}
                Some('!') => self.run_action(rest),
                _ => panic!("malformed scenario line {line:?}"),
            }
        }
    }

    fn run_action(&self, action: &str) {
        match action.split_once(' ') {
            Some(("wait", seconds)) => self.wait(seconds.trim().parse().unwrap()),
            Some(("act", name)) => self.try_act(name.trim()).unwrap(),
            _ => panic!("unknown scenario action {action:?}"),
        }
    }
}
