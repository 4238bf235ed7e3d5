use super::{DialogContext, Next};
use crate::api::AssistantApi;
use crate::error::DialogError;
use crate::message::{InboundMessage, IS_DIRECT_KEY};
use std::sync::Arc;
use std::time::Duration;

/// Waits for one of the trigger phrases (the assistant's name) and hands
/// the text after it to the next context.
///
/// Messages already marked direct skip the search. Text without a trigger
/// phrase is ignored.
#[derive(Debug)]
pub struct TriggerPhraseContext {
    phrases: Vec<Vec<String>>,
    next: Arc<dyn DialogContext>,
}

impl TriggerPhraseContext {
    /// Each phrase is a sequence of canonical words.
    pub fn new(phrases: Vec<Vec<String>>, next: Arc<dyn DialogContext>) -> Self {
        Self { phrases, next }
    }

    /// Text following the first trigger phrase, searching from the left.
    fn after_trigger(&self, text: &str) -> Option<String> {
        let words: Vec<&str> = text.split(' ').collect();
        (0..words.len()).find_map(|offset| {
            let tail = &words[offset..];
            self.phrases
                .iter()
                .find(|phrase| {
                    phrase.len() <= tail.len() && phrase.iter().zip(tail).all(|(want, got)| want == got)
                })
                .map(|phrase| tail[phrase.len()..].join(" "))
        })
    }
}

impl DialogContext for TriggerPhraseContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        if message.is_direct() {
            return Arc::clone(&self.next).handle_command(api, message);
        }

        match self.after_trigger(message.text()) {
            Some(rest) => {
                let direct = InboundMessage::partial(message, &rest).with_meta(IS_DIRECT_KEY, true);
                Arc::clone(&self.next).handle_command(api, &direct)
            }
            None => {
                tracing::debug!(text = %message.text(), "No trigger phrase");
                Ok(None)
            }
        }
    }

    fn handle_timeout(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(None)
    }

    fn handle_interrupt(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(Some(self))
    }

    fn handle_restore(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(Some(self))
    }

    fn timeout(&self, default: Duration) -> Duration {
        default
    }
}
