use chrono::{DateTime, Utc};
use std::fmt;

/// Identifies a single transcript entry. Ids are handed out in increasing order
/// by the owning [`Transcript`] and are never reused, even across a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Ai,
}

/// One entry of the interview transcript.
///
/// Messages are immutable once created: the accessors only hand out shared views.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    created_at: DateTime<Utc>,
    hidden: bool,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Hidden messages are kept for scaffolding turns but never rendered.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Ordered, append-only list of messages for one interview.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a visible message and returns its id.
    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> MessageId {
        self.push_with_visibility(sender, text.into(), false)
    }

    pub fn push_hidden(&mut self, sender: Sender, text: impl Into<String>) -> MessageId {
        self.push_with_visibility(sender, text.into(), true)
    }

    fn push_with_visibility(&mut self, sender: Sender, text: String, hidden: bool) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.push(Message {
            id,
            sender,
            text,
            created_at: Utc::now(),
            hidden,
        });
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages the presentation layer should render, in order.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.hidden)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // The id counter keeps running so a speech event for a message from the
    // previous interview can never match a new one.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_survive_clear() {
        let mut transcript = Transcript::new();
        let first = transcript.push(Sender::Ai, "Hello");
        let second = transcript.push(Sender::User, "Hi");
        assert!(second > first);

        transcript.clear();
        assert!(transcript.is_empty());

        let third = transcript.push(Sender::Ai, "Welcome back");
        assert!(third > second);
    }

    #[test]
    fn hidden_messages_are_kept_but_not_visible() {
        let mut transcript = Transcript::new();
        transcript.push_hidden(Sender::User, "scaffolding");
        let shown = transcript.push(Sender::Ai, "What is a REST API?");

        assert_eq!(transcript.len(), 2);
        let visible: Vec<_> = transcript.visible().map(Message::id).collect();
        assert_eq!(visible, vec![shown]);
    }
}
