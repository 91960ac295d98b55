//! UI-agnostic conversation state
//!
//! These types are shared between the TUI and the one-shot CLI commands and
//! don't depend on any UI framework.

use uuid::Uuid;

/// A citation backing an assistant answer, derived from the provider's
/// grounding metadata. A source with an empty `uri` is invalid and must be
/// dropped before it is attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// A chat message in the conversation. Immutable once appended.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub sources: Vec<Source>,
}

/// Append-only log of chat messages. Messages are never edited or removed
/// individually; `clear` drops the whole conversation.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Uuid {
        self.push(Sender::User, text.into(), Vec::new())
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, sources: Vec<Source>) -> Uuid {
        self.push(Sender::Assistant, text.into(), sources)
    }

    fn push(&mut self, sender: Sender, text: String, sources: Vec<Source>) -> Uuid {
        let id = Uuid::new_v4();
        self.messages.push(Message {
            id,
            sender,
            text,
            sources,
        });
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_grows_in_order() {
        let mut conversation = Conversation::new();
        conversation.push_user("¿Cómo configuro S-Log3?");
        conversation.push_assistant(
            "Paso 1...",
            vec![Source {
                uri: "http://sony.com/a".to_string(),
                title: "Manual".to_string(),
            }],
        );

        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[0].sender, Sender::User);
        assert_eq!(conversation.messages()[1].sender, Sender::Assistant);
        assert_eq!(conversation.messages()[1].sources.len(), 1);
    }

    #[test]
    fn message_ids_are_unique() {
        let mut conversation = Conversation::new();
        let a = conversation.push_user("primera");
        let b = conversation.push_user("segunda");
        assert_ne!(a, b);
    }

    #[test]
    fn clear_is_the_only_removal() {
        let mut conversation = Conversation::new();
        conversation.push_user("hola");
        conversation.push_assistant("hola, soy tu asistente", Vec::new());
        conversation.clear();
        assert!(conversation.messages().is_empty());
    }
}
