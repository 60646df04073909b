use super::client::{Message, ToolCall};
use std::collections::VecDeque;

/// Chat history for one session, bounded by message count and a rough token estimate.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    messages: VecDeque<Message>,
    max_messages: usize,
    max_tokens: usize,
    system_message: Option<Message>,
}

impl ConversationContext {
    pub fn new(max_messages: usize, max_tokens: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages,
            max_tokens,
            system_message: None,
        }
    }

    /// Create with default limits (40 messages, ~8000 tokens)
    pub fn with_defaults() -> Self {
        Self::new(40, 8000)
    }

    pub fn set_system_message(&mut self, content: impl Into<String>) {
        self.system_message = Some(Message::system(content));
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::assistant(content));
    }

    /// Record a tool round: the assistant's calls followed by one result per call
    pub fn add_tool_exchange(&mut self, calls: Vec<ToolCall>, results: Vec<(String, String)>) {
        self.messages.push_back(Message::assistant_tool_calls(calls));
        for (call_id, output) in results {
            self.messages.push_back(Message::tool(call_id, output));
        }
        self.trim_context();
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);
        self.trim_context();
    }

    /// All messages for an API call, system message first
    pub fn get_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);

        if let Some(ref system_msg) = self.system_message {
            messages.push(system_msg.clone());
        }

        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Clear all messages except system message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Conversation length (excluding system message)
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn estimate_tokens(&self) -> usize {
        self.system_message
            .iter()
            .chain(self.messages.iter())
            .map(estimate_message_tokens)
            .sum()
    }

    fn trim_context(&mut self) {
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }

        // The newest message stays even when it alone is over budget
        while self.estimate_tokens() > self.max_tokens && self.messages.len() > 1 {
            self.messages.pop_front();
        }

        // A tool result is only valid right after the call that produced it
        while self
            .messages
            .front()
            .is_some_and(|msg| msg.role == "tool")
        {
            self.messages.pop_front();
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Context: {} messages, ~{} tokens (limits: {} messages, {} tokens)",
            self.len(),
            self.estimate_tokens(),
            self.max_messages,
            self.max_tokens
        )
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Rough approximation: 1 token ≈ 4 characters, plus overhead for role and formatting
fn estimate_message_tokens(message: &Message) -> usize {
    let content = message.content.as_deref().map_or(0, str::len);
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|call| call.name.len() + call.arguments.to_string().len())
        .sum();
    (content + calls) / 4 + message.role.len() / 4 + 10
}
