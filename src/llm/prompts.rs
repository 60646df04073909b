// System prompts and conversation templates

pub struct SystemPrompts;

impl SystemPrompts {
    /// Instructions for the knowledge-base voice assistant
    pub fn voice_assistant() -> &'static str {
        "You are a voice assistant. Speak naturally.
You have a tool called 'lookup_info' that you can use to find information.
When asked a question, use the lookup_info tool to search for an answer."
    }
}

pub struct ConversationTemplates;

impl ConversationTemplates {
    /// Instructions for the first reply after joining the room
    pub fn greeting() -> &'static str {
        "Hi there! How can I help?"
    }

    /// Spoken while a lookup is in flight
    pub fn lookup_acknowledgement() -> &'static str {
        "One moment please."
    }

    /// Answer when the knowledge base has nothing for the question
    pub fn no_answer() -> &'static str {
        "Sorry, I couldn't find an answer."
    }

    /// Single-shot prompt that grounds the answer in retrieved text
    pub fn grounded_answer(context: &str, query: &str) -> String {
        format!("Answer using context:\n{}\nQ: {}", context, query)
    }
}
