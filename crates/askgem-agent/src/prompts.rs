//! Default identity and instructions for the question-answering agent.

pub const DEFAULT_AGENT_NAME: &str = "helpful_assistant";

pub const DEFAULT_AGENT_DESCRIPTION: &str = "A simple agent that can answer general questions.";

pub const DEFAULT_AGENT_INSTRUCTION: &str =
    "You are a helpful assistant. Use Google Search for current info or if unsure.";
