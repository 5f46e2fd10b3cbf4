//! Prompt templates for the persona responder and the evaluator.
//!
//! Everything here is a pure function of its arguments so the same persona and
//! history always produce byte-identical prompts.

use std::borrow::Cow;

use crate::core::message::Message;

/// Keyword that switches the reply into pig latin. Matched case-insensitively
/// anywhere in the user message.
pub const TRIGGER_KEYWORD: &str = "patent";

pub const TRIGGER_INSTRUCTION: &str = "\n\nEverything in your reply needs to be in pig latin - \
it is mandatory that you respond only and entirely in pig latin";

fn background_sections(summary: &str, profile_text: &str) -> String {
    format!("\n\n## Summary:\n{summary}\n\n## LinkedIn Profile:\n{profile_text}\n\n")
}

pub fn build_system_prompt(name: &str, summary: &str, profile_text: &str) -> String {
    let mut prompt = format!(
        "You are acting as {name}. You are answering questions on {name}'s website, \
particularly questions related to {name}'s career, background, skills and experience. \
Your responsibility is to represent {name} for interactions on the website as faithfully as possible. \
You are given a summary of {name}'s background and LinkedIn profile which you can use to answer questions. \
Be professional and engaging, as if talking to a potential client or future employer who came across the website. \
If you don't know the answer, say so."
    );
    prompt.push_str(&background_sections(summary, profile_text));
    prompt.push_str(&format!(
        "With this context, please chat with the user, always staying in character as {name}."
    ));
    prompt
}

pub fn build_evaluator_prompt(name: &str, summary: &str, profile_text: &str) -> String {
    let mut prompt = format!(
        "You are an evaluator that decides whether a response to a question is acceptable. \
You are provided with a conversation between a User and an Agent. \
Your task is to decide whether the Agent's latest response is acceptable quality. \
The Agent is playing the role of {name} and is representing {name} on their website. \
The Agent has been instructed to be professional and engaging, as if talking to a potential client or future employer who came across the website. \
The Agent has been provided with context on {name} in the form of their summary and LinkedIn details. Here's the information:"
    );
    prompt.push_str(&background_sections(summary, profile_text));
    prompt.push_str(
        "With this context, please evaluate the latest response, \
replying with whether the response is acceptable and your feedback.",
    );
    prompt
}

/// Serializes the committed history as indented JSON, then appends the latest
/// user message and the candidate reply.
pub fn build_evaluator_user_prompt(reply: &str, user_message: &str, history: &[Message]) -> String {
    // Message only holds strings and a unit-like enum, so this cannot fail.
    let history_json = serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Here's the conversation between the User and the Agent: \n\n{history_json}\n\n\
Here's the latest message from the User: \n\n{user_message}\n\n\
Here's the latest response from the Agent: \n\n{reply}\n\n\
Please evaluate the response, replying with whether it is acceptable and your feedback."
    )
}

pub fn mentions_trigger(message: &str) -> bool {
    message.to_lowercase().contains(TRIGGER_KEYWORD)
}

/// Returns the base prompt, extended with [`TRIGGER_INSTRUCTION`] when the user
/// message mentions [`TRIGGER_KEYWORD`].
pub fn apply_trigger_rule<'a>(base_prompt: &'a str, user_message: &str) -> Cow<'a, str> {
    if mentions_trigger(user_message) {
        Cow::Owned(format!("{base_prompt}{TRIGGER_INSTRUCTION}"))
    } else {
        Cow::Borrowed(base_prompt)
    }
}

/// System prompt for the single correction pass after a rejected draft.
pub fn build_rejection_prompt(foundation: &str, rejected_draft: &str, feedback: &str) -> String {
    format!(
        "{foundation}\n\n## Previous answer rejected\n\
You just tried to reply, but the quality control rejected your reply\n\
## Your attempted answer:\n{rejected_draft}\n\n\
## Reason for rejection:\n{feedback}\n\n"
    )
}
