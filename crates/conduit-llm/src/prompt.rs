//! Conversation → single backend prompt
//!
//! The backend receives one user turn per request, so a multi-turn
//! conversation is rendered as `Role: text` paragraphs. A conversation made
//! of one user message is sent verbatim.

use crate::adapters::anthropic::MessagesRequest;
use crate::adapters::openai::ChatCompletionRequest;
use crate::error::{ConversionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    fn parse(role: &str) -> Result<Self> {
        match role {
            "system" | "developer" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" | "function" => Ok(Self::Tool),
            other => Err(ConversionError::UnsupportedRole(other.to_string())),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::Tool => "Tool",
        }
    }
}

fn flatten(turns: Vec<(Role, String)>) -> Result<String> {
    let turns: Vec<(Role, String)> = turns
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();

    match turns.as_slice() {
        [] => Err(ConversionError::NoTextContent),
        [(Role::User, text)] => Ok(text.clone()),
        _ => Ok(turns
            .iter()
            .map(|(role, text)| format!("{}: {}", role.label(), text))
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}

impl ChatCompletionRequest {
    pub fn to_prompt(&self) -> Result<String> {
        if self.messages.is_empty() {
            return Err(ConversionError::EmptyMessages);
        }
        let turns = self
            .messages
            .iter()
            .map(|message| Ok((Role::parse(&message.role)?, message.text())))
            .collect::<Result<Vec<_>>>()?;
        flatten(turns)
    }
}

impl MessagesRequest {
    pub fn to_prompt(&self) -> Result<String> {
        if self.messages.is_empty() {
            return Err(ConversionError::EmptyMessages);
        }
        let mut turns = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system {
            turns.push((Role::System, system.text()));
        }
        for message in &self.messages {
            let role = match Role::parse(&message.role)? {
                Role::System => {
                    return Err(ConversionError::UnsupportedRole(message.role.clone()))
                }
                role => role,
            };
            turns.push((role, message.content.text()));
        }
        flatten(turns)
    }
}
