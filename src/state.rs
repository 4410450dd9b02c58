//! UI-agnostic conversation types
//!
//! `ChatMessage` is what travels to the backend as conversation history.
//! `Turn` is what a view renders; the two diverge for listing replies and
//! error messages, which are shown but never sent.

use serde::{Deserialize, Serialize};

use crate::format::PropertyCard;

/// A message in the conversation history sent with every query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Avatar label shown next to a turn
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "AI",
        }
    }
}

/// One rendered entry of the visible conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: ChatRole,
    pub body: TurnBody,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            body: TurnBody::Text(text.into()),
        }
    }

    pub fn assistant(body: TurnBody) -> Self {
        Self {
            role: ChatRole::Assistant,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnBody {
    /// Free text; `**bold**` spans are honoured by the terminal renderer
    Text(String),
    /// A search result: summary header followed by one card per listing
    Listings {
        header: String,
        cards: Vec<PropertyCard>,
    },
    /// A failure notice, styled as an error
    Error(String),
}
