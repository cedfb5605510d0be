//! Feishu interactive card payload.
//!
//! Only the subset of the card schema the digest needs: a header plus a flat
//! list of `div` and `hr` elements.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub config: CardConfig,
    pub header: CardHeader,
    pub elements: Vec<CardElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardHeader {
    pub title: CardText,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum CardElement {
    Div { text: CardText },
    Hr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum CardText {
    LarkMd { content: String },
    PlainText { content: String },
}

impl Card {
    pub fn new(title: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            config: CardConfig {
                wide_screen_mode: true,
            },
            header: CardHeader {
                title: CardText::plain(title),
                template: template.into(),
            },
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: CardElement) {
        self.elements.push(element);
    }
}

impl CardText {
    pub fn markdown(content: impl Into<String>) -> Self {
        Self::LarkMd {
            content: content.into(),
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self::PlainText {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::LarkMd { content } | Self::PlainText { content } => content,
        }
    }
}

impl CardElement {
    pub fn markdown(content: impl Into<String>) -> Self {
        Self::Div {
            text: CardText::markdown(content),
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self::Div {
            text: CardText::plain(content),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Div { text } => Some(text.content()),
            Self::Hr => None,
        }
    }
}
