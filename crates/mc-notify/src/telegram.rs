//! Telegram team channel

use async_trait::async_trait;
use mc_core::{Audience, NotifierConfig};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::debug;

use crate::error::{NotifyError, Result};

/// Shared channel that receives HTML alerts
#[async_trait]
pub trait TeamChannel: Send + Sync {
    /// Post an alert; returns a short description of what was sent
    async fn send(&self, audience: Audience, html: &str) -> Result<String>;
}

/// Telegram Bot API `sendMessage` in HTML mode
pub struct TelegramChannel {
    bot: Option<Bot>,
    team_chat: Option<ChatId>,
    owner_chat: Option<ChatId>,
}

impl TelegramChannel {
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        Ok(Self {
            bot: config.telegram_bot_token.as_deref().map(Bot::new),
            team_chat: parse_chat_id(config.team_chat_id.as_deref())?,
            owner_chat: parse_chat_id(config.owner_chat_id.as_deref())?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.bot.is_some() && self.team_chat.is_some()
    }

    /// Owner alerts use the owner chat when set, else the team chat
    fn chat_for(&self, audience: Audience) -> Option<ChatId> {
        match audience {
            Audience::Team => self.team_chat,
            Audience::Owner => self.owner_chat.or(self.team_chat),
        }
    }
}

fn parse_chat_id(value: Option<&str>) -> Result<Option<ChatId>> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map(ChatId)
                .map_err(|_| NotifyError::Config(format!("invalid Telegram chat id: {}", raw)))
        })
        .transpose()
}

#[async_trait]
impl TeamChannel for TelegramChannel {
    async fn send(&self, audience: Audience, html: &str) -> Result<String> {
        let bot = self.bot.as_ref().ok_or(NotifyError::TokenNotSet)?;
        let chat = self.chat_for(audience).ok_or(NotifyError::ChatNotSet)?;

        let message = bot
            .send_message(chat, html)
            .parse_mode(ParseMode::Html)
            .await?;

        debug!(chat = chat.0, message_id = message.id.0, "telegram alert sent");
        Ok(format!("telegram message {}", message.id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>, team: Option<&str>, owner: Option<&str>) -> NotifierConfig {
        NotifierConfig {
            telegram_bot_token: token.map(String::from),
            team_chat_id: team.map(String::from),
            owner_chat_id: owner.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_token() {
        let channel = TelegramChannel::from_config(&config(None, Some("-100123"), None)).unwrap();
        assert!(!channel.is_configured());

        let err = channel.send(Audience::Team, "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::TokenNotSet));
        assert_eq!(err.to_string(), "Bot token not configured");
    }

    #[tokio::test]
    async fn test_missing_chat() {
        let channel = TelegramChannel::from_config(&config(Some("123:abc"), None, None)).unwrap();
        let err = channel.send(Audience::Owner, "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::ChatNotSet));
    }

    #[test]
    fn test_owner_chat_fallback() {
        let team_only = TelegramChannel::from_config(&config(Some("t"), Some("-1"), None)).unwrap();
        assert_eq!(team_only.chat_for(Audience::Owner), Some(ChatId(-1)));

        let both = TelegramChannel::from_config(&config(Some("t"), Some("-1"), Some("42"))).unwrap();
        assert_eq!(both.chat_for(Audience::Owner), Some(ChatId(42)));
        assert_eq!(both.chat_for(Audience::Team), Some(ChatId(-1)));
    }

    #[test]
    fn test_invalid_chat_id() {
        let result = TelegramChannel::from_config(&config(None, Some("team-chat"), None));
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }
}
