//! Telegram implementation of the chat gateway.
//!
//! Outgoing messages go straight to the Bot API. Inbound updates are
//! converted into [`GatewayUpdate`]s here and forwarded by the listener in
//! [`crate::bot`].

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    MessageEntityKind, MessageId, ParseMode, ReplyParameters,
};
use tracing::debug;

use courier_core::{
    ChatGateway, ChoiceSet, CoreError, GatewayUpdate, InboundEvent, InteractionReply, MessageRef,
    OutgoingMessage,
};

/// Sends replies through a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn gateway_error(e: teloxide::RequestError) -> CoreError {
    CoreError::Gateway(e.to_string())
}

/// Converts a choice grid into an inline keyboard.
pub fn keyboard(choices: &ChoiceSet) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(choices.rows.iter().map(|row| {
        row.iter()
            .map(|choice| InlineKeyboardButton::callback(choice.label.clone(), choice.value.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send(&self, message: &OutgoingMessage) -> courier_core::Result<MessageRef> {
        let chat_id = ChatId(message.chat_id);
        let reply_to = message
            .reply_to
            .map(|id| ReplyParameters::new(MessageId(id)));

        let sent = if let Some(document) = &message.document {
            let file = InputFile::memory(document.bytes.clone()).file_name(document.file_name.clone());
            let mut request = self.bot.send_document(chat_id, file);
            if !message.text.is_empty() {
                request = request.caption(message.text.clone());
            }
            if let Some(reply_to) = reply_to {
                request = request.reply_parameters(reply_to);
            }
            request.await.map_err(gateway_error)?
        } else {
            let mut request = self.bot.send_message(chat_id, message.text.clone());
            if message.rich {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(choices) = &message.choices {
                request = request.reply_markup(keyboard(choices));
            }
            if let Some(reply_to) = reply_to {
                request = request.reply_parameters(reply_to);
            }
            request.await.map_err(gateway_error)?
        };

        debug!(chat_id = message.chat_id, message_id = sent.id.0, "message sent");
        Ok(MessageRef::new(sent.chat.id.0, sent.id.0))
    }

    async fn acknowledge(&self, interaction_id: &str, _value: &str) -> courier_core::Result<()> {
        self.bot
            .answer_callback_query(interaction_id.to_string())
            .await
            .map_err(gateway_error)?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> courier_core::Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map_err(gateway_error)?;
        Ok(())
    }
}

/// Whether Telegram flagged the message as a bot command.
fn is_bot_command(msg: &Message) -> bool {
    msg.entities()
        .and_then(|entities| entities.first())
        .is_some_and(|entity| entity.kind == MessageEntityKind::BotCommand && entity.offset == 0)
}

fn origin(msg: &Message) -> MessageRef {
    MessageRef::new(msg.chat.id.0, msg.id.0)
}

/// Converts a text message. Documents are handled by [`file_event`].
pub fn text_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let event = if is_bot_command(msg) {
        InboundEvent::command(origin(msg), text)
    } else {
        InboundEvent::text(origin(msg), text)
    };
    Some(event)
}

/// Converts a message carrying a document whose content lives at `url`.
pub fn file_event(msg: &Message, url: String) -> Option<InboundEvent> {
    let document = msg.document()?;
    let name = document
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}.torrent", document.file.unique_id));
    Some(InboundEvent::file(origin(msg), name, url))
}

/// Converts an inline button tap. Taps without data or message are not routable.
pub fn interaction(query: &CallbackQuery) -> Option<GatewayUpdate> {
    let message = query.message.as_ref()?;
    let choice = query.data.clone()?;
    Some(GatewayUpdate::Interaction(InteractionReply {
        interaction_id: query.id.clone(),
        message: MessageRef::new(message.chat().id.0, message.id().0),
        choice,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Choice;

    fn message(body: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 17,
            "date": 1_700_000_000i64,
            "chat": {"id": 42, "type": "private", "first_name": "User"},
            "from": {"id": 42, "is_bot": false, "first_name": "User"}
        });
        if let (Some(target), Some(extra)) = (json.as_object_mut(), body.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_plain_text_event() {
        let msg = message(serde_json::json!({"text": "alien romulus"}));
        let event = text_event(&msg).unwrap();
        assert_eq!(event, InboundEvent::text(MessageRef::new(42, 17), "alien romulus"));
    }

    #[test]
    fn test_command_event_from_entity() {
        let msg = message(serde_json::json!({
            "text": "/downloading",
            "entities": [{"type": "bot_command", "offset": 0, "length": 12}]
        }));
        let event = text_event(&msg).unwrap();
        assert!(event.is_command);
        assert_eq!(event.text.as_deref(), Some("/downloading"));
    }

    #[test]
    fn test_slash_text_without_entity_is_free_text() {
        let msg = message(serde_json::json!({"text": "/путь домой"}));
        let event = text_event(&msg).unwrap();
        assert!(!event.is_command);
        assert!(courier_core::Matcher::free_text(".*").unwrap().matches(&event));
    }

    #[test]
    fn test_document_event() {
        let msg = message(serde_json::json!({
            "document": {
                "file_id": "BQACAgIAAxkBAAI",
                "file_unique_id": "AgADBQ",
                "file_name": "dune.torrent",
                "file_size": 2048
            }
        }));
        assert!(text_event(&msg).is_none());
        let event = file_event(&msg, "https://files.example/dune".to_string()).unwrap();
        let file = event.file.unwrap();
        assert_eq!(file.name, "dune.torrent");
        assert_eq!(file.url, "https://files.example/dune");
        assert_eq!(event.origin, MessageRef::new(42, 17));
    }

    #[test]
    fn test_callback_interaction() {
        let query: CallbackQuery = serde_json::from_value(serde_json::json!({
            "id": "987",
            "from": {"id": 42, "is_bot": false, "first_name": "User"},
            "data": "Movies",
            "chat_instance": "abc",
            "message": {
                "message_id": 1000,
                "date": 1_700_000_000i64,
                "chat": {"id": 42, "type": "private", "first_name": "User"},
                "from": {"id": 1, "is_bot": true, "first_name": "Courier"},
                "text": "Где искать?"
            }
        }))
        .unwrap();

        assert_eq!(
            interaction(&query),
            Some(GatewayUpdate::Interaction(InteractionReply {
                interaction_id: "987".to_string(),
                message: MessageRef::new(42, 1000),
                choice: "Movies".to_string(),
            }))
        );
    }

    #[test]
    fn test_keyboard_rows() {
        let markup = keyboard(&ChoiceSet::new(vec![
            vec![Choice::new("A", "a"), Choice::new("B", "b")],
            vec![Choice::new("C", "c")],
        ]));
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "C");
    }
}
