//! Fixed user-facing replies. All strings are the bot's Russian UI surface;
//! builders return [`OutboundMessage`] values the transport knows how to
//! deliver.

use homestash_core::domain::item::{Item, MediaRef};
use homestash_core::flows::ROOM_SHORTCUTS;

use crate::speech::VoiceClip;

/// One outbound message for the transport to deliver. Keyboard handling is
/// explicit: `TextWithKeyboard` shows the room quick-reply set,
/// `TextRemoveKeyboard` tears it down again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text { text: String },
    TextWithKeyboard { text: String, keyboard: Vec<String> },
    TextRemoveKeyboard { text: String },
    PhotoWithCaption { photo: MediaRef, caption: String },
    Voice { clip: VoiceClip },
}

impl OutboundMessage {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

pub fn help() -> OutboundMessage {
    OutboundMessage::text(
        "🏠 Добро пожаловать в Homestash!\n\
         Я помогу найти потерянные вещи в вашем доме.\n\n\
         🔹 Основные команды:\n\
         /add - Добавить новую вещь\n\
         /find - Найти вещь\n\
         /map - Настроить карту квартиры\n\
         /cleanup - Показать забытые вещи",
    )
}

pub fn unknown_command(name: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "🤔 Я не знаю команду /{name}. Отправьте /start, чтобы увидеть список команд."
    ))
}

pub fn map_image_prompt() -> OutboundMessage {
    OutboundMessage::text("📱 Загрузите схему вашей квартиры (изображение):")
}

pub fn map_coordinates_prompt() -> OutboundMessage {
    OutboundMessage::text(
        "📍 Отправьте координаты места для метки в формате: X Y\n(Например: 150 200)",
    )
}

pub fn map_saved() -> OutboundMessage {
    OutboundMessage::text("✅ Карта успешно сохранена! Теперь вы можете добавлять вещи.")
}

pub fn invalid_coordinates() -> OutboundMessage {
    OutboundMessage::text(
        "❌ Не получилось разобрать координаты. Отправьте два целых числа в формате: X Y",
    )
}

pub fn capture_photo_prompt() -> OutboundMessage {
    OutboundMessage::text("📸 Сфотографируйте вещь:")
}

pub fn capture_description_prompt() -> OutboundMessage {
    OutboundMessage::text(
        "✍️ Опишите вещь и место хранения:\n\
         Пример: 'Паспорт в синей папке на верхней полке шкафа'",
    )
}

pub fn capture_location_prompt() -> OutboundMessage {
    OutboundMessage::TextWithKeyboard {
        text: "📍 Выберите комнату или отправьте своё описание:".to_owned(),
        keyboard: ROOM_SHORTCUTS.iter().map(|room| (*room).to_owned()).collect(),
    }
}

pub fn item_saved(tags: &[String]) -> OutboundMessage {
    OutboundMessage::TextRemoveKeyboard {
        text: format!("✅ Вещь сохранена! Теги: {}", tags.join(",")),
    }
}

pub fn search_prompt() -> OutboundMessage {
    OutboundMessage::text("🔍 Что ищем? Опишите вещь или используйте голосовое сообщение:")
}

pub fn voice_search_unavailable() -> OutboundMessage {
    OutboundMessage::text("🔇 Голосовой поиск временно недоступен. Используйте текст.")
}

pub fn nothing_found() -> OutboundMessage {
    OutboundMessage::text("😢 Ничего не найдено. Попробуйте другие ключевые слова.")
}

pub fn search_match(item: &Item) -> OutboundMessage {
    OutboundMessage::PhotoWithCaption {
        photo: item.photo_ref.clone(),
        caption: format!("📍 {}\n{}", item.location, item.description),
    }
}

pub fn stale_report(lines: &[String]) -> OutboundMessage {
    OutboundMessage::text(format!(
        "📅 Вещи, которые вы не использовали больше месяца:\n\n{}",
        lines.join("\n")
    ))
}

pub fn nothing_forgotten() -> OutboundMessage {
    OutboundMessage::text("🎉 Все ваши вещи использовались недавно! Ничего не забыто.")
}

pub fn expected_photo() -> OutboundMessage {
    OutboundMessage::text("❌ Я жду фотографию. Пришлите изображение, пожалуйста.")
}

pub fn expected_text() -> OutboundMessage {
    OutboundMessage::text("❌ Я жду текстовое сообщение. Напишите текстом, пожалуйста.")
}
