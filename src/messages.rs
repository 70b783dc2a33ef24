use teloxide::utils::markdown::{bold, code_inline, escape};

pub const SOURCE_BUTTON_LABEL: &str = "➡️ Перейти до джерела";

pub fn greeting() -> String {
    escape(
        "Вітаю! 👋 Я допоможу вам відстежувати повідомлення від водоканалу.\n\n\
         Надішліть мені назву першої вулиці, за якою ви хочете стежити.",
    )
}

pub fn street_prompt() -> String {
    escape("Надішліть мені назву вулиці, яку хочете додати до списку моніторингу.")
}

pub fn street_added(street: &str) -> String {
    escape(&format!(
        "✅ Вулицю «{street}» додано!\n\n\
         Надішліть /addstreet, щоб додати ще, або /mystreets, щоб переглянути весь список."
    ))
}

pub fn street_list(streets: &[String]) -> String {
    if streets.is_empty() {
        return escape("Ви ще не додали жодної вулиці. Надішліть /addstreet, щоб почати.");
    }

    escape("Ви відстежуєте наступні вулиці:\n")
        + &streets
            .iter()
            .map(|street| format!("– {}", code_inline(street)))
            .collect::<Vec<_>>()
            .join("\n")
}

pub fn remove_street_usage() -> String {
    escape("Будь ласка, вкажіть назву вулиці після команди, наприклад:\n")
        + &code_inline("/removestreet Велика Перспективна")
}

pub fn street_removed(street: &str, removed: bool) -> String {
    if removed {
        escape(&format!("Вулицю «{street}» видалено зі списку моніторингу."))
    } else {
        escape(&format!("Вулиця «{street}» не знайдена у вашому списку."))
    }
}

pub fn unsubscribed() -> String {
    escape(
        "Ви успішно відписалися. Всі ваші дані та список вулиць видалено. \
         Щоб почати знову, надішліть /start.",
    )
}

pub fn unknown_text() -> String {
    escape("Не розумію вас. Щоб додати вулицю, використайте команду /addstreet.")
}

/// The alert pushed to matching subscribers, carrying the announcement
/// verbatim under a fixed header.
pub fn announcement_alert(text: &str) -> String {
    format!(
        "🚨 {} 🚨\n\n{}\n\n{}\n{}",
        bold(&escape("Увага! Повідомлення від водоканалу!")),
        escape("(Можливо, стосується вашої вулиці)"),
        escape("---"),
        escape(text)
    )
}
