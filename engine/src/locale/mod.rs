//! Locale detection and answer strings
//!
//! The chat surface answers in English or Ukrainian. Detection is a plain
//! script check on the question text; the formatter then pulls its fixed
//! phrases from the table here so numbers stay identical across locales.

/// Detect the answer locale from the question text. Any Cyrillic letter
/// selects Ukrainian, everything else falls back to English.
pub fn detect(question: &str) -> &'static str {
    if question
        .chars()
        .any(|c| ('\u{0400}'..='\u{04FF}').contains(&c))
    {
        "uk"
    } else {
        "en"
    }
}

/// Fixed formatter phrases, keyed by locale.
pub struct Strings;

impl Strings {
    /// Caveat prepended when any step was truncated.
    pub fn truncated_caveat(locale: &str) -> &'static str {
        match locale {
            "uk" => "Дані неповні: не всі сторінки було отримано, показано частковий результат.",
            _ => "Note: the data was truncated before all pages were read, so this is a partial result.",
        }
    }

    /// Caveat prepended when a step failed or was skipped.
    pub fn failed_caveat(locale: &str) -> &'static str {
        match locale {
            "uk" => "Частина запиту не виконалась через проблеми з джерелом даних.",
            _ => "Part of the query could not be completed because a data source was unavailable.",
        }
    }

    /// Answer when the final step produced no rows.
    pub fn no_data(locale: &str) -> &'static str {
        match locale {
            "uk" => "Даних за цим запитом не знайдено.",
            _ => "No data was found for this query.",
        }
    }

    /// Apology when planning failed and nothing was executed.
    pub fn could_not_understand(locale: &str) -> &'static str {
        match locale {
            "uk" => "Вибачте, я не зміг зрозуміти запит. Спробуйте переформулювати питання.",
            _ => "Sorry, I could not understand the request. Try rephrasing the question.",
        }
    }

    /// Apology when no language model provider answered.
    pub fn service_unavailable(locale: &str) -> &'static str {
        match locale {
            "uk" => "Сервіс тимчасово недоступний. Спробуйте пізніше.",
            _ => "The service is temporarily unavailable. Please try again later.",
        }
    }

    /// Label for a row count line.
    pub fn rows_label(locale: &str) -> &'static str {
        match locale {
            "uk" => "рядків",
            _ => "rows",
        }
    }
}
