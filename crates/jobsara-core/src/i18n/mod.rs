//! Locale negotiation and dictionary translation.
//!
//! Translation is display-only: a whole-phrase dictionary lookup first, then
//! word-by-word substitution that keeps unknown words as they are.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported display locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English (source language of every message).
    #[default]
    En,
    /// Persian.
    Fa,
}

impl Locale {
    /// Language code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fa => "fa",
        }
    }

    /// Derive a locale from an `Accept-Language` header value.
    ///
    /// Only the first listed language counts: anything starting with `fa`
    /// maps to Persian, everything else (including a missing header) to
    /// English.
    #[must_use]
    pub fn from_accept_language(header: Option<&str>) -> Self {
        let first = header
            .and_then(|h| h.split(',').next())
            .map(str::trim)
            .unwrap_or_default();

        if first.to_ascii_lowercase().starts_with("fa") {
            Self::Fa
        } else {
            Self::En
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned for an unsupported language code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLocale(pub String);

impl FromStr for Locale {
    type Err = UnsupportedLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "en" => Ok(Self::En),
            "fa" => Ok(Self::Fa),
            other => Err(UnsupportedLocale(other.to_string())),
        }
    }
}

/// Text translator.
pub trait Translator: Send + Sync {
    /// Translate `text` into `locale`. Never fails; untranslatable text is
    /// returned unchanged.
    fn translate(&self, text: &str, locale: Locale) -> String;
}

/// Dictionary-backed translator with phrase and word tables per locale.
#[derive(Debug, Clone, Default)]
pub struct WordTranslator {
    phrases: HashMap<Locale, HashMap<String, String>>,
    words: HashMap<Locale, HashMap<String, String>>,
}

impl WordTranslator {
    /// Create an empty translator (identity for every locale).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a whole-phrase translation.
    #[must_use]
    pub fn with_phrase(mut self, locale: Locale, source: &str, target: &str) -> Self {
        self.phrases
            .entry(locale)
            .or_default()
            .insert(source.to_lowercase(), target.to_string());
        self
    }

    /// Add a single-word translation.
    #[must_use]
    pub fn with_word(mut self, locale: Locale, source: &str, target: &str) -> Self {
        self.words
            .entry(locale)
            .or_default()
            .insert(source.to_lowercase(), target.to_string());
        self
    }

    /// Translator preloaded with the gateway's response messages.
    #[must_use]
    pub fn builtin() -> Self {
        let mut translator = Self::new();
        for (source, target) in FA_PHRASES {
            translator = translator.with_phrase(Locale::Fa, source, target);
        }
        for (source, target) in FA_WORDS {
            translator = translator.with_word(Locale::Fa, source, target);
        }
        translator
    }

    fn substitute_words(&self, text: &str, table: &HashMap<String, String>) -> String {
        text.split_whitespace()
            .map(|token| {
                let trimmed = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
                let suffix = &token[trimmed.len()..];
                table.get(&trimmed.to_lowercase()).map_or_else(
                    || token.to_string(),
                    |translated| format!("{translated}{suffix}"),
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Translator for WordTranslator {
    fn translate(&self, text: &str, locale: Locale) -> String {
        if let Some(phrase) = self
            .phrases
            .get(&locale)
            .and_then(|table| table.get(&text.trim().to_lowercase()))
        {
            return phrase.clone();
        }

        match self.words.get(&locale) {
            Some(table) if !table.is_empty() => self.substitute_words(text, table),
            _ => text.to_string(),
        }
    }
}

const FA_PHRASES: &[(&str, &str)] = &[
    ("Access token required", "توکن دسترسی لازم است"),
    ("Invalid token", "توکن نامعتبر است"),
    ("Token expired", "توکن منقضی شده است"),
    ("Session is no longer valid", "نشست دیگر معتبر نیست"),
    ("Admin access required", "دسترسی مدیر لازم است"),
    ("Access denied", "دسترسی رد شد"),
    ("Invalid email or password", "ایمیل یا رمز عبور نامعتبر است"),
    ("Missing required fields", "فیلدهای اجباری وارد نشده‌اند"),
    ("User with this email already exists", "کاربری با این ایمیل وجود دارد"),
    ("Username already taken", "این نام کاربری قبلا گرفته شده است"),
    ("User registered successfully", "ثبت نام با موفقیت انجام شد"),
    ("Login successful", "ورود موفقیت‌آمیز بود"),
    ("Logout successful", "خروج موفقیت‌آمیز بود"),
    ("User not found", "کاربر پیدا نشد"),
    ("Teacher not found", "مدرس پیدا نشد"),
    ("Endpoint not found", "مسیر پیدا نشد"),
    ("Internal server error", "خطای داخلی سرور"),
    ("Service temporarily unavailable", "سرویس موقتا در دسترس نیست"),
    ("Server is running", "سرور در حال اجراست"),
    ("Language updated successfully", "زبان با موفقیت تغییر کرد"),
    ("Invalid language", "زبان نامعتبر است"),
];

const FA_WORDS: &[(&str, &str)] = &[
    ("user", "کاربر"),
    ("users", "کاربران"),
    ("teacher", "مدرس"),
    ("teachers", "مدرسان"),
    ("profile", "پروفایل"),
    ("role", "نقش"),
    ("course", "دوره"),
    ("retrieved", "دریافت شد"),
    ("updated", "به‌روزرسانی شد"),
    ("deleted", "حذف شد"),
    ("added", "اضافه شد"),
    ("successfully", "با موفقیت"),
    ("invalid", "نامعتبر"),
    ("failed", "ناموفق"),
    ("summary", "خلاصه"),
    ("site", "سایت"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_from_accept_language() {
        assert_eq!(Locale::from_accept_language(Some("fa-IR,en;q=0.8")), Locale::Fa);
        assert_eq!(Locale::from_accept_language(Some("en-US,fa;q=0.9")), Locale::En);
        assert_eq!(Locale::from_accept_language(Some("  FA ")), Locale::Fa);
        assert_eq!(Locale::from_accept_language(Some("de")), Locale::En);
        assert_eq!(Locale::from_accept_language(None), Locale::En);
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("fa".parse::<Locale>().unwrap(), Locale::Fa);
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert!("de".parse::<Locale>().is_err());
    }

    #[test]
    fn test_english_is_identity() {
        let translator = WordTranslator::builtin();
        assert_eq!(
            translator.translate("Login successful", Locale::En),
            "Login successful"
        );
    }

    #[test]
    fn test_phrase_lookup_ignores_case() {
        let translator = WordTranslator::builtin();
        assert_eq!(
            translator.translate("token expired", Locale::Fa),
            "توکن منقضی شده است"
        );
    }

    #[test]
    fn test_word_substitution_keeps_unknown_words_and_punctuation() {
        let translator = WordTranslator::new()
            .with_word(Locale::Fa, "teacher", "مدرس")
            .with_word(Locale::Fa, "added", "اضافه شد");

        assert_eq!(
            translator.translate("Teacher Ada added!", Locale::Fa),
            "مدرس Ada اضافه شد!"
        );
    }

    #[test]
    fn test_empty_translator_is_identity() {
        let translator = WordTranslator::new();
        assert_eq!(translator.translate("anything", Locale::Fa), "anything");
    }
}
