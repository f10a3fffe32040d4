//! Localized category titles and descriptions.
//!
//! The legacy product stores a language item name instead of literal text
//! when a title or description was translated. Such sentinels are expanded
//! to every locale value; several locales become a shared translation key
//! named after the new category ID, a single locale is inlined, and no
//! locale at all falls back to a placeholder.

use regex::Regex;
use tracing::{debug, warn};

use crate::destination::DestinationWriter;
use crate::error::{MigrateError, Result};
use crate::source::{LocalizedText, SourceReader};

/// Language category new translation keys are filed under.
pub const LANGUAGE_CATEGORY: &str = "wcf.category";

/// Which localized field is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Title,
    Description,
}

impl FieldKind {
    pub fn column(self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Description => "description",
        }
    }

    /// Translation key for a category's field.
    pub fn key(self, new_id: i64) -> String {
        match self {
            FieldKind::Title => format!("wcf.category.category.title.category{}", new_id),
            FieldKind::Description => {
                format!("wcf.category.category.description.category{}", new_id)
            }
        }
    }

    /// Text used when a sentinel has no value in any known locale.
    pub fn fallback_text(self, new_id: i64) -> String {
        match self {
            FieldKind::Title => format!("Imported Category {}", new_id),
            FieldKind::Description => format!("Imported Category {} description", new_id),
        }
    }
}

/// Result of resolving a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedText {
    /// Inline text.
    Literal(String),
    /// Translation key created in the destination.
    Key(String),
}

impl ResolvedText {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedText::Literal(s) | ResolvedText::Key(s) => s,
        }
    }
}

/// Recognises language item sentinels in legacy field values.
///
/// Matches are unanchored: the pattern only has to occur somewhere in the
/// value. A description sentinel keeps the legacy quirk of being named
/// `…title.category{N}.description`.
#[derive(Debug, Clone)]
pub struct SentinelPattern {
    title: Regex,
    description: Regex,
}

impl SentinelPattern {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| MigrateError::Config(format!("invalid sentinel pattern: {}", e)))
        };
        Ok(Self {
            title: compile(r"wcf\.category\.category\.title\.category\d+")?,
            description: compile(r"wcf\.category\.category\.title\.category\d+\.description")?,
        })
    }

    pub fn is_sentinel(&self, kind: FieldKind, value: &str) -> bool {
        match kind {
            FieldKind::Title => self.title.is_match(value),
            FieldKind::Description => self.description.is_match(value),
        }
    }
}

/// Expands sentinels through the source and writes translations to the
/// destination.
#[derive(Debug, Clone)]
pub struct LanguageResolver {
    pattern: SentinelPattern,
}

impl LanguageResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: SentinelPattern::new()?,
        })
    }

    /// Resolve one field of the category imported as `new_id`.
    ///
    /// Never fails on missing translations; only source or destination
    /// errors propagate.
    pub async fn resolve<S, W>(
        &self,
        source: &S,
        writer: &mut W,
        value: &str,
        new_id: i64,
        kind: FieldKind,
    ) -> Result<ResolvedText>
    where
        S: SourceReader + ?Sized,
        W: DestinationWriter + ?Sized,
    {
        if !self.pattern.is_sentinel(kind, value) {
            if value.contains("wcf.category.") {
                debug!(
                    "{} of category {} looks like a language item but is not a known sentinel: {}",
                    kind.column(),
                    new_id,
                    value
                );
            }
            return Ok(ResolvedText::Literal(value.to_string()));
        }

        let values = filter_locales(
            source.language_item_values(value).await?,
            writer.known_locales(),
        );

        match values.len() {
            0 => {
                warn!(
                    "Missing translation: {} has no values in a known locale, using fallback for category {}",
                    value, new_id
                );
                Ok(ResolvedText::Literal(kind.fallback_text(new_id)))
            }
            1 => Ok(ResolvedText::Literal(
                values.into_values().next().unwrap_or_default(),
            )),
            _ => {
                let key = kind.key(new_id);
                writer
                    .create_translation(&key, LANGUAGE_CATEGORY, &values)
                    .await?;
                debug!("Created translation {} with {} locales", key, values.len());
                Ok(ResolvedText::Key(key))
            }
        }
    }
}

/// Keep only locales the destination knows; an empty list keeps all.
fn filter_locales(values: LocalizedText, known: &[String]) -> LocalizedText {
    if known.is_empty() {
        return values;
    }
    values
        .into_iter()
        .filter(|(locale, _)| known.iter().any(|k| k == locale))
        .collect()
}
