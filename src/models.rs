//! Data models for collected articles and their workflow state.
//!
//! - [`Candidate`]: a search result after markup cleanup, ready for scoring
//! - [`NewArticle`]: an accepted candidate about to be persisted
//! - [`Article`]: a persisted article with its workflow [`ArticleState`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned article identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub u64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an article from collection to publication.
///
/// The variants are declared in workflow order; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleState {
    Collected,
    ApprovedForTranslate,
    /// Defined for completeness; successful translation writes `ReadyForFinal` directly.
    TranslatedEdited,
    ReadyForFinal,
    PublishedQueue,
    Published,
}

impl ArticleState {
    pub const ALL: [ArticleState; 6] = [
        ArticleState::Collected,
        ArticleState::ApprovedForTranslate,
        ArticleState::TranslatedEdited,
        ArticleState::ReadyForFinal,
        ArticleState::PublishedQueue,
        ArticleState::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleState::Collected => "collected",
            ArticleState::ApprovedForTranslate => "approved_for_translate",
            ArticleState::TranslatedEdited => "translated_edited",
            ArticleState::ReadyForFinal => "ready_for_final",
            ArticleState::PublishedQueue => "published_queue",
            ArticleState::Published => "published",
        }
    }

    /// States reachable from `self` in one step.
    ///
    /// `ReadyForFinal -> Published` is the manual "publish now" path; every
    /// other edge is the linear progression.
    pub fn successors(&self) -> &'static [ArticleState] {
        use ArticleState::*;
        match self {
            Collected => &[ApprovedForTranslate],
            ApprovedForTranslate => &[TranslatedEdited, ReadyForFinal],
            TranslatedEdited => &[ReadyForFinal],
            ReadyForFinal => &[PublishedQueue, Published],
            PublishedQueue => &[Published],
            Published => &[],
        }
    }

    pub fn can_advance_to(&self, next: ArticleState) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for ArticleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArticleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArticleState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown article state: {s}"))
    }
}

/// A search result reduced to the fields the scorer and duplicate detector need.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    /// Highlight text with markup removed.
    pub body_text: String,
    pub published_at: DateTime<Utc>,
    /// Lower is more credible. `None` when the source did not report one.
    pub domain_rank: Option<i64>,
    pub categories: Vec<String>,
}

/// An accepted candidate, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub domain_rank: Option<i64>,
    pub categories: Vec<String>,
    pub sentiment: Option<String>,
    pub language: String,
    pub score: f64,
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub domain_rank: Option<i64>,
    pub categories: Vec<String>,
    pub sentiment: Option<String>,
    pub language: String,
    pub score: f64,
    pub state: ArticleState,
    pub translated_text: Option<String>,
    /// Human-adjusted text; wins over everything else when present.
    pub edited_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

impl Article {
    pub fn from_new(id: ArticleId, new: NewArticle, now: DateTime<Utc>) -> Self {
        Article {
            id,
            title: new.title,
            body_text: new.body_text,
            url: new.url,
            published_at: new.published_at,
            domain_rank: new.domain_rank,
            categories: new.categories,
            sentiment: new.sentiment,
            language: new.language,
            score: new.score,
            state: ArticleState::Collected,
            translated_text: None,
            edited_text: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Best text to show or publish: edited, then translated, then the body.
    pub fn display_text(&self) -> Option<&str> {
        non_blank(&self.edited_text)
            .or_else(|| non_blank(&self.translated_text))
            .or_else(|| Some(self.body_text.as_str()).filter(|t| !t.trim().is_empty()))
    }

    /// True once a translation or a human edit exists.
    pub fn has_translation(&self) -> bool {
        non_blank(&self.edited_text).is_some() || non_blank(&self.translated_text).is_some()
    }

    /// Source text handed to the translator: the body, or the title when the body is empty.
    pub fn translation_source(&self) -> &str {
        if self.body_text.trim().is_empty() {
            &self.title
        } else {
            &self.body_text
        }
    }

    /// Candidate view of this article, used when re-explaining its score.
    pub fn as_candidate(&self) -> Candidate {
        Candidate {
            title: self.title.clone(),
            body_text: self.body_text.clone(),
            published_at: self.published_at,
            domain_rank: self.domain_rank,
            categories: self.categories.clone(),
        }
    }
}
