//! Fuzzy duplicate detection against recently persisted articles.
//!
//! A candidate is a duplicate when either check fires against any article in
//! the window:
//!
//! 1. full similarity ratio of the case-folded titles exceeds `title_threshold`
//! 2. partial similarity ratio of the case-folded body prefixes exceeds `body_threshold`
//!
//! The detector holds no state; the caller supplies the window.

use crate::config::DedupSettings;
use crate::models::Article;
use tracing::debug;

/// Normalized Levenshtein similarity on a 0-100 scale.
pub fn ratio(a: &str, b: &str) -> u32 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u32
}

/// Best [`ratio`] between the shorter string and any equally long window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    let needle: String = short.iter().collect();
    let mut best = 0;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        best = best.max(ratio(&needle, &window));
        if best == 100 {
            break;
        }
    }
    best
}

fn prefix(text: &str, chars: usize) -> String {
    text.to_lowercase().chars().take(chars).collect()
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    title_threshold: u32,
    body_threshold: u32,
    body_prefix_chars: usize,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(&DedupSettings::default())
    }
}

impl DuplicateDetector {
    pub fn new(settings: &DedupSettings) -> Self {
        Self {
            title_threshold: settings.title_threshold,
            body_threshold: settings.body_threshold,
            body_prefix_chars: settings.body_prefix_chars,
        }
    }

    /// Returns the first article in `recent` that `title` / `body` duplicate.
    pub fn find_duplicate<'a>(
        &self,
        title: &str,
        body: &str,
        recent: &'a [Article],
    ) -> Option<&'a Article> {
        let title = title.to_lowercase();
        let body = prefix(body, self.body_prefix_chars);

        recent.iter().find(|existing| {
            let title_sim = ratio(&title, &existing.title.to_lowercase());
            if title_sim > self.title_threshold {
                debug!(existing_id = %existing.id, title_sim, "Title matches a recent article");
                return true;
            }
            if body.trim().is_empty() || existing.body_text.trim().is_empty() {
                return false;
            }
            let body_sim = partial_ratio(&body, &prefix(&existing.body_text, self.body_prefix_chars));
            if body_sim > self.body_threshold {
                debug!(existing_id = %existing.id, body_sim, "Body matches a recent article");
                return true;
            }
            false
        })
    }

    pub fn is_duplicate(&self, title: &str, body: &str, recent: &[Article]) -> bool {
        self.find_duplicate(title, body, recent).is_some()
    }
}
