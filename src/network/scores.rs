//! High Score Board
//!
//! In-memory top-N board shared by every session of one server process.
//! Nothing is persisted; the board is empty after a restart.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::info;

/// Entries kept on the board.
pub const BOARD_CAPACITY: usize = 10;

/// Longest accepted player name, in characters.
pub const MAX_NAME_CHARS: usize = 16;

/// Name used when a submission has none.
pub const ANONYMOUS: &str = "Anonymous";

/// One board entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub name: String,
    pub score: u32,
    /// Level name for heist runs, `None` for endless.
    pub level: Option<String>,
    pub achieved_at: DateTime<Utc>,
}

/// Best scores, highest first. Equal scores keep submission order.
#[derive(Debug, Clone)]
pub struct HighScoreBoard {
    capacity: usize,
    entries: Vec<HighScoreEntry>,
}

impl HighScoreBoard {
    /// Empty board holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    /// Submit a score.
    ///
    /// Returns the 1-based rank, or `None` when the board is full and the
    /// score does not beat the lowest entry.
    pub fn submit(
        &mut self,
        name: &str,
        score: u32,
        level: Option<String>,
        achieved_at: DateTime<Utc>,
    ) -> Option<usize> {
        let position = self.entries.partition_point(|e| e.score >= score);
        if position >= self.capacity {
            return None;
        }

        let name = sanitize_name(name);
        info!("High score #{}: {} ({})", position + 1, name, score);

        self.entries.insert(
            position,
            HighScoreEntry {
                name,
                score,
                level,
                achieved_at,
            },
        );
        self.entries.truncate(self.capacity);

        Some(position + 1)
    }

    /// Entries, best first.
    pub fn entries(&self) -> &[HighScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HighScoreBoard {
    fn default() -> Self {
        Self::new(BOARD_CAPACITY)
    }
}

/// Trim, strip control characters and cap the length.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        ANONYMOUS.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_entries_sorted_descending() {
        let mut board = HighScoreBoard::default();

        assert_eq!(board.submit("ana", 50, None, at(0)), Some(1));
        assert_eq!(board.submit("bo", 80, None, at(1)), Some(1));
        assert_eq!(board.submit("cy", 60, Some("Vault".into()), at(2)), Some(2));

        let scores: Vec<u32> = board.entries().iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![80, 60, 50]);
        assert_eq!(board.entries()[1].level.as_deref(), Some("Vault"));
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let mut board = HighScoreBoard::default();
        board.submit("first", 40, None, at(0));

        assert_eq!(board.submit("second", 40, None, at(1)), Some(2));
        assert_eq!(board.entries()[0].name, "first");
    }

    #[test]
    fn test_capacity_enforced() {
        let mut board = HighScoreBoard::new(3);
        for score in [10, 20, 30] {
            board.submit("p", score, None, at(0));
        }

        // Does not beat the lowest
        assert_eq!(board.submit("low", 10, None, at(1)), None);
        assert_eq!(board.len(), 3);

        // Pushes the lowest off
        assert_eq!(board.submit("mid", 25, None, at(2)), Some(2));
        let scores: Vec<u32> = board.entries().iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![30, 25, 20]);
    }

    #[test]
    fn test_names_sanitized() {
        let mut board = HighScoreBoard::default();
        board.submit("   ", 1, None, at(0));
        board.submit("a\u{7}very-long-player-name-indeed", 2, None, at(0));

        assert_eq!(board.entries()[1].name, ANONYMOUS);
        assert_eq!(board.entries()[0].name, "avery-long-playe");
    }
}
