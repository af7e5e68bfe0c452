//! Like/dislike membership for a single review.
//!
//! [`Reactions`] owns both membership sets and derives the counters from
//! them, so the counters written back to storage can never drift from the
//! sets they summarize.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The two reactions a user can leave on a review.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReactionKind {
    /// Thumbs up.
    Like,
    /// Thumbs down.
    Dislike,
}

impl ReactionKind {
    /// Returns the reaction that is cleared when this one is added.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Like => Self::Dislike,
            Self::Dislike => Self::Like,
        }
    }
}

/// Like and dislike totals returned after every toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReactionCounts {
    /// Number of users currently liking the review.
    pub likes: u32,
    /// Number of users currently disliking the review.
    pub dislikes: u32,
}

/// A user id was found in both membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionConflictError {
    /// The user id present in both sets.
    pub user_id: i64,
}

impl std::fmt::Display for ReactionConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "user {} appears in both likedBy and dislikedBy",
            self.user_id
        )
    }
}

impl std::error::Error for ReactionConflictError {}

/// Disjoint sets of users who liked and disliked a review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reactions {
    liked_by: BTreeSet<i64>,
    disliked_by: BTreeSet<i64>,
}

impl Reactions {
    /// Builds reactions from stored membership lists.
    ///
    /// # Errors
    ///
    /// Returns [`ReactionConflictError`] if a user id is in both lists.
    pub fn from_sets<L, D>(liked_by: L, disliked_by: D) -> Result<Self, ReactionConflictError>
    where
        L: IntoIterator<Item = i64>,
        D: IntoIterator<Item = i64>,
    {
        let liked_by: BTreeSet<i64> = liked_by.into_iter().collect();
        let disliked_by: BTreeSet<i64> = disliked_by.into_iter().collect();

        if let Some(&user_id) = liked_by.intersection(&disliked_by).next() {
            return Err(ReactionConflictError { user_id });
        }

        Ok(Self {
            liked_by,
            disliked_by,
        })
    }

    /// Toggles `kind` for `user_id` and returns the resulting counts.
    ///
    /// A repeated toggle of the same kind removes the reaction. Adding a
    /// reaction removes the opposite one from the same user.
    pub fn toggle(&mut self, kind: ReactionKind, user_id: i64) -> ReactionCounts {
        let (same, opposite) = match kind {
            ReactionKind::Like => (&mut self.liked_by, &mut self.disliked_by),
            ReactionKind::Dislike => (&mut self.disliked_by, &mut self.liked_by),
        };

        if !same.remove(&user_id) {
            same.insert(user_id);
            opposite.remove(&user_id);
        }

        self.counts()
    }

    /// Current like and dislike totals.
    #[must_use]
    pub fn counts(&self) -> ReactionCounts {
        ReactionCounts {
            likes: u32::try_from(self.liked_by.len()).unwrap_or(u32::MAX),
            dislikes: u32::try_from(self.disliked_by.len()).unwrap_or(u32::MAX),
        }
    }

    /// Users who liked the review, ascending.
    #[must_use]
    pub const fn liked_by(&self) -> &BTreeSet<i64> {
        &self.liked_by
    }

    /// Users who disliked the review, ascending.
    #[must_use]
    pub const fn disliked_by(&self) -> &BTreeSet<i64> {
        &self.disliked_by
    }
}
