//! Optimistic like/dislike state for one review as seen by one user.
//!
//! A toggle is applied locally first so the counters move immediately.
//! [`ReactionView::begin`] returns a [`PendingReaction`] holding the state
//! before the change; the caller then either [`confirm`](ReactionView::confirm)s
//! with the server's counters or [`rollback`](ReactionView::rollback)s when
//! the request fails.

use safe_route_database_models::{ReactionCounts, ReactionKind};
use safe_route_server_models::{ApiReactionCounts, ApiReview};

use crate::ClientError;
use crate::api::ApiClient;

/// Local reaction state for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionView {
    /// The review being reacted to.
    pub review_id: i64,
    /// Counters as currently shown.
    pub counts: ReactionCounts,
    /// The viewing user's own reaction.
    pub mine: Option<ReactionKind>,
}

/// Snapshot taken before an optimistic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a pending reaction must be confirmed or rolled back"]
pub struct PendingReaction {
    /// The reaction being toggled.
    pub kind: ReactionKind,
    previous_counts: ReactionCounts,
    previous_mine: Option<ReactionKind>,
}

impl ReactionView {
    /// State of `review` as seen by `user_id`.
    #[must_use]
    pub fn for_user(review: &ApiReview, user_id: i64) -> Self {
        let mine = if review.liked_by.contains(&user_id) {
            Some(ReactionKind::Like)
        } else if review.disliked_by.contains(&user_id) {
            Some(ReactionKind::Dislike)
        } else {
            None
        };

        Self {
            review_id: review.id,
            counts: ReactionCounts {
                likes: review.likes,
                dislikes: review.dislikes,
            },
            mine,
        }
    }

    /// Applies `kind` locally using the same rules as the server: repeating
    /// a reaction removes it, and switching moves the user across.
    pub fn begin(&mut self, kind: ReactionKind) -> PendingReaction {
        let pending = PendingReaction {
            kind,
            previous_counts: self.counts,
            previous_mine: self.mine,
        };

        if self.mine == Some(kind) {
            let count = self.counter(kind);
            *count = count.saturating_sub(1);
            self.mine = None;
        } else {
            if self.mine == Some(kind.opposite()) {
                let count = self.counter(kind.opposite());
                *count = count.saturating_sub(1);
            }
            *self.counter(kind) += 1;
            self.mine = Some(kind);
        }

        pending
    }

    /// Replaces the optimistic counters with the server's. The user's own
    /// reaction stays as toggled.
    pub fn confirm(&mut self, pending: PendingReaction, server: ApiReactionCounts) {
        log::trace!(
            "Review {} {} confirmed: {} likes, {} dislikes",
            self.review_id,
            pending.kind,
            server.likes,
            server.dislikes
        );
        self.counts = ReactionCounts {
            likes: server.likes,
            dislikes: server.dislikes,
        };
    }

    /// Restores the state from before `pending` was started.
    pub fn rollback(&mut self, pending: PendingReaction) {
        self.counts = pending.previous_counts;
        self.mine = pending.previous_mine;
    }

    /// Toggles `kind` optimistically and reconciles with the server.
    ///
    /// # Errors
    ///
    /// Returns the request error after rolling the local state back.
    pub async fn toggle(
        &mut self,
        client: &ApiClient,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<(), ClientError> {
        let pending = self.begin(kind);
        match client.react(self.review_id, user_id, kind).await {
            Ok(counts) => {
                self.confirm(pending, counts);
                Ok(())
            }
            Err(e) => {
                log::warn!("Reaction on review {} failed: {e}", self.review_id);
                self.rollback(pending);
                Err(e)
            }
        }
    }

    fn counter(&mut self, kind: ReactionKind) -> &mut u32 {
        match kind {
            ReactionKind::Like => &mut self.counts.likes,
            ReactionKind::Dislike => &mut self.counts.dislikes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn view(likes: u32, dislikes: u32, mine: Option<ReactionKind>) -> ReactionView {
        ReactionView {
            review_id: 5,
            counts: ReactionCounts { likes, dislikes },
            mine,
        }
    }

    #[test]
    fn like_then_like_again_is_identity() {
        let mut v = view(2, 1, None);
        let _ = v.begin(ReactionKind::Like);
        assert_eq!(v.counts, ReactionCounts { likes: 3, dislikes: 1 });
        assert_eq!(v.mine, Some(ReactionKind::Like));

        let _ = v.begin(ReactionKind::Like);
        assert_eq!(v, view(2, 1, None));
    }

    #[test]
    fn switching_moves_the_user_across() {
        let mut v = view(2, 1, Some(ReactionKind::Dislike));
        let _ = v.begin(ReactionKind::Like);
        assert_eq!(v.counts, ReactionCounts { likes: 3, dislikes: 0 });
        assert_eq!(v.mine, Some(ReactionKind::Like));
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut v = view(0, 4, Some(ReactionKind::Dislike));
        let pending = v.begin(ReactionKind::Like);
        v.rollback(pending);
        assert_eq!(v, view(0, 4, Some(ReactionKind::Dislike)));
    }

    #[test]
    fn confirm_takes_server_counts() {
        let mut v = view(0, 0, None);
        let pending = v.begin(ReactionKind::Like);
        v.confirm(pending, ApiReactionCounts { likes: 7, dislikes: 2 });
        assert_eq!(v.counts, ReactionCounts { likes: 7, dislikes: 2 });
        assert_eq!(v.mine, Some(ReactionKind::Like));
    }

    #[tokio::test]
    async fn failed_request_rolls_back() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/reviews/like/5"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "msg": "Review not found" })),
            )
            .mount(&server)
            .await;
        let client =
            ApiClient::with_timeout(&format!("{}/api", server.uri()), Duration::from_millis(500))
                .unwrap();

        let mut v = view(1, 0, None);
        let err = v.toggle(&client, 9, ReactionKind::Like).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 404, .. }));
        assert_eq!(v, view(1, 0, None));
    }

    #[tokio::test]
    async fn successful_request_confirms() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/reviews/dislike/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "likes": 3, "dislikes": 2 })),
            )
            .mount(&server)
            .await;
        let client =
            ApiClient::with_timeout(&format!("{}/api", server.uri()), Duration::from_millis(500))
                .unwrap();

        let mut v = view(4, 0, Some(ReactionKind::Like));
        v.toggle(&client, 9, ReactionKind::Dislike).await.unwrap();
        assert_eq!(v.counts, ReactionCounts { likes: 3, dislikes: 2 });
        assert_eq!(v.mine, Some(ReactionKind::Dislike));
    }
}
