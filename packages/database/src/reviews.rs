//! Review storage, reaction toggles and the nearby query.
//!
//! Reaction toggles read the review's reaction document, apply the
//! [`Reactions::toggle`] transition in memory and write both sets and both
//! counters back with a single `UPDATE ... WHERE version = $old`. A writer
//! that loses the race re-reads and tries again, so concurrent toggles from
//! different users are never lost and no reader sees counters that disagree
//! with the sets.

use chrono::Utc;
use moosicbox_json_utils::database::ToValue as _;
use safe_route_database_models::{
    NearbyQuery, NearbyReview, NewReview, Rating, ReactionCounts, ReactionKind, Reactions, Review,
    ReviewUpdate,
};
use safe_route_geo::{BoundingBox, GeoPoint};
use switchy_database::{Database, DatabaseValue};

use crate::{
    DbError, format_timestamp, parse_timestamp, read_f64, read_i64, read_string, returning_id,
    users,
};

/// Upper bound on compare-and-swap attempts for a single toggle.
const MAX_TOGGLE_ATTEMPTS: usize = 64;

const REVIEW_COLUMNS: &str = "r.id, r.user_id, u.name AS author_name, r.route_name, r.content,
    r.rating, r.longitude, r.latitude, r.likes, r.dislikes, r.liked_by, r.disliked_by,
    r.version, r.created_at";

/// A review together with the version its reaction document was read at.
struct StoredReview {
    review: Review,
    version: i64,
}

fn row_to_review(row: &switchy_database::Row) -> Result<StoredReview, DbError> {
    let id = read_i64(row, "id")?;

    let rating = Rating::from_i64(read_i64(row, "rating")?).map_err(|e| DbError::Conversion {
        message: format!("review {id}: {e}"),
    })?;

    let location = GeoPoint::new(read_f64(row, "latitude")?, read_f64(row, "longitude")?)
        .map_err(|e| DbError::Conversion {
            message: format!("review {id}: {e}"),
        })?;

    let liked_by: Vec<i64> = serde_json::from_str(&read_string(row, "liked_by")?)?;
    let disliked_by: Vec<i64> = serde_json::from_str(&read_string(row, "disliked_by")?)?;
    let reactions =
        Reactions::from_sets(liked_by, disliked_by).map_err(|e| DbError::Conversion {
            message: format!("review {id}: {e}"),
        })?;

    let stored_counts = (read_i64(row, "likes")?, read_i64(row, "dislikes")?);
    let counts = reactions.counts();
    if stored_counts != (i64::from(counts.likes), i64::from(counts.dislikes)) {
        log::warn!(
            "Review {id} has counters {stored_counts:?} but sets of size ({}, {})",
            counts.likes,
            counts.dislikes
        );
    }

    Ok(StoredReview {
        review: Review {
            id,
            user_id: read_i64(row, "user_id")?,
            author_name: row.to_value("author_name").unwrap_or(None),
            route_name: read_string(row, "route_name")?,
            content: read_string(row, "content")?,
            rating,
            location,
            reactions,
            created_at: parse_timestamp(&read_string(row, "created_at")?)?,
        },
        version: read_i64(row, "version")?,
    })
}

async fn load_review(db: &dyn Database, id: i64) -> Result<Option<StoredReview>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {REVIEW_COLUMNS}
                 FROM reviews r
                 LEFT JOIN users u ON u.id = r.user_id
                 WHERE r.id = $1"
            ),
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    rows.first().map(row_to_review).transpose()
}

/// Loads the review owned by `caller`, failing if it is missing or owned by
/// someone else.
async fn load_owned(db: &dyn Database, id: i64, caller: i64) -> Result<Review, DbError> {
    let review = load_review(db, id)
        .await?
        .ok_or(DbError::NotFound {
            entity: "review",
            id,
        })?
        .review;

    if !review.is_owned_by(caller) {
        log::warn!("User {caller} tried to modify review {id} owned by {}", review.user_id);
        return Err(DbError::NotOwner {
            review_id: id,
            user_id: caller,
        });
    }

    Ok(review)
}

fn counter_value(count: u32) -> DatabaseValue {
    DatabaseValue::Int64(i64::from(count))
}

fn id_list(ids: &std::collections::BTreeSet<i64>) -> Result<DatabaseValue, DbError> {
    Ok(DatabaseValue::String(serde_json::to_string(ids)?))
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// Creates a review with zero counters and empty reaction sets.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if a text field is blank or the owner
/// does not exist, or [`DbError::Database`] if the insert fails.
pub async fn create_review(db: &dyn Database, new_review: &NewReview) -> Result<Review, DbError> {
    new_review.validate()?;

    if !users::user_exists(db, new_review.user_id).await? {
        return Err(DbError::Validation(format!(
            "userId {} does not exist",
            new_review.user_id
        )));
    }

    let [longitude, latitude] = new_review.location.to_lng_lat();

    let rows = db
        .query_raw_params(
            "INSERT INTO reviews (user_id, route_name, content, rating, longitude, latitude,
                                  likes, dislikes, liked_by, disliked_by, version, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, 0, 0, '[]', '[]', 0, $7)
             RETURNING id",
            &[
                DatabaseValue::Int64(new_review.user_id),
                DatabaseValue::String(new_review.route_name.trim().to_string()),
                DatabaseValue::String(new_review.content.trim().to_string()),
                DatabaseValue::Int32(i32::from(new_review.rating.value())),
                DatabaseValue::Real64(longitude),
                DatabaseValue::Real64(latitude),
                DatabaseValue::String(format_timestamp(Utc::now())),
            ],
        )
        .await?;

    let id = returning_id(&rows)?;
    log::info!("User {} created review {id}", new_review.user_id);

    get_review(db, id).await?.ok_or(DbError::NotFound {
        entity: "review",
        id,
    })
}

/// Loads a single review.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is malformed.
pub async fn get_review(db: &dyn Database, id: i64) -> Result<Option<Review>, DbError> {
    Ok(load_review(db, id).await?.map(|stored| stored.review))
}

/// Lists every review, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is malformed.
pub async fn list_reviews(db: &dyn Database) -> Result<Vec<Review>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {REVIEW_COLUMNS}
                 FROM reviews r
                 LEFT JOIN users u ON u.id = r.user_id
                 ORDER BY r.created_at DESC, r.id DESC"
            ),
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| row_to_review(row).map(|stored| stored.review))
        .collect()
}

/// Updates the label, content and/or rating of a review owned by `caller`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown review,
/// [`DbError::NotOwner`] if `caller` is not the owner (the review is left
/// unchanged), or [`DbError::Validation`] for blank fields.
pub async fn update_review(
    db: &dyn Database,
    id: i64,
    caller: i64,
    update: &ReviewUpdate,
) -> Result<Review, DbError> {
    update.validate()?;
    load_owned(db, id, caller).await?;

    db.exec_raw_params(
        "UPDATE reviews
         SET route_name = COALESCE($1, route_name),
             content = COALESCE($2, content),
             rating = COALESCE($3, rating)
         WHERE id = $4 AND user_id = $5",
        &[
            update
                .route_name
                .as_deref()
                .map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.trim().to_string())),
            update
                .content
                .as_deref()
                .map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.trim().to_string())),
            update.rating.map_or(DatabaseValue::Null, |r| {
                DatabaseValue::Int32(i32::from(r.value()))
            }),
            DatabaseValue::Int64(id),
            DatabaseValue::Int64(caller),
        ],
    )
    .await?;

    log::info!("User {caller} updated review {id}");

    get_review(db, id).await?.ok_or(DbError::NotFound {
        entity: "review",
        id,
    })
}

/// Deletes a review owned by `caller` along with its index entry.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown review or
/// [`DbError::NotOwner`] if `caller` is not the owner.
pub async fn delete_review(db: &dyn Database, id: i64, caller: i64) -> Result<(), DbError> {
    load_owned(db, id, caller).await?;

    let deleted = db
        .exec_raw_params(
            "DELETE FROM reviews WHERE id = $1 AND user_id = $2",
            &[DatabaseValue::Int64(id), DatabaseValue::Int64(caller)],
        )
        .await?;

    if deleted == 0 {
        return Err(DbError::NotFound {
            entity: "review",
            id,
        });
    }

    log::info!("User {caller} deleted review {id}");

    Ok(())
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// Toggles a like by `user_id` on review `id`.
///
/// # Errors
///
/// See [`toggle_reaction`].
pub async fn toggle_like(
    db: &dyn Database,
    id: i64,
    user_id: i64,
) -> Result<ReactionCounts, DbError> {
    toggle_reaction(db, id, user_id, ReactionKind::Like).await
}

/// Toggles a dislike by `user_id` on review `id`.
///
/// # Errors
///
/// See [`toggle_reaction`].
pub async fn toggle_dislike(
    db: &dyn Database,
    id: i64,
    user_id: i64,
) -> Result<ReactionCounts, DbError> {
    toggle_reaction(db, id, user_id, ReactionKind::Dislike).await
}

/// Applies one reaction toggle atomically and returns the resulting counts.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an unknown user,
/// [`DbError::NotFound`] for an unknown review, or [`DbError::Conflict`] if
/// the update kept losing to concurrent writers.
pub async fn toggle_reaction(
    db: &dyn Database,
    id: i64,
    user_id: i64,
    kind: ReactionKind,
) -> Result<ReactionCounts, DbError> {
    if !users::user_exists(db, user_id).await? {
        return Err(DbError::Validation(format!(
            "userId {user_id} does not exist"
        )));
    }

    for attempt in 1..=MAX_TOGGLE_ATTEMPTS {
        let StoredReview {
            review: Review { mut reactions, .. },
            version,
        } = load_review(db, id).await?.ok_or(DbError::NotFound {
            entity: "review",
            id,
        })?;

        let counts = reactions.toggle(kind, user_id);

        let updated = db
            .exec_raw_params(
                "UPDATE reviews
                 SET liked_by = $1,
                     disliked_by = $2,
                     likes = $3,
                     dislikes = $4,
                     version = version + 1
                 WHERE id = $5 AND version = $6",
                &[
                    id_list(reactions.liked_by())?,
                    id_list(reactions.disliked_by())?,
                    counter_value(counts.likes),
                    counter_value(counts.dislikes),
                    DatabaseValue::Int64(id),
                    DatabaseValue::Int64(version),
                ],
            )
            .await?;

        if updated > 0 {
            log::debug!("User {user_id} toggled {kind} on review {id}: {counts:?}");
            return Ok(counts);
        }

        log::debug!("Reaction update on review {id} raced (attempt {attempt}), retrying");
    }

    Err(DbError::Conflict(format!(
        "review {id} changed concurrently {MAX_TOGGLE_ATTEMPTS} times"
    )))
}

// ---------------------------------------------------------------------------
// Nearby query
// ---------------------------------------------------------------------------

/// Finds reviews within `query.max_distance_m` metres of `query.center`,
/// nearest first.
///
/// Candidates come from the R-tree using a box around the radius and are
/// then filtered by exact great-circle distance, so a review exactly on the
/// radius is included.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is malformed.
pub async fn find_near(
    db: &dyn Database,
    query: &NearbyQuery,
) -> Result<Vec<NearbyReview>, DbError> {
    let bbox = BoundingBox::around(query.center, query.max_distance_m);

    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {REVIEW_COLUMNS}
                 FROM reviews_rtree idx
                 JOIN reviews r ON r.id = idx.id
                 LEFT JOIN users u ON u.id = r.user_id
                 WHERE idx.max_lng >= $1 AND idx.min_lng <= $2
                   AND idx.max_lat >= $3 AND idx.min_lat <= $4"
            ),
            &[
                DatabaseValue::Real64(bbox.west),
                DatabaseValue::Real64(bbox.east),
                DatabaseValue::Real64(bbox.south),
                DatabaseValue::Real64(bbox.north),
            ],
        )
        .await?;

    let candidates = rows.len();
    let mut results = Vec::with_capacity(candidates);
    for row in &rows {
        let review = row_to_review(row)?.review;
        let distance_meters = query.center.distance_meters(review.location);
        if distance_meters <= query.max_distance_m {
            results.push(NearbyReview {
                review,
                distance_meters,
            });
        }
    }

    results.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.review.id.cmp(&b.review.id))
    });

    log::debug!(
        "Nearby query at {} within {}m: {candidates} candidates, {} results",
        query.center,
        query.max_distance_m,
        results.len()
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use safe_route_database_models::MAX_NEARBY_DISTANCE_M;

    use super::*;
    use crate::test_support::temp_db;
    use crate::users::tests::register;

    fn new_review(user_id: i64, location: GeoPoint) -> NewReview {
        NewReview {
            user_id,
            route_name: "5th Ave".to_string(),
            content: "Busy and well lit".to_string(),
            rating: Rating::new(5).unwrap(),
            location,
        }
    }

    fn times_square() -> GeoPoint {
        GeoPoint::new(40.758, -73.9855).unwrap()
    }

    #[tokio::test]
    async fn new_review_has_no_reactions() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;

        let review = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        assert_eq!(review.counts(), ReactionCounts::default());
        assert!(review.reactions.liked_by().is_empty());
        assert!(review.reactions.disliked_by().is_empty());
        assert_eq!(review.author_name.as_deref(), Some("Ada"));
        assert_eq!(review.location, times_square());

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_and_unknown_owner() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;

        let mut blank = new_review(ada.id, times_square());
        blank.content = "   ".to_string();
        assert!(matches!(
            create_review(db.as_ref(), &blank).await,
            Err(DbError::Validation(_))
        ));

        assert!(matches!(
            create_review(db.as_ref(), &new_review(ada.id + 100, times_square())).await,
            Err(DbError::Validation(_))
        ));

        assert!(list_reviews(db.as_ref()).await.unwrap().is_empty());

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_location() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;

        let far_north = new_review(
            ada.id,
            GeoPoint {
                latitude: 999.0,
                longitude: 0.0,
            },
        );
        assert!(matches!(
            create_review(db.as_ref(), &far_north).await,
            Err(DbError::Validation(ref message)) if message.contains("location")
        ));

        create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();
        assert_eq!(list_reviews(db.as_ref()).await.unwrap().len(), 1);

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;

        let first = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();
        let second = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        let ids: Vec<i64> = list_reviews(db.as_ref())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn toggles_follow_the_reaction_rules() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;
        let bob = register(db.as_ref(), "Bob").await;
        let review = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        let counts = toggle_like(db.as_ref(), review.id, bob.id).await.unwrap();
        assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 0 });

        let counts = toggle_dislike(db.as_ref(), review.id, bob.id).await.unwrap();
        assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 1 });

        let counts = toggle_dislike(db.as_ref(), review.id, bob.id).await.unwrap();
        assert_eq!(counts, ReactionCounts::default());

        let stored = get_review(db.as_ref(), review.id).await.unwrap().unwrap();
        assert_eq!(stored.reactions, Reactions::default());

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn toggle_on_missing_review_or_user_fails() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;
        let review = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        assert!(matches!(
            toggle_like(db.as_ref(), review.id + 1, ada.id).await,
            Err(DbError::NotFound { entity: "review", .. })
        ));
        assert!(matches!(
            toggle_like(db.as_ref(), review.id, ada.id + 50).await,
            Err(DbError::Validation(_))
        ));

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn concurrent_likes_from_distinct_users_are_all_counted() {
        const USERS: usize = 16;

        let (db, path) = temp_db().await;
        let owner = register(db.as_ref(), "Owner").await;
        let review = create_review(db.as_ref(), &new_review(owner.id, times_square()))
            .await
            .unwrap();

        let mut likers = Vec::with_capacity(USERS);
        for i in 0..USERS {
            likers.push(register(db.as_ref(), &format!("User{i}")).await.id);
        }

        let results = join_all(
            likers
                .iter()
                .map(|&user_id| toggle_like(db.as_ref(), review.id, user_id)),
        )
        .await;
        assert!(results.iter().all(Result::is_ok));

        let stored = get_review(db.as_ref(), review.id).await.unwrap().unwrap();
        assert_eq!(stored.counts().likes as usize, USERS);
        assert_eq!(stored.reactions.liked_by().len(), USERS);

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn non_owner_cannot_update_or_delete() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;
        let bob = register(db.as_ref(), "Bob").await;
        let review = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        let update = ReviewUpdate {
            content: Some("Hijacked".to_string()),
            ..ReviewUpdate::default()
        };
        assert!(matches!(
            update_review(db.as_ref(), review.id, bob.id, &update).await,
            Err(DbError::NotOwner { .. })
        ));
        assert!(matches!(
            delete_review(db.as_ref(), review.id, bob.id).await,
            Err(DbError::NotOwner { .. })
        ));

        let unchanged = get_review(db.as_ref(), review.id).await.unwrap().unwrap();
        assert_eq!(unchanged, review);

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn owner_can_update_and_delete() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;
        let review = create_review(db.as_ref(), &new_review(ada.id, times_square()))
            .await
            .unwrap();

        let updated = update_review(
            db.as_ref(),
            review.id,
            ada.id,
            &ReviewUpdate {
                rating: Some(Rating::new(2).unwrap()),
                ..ReviewUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.rating.value(), 2);
        assert_eq!(updated.content, review.content);

        delete_review(db.as_ref(), review.id, ada.id).await.unwrap();
        assert!(get_review(db.as_ref(), review.id).await.unwrap().is_none());
        assert!(matches!(
            delete_review(db.as_ref(), review.id, ada.id).await,
            Err(DbError::NotFound { .. })
        ));

        let query = NearbyQuery::new(times_square(), Some(100.0), MAX_NEARBY_DISTANCE_M).unwrap();
        assert!(find_near(db.as_ref(), &query).await.unwrap().is_empty());

        drop(db);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn nearby_respects_radius_boundary_and_orders_by_distance() {
        let (db, path) = temp_db().await;
        let ada = register(db.as_ref(), "Ada").await;
        let center = times_square();
        let radius = 5_000.0;

        let inside = create_review(db.as_ref(), &new_review(ada.id, center.offset_north(radius - 1.0)))
            .await
            .unwrap();
        let outside =
            create_review(db.as_ref(), &new_review(ada.id, center.offset_north(radius + 1.0)))
                .await
                .unwrap();
        let close = create_review(db.as_ref(), &new_review(ada.id, center.offset_north(-250.0)))
            .await
            .unwrap();

        let query = NearbyQuery::new(center, Some(radius), MAX_NEARBY_DISTANCE_M).unwrap();
        let results = find_near(db.as_ref(), &query).await.unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.review.id).collect();
        assert_eq!(ids, vec![close.id, inside.id]);
        assert!(!ids.contains(&outside.id));
        assert!(results.windows(2).all(|w| w[0].distance_meters <= w[1].distance_meters));
        assert!((results[0].distance_meters - 250.0).abs() < 0.5);

        drop(db);
        let _ = std::fs::remove_file(path);
    }
}
