//! The durable state store behind the review service.
//!
//! Two strategies implement the same [`StateStore`] contract and are selected
//! at construction time: Postgres for deployments, an in-memory fixture for
//! tests and local development. The review service is generic over the trait
//! and cannot tell them apart.
//!
//! Writes are guarded: the caller passes the `last_review` it observed when
//! it read the record, and the store refuses the write if the stored value
//! has moved since. Duplicate or racing submissions for the same (user, item)
//! pair therefore cannot silently overwrite each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use kotoba_srs::{SrsState, Stage};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{LearningItem, StateRow};

/// Errors surfaced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A guarded write lost the race: the stored record changed between the
    /// caller's read and its write.
    #[error("write conflict for user {user_id} on item {item_id}")]
    Conflict {
        /// Owning user
        user_id: Uuid,
        /// Contested item
        item_id: Uuid,
    },
    /// A stored row could not be decoded into a valid state record.
    #[error("corrupt state record: {0}")]
    Corrupt(String),
}

/// Durable per-(user, item) state, plus the queue queries built on it.
pub trait StateStore: Send + Sync {
    /// Load the state record for one (user, item) pair, if any.
    fn get_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> impl Future<Output = Result<Option<SrsState>, StoreError>> + Send;

    /// Persist a state record, guarded by the `last_review` observed at read
    /// time (`None` when no record existed). Returns
    /// [`StoreError::Conflict`] if the guard no longer matches.
    fn put_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        expected_last_review: Option<DateTime<Utc>>,
        state: &SrsState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Items due for review: `next_review <= now`, unburned, soonest first.
    fn list_due(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LearningItem>, StoreError>> + Send;

    /// Items at `level` the user has never encountered, in slug order,
    /// optionally narrowed to one item type.
    fn list_new(
        &self,
        user_id: Uuid,
        level: i32,
        item_type: Option<String>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LearningItem>, StoreError>> + Send;

    /// Bump the user's daily review counter.
    fn record_review(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Number of unburned records due at `now`, across all users. Feeds the
    /// backlog gauge.
    fn count_due(&self, now: DateTime<Utc>)
    -> impl Future<Output = Result<i64, StoreError>> + Send;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    /// Wrap a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl StateStore for PgStateStore {
    async fn get_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<SrsState>, StoreError> {
        let row: Option<StateRow> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT stage, srs_stage, stability, reps, lapses,
                       interval_minutes, last_review_at, next_review_at
                FROM user_item_state
                WHERE user_id = $1 AND item_id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StateRow::into_state).transpose()
    }

    async fn put_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        expected_last_review: Option<DateTime<Utc>>,
        state: &SrsState,
    ) -> Result<(), StoreError> {
        let row = StateRow::from_state(state);

        let result = match expected_last_review {
            // First write for this pair: the insert must not replace a row
            // that appeared concurrently.
            None => {
                sqlx::query(
                    // language=PostgreSQL
                    r#"
                        INSERT INTO user_item_state
                            (user_id, item_id, stage, srs_stage, stability, reps,
                             lapses, interval_minutes, last_review_at, next_review_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                        ON CONFLICT (user_id, item_id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(item_id)
                .bind(&row.stage)
                .bind(row.srs_stage)
                .bind(row.stability)
                .bind(row.reps)
                .bind(row.lapses)
                .bind(row.interval_minutes)
                .bind(row.last_review_at)
                .bind(row.next_review_at)
                .execute(&self.pool)
                .await?
            }
            // Update guarded by the last_review observed at read time.
            Some(expected) => {
                sqlx::query(
                    // language=PostgreSQL
                    r#"
                        UPDATE user_item_state
                        SET stage = $3, srs_stage = $4, stability = $5, reps = $6,
                            lapses = $7, interval_minutes = $8, last_review_at = $9,
                            next_review_at = $10, updated_at = NOW()
                        WHERE user_id = $1 AND item_id = $2 AND last_review_at = $11
                    "#,
                )
                .bind(user_id)
                .bind(item_id)
                .bind(&row.stage)
                .bind(row.srs_stage)
                .bind(row.stability)
                .bind(row.reps)
                .bind(row.lapses)
                .bind(row.interval_minutes)
                .bind(row.last_review_at)
                .bind(row.next_review_at)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { user_id, item_id });
        }
        Ok(())
    }

    async fn list_due(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        let items = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT i.id, i.item_type, i.level, i.slug, i.meaning, i.reading
                FROM user_item_state s
                JOIN learning_items i ON i.id = s.item_id
                WHERE s.user_id = $1
                  AND s.next_review_at IS NOT NULL
                  AND s.next_review_at <= $2
                  AND s.stage <> 'burned'
                ORDER BY s.next_review_at
                LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn list_new(
        &self,
        user_id: Uuid,
        level: i32,
        item_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        let items = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT i.id, i.item_type, i.level, i.slug, i.meaning, i.reading
                FROM learning_items i
                LEFT JOIN user_item_state s
                    ON s.item_id = i.id AND s.user_id = $1
                WHERE s.item_id IS NULL
                  AND i.level = $2
                  AND ($3::TEXT IS NULL OR i.item_type = $3)
                ORDER BY i.slug
                LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(level)
        .bind(item_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn record_review(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO user_activity (user_id, activity_date, reviews_count)
                VALUES ($1, $2, 1)
                ON CONFLICT (user_id, activity_date)
                DO UPDATE SET reviews_count = user_activity.reviews_count + 1
            "#,
        )
        .bind(user_id)
        .bind(now.date_naive())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                SELECT COUNT(*)
                FROM user_item_state
                WHERE next_review_at IS NOT NULL
                  AND next_review_at <= $1
                  AND stage <> 'burned'
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: Vec<LearningItem>,
    states: HashMap<(Uuid, Uuid), SrsState>,
    activity: HashMap<(Uuid, NaiveDate), u32>,
}

/// In-memory fixture store with the same semantics as the Postgres strategy,
/// including the guarded-write check. Used by tests and by local development
/// without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStateStore {
    /// An empty fixture store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the item catalog.
    pub async fn insert_items(&self, items: impl IntoIterator<Item = LearningItem>) {
        self.inner.write().await.items.extend(items);
    }

    /// The daily review count recorded for a user, for assertions in tests.
    pub async fn reviews_on(&self, user_id: Uuid, date: NaiveDate) -> u32 {
        self.inner
            .read()
            .await
            .activity
            .get(&(user_id, date))
            .copied()
            .unwrap_or(0)
    }
}

impl StateStore for MemoryStateStore {
    async fn get_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<SrsState>, StoreError> {
        Ok(self.inner.read().await.states.get(&(user_id, item_id)).cloned())
    }

    async fn put_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        expected_last_review: Option<DateTime<Utc>>,
        state: &SrsState,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (user_id, item_id);

        let guard_matches = match (inner.states.get(&key), expected_last_review) {
            (None, None) => true,
            (Some(existing), Some(expected)) => existing.last_review == Some(expected),
            _ => false,
        };
        if !guard_matches {
            return Err(StoreError::Conflict { user_id, item_id });
        }

        inner.states.insert(key, state.clone());
        Ok(())
    }

    async fn list_due(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        let inner = self.inner.read().await;

        let mut due: Vec<(DateTime<Utc>, LearningItem)> = inner
            .items
            .iter()
            .filter_map(|item| {
                let state = inner.states.get(&(user_id, item.id))?;
                let next_review = state.next_review?;
                (state.stage != Stage::Burned && next_review <= now)
                    .then(|| (next_review, item.clone()))
            })
            .collect();

        due.sort_by_key(|(next_review, _)| *next_review);
        due.truncate(limit.max(0) as usize);
        Ok(due.into_iter().map(|(_, item)| item).collect())
    }

    async fn list_new(
        &self,
        user_id: Uuid,
        level: i32,
        item_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        let inner = self.inner.read().await;

        let mut fresh: Vec<LearningItem> = inner
            .items
            .iter()
            .filter(|item| {
                item.level == level
                    && item_type.as_ref().is_none_or(|t| *t == item.item_type)
                    && !inner.states.contains_key(&(user_id, item.id))
            })
            .cloned()
            .collect();

        fresh.sort_by(|a, b| a.slug.cmp(&b.slug));
        fresh.truncate(limit.max(0) as usize);
        Ok(fresh)
    }

    async fn record_review(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        *inner
            .activity
            .entry((user_id, now.date_naive()))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        let count = inner
            .states
            .values()
            .filter(|state| {
                state.stage != Stage::Burned
                    && state.next_review.is_some_and(|next| next <= now)
            })
            .count();
        Ok(count as i64)
    }
}

/// The strategy actually wired into the service, selected from configuration
/// at startup.
#[derive(Debug, Clone)]
pub enum Store {
    /// Postgres deployment strategy.
    Postgres(PgStateStore),
    /// In-memory fixture strategy.
    Memory(MemoryStateStore),
}

impl StateStore for Store {
    async fn get_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<SrsState>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_state(user_id, item_id).await,
            Self::Memory(store) => store.get_state(user_id, item_id).await,
        }
    }

    async fn put_state(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        expected_last_review: Option<DateTime<Utc>>,
        state: &SrsState,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => {
                store
                    .put_state(user_id, item_id, expected_last_review, state)
                    .await
            }
            Self::Memory(store) => {
                store
                    .put_state(user_id, item_id, expected_last_review, state)
                    .await
            }
        }
    }

    async fn list_due(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        match self {
            Self::Postgres(store) => store.list_due(user_id, now, limit).await,
            Self::Memory(store) => store.list_due(user_id, now, limit).await,
        }
    }

    async fn list_new(
        &self,
        user_id: Uuid,
        level: i32,
        item_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<LearningItem>, StoreError> {
        match self {
            Self::Postgres(store) => store.list_new(user_id, level, item_type, limit).await,
            Self::Memory(store) => store.list_new(user_id, level, item_type, limit).await,
        }
    }

    async fn record_review(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.record_review(user_id, now).await,
            Self::Memory(store) => store.record_review(user_id, now).await,
        }
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        match self {
            Self::Postgres(store) => store.count_due(now).await,
            Self::Memory(store) => store.count_due(now).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(level: i32, slug: &str) -> LearningItem {
        LearningItem {
            id: Uuid::new_v4(),
            item_type: "kanji".to_string(),
            level,
            slug: slug.to_string(),
            meaning: slug.to_string(),
            reading: None,
        }
    }

    fn scheduled_state(next_review: DateTime<Utc>) -> SrsState {
        SrsState {
            stage: Stage::Review,
            streak: 4,
            reps: 4,
            interval_minutes: 60,
            last_review: Some(next_review - Duration::minutes(60)),
            next_review: Some(next_review),
            ..SrsState::default()
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_persisted_state_reads_back_unchanged() {
        let store = MemoryStateStore::new();
        let (user_id, item_id) = (Uuid::new_v4(), Uuid::new_v4());
        let state = scheduled_state(at());

        store.put_state(user_id, item_id, None, &state).await.unwrap();
        let loaded = store.get_state(user_id, item_id).await.unwrap();

        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn test_stale_guard_is_rejected() {
        let store = MemoryStateStore::new();
        let (user_id, item_id) = (Uuid::new_v4(), Uuid::new_v4());
        let state = scheduled_state(at());

        store.put_state(user_id, item_id, None, &state).await.unwrap();

        // A second writer that read nothing must conflict...
        let err = store
            .put_state(user_id, item_id, None, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // ...and so must one holding an outdated last_review.
        let stale = at() - Duration::minutes(5);
        let err = store
            .put_state(user_id, item_id, Some(stale), &state)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // The guard read at the current value succeeds.
        store
            .put_state(user_id, item_id, state.last_review, &state)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_due_filters_and_orders() {
        let store = MemoryStateStore::new();
        let user_id = Uuid::new_v4();
        let (early, late, future, burned) = (
            item(1, "one"),
            item(1, "two"),
            item(1, "three"),
            item(1, "four"),
        );
        store
            .insert_items([early.clone(), late.clone(), future.clone(), burned.clone()])
            .await;

        let now = at();
        store
            .put_state(user_id, early.id, None, &scheduled_state(now - Duration::hours(2)))
            .await
            .unwrap();
        store
            .put_state(user_id, late.id, None, &scheduled_state(now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .put_state(user_id, future.id, None, &scheduled_state(now + Duration::hours(1)))
            .await
            .unwrap();
        let mut burned_state = scheduled_state(now - Duration::hours(3));
        burned_state.stage = Stage::Burned;
        store
            .put_state(user_id, burned.id, None, &burned_state)
            .await
            .unwrap();

        let due = store.list_due(user_id, now, 10).await.unwrap();
        let slugs: Vec<&str> = due.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["one", "two"]);

        assert_eq!(store.count_due(now).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_new_excludes_seen_items() {
        let store = MemoryStateStore::new();
        let user_id = Uuid::new_v4();
        let (seen, unseen, other_level) = (item(2, "b-seen"), item(2, "a-unseen"), item(3, "c"));
        store
            .insert_items([seen.clone(), unseen.clone(), other_level.clone()])
            .await;
        store
            .put_state(user_id, seen.id, None, &scheduled_state(at()))
            .await
            .unwrap();

        let fresh = store.list_new(user_id, 2, None, 10).await.unwrap();
        let slugs: Vec<&str> = fresh.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a-unseen"]);

        let vocab_only = store
            .list_new(user_id, 2, Some("vocabulary".to_string()), 10)
            .await
            .unwrap();
        assert!(vocab_only.is_empty());
    }

    #[tokio::test]
    async fn test_record_review_accumulates_daily_counter() {
        let store = MemoryStateStore::new();
        let user_id = Uuid::new_v4();

        store.record_review(user_id, at()).await.unwrap();
        store.record_review(user_id, at()).await.unwrap();

        assert_eq!(store.reviews_on(user_id, at().date_naive()).await, 2);
    }
}
