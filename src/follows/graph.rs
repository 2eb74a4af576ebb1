//! Follow edges and the denormalized `followers_count` / `following_count`
//! columns they drive.
//!
//! Every mutation changes the edge set and both counters in one unit: either
//! all of it is visible afterwards or none of it is.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::users::repo::is_foreign_key_violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct FollowCounts {
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

/// What a purge removed that lives outside the database.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgedUser {
    /// Profile image and the files of every project the user owned.
    pub file_keys: Vec<String>,
}

#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Creates the edge `follower -> followed` if absent, bumping both counters.
    /// `None` when either user no longer exists.
    async fn follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<Option<FollowOutcome>>;

    /// Removes the edge if present; counters are decremented but never below zero.
    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<UnfollowOutcome>;

    /// `None` when the user does not exist.
    async fn counts(&self, user: Uuid) -> anyhow::Result<Option<FollowCounts>>;

    /// `false` for missing and deactivated users alike.
    async fn is_active(&self, user: Uuid) -> anyhow::Result<bool>;

    /// Deletes the user with every incident edge, settling the counters of
    /// the users on the other end. `None` when the user did not exist.
    async fn purge_user(&self, user: Uuid) -> anyhow::Result<Option<PurgedUser>>;
}

#[derive(Clone)]
pub struct PgFollowGraph {
    db: PgPool,
}

impl PgFollowGraph {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Clone, Copy)]
enum Counter {
    Followers,
    Following,
}

#[derive(Clone, Copy)]
enum Step {
    Increment,
    Decrement,
}

fn counter_sql(counter: Counter, step: Step) -> &'static str {
    match (counter, step) {
        (Counter::Followers, Step::Increment) => {
            "UPDATE users SET followers_count = followers_count + 1 WHERE id = $1"
        }
        (Counter::Following, Step::Increment) => {
            "UPDATE users SET following_count = following_count + 1 WHERE id = $1"
        }
        (Counter::Followers, Step::Decrement) => {
            "UPDATE users SET followers_count = GREATEST(followers_count - 1, 0) WHERE id = $1"
        }
        (Counter::Following, Step::Decrement) => {
            "UPDATE users SET following_count = GREATEST(following_count - 1, 0) WHERE id = $1"
        }
    }
}

/// Applies both counter updates, touching rows in id order so that two
/// transactions on the same pair cannot deadlock.
async fn adjust_counters(
    tx: &mut Transaction<'_, Postgres>,
    follower: Uuid,
    followed: Uuid,
    step: Step,
) -> anyhow::Result<()> {
    let mut updates = [(follower, Counter::Following), (followed, Counter::Followers)];
    updates.sort_by_key(|(id, _)| *id);

    for (user, counter) in updates {
        let affected = sqlx::query(counter_sql(counter, step))
            .bind(user)
            .execute(&mut **tx)
            .await
            .context("update follow counter")?
            .rows_affected();
        anyhow::ensure!(affected == 1, "user {user} disappeared during follow update");
    }
    Ok(())
}

#[async_trait]
impl FollowGraph for PgFollowGraph {
    async fn follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<Option<FollowOutcome>> {
        let mut tx = self.db.begin().await.context("begin follow tx")?;

        // the FK checks take KEY SHARE locks on both users, which a purge waits for
        let inserted = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followed_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(followed)
        .execute(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(done) => done.rows_affected(),
            Err(e) if is_foreign_key_violation(&e) => {
                tx.rollback().await.context("rollback follow tx")?;
                return Ok(None);
            }
            Err(e) => return Err(e).context("insert follow edge"),
        };

        if inserted == 0 {
            tx.rollback().await.context("rollback follow tx")?;
            return Ok(Some(FollowOutcome::AlreadyFollowing));
        }

        adjust_counters(&mut tx, follower, followed, Step::Increment).await?;
        tx.commit().await.context("commit follow tx")?;
        Ok(Some(FollowOutcome::Created))
    }

    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<UnfollowOutcome> {
        let mut tx = self.db.begin().await.context("begin unfollow tx")?;

        let removed = sqlx::query(
            r#"DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2"#,
        )
        .bind(follower)
        .bind(followed)
        .execute(&mut *tx)
        .await
        .context("delete follow edge")?
        .rows_affected();

        if removed == 0 {
            tx.rollback().await.context("rollback unfollow tx")?;
            return Ok(UnfollowOutcome::NotFollowing);
        }

        adjust_counters(&mut tx, follower, followed, Step::Decrement).await?;
        tx.commit().await.context("commit unfollow tx")?;
        Ok(UnfollowOutcome::Removed)
    }

    async fn counts(&self, user: Uuid) -> anyhow::Result<Option<FollowCounts>> {
        let counts = sqlx::query_as::<_, FollowCounts>(
            r#"SELECT followers_count, following_count FROM users WHERE id = $1"#,
        )
        .bind(user)
        .fetch_optional(&self.db)
        .await
        .context("read follow counts")?;
        Ok(counts)
    }

    async fn is_active(&self, user: Uuid) -> anyhow::Result<bool> {
        let active = sqlx::query_scalar::<_, bool>(r#"SELECT is_active FROM users WHERE id = $1"#)
            .bind(user)
            .fetch_optional(&self.db)
            .await
            .context("read user active flag")?;
        Ok(active.unwrap_or(false))
    }

    async fn purge_user(&self, user: Uuid) -> anyhow::Result<Option<PurgedUser>> {
        let mut tx = self.db.begin().await.context("begin purge tx")?;

        // Locking the row first makes concurrent follows (FK KEY SHARE) and
        // counter updates on this user either finish before the settlement
        // below reads the edges, or fail afterwards on the missing row.
        let locked = sqlx::query_scalar::<_, Option<String>>(
            r#"SELECT profile_image FROM users WHERE id = $1 FOR UPDATE"#,
        )
        .bind(user)
        .fetch_optional(&mut *tx)
        .await
        .context("lock user for purge")?;
        let Some(profile_image) = locked else {
            tx.rollback().await.context("rollback purge tx")?;
            return Ok(None);
        };

        // project inserts also take KEY SHARE on the owner, so this list is final
        let project_files = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
            r#"SELECT cover_image, product_image, document FROM projects WHERE user_id = $1"#,
        )
        .bind(user)
        .fetch_all(&mut *tx)
        .await
        .context("collect project files on purge")?;

        // users followed by the departing user lose a follower
        sqlx::query(
            r#"
            UPDATE users u
               SET followers_count = GREATEST(u.followers_count - 1, 0)
              FROM follows f
             WHERE f.follower_id = $1 AND f.followed_id = u.id
            "#,
        )
        .bind(user)
        .execute(&mut *tx)
        .await
        .context("settle followers_count on purge")?;

        // users following the departing user follow one fewer
        sqlx::query(
            r#"
            UPDATE users u
               SET following_count = GREATEST(u.following_count - 1, 0)
              FROM follows f
             WHERE f.followed_id = $1 AND f.follower_id = u.id
            "#,
        )
        .bind(user)
        .execute(&mut *tx)
        .await
        .context("settle following_count on purge")?;

        // edges and projects go with the row via ON DELETE CASCADE
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(user)
            .execute(&mut *tx)
            .await
            .context("delete user")?;

        tx.commit().await.context("commit purge tx")?;

        let mut file_keys: Vec<String> = profile_image.into_iter().collect();
        file_keys.extend(
            project_files
                .into_iter()
                .flat_map(|(cover, product, document)| {
                    std::iter::once(cover).chain(product).chain(document)
                }),
        );
        Ok(Some(PurgedUser { file_keys }))
    }
}

#[cfg(test)]
pub use memory::MemoryFollowGraph;

#[cfg(test)]
mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Graph {
        users: HashMap<Uuid, FollowCounts>,
        inactive: HashSet<Uuid>,
        edges: HashSet<(Uuid, Uuid)>,
    }

    /// Single-lock graph; every operation is atomic with respect to the others.
    #[derive(Default)]
    pub struct MemoryFollowGraph {
        graph: Mutex<Graph>,
    }

    impl MemoryFollowGraph {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_user(&self) -> Uuid {
            let id = Uuid::new_v4();
            self.graph.lock().unwrap().users.insert(
                id,
                FollowCounts {
                    followers_count: 0,
                    following_count: 0,
                },
            );
            id
        }

        pub fn has_edge(&self, follower: Uuid, followed: Uuid) -> bool {
            self.graph.lock().unwrap().edges.contains(&(follower, followed))
        }

        pub fn edges_touching(&self, user: Uuid) -> usize {
            self.graph
                .lock()
                .unwrap()
                .edges
                .iter()
                .filter(|(a, b)| *a == user || *b == user)
                .count()
        }

        pub fn deactivate(&self, user: Uuid) {
            self.graph.lock().unwrap().inactive.insert(user);
        }

        /// Simulates drift between stored counters and the edge set.
        pub fn force_counts(&self, user: Uuid, counts: FollowCounts) {
            self.graph.lock().unwrap().users.insert(user, counts);
        }
    }

    #[async_trait]
    impl FollowGraph for MemoryFollowGraph {
        async fn follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<Option<FollowOutcome>> {
            let mut g = self.graph.lock().unwrap();
            if !g.users.contains_key(&follower) || !g.users.contains_key(&followed) {
                return Ok(None);
            }
            if !g.edges.insert((follower, followed)) {
                return Ok(Some(FollowOutcome::AlreadyFollowing));
            }
            if let Some(c) = g.users.get_mut(&follower) {
                c.following_count += 1;
            }
            if let Some(c) = g.users.get_mut(&followed) {
                c.followers_count += 1;
            }
            Ok(Some(FollowOutcome::Created))
        }

        async fn unfollow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<UnfollowOutcome> {
            let mut g = self.graph.lock().unwrap();
            if !g.edges.remove(&(follower, followed)) {
                return Ok(UnfollowOutcome::NotFollowing);
            }
            if let Some(c) = g.users.get_mut(&follower) {
                c.following_count = (c.following_count - 1).max(0);
            }
            if let Some(c) = g.users.get_mut(&followed) {
                c.followers_count = (c.followers_count - 1).max(0);
            }
            Ok(UnfollowOutcome::Removed)
        }

        async fn counts(&self, user: Uuid) -> anyhow::Result<Option<FollowCounts>> {
            Ok(self.graph.lock().unwrap().users.get(&user).copied())
        }

        async fn is_active(&self, user: Uuid) -> anyhow::Result<bool> {
            let g = self.graph.lock().unwrap();
            Ok(g.users.contains_key(&user) && !g.inactive.contains(&user))
        }

        async fn purge_user(&self, user: Uuid) -> anyhow::Result<Option<PurgedUser>> {
            let mut g = self.graph.lock().unwrap();
            if g.users.remove(&user).is_none() {
                return Ok(None);
            }
            g.inactive.remove(&user);
            let incident: Vec<(Uuid, Uuid)> = g
                .edges
                .iter()
                .copied()
                .filter(|(a, b)| *a == user || *b == user)
                .collect();
            for (follower, followed) in incident {
                g.edges.remove(&(follower, followed));
                if follower == user {
                    if let Some(c) = g.users.get_mut(&followed) {
                        c.followers_count = (c.followers_count - 1).max(0);
                    }
                } else if let Some(c) = g.users.get_mut(&follower) {
                    c.following_count = (c.following_count - 1).max(0);
                }
            }
            Ok(Some(PurgedUser::default()))
        }
    }
}
