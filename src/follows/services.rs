use tracing::{info, warn};
use uuid::Uuid;

use super::graph::{FollowGraph, FollowOutcome, UnfollowOutcome};
use crate::error::AppError;

async fn ensure_participants(graph: &dyn FollowGraph, actor: Uuid, target: Uuid) -> Result<(), AppError> {
    if !graph.is_active(actor).await? {
        return Err(AppError::Unauthorized("User not found".into()));
    }
    if graph.counts(target).await?.is_none() {
        return Err(AppError::NotFound("User"));
    }
    Ok(())
}

pub async fn follow_user(
    graph: &dyn FollowGraph,
    actor: Uuid,
    target: Uuid,
) -> Result<FollowOutcome, AppError> {
    if actor == target {
        warn!(user_id = %actor, "self-follow rejected");
        return Err(AppError::SelfFollow);
    }
    ensure_participants(graph, actor, target).await?;

    // either side may be deleted between the check above and the insert
    let outcome = graph
        .follow(actor, target)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    if outcome == FollowOutcome::Created {
        info!(follower = %actor, followed = %target, "follow edge created");
    }
    Ok(outcome)
}

pub async fn unfollow_user(graph: &dyn FollowGraph, actor: Uuid, target: Uuid) -> Result<(), AppError> {
    ensure_participants(graph, actor, target).await?;

    match graph.unfollow(actor, target).await? {
        UnfollowOutcome::Removed => {
            info!(follower = %actor, followed = %target, "follow edge removed");
            Ok(())
        }
        UnfollowOutcome::NotFollowing => Err(AppError::NotFollowing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::follows::graph::{FollowCounts, MemoryFollowGraph, PurgedUser};

    async fn counts(graph: &MemoryFollowGraph, user: Uuid) -> (i64, i64) {
        let c = graph.counts(user).await.unwrap().expect("user exists");
        (c.followers_count, c.following_count)
    }

    #[tokio::test]
    async fn follow_bumps_both_counters_once() {
        let graph = MemoryFollowGraph::new();
        let (a, b) = (graph.add_user(), graph.add_user());

        assert_eq!(follow_user(&graph, a, b).await.unwrap(), FollowOutcome::Created);
        assert!(graph.has_edge(a, b));
        assert_eq!(counts(&graph, a).await, (0, 1));
        assert_eq!(counts(&graph, b).await, (1, 0));

        assert_eq!(
            follow_user(&graph, a, b).await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(counts(&graph, a).await, (0, 1));
        assert_eq!(counts(&graph, b).await, (1, 0));
    }

    #[tokio::test]
    async fn unfollow_restores_prior_counts() {
        let graph = MemoryFollowGraph::new();
        let (a, b, c) = (graph.add_user(), graph.add_user(), graph.add_user());
        follow_user(&graph, c, b).await.unwrap();
        let before = (counts(&graph, a).await, counts(&graph, b).await);

        follow_user(&graph, a, b).await.unwrap();
        unfollow_user(&graph, a, b).await.unwrap();

        assert!(!graph.has_edge(a, b));
        assert_eq!((counts(&graph, a).await, counts(&graph, b).await), before);
        assert!(graph.has_edge(c, b));
    }

    #[tokio::test]
    async fn unfollow_without_edge_fails_and_leaves_counts() {
        let graph = MemoryFollowGraph::new();
        let (a, b) = (graph.add_user(), graph.add_user());
        follow_user(&graph, b, a).await.unwrap();

        let err = unfollow_user(&graph, a, b).await.unwrap_err();
        assert!(matches!(err, AppError::NotFollowing));
        assert_eq!(counts(&graph, a).await, (1, 0));
        assert_eq!(counts(&graph, b).await, (0, 1));
    }

    #[tokio::test]
    async fn counters_never_go_negative() {
        let graph = MemoryFollowGraph::new();
        let (a, b) = (graph.add_user(), graph.add_user());
        follow_user(&graph, a, b).await.unwrap();
        unfollow_user(&graph, a, b).await.unwrap();
        assert!(matches!(
            unfollow_user(&graph, a, b).await.unwrap_err(),
            AppError::NotFollowing
        ));
        assert_eq!(counts(&graph, a).await, (0, 0));
        assert_eq!(counts(&graph, b).await, (0, 0));

        // drifted counters are floored rather than wrapped
        follow_user(&graph, a, b).await.unwrap();
        graph.force_counts(
            a,
            FollowCounts {
                followers_count: 0,
                following_count: 0,
            },
        );
        unfollow_user(&graph, a, b).await.unwrap();
        assert_eq!(counts(&graph, a).await, (0, 0));
    }

    #[tokio::test]
    async fn self_follow_is_rejected_before_any_mutation() {
        let graph = MemoryFollowGraph::new();
        let a = graph.add_user();

        let err = follow_user(&graph, a, a).await.unwrap_err();
        assert!(matches!(err, AppError::SelfFollow));
        assert!(!graph.has_edge(a, a));
        assert_eq!(counts(&graph, a).await, (0, 0));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let graph = MemoryFollowGraph::new();
        let a = graph.add_user();
        let ghost = Uuid::new_v4();

        assert!(matches!(
            follow_user(&graph, a, ghost).await.unwrap_err(),
            AppError::NotFound("User")
        ));
        assert!(matches!(
            unfollow_user(&graph, a, ghost).await.unwrap_err(),
            AppError::NotFound("User")
        ));
        assert!(matches!(
            follow_user(&graph, ghost, a).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert_eq!(counts(&graph, a).await, (0, 0));
    }

    #[tokio::test]
    async fn deleting_a_followed_user_cascades_and_settles_counts() {
        let graph = MemoryFollowGraph::new();
        let (u1, u2, u3) = (graph.add_user(), graph.add_user(), graph.add_user());

        follow_user(&graph, u1, u2).await.unwrap();
        follow_user(&graph, u2, u3).await.unwrap();
        assert_eq!(counts(&graph, u1).await, (0, 1));
        assert_eq!(counts(&graph, u2).await, (1, 1));

        assert!(graph.purge_user(u2).await.unwrap().is_some());
        assert_eq!(graph.edges_touching(u2), 0);
        assert!(!graph.has_edge(u1, u2));
        assert_eq!(counts(&graph, u1).await, (0, 0));
        assert_eq!(counts(&graph, u3).await, (0, 0));
        assert_eq!(graph.counts(u2).await.unwrap(), None);

        assert!(graph.purge_user(u2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_actor_cannot_change_edges() {
        let graph = MemoryFollowGraph::new();
        let (a, b) = (graph.add_user(), graph.add_user());
        follow_user(&graph, a, b).await.unwrap();
        graph.deactivate(a);

        assert!(matches!(
            follow_user(&graph, a, graph.add_user()).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            unfollow_user(&graph, a, b).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(graph.has_edge(a, b));
        assert_eq!(counts(&graph, a).await, (0, 1));

        // others may still follow an inactive account
        let c = graph.add_user();
        assert_eq!(follow_user(&graph, c, a).await.unwrap(), FollowOutcome::Created);
    }

    /// Deletes the target right before the edge insert lands.
    struct TargetDeletedMidway(MemoryFollowGraph);

    #[async_trait::async_trait]
    impl FollowGraph for TargetDeletedMidway {
        async fn follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<Option<FollowOutcome>> {
            self.0.purge_user(followed).await?;
            self.0.follow(follower, followed).await
        }

        async fn unfollow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<UnfollowOutcome> {
            self.0.unfollow(follower, followed).await
        }

        async fn counts(&self, user: Uuid) -> anyhow::Result<Option<FollowCounts>> {
            self.0.counts(user).await
        }

        async fn is_active(&self, user: Uuid) -> anyhow::Result<bool> {
            self.0.is_active(user).await
        }

        async fn purge_user(&self, user: Uuid) -> anyhow::Result<Option<PurgedUser>> {
            self.0.purge_user(user).await
        }
    }

    #[tokio::test]
    async fn target_deleted_during_follow_is_not_found() {
        let inner = MemoryFollowGraph::new();
        let (a, b) = (inner.add_user(), inner.add_user());
        let graph = TargetDeletedMidway(inner);

        assert!(matches!(
            follow_user(&graph, a, b).await.unwrap_err(),
            AppError::NotFound("User")
        ));
        assert!(!graph.0.has_edge(a, b));
        assert_eq!(counts(&graph.0, a).await, (0, 0));
    }
}
