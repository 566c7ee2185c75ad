//! Integration tests for the Rollout orchestrator

use rollout_features::*;
use rollout_store::MemoryStore;
use std::sync::Arc;

fn rollout() -> Rollout {
    Rollout::new(Arc::new(MemoryStore::new()))
}

fn fives_only(rollout: &Rollout, name: &str) {
    rollout.define_group(name, |user: Option<&dyn RolloutUser>| {
        user.is_some_and(|u| u.rollout_identifier() == "5")
    });
}

async fn active_for(rollout: &Rollout, feature: &str, user: &dyn RolloutUser) -> bool {
    rollout
        .is_active(feature, &EvaluationContext::for_user(user))
        .await
        .unwrap()
}

async fn active_anonymously(rollout: &Rollout, feature: &str) -> bool {
    rollout
        .is_active(feature, &EvaluationContext::new())
        .await
        .unwrap()
}

async fn active_with_request(rollout: &Rollout, feature: &str, request: &RequestParams) -> bool {
    rollout
        .is_active(feature, &EvaluationContext::new().with_request(request))
        .await
        .unwrap()
}

async fn count_active(rollout: &Rollout, feature: &str, ids: std::ops::RangeInclusive<u32>) -> usize {
    let mut count = 0;
    for id in ids {
        if active_for(rollout, feature, &id).await {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn test_active_for_defined_group() {
    let rollout = rollout();
    fives_only(&rollout, "fivesonly");
    rollout.activate_group("chat", "fivesonly").await.unwrap();

    assert!(active_for(&rollout, "chat", &5).await);
    assert!(!active_for(&rollout, "chat", &1).await);

    // A stored group that was never defined is inert.
    rollout.activate_group("chat", "fake").await.unwrap();
    assert!(!active_for(&rollout, "chat", &1).await);
}

#[tokio::test]
async fn test_default_all_group() {
    let rollout = rollout();
    rollout.activate_group("chat", "all").await.unwrap();

    assert!(active_for(&rollout, "chat", &0).await);
    assert!(active_for(&rollout, "chat", &"anyone").await);
    assert!(!active_anonymously(&rollout, "chat").await);
}

#[tokio::test]
async fn test_deactivating_a_group() {
    let rollout = rollout();
    fives_only(&rollout, "fivesonly");
    rollout.activate_group("chat", "all").await.unwrap();
    rollout.activate_group("chat", "some").await.unwrap();
    rollout.activate_group("chat", "fivesonly").await.unwrap();
    rollout.deactivate_group("chat", "all").await.unwrap();
    rollout.deactivate_group("chat", "some").await.unwrap();

    assert!(!active_for(&rollout, "chat", &10).await);
    assert_eq!(rollout.get("chat").await.unwrap().groups(), ["fivesonly"]);
}

#[tokio::test]
async fn test_deactivating_a_feature_completely() {
    let rollout = rollout();
    fives_only(&rollout, "fivesonly");
    rollout.activate_group("chat", "all").await.unwrap();
    rollout.activate_group("chat", "fivesonly").await.unwrap();
    rollout.activate_user("chat", &51).await.unwrap();
    rollout.activate_percentage("chat", 100).await.unwrap();
    rollout
        .activate_request_param("chat", "FF_facebookIntegration=1")
        .await
        .unwrap();
    rollout.activate("chat").await.unwrap();
    rollout.deactivate("chat").await.unwrap();

    assert!(!active_for(&rollout, "chat", &0).await);
    assert!(!active_for(&rollout, "chat", &5).await);
    assert!(!active_for(&rollout, "chat", &51).await);
    assert!(!active_for(&rollout, "chat", &24).await);

    let request = RequestParams::new().with_param("FF_facebookIntegration", true);
    assert!(!active_with_request(&rollout, "chat", &request).await);
    assert!(!active_anonymously(&rollout, "chat").await);

    // Still listed until removed.
    assert_eq!(rollout.features().await.unwrap(), vec!["chat"]);
}

#[tokio::test]
async fn test_activating_a_specific_user() {
    let rollout = rollout();
    rollout.activate_user("chat", &42).await.unwrap();

    assert!(active_for(&rollout, "chat", &42).await);
    assert!(active_for(&rollout, "chat", &"42").await);
    assert!(!active_for(&rollout, "chat", &24).await);
}

#[tokio::test]
async fn test_activating_a_specific_user_with_string_id() {
    let rollout = rollout();
    rollout.activate_user("chat", "user-72").await.unwrap();

    assert!(active_for(&rollout, "chat", &"user-72").await);
    assert!(!active_for(&rollout, "chat", &"user-12").await);
}

#[tokio::test]
async fn test_deactivating_a_specific_user() {
    let rollout = rollout();
    rollout.activate_user("chat", &42).await.unwrap();
    rollout.activate_user("chat", &4242).await.unwrap();
    rollout.activate_user("chat", &24).await.unwrap();
    rollout.deactivate_user("chat", &42).await.unwrap();
    rollout.deactivate_user("chat", "4242").await.unwrap();

    assert!(!active_for(&rollout, "chat", &42).await);
    assert_eq!(rollout.get("chat").await.unwrap().users(), ["24"]);
}

#[tokio::test]
async fn test_activating_a_feature_globally() {
    let rollout = rollout();
    rollout.activate("chat").await.unwrap();

    assert!(active_anonymously(&rollout, "chat").await);
    assert!(active_for(&rollout, "chat", &7).await);
}

#[tokio::test]
async fn test_activating_a_feature_for_percentage_of_users() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 20).await.unwrap();

    let count = count_active(&rollout, "chat", 1..=120).await;
    assert!((19..=21).contains(&count), "activated {}", count);
}

#[tokio::test]
async fn test_activating_a_feature_for_percentage_of_more_users() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 20).await.unwrap();

    let count = count_active(&rollout, "chat", 1..=200).await;
    assert!((35..=45).contains(&count), "activated {}", count);
}

#[tokio::test]
async fn test_activating_a_feature_for_small_percentage_of_users() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 5).await.unwrap();

    let count = count_active(&rollout, "chat", 1..=100).await;
    assert!((3..=7).contains(&count), "activated {}", count);
}

#[tokio::test]
async fn test_percentage_membership_is_stable() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 30).await.unwrap();

    for id in 1..=50u32 {
        let first = active_for(&rollout, "chat", &id).await;
        let second = active_for(&rollout, "chat", &id.to_string()).await;
        assert_eq!(first, second);
        assert_eq!(first, hash_bucket(&id.to_string()) < 30);
    }
}

#[tokio::test]
async fn test_percentage_with_ranked_pool() {
    let rollout = rollout();
    rollout.activate_percentage("leaderboard", 25).await.unwrap();

    let pool = CandidatePool::new((1..=8).map(|i| format!("player-{}", i)));
    let mut active = Vec::new();
    for slug in pool.slugs() {
        let context = EvaluationContext::for_user(slug).with_candidates(&pool);
        if rollout.is_active("leaderboard", &context).await.unwrap() {
            active.push(slug.clone());
        }
    }
    assert_eq!(active, vec!["player-1", "player-2"]);
}

#[tokio::test]
async fn test_ranked_pool_rounds_up() {
    let rollout = rollout();
    rollout.activate_percentage("leaderboard", 10).await.unwrap();

    let pool = CandidatePool::new(["a", "b", "c"]);
    let leader = "a";
    let runner_up = "b";
    let context = EvaluationContext::for_user(&leader).with_candidates(&pool);
    assert!(rollout.is_active("leaderboard", &context).await.unwrap());
    let context = EvaluationContext::for_user(&runner_up).with_candidates(&pool);
    assert!(!rollout.is_active("leaderboard", &context).await.unwrap());
}

#[tokio::test]
async fn test_activating_a_feature_for_a_group_as_a_string() {
    let rollout = rollout();
    fives_only(&rollout, "admins");
    rollout.activate_group("chat", "admins").await.unwrap();

    assert!(active_for(&rollout, "chat", &5).await);
    assert!(!active_for(&rollout, "chat", &1).await);
}

#[tokio::test]
async fn test_deactivating_the_percentage_of_users() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 100).await.unwrap();
    rollout.deactivate_percentage("chat").await.unwrap();

    assert!(!active_for(&rollout, "chat", &24).await);
}

#[tokio::test]
async fn test_activating_request_param() {
    let rollout = rollout();
    rollout
        .activate_request_param("chat", "FF_facebookIntegration=1")
        .await
        .unwrap();

    let on = RequestParams::new().with_param("FF_facebookIntegration", true);
    let off = RequestParams::new().with_param("FF_anotherFeature", true);
    assert!(active_with_request(&rollout, "chat", &on).await);
    assert!(!active_with_request(&rollout, "chat", &off).await);

    let wrong_value = RequestParams::new().with_param("FF_facebookIntegration", "2");
    assert!(!active_with_request(&rollout, "chat", &wrong_value).await);
}

#[tokio::test]
async fn test_deactivating_request_param() {
    let rollout = rollout();
    rollout
        .activate_request_param("chat", "FF_facebookIntegration=1")
        .await
        .unwrap();
    rollout.deactivate_request_param("chat").await.unwrap();

    let on = RequestParams::new().with_param("FF_facebookIntegration", true);
    let off = RequestParams::new().with_param("FF_anotherFeature", true);
    assert!(!active_with_request(&rollout, "chat", &on).await);
    assert!(!active_with_request(&rollout, "chat", &off).await);
}

#[tokio::test]
async fn test_deactivating_the_feature_globally() {
    let rollout = rollout();
    rollout.activate("chat").await.unwrap();
    rollout.deactivate("chat").await.unwrap();

    assert!(!active_anonymously(&rollout, "chat").await);
}

#[tokio::test]
async fn test_keeps_a_list_of_features() {
    let rollout = rollout();
    rollout.activate("chat").await.unwrap();
    assert!(rollout.features().await.unwrap().contains(&"chat".to_string()));

    rollout.activate("chat").await.unwrap();
    rollout.activate("chat").await.unwrap();
    assert_eq!(rollout.features().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get() {
    let rollout = rollout();
    rollout.activate_percentage("chat", 10).await.unwrap();
    rollout.activate_group("chat", "caretakers").await.unwrap();
    rollout.activate_group("chat", "greeters").await.unwrap();
    rollout.activate("signup").await.unwrap();
    rollout.activate_user("chat", &42).await.unwrap();
    rollout
        .activate_request_param("chat", "FF_facebookIntegration=1")
        .await
        .unwrap();

    let feature = rollout.get("chat").await.unwrap();
    assert_eq!(feature.percentage(), 10);
    assert_eq!(
        feature.snapshot(),
        FeatureSnapshot {
            percentage: 10,
            groups: vec!["caretakers".to_string(), "greeters".to_string()],
            users: vec!["42".to_string()],
            request_param: "FF_facebookIntegration=1".to_string(),
            data: Default::default(),
        }
    );

    let feature = rollout.get("signup").await.unwrap();
    assert!(feature.groups().is_empty());
    assert!(feature.users().is_empty());
    assert_eq!(feature.percentage(), 100);
    assert!(feature.request_param().is_empty());
}

#[tokio::test]
async fn test_remove() {
    let rollout = rollout();
    rollout.activate("signup").await.unwrap();
    rollout.activate("chat").await.unwrap();
    assert_eq!(rollout.get("signup").await.unwrap().name(), "signup");

    rollout.remove("signup").await.unwrap();
    assert_eq!(rollout.features().await.unwrap(), vec!["chat"]);

    // A later get starts from scratch and re-lists the feature.
    let feature = rollout.get("signup").await.unwrap();
    assert_eq!(feature.percentage(), 0);
    assert_eq!(rollout.features().await.unwrap(), vec!["chat", "signup"]);
}

#[tokio::test]
async fn test_is_active_auto_creates() {
    let rollout = rollout();
    assert!(!active_anonymously(&rollout, "unknown").await);
    assert_eq!(rollout.features().await.unwrap(), vec!["unknown"]);
}

#[tokio::test]
async fn test_shared_across_tasks() {
    let rollout = Arc::new(rollout());
    rollout.activate_user("chat", &3).await.unwrap();

    let mut handles = Vec::new();
    for id in 0..8u32 {
        let rollout = rollout.clone();
        handles.push(tokio::spawn(async move {
            rollout
                .is_active("chat", &EvaluationContext::for_user(&id))
                .await
                .unwrap()
        }));
    }

    let mut verdicts = Vec::new();
    for handle in handles {
        verdicts.push(handle.await.unwrap());
    }
    assert_eq!(verdicts.iter().filter(|active| **active).count(), 1);
    assert!(verdicts[3]);
}
