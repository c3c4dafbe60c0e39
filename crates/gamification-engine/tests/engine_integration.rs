//! 引擎端到端集成测试
//!
//! 用内存存储覆盖完整处理链路：规则匹配、幂等发放、计数条件、
//! 旧版回退与任务推进。

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use gamification_engine::{
    Badge, CountField, GamificationEngine, GamificationStore, MemoryStore, Quest, QuestStatus,
    QuestStep, RewardAmount, Rule,
};
use wayfarer_shared::events::{GameEvent, TriggerEvent};

fn rule(id: i64, trigger: TriggerEvent, condition: serde_json::Value) -> Rule {
    Rule {
        id,
        name: format!("rule-{}", id),
        trigger,
        condition,
        priority: 0,
        is_active: true,
        badge_id: None,
        achievement_id: None,
        xp_reward: 0,
        coins_reward: 0,
        metadata: json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn badge(id: i64, name: &str, xp_value: i64) -> Badge {
    Badge {
        id,
        name: name.to_string(),
        xp_value,
        criteria: json!(null),
    }
}

fn check_in(subject: &str, city: &str) -> GameEvent {
    GameEvent::new(
        TriggerEvent::CheckIn,
        subject,
        json!({"city_name": city}),
        "integration-test",
    )
}

/// 布拉索夫签到规则：+50 XP 并发放徽章 B1
fn brasov_setup() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.seed_badge(badge(1, "Brasov Explorer", 0));
    let mut r = rule(
        1,
        TriggerEvent::CheckIn,
        json!({"type": "location", "city_name": "Brasov"}),
    );
    r.xp_reward = 50;
    r.badge_id = Some(1);
    store.seed_rule(r);
    store
}

#[tokio::test]
async fn location_rule_grants_badge_and_xp_case_insensitive() {
    let store = brasov_setup();
    let engine = GamificationEngine::new(store.clone());

    // 上下文城市为小写，规则定义首字母大写
    let result = engine.process(&check_in("user-001", "brasov")).await.unwrap();

    assert_eq!(result.granted_badges.len(), 1);
    assert_eq!(result.granted_badges[0].badge_id, 1);
    assert!(result.errors.is_empty());

    let totals = store.rewards_for_subject("user-001").await.unwrap();
    assert_eq!(totals.xp, 50);

    let ledger = store.ledger_for_subject("user-001").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].reason, "Rule: rule-1");
    assert_eq!(ledger[0].amount.xp, 50);
}

#[tokio::test]
async fn refiring_same_event_grants_nothing_new() {
    let store = brasov_setup();
    let engine = GamificationEngine::new(store.clone());

    let first = engine.process(&check_in("user-001", "Brasov")).await.unwrap();
    assert_eq!(first.granted_badges.len(), 1);

    // 同一事件再次触发：徽章已持有，整条规则跳过
    let second = engine.process(&check_in("user-001", "Brasov")).await.unwrap();
    assert!(second.granted_badges.is_empty());

    let ledger = store.ledger_for_subject("user-001").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 50);
}

#[tokio::test]
async fn concurrent_double_fire_grants_exactly_once() {
    let store = brasov_setup();
    let engine = Arc::new(GamificationEngine::new(store.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.process(&check_in("user-001", "Brasov")).await.unwrap()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        granted += handle.await.unwrap().granted_badges.len();
    }

    // 按用户串行化保证并发重放也只发放一次
    assert_eq!(granted, 1);
    assert_eq!(store.ledger_for_subject("user-001").await.unwrap().len(), 1);
    assert_eq!(
        store.badges_for_subject("user-001").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn count_rule_fires_exactly_at_threshold() {
    let store = Arc::new(MemoryStore::new());
    let mut r = rule(
        1,
        TriggerEvent::TripCreated,
        json!({"type": "count", "field": "trips_created", "operator": "gte", "value": 5}),
    );
    r.xp_reward = 100;
    store.seed_rule(r);
    let engine = GamificationEngine::new(store.clone());

    let trip = GameEvent::new(TriggerEvent::TripCreated, "user-001", json!({}), "test");

    // 4 次行程：阈值未到
    store.record_activity("user-001", CountField::TripsCreated, 4);
    let result = engine.process(&trip).await.unwrap();
    assert!(result.errors.is_empty());
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 0);

    // 第 5 次行程已计入后重放事件：恰好发放一次 +100
    store.record_activity("user-001", CountField::TripsCreated, 1);
    engine.process(&trip).await.unwrap();
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 100);

    let ledger = store.ledger_for_subject("user-001").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].reason, "Rule: rule-1");
}

#[tokio::test]
async fn quest_advances_completes_and_stays_completed() {
    let store = Arc::new(MemoryStore::new());
    store.seed_quest(Quest {
        id: 1,
        name: "First Journey".to_string(),
        steps: vec![
            QuestStep {
                step_number: 1,
                title: "Plan a trip".to_string(),
                trigger: TriggerEvent::TripCreated,
                condition: json!({}),
                reward: RewardAmount::default(),
            },
            QuestStep {
                step_number: 2,
                title: "Make a booking".to_string(),
                trigger: TriggerEvent::BookingMade,
                condition: json!({}),
                reward: RewardAmount::default(),
            },
        ],
        completion_reward: RewardAmount::new(200, 0),
        completion_badge_id: None,
        is_active: true,
    });
    store.start_quest("user-001", 1);
    let engine = GamificationEngine::new(store.clone());

    let trip = GameEvent::new(TriggerEvent::TripCreated, "user-001", json!({}), "test");
    let booking = GameEvent::new(TriggerEvent::BookingMade, "user-001", json!({}), "test");

    // 第 1 步完成，推进到第 2 步
    engine.process(&trip).await.unwrap();
    let uq = store.user_quest("user-001", 1).unwrap();
    assert_eq!(uq.current_step, 2);
    assert_eq!(uq.status, QuestStatus::InProgress);

    // 第 2 步完成，任务整体完成并发放完成奖励
    engine.process(&booking).await.unwrap();
    let uq = store.user_quest("user-001", 1).unwrap();
    assert_eq!(uq.status, QuestStatus::Completed);
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 200);

    let ledger = store.ledger_for_subject("user-001").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].reason, "Quest Completed: First Journey");

    // 完成后事件重放：无任何效果
    engine.process(&trip).await.unwrap();
    engine.process(&booking).await.unwrap();
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 200);
    assert_eq!(store.ledger_for_subject("user-001").await.unwrap().len(), 1);
}

#[tokio::test]
async fn quest_current_step_is_monotonic() {
    let store = Arc::new(MemoryStore::new());
    store.seed_quest(Quest {
        id: 1,
        name: "Scout".to_string(),
        steps: vec![
            QuestStep {
                step_number: 1,
                title: "Check in".to_string(),
                trigger: TriggerEvent::CheckIn,
                condition: json!({}),
                reward: RewardAmount::new(5, 0),
            },
            QuestStep {
                step_number: 2,
                title: "Post a review".to_string(),
                trigger: TriggerEvent::ReviewPosted,
                condition: json!({}),
                reward: RewardAmount::new(5, 0),
            },
        ],
        completion_reward: RewardAmount::default(),
        completion_badge_id: None,
        is_active: true,
    });
    store.start_quest("user-001", 1);
    let engine = GamificationEngine::new(store.clone());

    let mut last_step = 0;
    let events = [
        GameEvent::new(TriggerEvent::CheckIn, "user-001", json!({}), "test"),
        GameEvent::new(TriggerEvent::CheckIn, "user-001", json!({}), "test"),
        GameEvent::new(TriggerEvent::ReviewPosted, "user-001", json!({}), "test"),
        GameEvent::new(TriggerEvent::CheckIn, "user-001", json!({}), "test"),
    ];
    for event in &events {
        engine.process(event).await.unwrap();
        let uq = store.user_quest("user-001", 1).unwrap();
        assert!(uq.current_step >= last_step);
        last_step = uq.current_step;
    }

    // 第 1 步重放（第二个 check_in）不重复发步骤奖励
    let ledger = store.ledger_for_subject("user-001").await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].reason, "Quest Step: Check in");
    assert_eq!(ledger[1].reason, "Quest Step: Post a review");
}

#[tokio::test]
async fn legacy_fallback_runs_only_without_active_rules() {
    let store = Arc::new(MemoryStore::new());
    store.seed_badge(Badge {
        id: 1,
        name: "Tokyo Walker".to_string(),
        xp_value: 30,
        criteria: json!({"type": "location", "city_name": "Tokyo"}),
    });
    let engine = GamificationEngine::new(store.clone());

    // 无激活规则：旧版判据生效
    let result = engine.process(&check_in("user-001", "Tokyo")).await.unwrap();
    assert_eq!(result.granted_badges.len(), 1);
    assert_eq!(result.granted_badges[0].badge_name, "Tokyo Walker");

    // 加入一条不会命中的激活规则：旧版路径对新用户关闭
    store.seed_rule(rule(
        1,
        TriggerEvent::CheckIn,
        json!({"type": "location", "city_name": "Paris"}),
    ));
    let result = engine.process(&check_in("user-002", "Tokyo")).await.unwrap();
    assert!(result.granted_badges.is_empty());
    assert!(
        store.badges_for_subject("user-002").await.unwrap().is_empty()
    );
}

#[tokio::test]
async fn unknown_condition_rule_never_fires() {
    let store = Arc::new(MemoryStore::new());
    let mut r = rule(1, TriggerEvent::CheckIn, json!({"type": "unsupported_tag"}));
    r.xp_reward = 999;
    store.seed_rule(r);
    let engine = GamificationEngine::new(store.clone());

    for city in ["Tokyo", "brasov", ""] {
        let result = engine.process(&check_in("user-001", city)).await.unwrap();
        assert!(result.granted_badges.is_empty());
        assert!(result.errors.is_empty());
    }
    assert_eq!(store.rewards_for_subject("user-001").await.unwrap().xp, 0);
}

#[tokio::test]
async fn unknown_trigger_yields_empty_result() {
    let store = Arc::new(MemoryStore::new());
    let engine = GamificationEngine::new(store);

    let event = GameEvent::new(TriggerEvent::SwipeDislike, "user-001", json!({}), "test");
    let result = engine.process(&event).await.unwrap();
    assert!(result.granted_badges.is_empty());
    assert!(result.granted_achievements.is_empty());
    assert!(result.errors.is_empty());
}
