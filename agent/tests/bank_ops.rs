//! Bank operation ladders against the in-memory game server.

mod mock_api;

use std::sync::Arc;

use agent::CharacterContext;
use agent::bank::{self, WithdrawMode, WithdrawRequest};
use common::ManualClock;
use gameapi::SimpleItem;
use mock_api::{MockGameApi, mk_character, test_services, worker_settings};

async fn context_at(api: &Arc<MockGameApi>, x: i32, y: i32) -> (CharacterContext, Arc<ManualClock>) {
    let clock = ManualClock::shared(1_000_000);
    api.add_character(mk_character("Worker", x, y, 20));
    let services = test_services(api.clone(), clock.clone()).await;
    let live = services.api.get_character("Worker").await.unwrap();
    (
        CharacterContext::new(worker_settings(), services, live),
        clock,
    )
}

#[tokio::test]
async fn off_bank_withdraw_auto_moves() {
    let api = Arc::new(MockGameApi::new());
    api.set_bank(&[("wooden_shield", 5), ("copper_ring", 4)]);
    let (mut ctx, _clock) = context_at(&api, 0, 0).await;

    let report = bank::withdraw(
        &mut ctx,
        WithdrawRequest::partial(vec![
            SimpleItem::new("wooden_shield", 3),
            SimpleItem::new("copper_ring", 2),
        ]),
    )
    .await
    .unwrap();

    assert_eq!(
        report.withdrawn,
        vec![
            SimpleItem::new("wooden_shield", 3),
            SimpleItem::new("copper_ring", 2),
        ],
        "withdraws happen in request order"
    );
    assert!(report.skipped.is_empty());

    let moves = api.calls_matching("move");
    assert_eq!(moves, vec!["move Worker 4,1"], "exactly one move to the bank");

    let withdraws = api.calls_matching("withdraw");
    assert_eq!(
        withdraws,
        vec!["withdraw Worker wooden_shield:3", "withdraw Worker copper_ring:2"]
    );

    let ledger = ctx.services().ledger.clone();
    assert_eq!(ledger.reserved_total("wooden_shield"), 0, "no leaked reservations");
    assert_eq!(ledger.reserved_total("copper_ring"), 0);
    assert_eq!(ctx.item_count("wooden_shield"), 3);
}

#[tokio::test]
async fn stale_cache_triggers_one_extra_refresh() {
    let api = Arc::new(MockGameApi::new());
    // Prime the ledger against an empty bank, then stock it behind the
    // cache's back: the first pass sees nothing and the ladder must recover.
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;
    api.set_bank(&[("iron_ore", 3)]);

    let fetches_before = api.bank_fetch_count();

    let report = bank::withdraw(
        &mut ctx,
        WithdrawRequest::partial(vec![SimpleItem::new("iron_ore", 2)]),
    )
    .await
    .unwrap();

    assert_eq!(report.withdrawn, vec![SimpleItem::new("iron_ore", 2)]);
    assert_eq!(
        api.bank_fetch_count() - fetches_before,
        1,
        "exactly one extra refresh between the failure and the retry"
    );
    assert_eq!(ctx.services().ledger.reserved_total("iron_ore"), 0);
}

#[tokio::test]
async fn partial_mode_fills_what_it_can() {
    let api = Arc::new(MockGameApi::new());
    api.set_bank(&[("feather", 3)]);
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;

    let report = bank::withdraw(
        &mut ctx,
        WithdrawRequest::partial(vec![SimpleItem::new("feather", 5)]),
    )
    .await
    .unwrap();

    assert_eq!(report.withdrawn, vec![SimpleItem::new("feather", 3)]);
    assert_eq!(report.skipped.len(), 1);
    assert!(
        report.skipped[0].reason.contains("partial fill 3/5"),
        "got: {}",
        report.skipped[0].reason
    );
}

#[tokio::test]
async fn strict_mode_refuses_short_lines() {
    let api = Arc::new(MockGameApi::new());
    api.set_bank(&[("feather", 3), ("iron_ore", 4)]);
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;

    let report = bank::withdraw(
        &mut ctx,
        WithdrawRequest {
            items: vec![SimpleItem::new("feather", 5), SimpleItem::new("iron_ore", 4)],
            mode: WithdrawMode::Strict,
            retry_stale_once: false,
            throw_on_all_skipped: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.withdrawn, vec![SimpleItem::new("iron_ore", 4)]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].code, "feather");
}

#[tokio::test]
async fn location_errors_do_not_invalidate_the_cache() {
    let api = Arc::new(MockGameApi::new());
    api.set_bank(&[("spruce_wood", 1)]);
    *api.fail_location_code.lock() = Some("spruce_wood".into());
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;

    let fetches_before = api.bank_fetch_count();

    let report = bank::withdraw(
        &mut ctx,
        WithdrawRequest {
            items: vec![SimpleItem::new("spruce_wood", 1)],
            mode: WithdrawMode::Partial,
            retry_stale_once: true,
            throw_on_all_skipped: false,
        },
    )
    .await
    .unwrap();

    assert!(report.withdrawn.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(!report.skipped[0].stale_suspect);
    assert_eq!(
        api.bank_fetch_count(),
        fetches_before,
        "position faults never trigger the stale-retry refresh"
    );
    assert_eq!(ctx.services().ledger.reserved_total("spruce_wood"), 0);
}

#[tokio::test]
async fn throw_on_all_skipped_surfaces_reasons() {
    let api = Arc::new(MockGameApi::new());
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;

    let result = bank::withdraw(
        &mut ctx,
        WithdrawRequest {
            items: vec![SimpleItem::new("missing_item", 2)],
            mode: WithdrawMode::Partial,
            retry_stale_once: false,
            throw_on_all_skipped: true,
        },
    )
    .await;

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("missing_item"), "got: {message}");
}

#[tokio::test]
async fn deposit_feeds_the_order_hook() {
    let api = Arc::new(MockGameApi::new());
    let (mut ctx, _clock) = context_at(&api, 0, 0).await;

    // Pretend Worker gathered two birch_wood for a claimed order.
    {
        let mut state = api.state.lock();
        let character = state.characters.get_mut("Worker").unwrap();
        character.inventory[0].code = "birch_wood".into();
        character.inventory[0].quantity = 2;
    }
    ctx.refresh().await.unwrap();

    let board = ctx.services().orders.clone();
    let order = board
        .create_or_merge(orders::NewOrder {
            requester_name: "Smith".into(),
            item_code: "birch_wood".into(),
            source_type: orders::SourceType::Gather,
            source_code: "birch_tree".into(),
            recipe_code: None,
            gather_skill: Some(gameapi::Skill::Woodcutting),
            source_level: 1,
            quantity: 2,
        })
        .await
        .unwrap();
    board.claim(&order.id, "Worker", 60_000).await.unwrap();

    let contributions = bank::deposit(&mut ctx, vec![SimpleItem::new("birch_wood", 2)])
        .await
        .unwrap();

    assert_eq!(contributions.len(), 1);
    assert_eq!(contributions[0].order_id, order.id);
    assert!(!contributions[0].opportunistic);

    let snap = board.snapshot().await;
    assert_eq!(snap[0].remaining_qty, 0);
    assert_eq!(snap[0].status, orders::OrderStatus::Fulfilled);

    // Deposit moved across both ledgers: bank gained, inventory emptied.
    assert_eq!(ctx.services().ledger.bank_count("birch_wood"), 2);
    assert_eq!(ctx.item_count("birch_wood"), 0);
}

#[tokio::test]
async fn deposit_all_respects_keeps() {
    let api = Arc::new(MockGameApi::new());
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;

    {
        let mut state = api.state.lock();
        let character = state.characters.get_mut("Worker").unwrap();
        character.inventory[0].code = "small_health_potion".into();
        character.inventory[0].quantity = 10;
        character.inventory[1].code = "copper_ore".into();
        character.inventory[1].quantity = 30;
    }
    ctx.refresh().await.unwrap();

    let keeps = std::collections::HashMap::from([("small_health_potion".to_string(), 8u32)]);
    bank::deposit_all(&mut ctx, &keeps).await.unwrap();

    assert_eq!(ctx.item_count("small_health_potion"), 8);
    assert_eq!(ctx.item_count("copper_ore"), 0);
    assert_eq!(ctx.services().ledger.bank_count("copper_ore"), 30);
    assert_eq!(ctx.services().ledger.bank_count("small_health_potion"), 2);
}

#[tokio::test]
async fn gold_round_trip() {
    let api = Arc::new(MockGameApi::new());
    let (mut ctx, _clock) = context_at(&api, 4, 1).await;
    api.state.lock().characters.get_mut("Worker").unwrap().gold = 5_000;
    ctx.refresh().await.unwrap();

    let banked = bank::deposit_gold_above(&mut ctx, 1_000).await.unwrap();
    assert_eq!(banked, 4_000);
    assert_eq!(ctx.live().gold, 1_000);
    assert_eq!(ctx.services().ledger.details().gold, 4_000);

    bank::withdraw_gold(&mut ctx, 500).await.unwrap();
    assert_eq!(ctx.live().gold, 1_500);
    assert_eq!(ctx.services().ledger.details().gold, 3_500);
}
