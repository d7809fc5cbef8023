//! Task orchestration tests
//!
//! Drive submit → start → aggregation against a temp database with scripted
//! generation and content-detail fakes.

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use helpers::*;
use redraft_common::config::ItemSuccessPolicy;
use redraft_gen::db;
use redraft_gen::models::{CreditKind, ItemStatus, TaskStatus, VariantStatus};
use redraft_gen::services::{recover_interrupted_tasks, OrchestratorError, TaskOrchestrator};
use uuid::Uuid;

/// Grant, charge and submit the way the submit endpoint does
async fn submit_charged(env: &TestEnv, items: Vec<redraft_gen::services::SubmissionItem>) -> Uuid {
    let task_id = Uuid::new_v4();
    let cost = items.len() as i64 * env.state.orchestrator.unit_cost();

    env.state.ledger.grant(OWNER, 10, "test top-up").await.unwrap();
    env.state
        .ledger
        .consume(OWNER, cost, "batch submission", Some(task_id))
        .await
        .unwrap();

    env.state
        .orchestrator
        .submit(task_id, OWNER, Some("batch".to_string()), items, note_config())
        .await
        .unwrap();

    task_id
}

async fn start_and_wait(env: &TestEnv, task_id: Uuid) -> redraft_gen::models::Task {
    db::credentials::set_credential(&env.pool, OWNER, "cookie-abc").await.unwrap();
    let ack = env.state.orchestrator.start(task_id, OWNER).await.unwrap();
    assert!(ack.accepted);
    wait_for_terminal(&env.pool, task_id).await
}

#[tokio::test]
async fn test_missing_reference_fails_only_that_item_and_refunds_it() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Morning coffee"),
            submission_item("s2", None, "No link"),
            submission_item("s3", Some(VALID_REFERENCE), "Evening run"),
        ],
    )
    .await;

    let task = start_and_wait(&env, task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completed_at.is_some());

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Completed);
    assert_eq!(items[2].status, ItemStatus::Completed);
    assert_eq!(items[1].status, ItemStatus::Failed);
    assert!(items[1]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("missing reference"));

    // Refused items never reach generation and get no variants
    assert_eq!(env.generator.calls(), 2);
    assert!(db::variants::load_for_item(&env.pool, items[1].item_id)
        .await
        .unwrap()
        .is_empty());

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v.status == VariantStatus::Completed));
    assert_eq!(variants[0].title, "Fresh title one");
    assert_eq!(variants[1].body, "Fresh body two");

    let refunds: Vec<_> = env
        .state
        .ledger
        .transactions_for_task(task_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == CreditKind::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, 1);

    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10 - 3 + 1);
}

#[tokio::test]
async fn test_reference_outside_allowed_domains_is_refused() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some("https://example.com/post/1"), "Elsewhere")],
    )
    .await;

    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert!(items[0]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("invalid reference"));
    assert_eq!(env.generator.calls(), 0);
    assert_eq!(env.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_fetched_detail_is_preferred_over_staged_content() {
    let fetcher = FakeFetcher::unavailable().with_document(
        VALID_REFERENCE,
        "Full fetched title",
        "Full fetched body",
    );
    let env = setup(FakeGenerator::two_versions(), fetcher).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Staged title")],
    )
    .await;
    start_and_wait(&env, task_id).await;

    assert_eq!(env.fetcher.credentials_seen(), vec!["cookie-abc".to_string()]);

    let prompts = env.generator.prompts();
    assert_eq!(prompts.len(), 1);
    let user = &prompts[0].last().unwrap().content;
    assert!(user.contains("Full fetched title"));
    assert!(!user.contains("Staged title"));
}

#[tokio::test]
async fn test_fetch_failure_falls_back_to_staged_content() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Staged title")],
    )
    .await;
    let task = start_and_wait(&env, task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let prompts = env.generator.prompts();
    let user = &prompts[0].last().unwrap().content;
    assert!(user.contains("Staged title"));
    assert!(user.contains("Staged title staged body"));
}

#[tokio::test]
async fn test_empty_source_fails_item() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let mut item = submission_item("s1", Some(VALID_REFERENCE), "unused");
    item.staged.title = None;
    item.staged.body = Some("   ".to_string());
    item.staged.tags.clear();

    let task_id = submit_charged(&env, vec![item]).await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert_eq!(items[0].error_message.as_deref(), Some("empty source data"));
    assert_eq!(env.generator.calls(), 0);
}

#[tokio::test]
async fn test_fewer_sections_than_requested_keeps_item_under_any_variant() {
    let one_version = "Version 1\nTitle: Only title\nBody: Only body".to_string();
    let env = setup(
        FakeGenerator::new(Script::Text(one_version)),
        FakeFetcher::unavailable(),
    )
    .await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Short answer")],
    )
    .await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Completed);

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert_eq!(variants[0].status, VariantStatus::Completed);
    assert_eq!(variants[0].title, "Only title");
    assert_eq!(variants[1].status, VariantStatus::Failed);
    assert_eq!(
        variants[1].error_message.as_deref(),
        Some("generation returned only 1 of 2 versions")
    );

    // Completed items are not refunded
    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 9);
}

#[tokio::test]
async fn test_all_variants_policy_fails_partial_item() {
    let one_version = "Version 1\nTitle: Only title\nBody: Only body".to_string();
    let mut config = test_config();
    config.pipeline.item_success_policy = ItemSuccessPolicy::AllVariants;
    let env = setup_with_config(
        FakeGenerator::new(Script::Text(one_version)),
        FakeFetcher::unavailable(),
        config,
    )
    .await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Short answer")],
    )
    .await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert_eq!(
        items[0].error_message.as_deref(),
        Some("only 1 of 2 variants were generated")
    );
    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10);
}

#[tokio::test]
async fn test_empty_generation_output_fails_item() {
    let env = setup(
        FakeGenerator::new(Script::Text(String::new())),
        FakeFetcher::unavailable(),
    )
    .await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Silent")],
    )
    .await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert!(items[0]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("no variant was generated"));

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert!(variants.iter().all(|v| v.status == VariantStatus::Failed));
}

#[tokio::test]
async fn test_transport_error_fails_every_variant_of_the_item() {
    let generator = FakeGenerator::two_versions()
        .with_rule("Broken upstream", Script::Transport("HTTP 502 Bad Gateway: ".to_string()));
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Broken upstream"),
            submission_item("s2", Some(VALID_REFERENCE), "Healthy"),
        ],
    )
    .await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert!(items[0].error_message.as_deref().unwrap().contains("HTTP 502"));
    assert_eq!(items[1].status, ItemStatus::Completed);

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v.status == VariantStatus::Failed));
}

#[tokio::test]
async fn test_item_with_every_variant_failed_is_refunded() {
    let generator = FakeGenerator::two_versions()
        .with_rule("Broken upstream", Script::Transport("HTTP 503 Service Unavailable: ".to_string()));
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Broken upstream"),
            submission_item("s2", Some(VALID_REFERENCE), "Healthy"),
        ],
    )
    .await;
    let task = start_and_wait(&env, task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert_eq!(items[1].status, ItemStatus::Completed);

    let refunds: Vec<_> = env
        .state
        .ledger
        .transactions_for_task(task_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == CreditKind::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, env.state.orchestrator.unit_cost());

    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10 - 2 + 1);
}

#[tokio::test]
async fn test_finalize_closes_variants_left_generating() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Stuck"),
            submission_item("s2", Some(VALID_REFERENCE), "Untouched"),
        ],
    )
    .await;
    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());

    // Item failed while its variants were never closed
    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    db::items::mark_processing(&env.pool, items[0].item_id).await.unwrap();
    db::variants::create_for_item(&env.pool, items[0].item_id, 2).await.unwrap();
    db::items::mark_failed(&env.pool, items[0].item_id, "generation backend went away")
        .await
        .unwrap();

    let task = db::tasks::load_task(&env.pool, task_id).await.unwrap().unwrap();
    env.state.orchestrator.finalize(&task, Instant::now()).await.unwrap();

    let task = db::tasks::load_task(&env.pool, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    let variants = db::variants::load_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| {
        v.status == VariantStatus::Failed
            && v.error_message.as_deref() == Some("generation backend went away")
            && v.completed_at.is_some()
    }));

    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10);
}

#[tokio::test]
async fn test_interrupted_stream_fails_item() {
    let generator = FakeGenerator::new(Script::StreamError {
        partial: "Version 1\nTitle: Half".to_string(),
        message: "connection reset".to_string(),
    });
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Cut off")],
    )
    .await;
    start_and_wait(&env, task_id).await;

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert!(items[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection reset"));

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert!(variants.iter().all(|v| v.status == VariantStatus::Failed));
}

#[tokio::test]
async fn test_panicking_item_does_not_take_down_siblings() {
    let generator = FakeGenerator::two_versions().with_rule("Explodes", Script::Panic);
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Explodes"),
            submission_item("s2", Some(VALID_REFERENCE), "Calm"),
        ],
    )
    .await;
    let task = start_and_wait(&env, task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert_eq!(items[0].error_message.as_deref(), Some("item processing panicked"));
    assert_eq!(items[1].status, ItemStatus::Completed);
    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 9);
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let generator = FakeGenerator::two_versions().with_delay(Duration::from_millis(300));
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Slow")],
    )
    .await;
    db::credentials::set_credential(&env.pool, OWNER, "cookie-abc").await.unwrap();

    let orchestrator = Arc::clone(&env.state.orchestrator);
    orchestrator.start(task_id, OWNER).await.unwrap();

    let second = orchestrator.start(task_id, OWNER).await;
    assert!(matches!(second, Err(OrchestratorError::AlreadyProcessing)));

    wait_for_terminal(&env.pool, task_id).await;
    let third = orchestrator.start(task_id, OWNER).await;
    assert!(matches!(third, Err(OrchestratorError::AlreadyCompleted)));

    assert_eq!(env.generator.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_claim_once() {
    let generator = FakeGenerator::two_versions().with_delay(Duration::from_millis(100));
    let env = setup(generator, FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Raced")],
    )
    .await;
    db::credentials::set_credential(&env.pool, OWNER, "cookie-abc").await.unwrap();

    let a = Arc::clone(&env.state.orchestrator);
    let b = Arc::clone(&env.state.orchestrator);
    let (first, second) = tokio::join!(a.start(task_id, OWNER), b.start(task_id, OWNER));

    let accepted = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(accepted, 1);

    wait_for_terminal(&env.pool, task_id).await;
    assert_eq!(env.generator.calls(), 1);
}

#[tokio::test]
async fn test_start_preconditions() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;
    let orchestrator = Arc::clone(&env.state.orchestrator);

    let unknown = orchestrator.start(Uuid::new_v4(), OWNER).await;
    assert!(matches!(unknown, Err(OrchestratorError::NotFound(_))));

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Guarded")],
    )
    .await;

    // Another owner cannot see the task
    let foreign = orchestrator.start(task_id, "someone-else").await;
    assert!(matches!(foreign, Err(OrchestratorError::NotFound(_))));

    let no_credential = orchestrator.start(task_id, OWNER).await;
    assert!(matches!(
        no_credential,
        Err(OrchestratorError::MissingFetchCredential(_))
    ));

    let task = db::tasks::load_task(&env.pool, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_start_without_pending_items() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Drained")],
    )
    .await;
    db::credentials::set_credential(&env.pool, OWNER, "cookie-abc").await.unwrap();

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    db::items::mark_failed(&env.pool, items[0].item_id, "manual").await.unwrap();

    let result = env.state.orchestrator.start(task_id, OWNER).await;
    assert!(matches!(result, Err(OrchestratorError::NoPendingItems)));
}

#[tokio::test]
async fn test_failed_task_can_be_restarted() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Second chance")],
    )
    .await;

    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());
    assert!(db::tasks::mark_failed(&env.pool, task_id, "failed to load items").await.unwrap());

    let task = start_and_wait(&env, task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.error_message, None);
}

#[tokio::test]
async fn test_submission_validation() {
    let items = vec![submission_item("", Some(VALID_REFERENCE), "No id")];
    let result = TaskOrchestrator::validate_submission(&items, &note_config());
    assert!(matches!(result, Err(OrchestratorError::Validation(_))));

    let result = TaskOrchestrator::validate_submission(&[], &note_config());
    assert!(matches!(result, Err(OrchestratorError::Validation(_))));
}

#[tokio::test]
async fn test_recovery_resumes_interrupted_task() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Was running"),
            submission_item("s2", Some(VALID_REFERENCE), "Never started"),
        ],
    )
    .await;
    db::credentials::set_credential(&env.pool, OWNER, "cookie-abc").await.unwrap();

    // Simulate a crash mid-item: task processing, one item with stale variants
    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());
    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    db::items::mark_processing(&env.pool, items[0].item_id).await.unwrap();
    db::variants::create_for_item(&env.pool, items[0].item_id, 2).await.unwrap();

    let report = recover_interrupted_tasks(&env.pool, &env.state.orchestrator, true)
        .await
        .unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(report.finalized, 0);

    let task = wait_for_terminal(&env.pool, task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert!(items.iter().all(|i| i.status == ItemStatus::Completed));

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v.status == VariantStatus::Completed));
}

#[tokio::test]
async fn test_recovery_without_resume_fails_and_refunds() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![
            submission_item("s1", Some(VALID_REFERENCE), "Lost one"),
            submission_item("s2", Some(VALID_REFERENCE), "Lost two"),
        ],
    )
    .await;
    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());

    let report = recover_interrupted_tasks(&env.pool, &env.state.orchestrator, false)
        .await
        .unwrap();
    assert_eq!(report.finalized, 1);

    let task = db::tasks::load_task(&env.pool, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert!(items.iter().all(|i| {
        i.status == ItemStatus::Failed
            && i.error_message.as_deref() == Some("interrupted by service restart")
    }));

    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10);
    assert_eq!(env.generator.calls(), 0);
}

#[tokio::test]
async fn test_recovery_without_resume_closes_generating_variants() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Mid-stream")],
    )
    .await;
    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());
    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    db::items::mark_processing(&env.pool, items[0].item_id).await.unwrap();
    db::variants::create_for_item(&env.pool, items[0].item_id, 2).await.unwrap();

    let report = recover_interrupted_tasks(&env.pool, &env.state.orchestrator, false)
        .await
        .unwrap();
    assert_eq!(report.finalized, 1);

    let items = db::items::load_items_for_task(&env.pool, task_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Failed);
    assert_eq!(
        items[0].error_message.as_deref(),
        Some("interrupted by service restart")
    );

    let variants = db::variants::load_for_item(&env.pool, items[0].item_id).await.unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| {
        v.status == VariantStatus::Failed
            && v.error_message.as_deref() == Some("interrupted by service restart")
    }));

    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10);
}

#[tokio::test]
async fn test_recovery_without_credential_finalizes() {
    let env = setup(FakeGenerator::two_versions(), FakeFetcher::unavailable()).await;

    let task_id = submit_charged(
        &env,
        vec![submission_item("s1", Some(VALID_REFERENCE), "Orphaned")],
    )
    .await;
    assert!(db::tasks::try_begin_processing(&env.pool, task_id, OWNER).await.unwrap());

    let report = recover_interrupted_tasks(&env.pool, &env.state.orchestrator, true)
        .await
        .unwrap();
    assert_eq!(report.resumed, 0);
    assert_eq!(report.finalized, 1);
    assert_eq!(env.state.ledger.balance(OWNER).await.unwrap(), 10);
}
