//! Credit ledger tests

mod helpers;

use helpers::create_test_db;
use redraft_gen::models::CreditKind;
use redraft_gen::services::{CreditLedger, LedgerError};
use uuid::Uuid;

#[tokio::test]
async fn test_unknown_owner_has_zero_balance() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);

    assert_eq!(ledger.balance("nobody").await.unwrap(), 0);
    assert!(ledger.transactions("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_grant_then_consume() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);

    assert_eq!(ledger.grant("alice", 5, "welcome").await.unwrap(), 5);
    assert_eq!(ledger.grant("alice", 3, "promo").await.unwrap(), 8);

    let task_id = Uuid::new_v4();
    let receipt = ledger.consume("alice", 6, "batch of 6", Some(task_id)).await.unwrap();
    assert_eq!(receipt.consumed, 6);
    assert_eq!(receipt.remaining, 2);
    assert_eq!(ledger.balance("alice").await.unwrap(), 2);

    let history = ledger.transactions("alice").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].kind, CreditKind::Consume);
    assert_eq!(history[0].task_id, Some(task_id));
}

#[tokio::test]
async fn test_insufficient_balance_writes_nothing() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);
    ledger.grant("bob", 2, "welcome").await.unwrap();

    let result = ledger.consume("bob", 3, "too big", None).await;
    match result {
        Err(LedgerError::InsufficientBalance {
            required,
            available,
        }) => {
            assert_eq!(required, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientBalance, got {:?}", other),
    }

    assert_eq!(ledger.balance("bob").await.unwrap(), 2);
    assert_eq!(ledger.transactions("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);

    assert!(matches!(
        ledger.grant("carol", 0, "nothing").await,
        Err(LedgerError::InvalidAmount(0))
    ));
    assert!(matches!(
        ledger.consume("carol", -1, "negative", None).await,
        Err(LedgerError::InvalidAmount(-1))
    ));
    assert!(matches!(
        ledger.refund("carol", 0, "nothing", Uuid::new_v4()).await,
        Err(LedgerError::InvalidAmount(0))
    ));
}

#[tokio::test]
async fn test_refund_is_clamped_to_consumed_amount() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);
    ledger.grant("dave", 10, "welcome").await.unwrap();

    let task_id = Uuid::new_v4();
    ledger.consume("dave", 3, "batch of 3", Some(task_id)).await.unwrap();

    let first = ledger.refund("dave", 2, "two failed", task_id).await.unwrap();
    assert_eq!(first.refunded, 2);
    assert_eq!(first.new_balance, 9);

    // Only 1 of the 3 consumed credits is still refundable
    let second = ledger.refund("dave", 5, "retry refund", task_id).await.unwrap();
    assert_eq!(second.refunded, 1);
    assert_eq!(second.new_balance, 10);

    let third = ledger.refund("dave", 1, "nothing left", task_id).await.unwrap();
    assert_eq!(third.refunded, 0);
    assert_eq!(third.new_balance, 10);

    let refunds = ledger
        .transactions_for_task(task_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == CreditKind::Refund)
        .count();
    assert_eq!(refunds, 2);
}

#[tokio::test]
async fn test_refund_without_consumption_is_a_no_op() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);
    ledger.grant("erin", 4, "welcome").await.unwrap();

    let receipt = ledger.refund("erin", 2, "stray", Uuid::new_v4()).await.unwrap();
    assert_eq!(receipt.refunded, 0);
    assert_eq!(receipt.new_balance, 4);
}

#[tokio::test]
async fn test_refund_is_scoped_to_owner() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 1000);
    ledger.grant("frank", 5, "welcome").await.unwrap();

    let task_id = Uuid::new_v4();
    ledger.consume("frank", 5, "batch", Some(task_id)).await.unwrap();

    let receipt = ledger.refund("mallory", 5, "not theirs", task_id).await.unwrap();
    assert_eq!(receipt.refunded, 0);
    assert_eq!(ledger.balance("mallory").await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_consumes_never_overdraw() {
    let (_dir, pool) = create_test_db().await;
    let ledger = CreditLedger::new(pool, 5000);
    ledger.grant("gina", 5, "welcome").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.consume("gina", 1, &format!("job {}", i), None).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(e) => panic!("unexpected ledger error: {}", e),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(ledger.balance("gina").await.unwrap(), 0);
}
