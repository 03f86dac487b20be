//! Integration tests for long-running customer ledgers.

use std::sync::Arc;

use common::{CustomerId, ProcessId};
use domain::{LedgerCheckpoint, STARTING_BALANCE};
use journal::{InMemoryJournal, Journal};
use saga::{LedgerView, LoyaltyLedgers};

fn alice() -> CustomerId {
    CustomerId::new("alice@example.com")
}

async fn settle(
    ledgers: &LoyaltyLedgers<InMemoryJournal>,
    until: impl Fn(&LedgerView) -> bool,
) -> LedgerView {
    let mut view = ledgers.watch(&alice()).await.unwrap();
    *view.wait_for(|view| until(view)).await.unwrap()
}

#[tokio::test]
async fn test_balance_survives_continue_as_new() {
    let journal = Arc::new(InMemoryJournal::new());
    let ledgers = LoyaltyLedgers::new(journal.clone(), 3);

    for amount in [1, 3, 1] {
        ledgers.credit(alice(), amount).await.unwrap();
    }
    let view = settle(&ledgers, |view| view.epoch == 1).await;
    assert_eq!(view.points, STARTING_BALANCE + 5);

    ledgers.credit(alice(), 3).await.unwrap();
    let view = settle(&ledgers, |view| view.points == 108).await;
    assert_eq!(view.epoch, 1);

    let stream = ProcessId::for_customer(&alice());
    let checkpoint: LedgerCheckpoint = journal
        .latest_checkpoint(stream)
        .await
        .unwrap()
        .unwrap()
        .into_state()
        .unwrap();
    assert_eq!(checkpoint.customer, alice());
    assert_eq!(checkpoint.points, 105);
    assert_eq!(journal.history_len(stream).await.unwrap(), 1);
}

#[tokio::test]
async fn test_history_stays_bounded() {
    let journal = Arc::new(InMemoryJournal::new());
    let ledgers = LoyaltyLedgers::new(journal.clone(), 5);

    for _ in 0..50 {
        ledgers.credit(alice(), 2).await.unwrap();
        tokio::task::yield_now().await;
    }
    let view = settle(&ledgers, |view| view.points == STARTING_BALANCE + 100).await;
    assert!(view.epoch >= 1);

    // The last epoch may still be saving its checkpoint.
    let stream = ProcessId::for_customer(&alice());
    for _ in 0..1000 {
        if journal.history_len(stream).await.unwrap() < 5 {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("ledger history was never compacted");
}

#[tokio::test]
async fn test_concurrent_credits_from_many_tasks() {
    let ledgers = LoyaltyLedgers::new(Arc::new(InMemoryJournal::new()), 4);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let ledgers = ledgers.clone();
            tokio::spawn(async move { ledgers.credit(alice(), 1).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    settle(&ledgers, |view| view.points == STARTING_BALANCE + 20).await;
    assert_eq!(ledgers.balance(&alice()).await.unwrap(), Some(120));
}
