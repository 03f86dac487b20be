//! Property tests for the fulfillment state machine.

use domain::{
    Aggregate, Category, Closure, Fulfillment, FulfillmentError, ItemStatusUpdate, LineItem,
    LineStatus,
};
use proptest::prelude::*;

fn fulfillment_with(lines: u32) -> Fulfillment {
    let items: Vec<LineItem> = (1..=lines)
        .map(|n| LineItem::food(format!("Item {n}"), 1))
        .collect();
    Fulfillment::open(Category::Food, &items)
}

fn update_status() -> impl Strategy<Value = LineStatus> {
    prop_oneof![
        Just(LineStatus::Started),
        Just(LineStatus::Completed),
        Just(LineStatus::Failed),
    ]
}

/// Applies an update if it is accepted; rejected updates change nothing.
fn submit(fulfillment: &mut Fulfillment, update: ItemStatusUpdate) -> bool {
    match fulfillment.update_item(update) {
        Ok(events) => {
            fulfillment.apply_events(events);
            true
        }
        Err(_) => false,
    }
}

fn assert_open_invariant(fulfillment: &Fulfillment) -> Result<(), TestCaseError> {
    let lines = fulfillment.lines();
    let failed = lines.iter().filter(|l| l.status == LineStatus::Failed).count();
    let all_completed = lines.iter().all(|l| l.status == LineStatus::Completed);

    match fulfillment.closure() {
        None => {
            prop_assert!(fulfillment.is_open());
            prop_assert_eq!(failed, 0);
            prop_assert!(!all_completed);
        }
        Some(Closure::Completed) => {
            prop_assert!(!fulfillment.is_open());
            prop_assert!(all_completed);
        }
        Some(Closure::Failed { line, name }) => {
            prop_assert!(!fulfillment.is_open());
            prop_assert_eq!(failed, 1);
            let failed_line = &lines[(*line - 1) as usize];
            prop_assert_eq!(failed_line.status, LineStatus::Failed);
            prop_assert_eq!(&failed_line.name, name);
        }
        Some(Closure::Canceled) => prop_assert!(false, "nothing canceled this fulfillment"),
    }
    Ok(())
}

proptest! {
    /// Started then completed always ends completed, whatever comes after.
    #[test]
    fn completed_lines_never_revert(
        lines in 2u32..8,
        pick in any::<prop::sample::Index>(),
        later in prop::collection::vec((1u32..8, update_status()), 0..20),
    ) {
        let mut fulfillment = fulfillment_with(lines);
        let line = pick.index(lines as usize) as u32 + 1;

        prop_assert!(submit(&mut fulfillment, ItemStatusUpdate::new(line, LineStatus::Started)));
        prop_assert!(submit(&mut fulfillment, ItemStatusUpdate::new(line, LineStatus::Completed)));

        for (other, status) in later {
            submit(&mut fulfillment, ItemStatusUpdate::new(other, status));
            prop_assert_eq!(
                fulfillment.lines()[(line - 1) as usize].status,
                LineStatus::Completed
            );
        }
    }

    /// The open flag and closure agree with the line statuses after every update.
    #[test]
    fn closes_iff_all_completed_or_one_failed(
        lines in 1u32..6,
        updates in prop::collection::vec((0u32..8, update_status()), 0..40),
    ) {
        let mut fulfillment = fulfillment_with(lines);
        let mut first_failure = None;

        for (line, status) in updates {
            let was_open = fulfillment.is_open();
            let accepted = submit(&mut fulfillment, ItemStatusUpdate::new(line, status));
            if was_open && accepted && status == LineStatus::Failed && first_failure.is_none() {
                first_failure = Some(line);
            }
            assert_open_invariant(&fulfillment)?;
        }

        if let Some(line) = first_failure {
            let is_failed_at_line =
                matches!(fulfillment.closure(), Some(Closure::Failed { line: l, .. }) if *l == line);
            prop_assert!(is_failed_at_line);
        }
    }

    /// Out-of-range lines are rejected and leave the snapshot identical.
    #[test]
    fn out_of_range_updates_change_nothing(
        lines in 1u32..6,
        prefix in prop::collection::vec((1u32..6, update_status()), 0..6),
        beyond in 1u32..100,
        use_zero in any::<bool>(),
        status in update_status(),
    ) {
        let mut fulfillment = fulfillment_with(lines);
        for (line, status) in prefix {
            submit(&mut fulfillment, ItemStatusUpdate::new(line, status));
        }
        prop_assume!(fulfillment.is_open());

        let line = if use_zero { 0 } else { lines + beyond };
        let before = fulfillment.status();

        let result = fulfillment.update_item(ItemStatusUpdate::new(line, status));
        prop_assert_eq!(
            result,
            Err(FulfillmentError::InvalidLine { line, line_count: lines })
        );
        prop_assert_eq!(fulfillment.status(), before);
    }
}
