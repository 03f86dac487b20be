use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::{Category, LineItem};

use super::{
    Closure, FulfillmentError, FulfillmentEvent, FulfillmentLine, FulfillmentStatus,
    ItemStatusUpdate, LineStatus,
};

/// Fulfillment of one category of one order.
///
/// Lines keep their insertion order for the whole life of the fulfillment.
/// The fulfillment is open until every line is completed, a line fails, or
/// it is canceled; a failed fulfillment never reopens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    category: Category,
    lines: Vec<FulfillmentLine>,
    open: bool,
    /// Set once the owner has been told fulfillment began.
    start_notified: bool,
    closure: Option<Closure>,
}

impl Aggregate for Fulfillment {
    type Event = FulfillmentEvent;

    fn aggregate_type() -> &'static str {
        "Fulfillment"
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            FulfillmentEvent::Opened { category, lines } => {
                *self = Self::from_lines(category, lines);
            }
            FulfillmentEvent::ItemStatusChanged { line, status } => {
                if let Some(target) = line
                    .checked_sub(1)
                    .and_then(|index| self.lines.get_mut(index as usize))
                {
                    target.status = status;
                }
            }
            FulfillmentEvent::FulfillmentStarted => {
                self.start_notified = true;
            }
            FulfillmentEvent::Closed(closure) => {
                self.open = false;
                self.closure = Some(closure);
            }
        }
    }
}

impl Fulfillment {
    /// Opens a fulfillment, expanding each item into one pending line per unit.
    pub fn open(category: Category, items: &[LineItem]) -> Self {
        let lines = items
            .iter()
            .flat_map(|item| std::iter::repeat_n(item.name.clone(), item.quantity as usize))
            .collect();
        Self::from_lines(category, lines)
    }

    fn from_lines(category: Category, names: Vec<String>) -> Self {
        Self {
            category,
            lines: names.into_iter().map(FulfillmentLine::pending).collect(),
            open: true,
            start_notified: false,
            closure: None,
        }
    }

    /// Rebuilds a fulfillment from its recorded history.
    ///
    /// Returns None unless the history starts with `Opened`.
    pub fn replay(events: impl IntoIterator<Item = FulfillmentEvent>) -> Option<Self> {
        let mut events = events.into_iter();
        let FulfillmentEvent::Opened { category, lines } = events.next()? else {
            return None;
        };
        let mut fulfillment = Self::from_lines(category, lines);
        fulfillment.apply_events(events);
        Some(fulfillment)
    }

    /// Returns the event that recreates this fulfillment's initial state.
    pub fn opened(&self) -> FulfillmentEvent {
        FulfillmentEvent::Opened {
            category: self.category,
            lines: self.lines.iter().map(|line| line.name.clone()).collect(),
        }
    }
}

// Query methods
impl Fulfillment {
    /// Returns the category this fulfillment prepares.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns true while updates are accepted.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the number of unit lines.
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Returns the lines in presentation order.
    pub fn lines(&self) -> &[FulfillmentLine] {
        &self.lines
    }

    /// Returns true once the owner has been told fulfillment began.
    pub fn start_notified(&self) -> bool {
        self.start_notified
    }

    /// Returns how the fulfillment closed, if it has.
    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    /// Returns a read-only snapshot for status queries.
    pub fn status(&self) -> FulfillmentStatus {
        FulfillmentStatus {
            category: self.category,
            open: self.open,
            lines: self.lines.clone(),
        }
    }
}

// Command methods (return events)
impl Fulfillment {
    /// Validates an item status update and returns the resulting events.
    ///
    /// A repeat of a line's current status is accepted and yields no events.
    pub fn update_item(
        &self,
        update: ItemStatusUpdate,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        if !self.open {
            return Err(FulfillmentError::Closed);
        }

        let ItemStatusUpdate { line, status } = update;
        let index = self.line_index(line)?;
        let current = &self.lines[index];

        // Staff never move a line back to pending, not even a pending one.
        if status == LineStatus::Pending {
            return Err(FulfillmentError::InvalidTransition {
                line,
                from: current.status,
                to: status,
            });
        }
        if current.status == status {
            return Ok(vec![]);
        }
        if !current.status.can_become(status) {
            return Err(FulfillmentError::InvalidTransition {
                line,
                from: current.status,
                to: status,
            });
        }

        let mut events = vec![FulfillmentEvent::ItemStatusChanged { line, status }];

        match status {
            LineStatus::Started | LineStatus::Completed => {
                if !self.start_notified {
                    events.push(FulfillmentEvent::FulfillmentStarted);
                }
                if status == LineStatus::Completed && self.all_completed_except(index) {
                    events.push(FulfillmentEvent::Closed(Closure::Completed));
                }
            }
            LineStatus::Failed => {
                events.push(FulfillmentEvent::Closed(Closure::Failed {
                    line,
                    name: current.name.clone(),
                }));
            }
            LineStatus::Pending => {}
        }

        Ok(events)
    }

    /// Closes the fulfillment without failing it.
    pub fn cancel(&self) -> Vec<FulfillmentEvent> {
        if self.open {
            vec![FulfillmentEvent::Closed(Closure::Canceled)]
        } else {
            vec![]
        }
    }

    fn line_index(&self, line: u32) -> Result<usize, FulfillmentError> {
        if line < 1 || line > self.line_count() {
            return Err(FulfillmentError::InvalidLine {
                line,
                line_count: self.line_count(),
            });
        }
        Ok((line - 1) as usize)
    }

    fn all_completed_except(&self, index: usize) -> bool {
        self.lines
            .iter()
            .enumerate()
            .all(|(i, line)| i == index || line.status == LineStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kitchen() -> Fulfillment {
        Fulfillment::open(
            Category::Food,
            &[LineItem::food("Bagel", 2), LineItem::food("Muffin", 1)],
        )
    }

    fn update(fulfillment: &mut Fulfillment, line: u32, status: LineStatus) -> Vec<FulfillmentEvent> {
        let events = fulfillment
            .update_item(ItemStatusUpdate::new(line, status))
            .unwrap();
        fulfillment.apply_events(events.clone());
        events
    }

    #[test]
    fn test_open_expands_quantities() {
        let fulfillment = kitchen();
        let names: Vec<&str> = fulfillment.lines().iter().map(|l| l.name.as_str()).collect();

        assert_eq!(names, vec!["Bagel", "Bagel", "Muffin"]);
        assert!(fulfillment.is_open());
        assert!(fulfillment
            .lines()
            .iter()
            .all(|line| line.status == LineStatus::Pending));
        assert!(fulfillment.closure().is_none());
    }

    #[test]
    fn test_first_start_notifies_once() {
        let mut fulfillment = kitchen();

        let first = update(&mut fulfillment, 1, LineStatus::Started);
        assert_eq!(
            first,
            vec![
                FulfillmentEvent::ItemStatusChanged {
                    line: 1,
                    status: LineStatus::Started
                },
                FulfillmentEvent::FulfillmentStarted,
            ]
        );
        assert!(fulfillment.start_notified());

        let second = update(&mut fulfillment, 2, LineStatus::Started);
        assert!(!second.contains(&FulfillmentEvent::FulfillmentStarted));
    }

    #[test]
    fn test_duplicate_update_is_a_no_op() {
        let mut fulfillment = kitchen();
        update(&mut fulfillment, 1, LineStatus::Started);

        let before = fulfillment.status();
        let events = update(&mut fulfillment, 1, LineStatus::Started);
        assert!(events.is_empty());
        assert_eq!(fulfillment.status(), before);
    }

    #[test]
    fn test_completing_every_line_closes() {
        let mut fulfillment = kitchen();
        update(&mut fulfillment, 1, LineStatus::Started);
        update(&mut fulfillment, 1, LineStatus::Completed);
        update(&mut fulfillment, 2, LineStatus::Completed);
        assert!(fulfillment.is_open());

        let last = update(&mut fulfillment, 3, LineStatus::Completed);
        assert_eq!(
            last.last(),
            Some(&FulfillmentEvent::Closed(Closure::Completed))
        );
        assert!(!fulfillment.is_open());
        assert_eq!(fulfillment.closure(), Some(&Closure::Completed));
    }

    #[test]
    fn test_completion_without_start_still_notifies() {
        let mut fulfillment = kitchen();
        let events = update(&mut fulfillment, 3, LineStatus::Completed);
        assert!(events.contains(&FulfillmentEvent::FulfillmentStarted));
    }

    #[test]
    fn test_failure_closes_and_names_the_line() {
        let mut fulfillment = kitchen();
        update(&mut fulfillment, 1, LineStatus::Started);
        let events = update(&mut fulfillment, 3, LineStatus::Failed);

        assert_eq!(
            events.last(),
            Some(&FulfillmentEvent::Closed(Closure::Failed {
                line: 3,
                name: "Muffin".to_string()
            }))
        );
        assert!(!fulfillment.is_open());

        let rejected = fulfillment.update_item(ItemStatusUpdate::new(1, LineStatus::Completed));
        assert_eq!(rejected, Err(FulfillmentError::Closed));
    }

    #[test]
    fn test_invalid_line_is_rejected() {
        let fulfillment = kitchen();

        assert_eq!(
            fulfillment.update_item(ItemStatusUpdate::new(0, LineStatus::Started)),
            Err(FulfillmentError::InvalidLine {
                line: 0,
                line_count: 3
            })
        );
        assert_eq!(
            fulfillment.update_item(ItemStatusUpdate::new(4, LineStatus::Started)),
            Err(FulfillmentError::InvalidLine {
                line: 4,
                line_count: 3
            })
        );
    }

    #[test]
    fn test_terminal_lines_never_revert() {
        let mut fulfillment = kitchen();
        update(&mut fulfillment, 1, LineStatus::Completed);

        assert_eq!(
            fulfillment.update_item(ItemStatusUpdate::new(1, LineStatus::Started)),
            Err(FulfillmentError::InvalidTransition {
                line: 1,
                from: LineStatus::Completed,
                to: LineStatus::Started
            })
        );
        assert!(matches!(
            fulfillment.update_item(ItemStatusUpdate::new(2, LineStatus::Pending)),
            Err(FulfillmentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_pending_update_on_pending_line_is_rejected() {
        let fulfillment = kitchen();

        assert_eq!(
            fulfillment.update_item(ItemStatusUpdate::new(1, LineStatus::Pending)),
            Err(FulfillmentError::InvalidTransition {
                line: 1,
                from: LineStatus::Pending,
                to: LineStatus::Pending
            })
        );
    }

    #[test]
    fn test_cancel() {
        let mut fulfillment = kitchen();
        let events = fulfillment.cancel();
        assert_eq!(events, vec![FulfillmentEvent::Closed(Closure::Canceled)]);

        fulfillment.apply_events(events);
        assert!(!fulfillment.is_open());
        assert!(!fulfillment.closure().unwrap().is_failure());
        assert!(fulfillment.cancel().is_empty());
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut fulfillment = kitchen();
        let mut history = vec![fulfillment.opened()];
        history.extend(update(&mut fulfillment, 1, LineStatus::Started));
        history.extend(update(&mut fulfillment, 2, LineStatus::Failed));

        let replayed = Fulfillment::replay(history).unwrap();
        assert_eq!(replayed, fulfillment);
    }

    #[test]
    fn test_replay_requires_opened_first() {
        assert!(Fulfillment::replay(vec![FulfillmentEvent::FulfillmentStarted]).is_none());
        assert!(Fulfillment::replay(Vec::new()).is_none());
    }
}
