//! Event loop that turns watch deliveries into condition values
//!
//! Each leaf condition owns one watch on the status tree. All receivers are
//! fanned into a single stream with `select_all`, so one task can follow an
//! arbitrary number of patterns.

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use hub_core::Matches;
use hub_status::{Status, WatchReceiver};
use tracing::trace;

use crate::condition::{CompiledTest, Condition};
use crate::error::AutomationResult;

/// Live evaluation of a [`Condition`]
///
/// Dropping the watch releases every underlying status watch.
pub struct ConditionWatch {
    condition: Condition,
    tests: Vec<CompiledTest>,
    results: Vec<bool>,
    events: SelectAll<BoxStream<'static, (usize, Matches)>>,
    reported: Option<bool>,
}

impl ConditionWatch {
    /// Register watches for every leaf of `condition`
    ///
    /// The initial value is computed before returning.
    pub fn new(status: &Status, condition: Condition) -> AutomationResult<Self> {
        condition.validate()?;

        let mut tests = Vec::new();
        let mut results = Vec::new();
        let mut events = SelectAll::new();

        for (index, leaf) in condition.leaves().into_iter().enumerate() {
            let test = CompiledTest::compile(&leaf.test)?;
            let mut receiver = status.watch(&leaf.url)?;
            let initial = receiver.try_recv().unwrap_or_default();
            results.push(test.check_all(&initial));
            tests.push(test);
            events.push(leaf_events(index, receiver));
        }

        Ok(Self {
            condition,
            tests,
            results,
            events,
            reported: None,
        })
    }

    /// Current value of the condition
    pub fn value(&self) -> bool {
        let mut leaf = 0;
        self.condition.evaluate(&self.results, &mut leaf)
    }

    /// Wait until the condition's value changes
    ///
    /// The first call returns the initial value immediately. Returns None
    /// once every underlying watch has been released.
    pub async fn changed(&mut self) -> Option<bool> {
        if self.reported.is_none() {
            let value = self.value();
            self.reported = Some(value);
            return Some(value);
        }

        loop {
            let (index, matches) = self.events.next().await?;
            self.results[index] = self.tests[index].check_all(&matches);

            let value = self.value();
            trace!(leaf = index, value, "Condition input changed");
            if self.reported != Some(value) {
                self.reported = Some(value);
                return Some(value);
            }
        }
    }
}

fn leaf_events(index: usize, receiver: WatchReceiver) -> BoxStream<'static, (usize, Matches)> {
    stream::unfold(receiver, |mut receiver| async move {
        let matches = receiver.recv().await?;
        Some((matches, receiver))
    })
    .map(move |matches| (index, matches))
    .boxed()
}
