//! Rule execution engine
//!
//! Every rule runs as its own task: it follows its condition through a
//! [`ConditionWatch`] and runs its actions on each false to true edge.

use dashmap::DashMap;
use hub_status::Status;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{AutomationError, AutomationResult};
use crate::rule::Rule;
use crate::watcher::ConditionWatch;

struct RunningRule {
    task: JoinHandle<()>,
    fired: Arc<AtomicU64>,
}

/// Runs rules against a status tree
pub struct RuleEngine {
    status: Status,
    rules: DashMap<String, RunningRule>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RuleEngine {
    /// Create an engine with no rules
    pub fn new(status: Status) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            status,
            rules: DashMap::new(),
            shutdown_tx,
        }
    }

    /// Start following a rule
    ///
    /// Watches are registered before this returns, so writes made after it
    /// are seen by the rule. Must be called within a tokio runtime.
    pub fn add(&self, rule: Rule) -> AutomationResult<()> {
        if self.rules.contains_key(&rule.name) {
            return Err(AutomationError::DuplicateRule(rule.name));
        }

        let watch = ConditionWatch::new(&self.status, rule.condition.clone())?;
        let fired = Arc::new(AtomicU64::new(0));
        let name = rule.name.clone();

        let task = tokio::spawn(run_rule(
            rule,
            watch,
            self.status.clone(),
            fired.clone(),
            self.shutdown_tx.subscribe(),
        ));

        info!(rule = %name, "Rule started");
        self.rules.insert(name, RunningRule { task, fired });
        Ok(())
    }

    /// Stop and forget a rule
    pub fn remove(&self, name: &str) -> AutomationResult<()> {
        let (_, running) = self
            .rules
            .remove(name)
            .ok_or_else(|| AutomationError::RuleNotFound(name.to_string()))?;
        running.task.abort();
        info!(rule = %name, "Rule removed");
        Ok(())
    }

    /// Number of times a rule has fired
    pub fn fired_count(&self, name: &str) -> Option<u64> {
        self.rules
            .get(name)
            .map(|running| running.fired.load(Ordering::SeqCst))
    }

    /// Names of all registered rules
    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }

    /// Signal every rule task to stop
    pub fn stop(&self) {
        info!(rules = self.rules.len(), "Stopping rule engine");
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for RuleEngine {
    fn drop(&mut self) {
        for running in self.rules.iter() {
            running.task.abort();
        }
    }
}

async fn run_rule(
    rule: Rule,
    mut watch: ConditionWatch,
    status: Status,
    fired: Arc<AtomicU64>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    // The initial value only arms the rule; it does not fire it
    let mut armed = watch.changed().await == Some(false);

    loop {
        tokio::select! {
            changed = watch.changed() => match changed {
                Some(true) if armed => {
                    armed = false;
                    fired.fetch_add(1, Ordering::SeqCst);
                    run_actions(&rule, &status).await;
                }
                Some(true) => {}
                Some(false) => armed = true,
                None => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }

    debug!(rule = %rule.name, "Rule task finished");
}

async fn run_actions(rule: &Rule, status: &Status) {
    info!(rule = %rule.name, "Rule fired");
    for action in &rule.actions {
        match action.run(status).await {
            Ok(()) => {}
            // A newer value already exists; drop this write
            Err(err) if err.is_conflict() => {
                warn!(
                    rule = %rule.name,
                    action = %action.describe(),
                    error = %err,
                    "Action lost revision check"
                );
            }
            Err(err) => {
                error!(
                    rule = %rule.name,
                    action = %action.describe(),
                    error = %err,
                    "Action failed"
                );
                break;
            }
        }
    }
}
