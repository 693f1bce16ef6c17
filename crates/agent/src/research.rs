//! Lead-research wrapper around the generic loop.
//!
//! [`ResearchController`] turns a product description and a lead target
//! into a configured [`ReactLoop`]:
//!
//! - the system prompt carries the expected action order and the quality
//!   bar for saving a lead (guidance only, nothing is enforced);
//! - the raw iteration cap is the logical search budget multiplied by the
//!   steps one search round normally takes;
//! - a [`GoalTracker`] watches observations, counts saved leads, and cancels
//!   the run once the target is met or `complete_task` reports completion.
//!
//! A `complete_task` action is registered automatically if the caller's
//! catalog does not provide one.

use async_trait::async_trait;
use scoutloop_config::{AppConfig, ResearchConfig};
use scoutloop_core::provider::Provider;
use scoutloop_core::{
    Action, ActionCatalog, ActionError, ActionInput, ActionOutput, Step, StepKind, Termination,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::react::{ReactLoop, StepObserver, StepStream};

/// Observation text that means one lead was stored.
pub const SUCCESS_MARKERS: [&str; 2] = [r#""status": "saved""#, "Saved lead successfully"];

/// Observation text that means the model declared the task complete.
pub const COMPLETION_MARKER: &str = r#""task_completed": true"#;

pub const COMPLETE_TASK: &str = "complete_task";

/// The order a research round is expected to follow, with a hint per action.
pub const EXPECTED_CALL_ORDER: [(&str, &str); 8] = [
    ("extract_icp", "once, at the start, to derive the ideal customer profile"),
    ("generate_search_queries", "turn the profile into search queries"),
    ("searxng_search", "run the queries"),
    ("normalize_candidates", "deduplicate and clean the search hits"),
    ("firecrawl_enrich", "fetch details for promising candidates"),
    ("score_company", "score each enriched candidate"),
    ("save_lead_tool", "save candidates that pass the quality bar"),
    (COMPLETE_TASK, "finish the run"),
];

/// What the research run is trying to achieve.
#[derive(Debug, Clone)]
pub struct ResearchGoal {
    pub product_description: String,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub target_count: usize,
    /// Logical search rounds; each allows `steps_per_iteration` model calls.
    pub max_search_iterations: usize,
}

impl ResearchGoal {
    pub fn new(product_description: impl Into<String>) -> Self {
        let defaults = ResearchConfig::default();
        Self {
            product_description: product_description.into(),
            product_id: None,
            product_name: None,
            target_count: defaults.target_count,
            max_search_iterations: defaults.max_search_iterations,
        }
    }

    /// Zero disables the target stop.
    pub fn with_target(mut self, target: usize) -> Self {
        self.target_count = target;
        self
    }

    pub fn with_budget(mut self, search_iterations: usize) -> Self {
        self.max_search_iterations = search_iterations;
        self
    }

    pub fn with_product(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.product_id = Some(id.into());
        self.product_name = name;
        self
    }

    fn task(&self) -> String {
        let mut task = format!(
            "Find and save {} high-quality leads for this product: {}",
            self.target_count, self.product_description
        );
        if let Some(name) = &self.product_name {
            task.push_str(&format!(" (product name: {name})"));
        }
        task
    }
}

/// Why a research run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    TaskCompleted,
    BudgetExhausted,
    Cancelled,
    Answered,
    Failed,
}

impl StopReason {
    fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::Answered => Self::Answered,
            Termination::Cancelled => Self::Cancelled,
            Termination::IterationCap => Self::BudgetExhausted,
            Termination::ModelFailure => Self::Failed,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    saved: usize,
    stop: Option<StopReason>,
}

/// Counts saved leads in observations and cancels the run when the goal is
/// met. A target of zero means no target: only the completion marker stops
/// the run.
pub struct GoalTracker {
    target: usize,
    cancel: CancellationToken,
    state: Mutex<TrackerState>,
}

impl GoalTracker {
    /// `cancel` is the token of the run being tracked.
    pub fn new(target: usize, cancel: CancellationToken) -> Self {
        Self {
            target,
            cancel,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn saved(&self) -> usize {
        self.lock().saved
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Set once the tracker has asked the run to stop.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.lock().stop
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn request_stop(&self, state: &mut TrackerState, reason: StopReason) {
        if state.stop.is_none() {
            info!(saved = state.saved, target = self.target, reason = ?reason, "Research goal met, stopping run");
            state.stop = Some(reason);
            self.cancel.cancel();
        }
    }
}

impl StepObserver for GoalTracker {
    fn on_step(&self, step: &Step) {
        if step.kind != StepKind::Observation {
            return;
        }

        let mut state = self.lock();
        if SUCCESS_MARKERS.iter().any(|m| step.content.contains(m)) {
            state.saved += 1;
            info!(saved = state.saved, target = self.target, "Lead saved");
        }

        if self.target > 0 && state.saved >= self.target {
            self.request_stop(&mut state, StopReason::TargetReached);
        } else if step.content.contains(COMPLETION_MARKER) {
            self.request_stop(&mut state, StopReason::TaskCompleted);
        }
    }
}

/// Built-in action that lets the model declare the research finished.
pub struct CompleteTaskAction;

#[async_trait]
impl Action for CompleteTaskAction {
    fn name(&self) -> &str {
        COMPLETE_TASK
    }

    fn description(&self) -> &str {
        "Mark the research as finished. Input: {\"total_leads_found\": int, \"quality_leads_saved\": int, \"summary_message\": str}"
    }

    async fn invoke(&self, input: ActionInput) -> Result<ActionOutput, ActionError> {
        let count = |key: &str| input.get(key).and_then(Value::as_u64).unwrap_or(0);
        let message = input
            .get("summary_message")
            .and_then(Value::as_str)
            .unwrap_or("Research complete.");

        Ok(ActionOutput::Structured(json!({
            "status": "complete",
            "total_found": count("total_leads_found"),
            "quality_saved": count("quality_leads_saved"),
            "message": message,
            "task_completed": true,
        })))
    }
}

/// Tuning knobs for the research prompt and budget.
#[derive(Debug, Clone)]
pub struct ResearchPolicy {
    pub steps_per_iteration: usize,
    pub min_score: u32,
}

impl Default for ResearchPolicy {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for ResearchPolicy {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            steps_per_iteration: config.steps_per_iteration,
            min_score: config.min_score,
        }
    }
}

/// Configures and runs lead-research loops.
pub struct ResearchController {
    react: ReactLoop,
    goal: ResearchGoal,
}

impl ResearchController {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        catalog: ActionCatalog,
        goal: ResearchGoal,
        policy: ResearchPolicy,
    ) -> Self {
        let catalog = Arc::new(with_complete_task(catalog));
        let react = ReactLoop::new(provider, model, Arc::new(Dispatcher::new(catalog)));
        Self::configure(react, goal, &policy)
    }

    /// Model settings, redactions and research defaults from the config.
    /// Goal fields set by the caller are kept.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        config: &AppConfig,
        catalog: ActionCatalog,
        goal: ResearchGoal,
    ) -> Self {
        let catalog = Arc::new(with_complete_task(catalog));
        let dispatcher = Dispatcher::from_config(catalog, &config.dispatcher);
        let react = ReactLoop::from_config(provider, config, Arc::new(dispatcher));
        Self::configure(react, goal, &ResearchPolicy::from(&config.research))
    }

    fn configure(react: ReactLoop, goal: ResearchGoal, policy: &ResearchPolicy) -> Self {
        let cap = goal
            .max_search_iterations
            .saturating_mul(policy.steps_per_iteration);
        let system_prompt = research_system_prompt(&goal, policy, react.dispatcher().catalog());
        let react = react
            .with_max_iterations(cap)
            .with_system_prompt(system_prompt);
        Self { react, goal }
    }

    pub fn goal(&self) -> &ResearchGoal {
        &self.goal
    }

    pub fn react(&self) -> &ReactLoop {
        &self.react
    }

    /// Model calls allowed before the run is cut off.
    pub fn raw_iteration_cap(&self) -> usize {
        self.react.max_iterations()
    }

    /// Start a streamed run. Cancelling `cancel` stops it at the next
    /// iteration boundary; so does reaching the goal.
    pub fn start(&self, cancel: CancellationToken) -> ResearchRun {
        let run_token = cancel.child_token();
        let tracker = Arc::new(GoalTracker::new(self.goal.target_count, run_token.clone()));

        info!(
            target = self.goal.target_count,
            budget = self.goal.max_search_iterations,
            cap = self.raw_iteration_cap(),
            product_id = ?self.goal.product_id,
            "Research run starting"
        );

        let steps = self
            .react
            .start(self.goal.task(), run_token)
            .with_observer(tracker.clone())
            .stream();

        ResearchRun {
            steps,
            tracker,
            steps_seen: 0,
            last: None,
        }
    }

    /// Run to completion, discarding intermediate steps.
    pub async fn run(&self, cancel: CancellationToken) -> ResearchOutcome {
        self.start(cancel).finish().await
    }
}

/// A research run in progress.
pub struct ResearchRun {
    steps: StepStream,
    tracker: Arc<GoalTracker>,
    steps_seen: usize,
    last: Option<Step>,
}

impl ResearchRun {
    /// The next step, or `None` once the run has ended.
    pub async fn next_step(&mut self) -> Option<Step> {
        let step = self.steps.next().await?;
        self.steps_seen += 1;
        if step.is_terminal() {
            self.last = Some(step.clone());
        }
        Some(step)
    }

    pub fn tracker(&self) -> &GoalTracker {
        &self.tracker
    }

    /// Drain the remaining steps and summarize.
    pub async fn finish(mut self) -> ResearchOutcome {
        while self.next_step().await.is_some() {}

        let (final_text, termination) = match &self.last {
            Some(step) => (
                step.content.clone(),
                step.termination.unwrap_or(Termination::ModelFailure),
            ),
            None => (String::new(), Termination::ModelFailure),
        };

        let stop_reason = self
            .tracker
            .stop_reason()
            .unwrap_or_else(|| StopReason::from_termination(termination));

        let outcome = ResearchOutcome {
            saved: self.tracker.saved(),
            target: self.tracker.target(),
            stop_reason,
            final_text,
            steps_seen: self.steps_seen,
        };
        info!(
            saved = outcome.saved,
            target = outcome.target,
            stop_reason = ?outcome.stop_reason,
            "Research run finished"
        );
        outcome
    }
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub saved: usize,
    pub target: usize,
    pub stop_reason: StopReason,
    /// Content of the terminal step.
    pub final_text: String,
    pub steps_seen: usize,
}

fn with_complete_task(mut catalog: ActionCatalog) -> ActionCatalog {
    if !catalog.contains(COMPLETE_TASK) {
        catalog.register(Arc::new(CompleteTaskAction));
    }
    catalog
}

fn research_system_prompt(goal: &ResearchGoal, policy: &ResearchPolicy, catalog: &ActionCatalog) -> String {
    let mut prompt = String::from(
        "You are a lead research controller. Your job is to find companies that match the product's ideal customer profile and save the good ones as leads.\n\n",
    );

    prompt.push_str("Expected call order (follow it unless an observation gives you a reason not to):\n");
    let mut n = 0;
    for (name, hint) in EXPECTED_CALL_ORDER {
        if catalog.contains(name) {
            n += 1;
            prompt.push_str(&format!("{n}. {name}: {hint}\n"));
        }
    }

    prompt.push_str(&format!(
        "\nQuality bar: only save a company when score_company returns a score of at least {} and a fit label of \"high\".\n\
         \nWhen to finish:\n\
         - after saving {} qualified leads, call {COMPLETE_TASK}\n\
         - after {} search rounds, call {COMPLETE_TASK} even if short of the target\n\
         \nCurrent task:\n\
         - Product: {}\n\
         - Target: {} qualified leads\n\
         - Search rounds available: {}\n",
        policy.min_score,
        goal.target_count,
        goal.max_search_iterations,
        goal.product_description,
        goal.target_count,
        goal.max_search_iterations,
    ));

    if let Some(id) = goal.product_id.as_deref().filter(|id| *id != "default") {
        let name = goal.product_name.as_deref().unwrap_or(id);
        prompt.push_str(&format!(
            "\nPRODUCT CONTEXT: you are researching leads for \"{name}\" (product_id: {id}). Always pass \"product_id\": \"{id}\" to save_lead_tool.\n"
        ));
    }

    prompt
}
