//! ReAct loop driver: Thought → Action → Observation until an answer.
//!
//! Each iteration rebuilds the prompt from the transcript, asks the model
//! for one reply (stopping before it can invent an `Observation:`), parses
//! the reply, and if it named an action, dispatches it and records the
//! result.
//!
//! # Termination
//!
//! Every run ends with exactly one terminal [`Step`]:
//!
//! - **Answered**: the model replied with `Final Answer:`
//! - **Cancelled**: the token fired, or a streaming consumer went away
//! - **IterationCap**: `max_iterations` model calls were made
//! - **ModelFailure**: the model call itself failed
//!
//! Cancellation is observed at the top of each iteration, before the cap
//! check; an in-flight model call or action is allowed to finish.
//!
//! # Delivery
//!
//! [`LoopRun::run`] collects steps into a [`ReactOutcome`];
//! [`LoopRun::stream`] spawns the loop and yields steps as they happen.
//! Both share one driver, so the step sequences are identical. A
//! [`StepObserver`] sees every step before the consumer does.

use scoutloop_config::{AgentConfig, AppConfig};
use scoutloop_core::error::ProviderError;
use scoutloop_core::provider::{Provider, ProviderRequest};
use scoutloop_core::{Step, Termination};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::parser::{ParseResult, parse};
use crate::prompt::{PriorTurn, PromptBuilder};
use crate::transcript::Transcript;

/// Content of the terminal step when a run is cancelled.
pub const CANCELLED_NOTICE: &str = "Task cancelled by user";

const COMPLETION_NOTE: &str = "Task marked as complete. Provide Final Answer now.";
const DEFAULT_STREAM_CAPACITY: usize = 32;

/// Receives every step synchronously, in emission order, before it is
/// delivered to the consumer.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, step: &Step);
}

impl<F> StepObserver for F
where
    F: Fn(&Step) + Send + Sync,
{
    fn on_step(&self, step: &Step) {
        self(step)
    }
}

/// A stream of steps from a spawned run.
pub type StepStream = ReceiverStream<Step>;

/// The task for one run, plus optional earlier conversation turns.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub task: String,
    pub history: Vec<PriorTurn>,
}

impl RunRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<PriorTurn>) -> Self {
        self.history = history;
        self
    }
}

impl From<&str> for RunRequest {
    fn from(task: &str) -> Self {
        Self::new(task)
    }
}

impl From<String> for RunRequest {
    fn from(task: String) -> Self {
        Self::new(task)
    }
}

/// The result of a collected run.
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    /// Content of the terminal step.
    pub answer: String,
    pub termination: Termination,
    /// Every emitted step, terminal step last.
    pub steps: Vec<Step>,
    /// Model calls made.
    pub iterations: usize,
    pub actions_taken: usize,
}

/// A configured ReAct loop. Cheap to clone; each [`start`](Self::start)
/// creates an independent run.
#[derive(Clone)]
pub struct ReactLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    dispatcher: Arc<Dispatcher>,
    prompt: Arc<PromptBuilder>,
    max_iterations: usize,
    stop_sequences: Vec<String>,
    completion_sentinel: String,
    stream_capacity: usize,
}

impl ReactLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            dispatcher,
            prompt: Arc::new(PromptBuilder::default()),
            max_iterations: defaults.max_iterations,
            stop_sequences: defaults.stop_sequences,
            completion_sentinel: defaults.completion_sentinel,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    /// Model, sampling and loop limits from the application config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        config: &AppConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self::new(provider, &config.model, dispatcher)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_stop_sequences(config.agent.stop_sequences.clone())
            .with_completion_sentinel(&config.agent.completion_sentinel)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the iteration cap. Zero means the run ends immediately with a
    /// cap notice.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Replace the stop sequences. An empty list is ignored: the model must
    /// always be stopped before it writes its own observation.
    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        if stop.is_empty() {
            warn!("Ignoring empty stop sequence list");
        } else {
            self.stop_sequences = stop;
        }
        self
    }

    pub fn with_completion_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.completion_sentinel = sentinel.into();
        self.prompt = Arc::new(
            self.prompt
                .as_ref()
                .clone()
                .with_completion_sentinel(self.completion_sentinel.clone()),
        );
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.prompt = Arc::new(self.prompt.as_ref().clone().with_system_prompt(system_prompt));
        self
    }

    /// Use a custom prompt builder. Its sentinel is replaced by the loop's.
    pub fn with_prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = Arc::new(prompt.with_completion_sentinel(self.completion_sentinel.clone()));
        self
    }

    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Prepare a run. Nothing happens until it is collected or streamed.
    pub fn start(&self, request: impl Into<RunRequest>, cancel: CancellationToken) -> LoopRun {
        LoopRun {
            id: Uuid::new_v4(),
            engine: self.clone(),
            request: request.into(),
            cancel,
            observer: None,
            transcript: Transcript::new(),
            iterations: 0,
            actions_taken: 0,
        }
    }

    /// Run to completion and collect every step.
    pub async fn run(
        &self,
        request: impl Into<RunRequest>,
        cancel: CancellationToken,
    ) -> ReactOutcome {
        self.start(request, cancel).run().await
    }

    /// Spawn a run and stream its steps.
    pub fn run_stream(
        &self,
        request: impl Into<RunRequest>,
        cancel: CancellationToken,
    ) -> StepStream {
        self.start(request, cancel).stream()
    }
}

/// One in-progress execution. Owns its transcript and counters; nothing is
/// shared with other runs except the read-only configuration.
pub struct LoopRun {
    id: Uuid,
    engine: ReactLoop,
    request: RunRequest,
    cancel: CancellationToken,
    observer: Option<Arc<dyn StepObserver>>,
    transcript: Transcript,
    iterations: usize,
    actions_taken: usize,
}

impl LoopRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run(mut self) -> ReactOutcome {
        let mut emitter = Emitter::new(Delivery::Collect(Vec::new()), self.observer.clone());
        let (answer, termination) = self.drive(&mut emitter).await;
        ReactOutcome {
            answer,
            termination,
            steps: emitter.into_steps(),
            iterations: self.iterations,
            actions_taken: self.actions_taken,
        }
    }

    pub fn stream(mut self) -> StepStream {
        let (tx, rx) = mpsc::channel(self.engine.stream_capacity);
        let observer = self.observer.clone();
        tokio::spawn(async move {
            let mut emitter = Emitter::new(Delivery::Channel(tx), observer);
            self.drive(&mut emitter).await;
        });
        ReceiverStream::new(rx)
    }

    async fn drive(&mut self, emitter: &mut Emitter) -> (String, Termination) {
        info!(
            run_id = %self.id,
            model = %self.engine.model,
            max_iterations = self.engine.max_iterations,
            actions = self.engine.dispatcher.catalog().len(),
            "ReAct run starting"
        );

        let (answer, termination) = loop {
            if self.cancel.is_cancelled() || emitter.consumer_gone {
                break self.finish(emitter, CANCELLED_NOTICE.into(), Termination::Cancelled).await;
            }

            if self.iterations >= self.engine.max_iterations {
                warn!(run_id = %self.id, max = self.engine.max_iterations, "Iteration cap reached");
                let notice = format!(
                    "I've reached the maximum number of reasoning steps ({}). Stopping with the progress made so far.",
                    self.engine.max_iterations
                );
                break self.finish(emitter, notice, Termination::IterationCap).await;
            }

            self.iterations += 1;
            debug!(run_id = %self.id, iteration = self.iterations, "ReAct iteration");

            let reply = match self.complete().await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(run_id = %self.id, error = %e, "Model call failed");
                    let content = model_failure_message(&e);
                    emitter.emit(Step::error(content.clone())).await;
                    break (content, Termination::ModelFailure);
                }
            };

            match parse(reply.trim()) {
                ParseResult::FinalAnswer(answer) => {
                    break self.finish(emitter, answer, Termination::Answered).await;
                }
                ParseResult::Action {
                    thought,
                    name,
                    input,
                } => {
                    if !thought.is_empty() {
                        emitter.emit(Step::thought(thought.clone())).await;
                    }
                    emitter.emit(Step::action(name.clone(), input.clone())).await;
                    self.actions_taken += 1;

                    let observation = self.engine.dispatcher.execute(&name, input.clone()).await;
                    emitter
                        .emit(Step::observation(name.clone(), observation.text.clone()))
                        .await;

                    self.transcript
                        .record_exchange(&thought, &name, &input, &observation.text);
                    if observation.text.contains(&self.engine.completion_sentinel) {
                        info!(run_id = %self.id, action = %name, "Completion sentinel observed");
                        self.transcript.record_system_note(COMPLETION_NOTE);
                    }
                }
                ParseResult::Thought(thought) => {
                    emitter.emit(Step::thought(thought.clone())).await;
                    self.transcript.record_thought(&thought);
                }
                ParseResult::Unrecognized(raw) => {
                    warn!(run_id = %self.id, chars = raw.len(), "Unrecognized model reply");
                    self.transcript.record_raw(&raw);
                }
            }
        };

        info!(
            run_id = %self.id,
            iterations = self.iterations,
            actions = self.actions_taken,
            termination = ?termination,
            "ReAct run finished"
        );
        (answer, termination)
    }

    async fn complete(&self) -> Result<String, ProviderError> {
        let prompt = self.engine.prompt.build(
            self.engine.dispatcher.catalog(),
            &self.request.task,
            &self.request.history,
            &self.transcript,
        );
        let request = ProviderRequest {
            model: self.engine.model.clone(),
            prompt,
            temperature: self.engine.temperature,
            max_tokens: self.engine.max_tokens,
            stop: self.engine.stop_sequences.clone(),
        };
        self.engine
            .provider
            .complete(request)
            .await
            .map(|response| response.text)
    }

    async fn finish(
        &self,
        emitter: &mut Emitter,
        content: String,
        termination: Termination,
    ) -> (String, Termination) {
        emitter
            .emit(Step::final_answer(content.clone(), termination))
            .await;
        (content, termination)
    }
}

fn model_failure_message(error: &ProviderError) -> String {
    if error.is_context_length() {
        format!(
            "Context length exceeded: the conversation no longer fits in the model's context window.\n\n\
             Error: {error}\n\n\
             Start a new run with fewer prior turns instead of retrying this one."
        )
    } else {
        format!("Model error: {error}")
    }
}

enum Delivery {
    Collect(Vec<Step>),
    Channel(mpsc::Sender<Step>),
}

/// The single emission path shared by collected and streamed runs.
struct Emitter {
    delivery: Delivery,
    observer: Option<Arc<dyn StepObserver>>,
    consumer_gone: bool,
}

impl Emitter {
    fn new(delivery: Delivery, observer: Option<Arc<dyn StepObserver>>) -> Self {
        Self {
            delivery,
            observer,
            consumer_gone: false,
        }
    }

    async fn emit(&mut self, step: Step) {
        if let Some(observer) = &self.observer {
            observer.on_step(&step);
        }
        match &mut self.delivery {
            Delivery::Collect(steps) => steps.push(step),
            Delivery::Channel(tx) => {
                if tx.send(step).await.is_err() && !self.consumer_gone {
                    debug!("Step consumer dropped, run will stop");
                    self.consumer_gone = true;
                }
            }
        }
    }

    fn into_steps(self) -> Vec<Step> {
        match self.delivery {
            Delivery::Collect(steps) => steps,
            Delivery::Channel(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, StaticAction};
    use scoutloop_core::{ActionCatalog, StepKind};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    fn react(provider: Arc<ScriptedProvider>, catalog: ActionCatalog) -> ReactLoop {
        ReactLoop::new(provider, "mock-model", Arc::new(Dispatcher::new(Arc::new(catalog))))
            .with_prompt_builder(PromptBuilder::default().without_time())
    }

    fn kinds(steps: &[Step]) -> Vec<StepKind> {
        steps.iter().map(|s| s.kind).collect()
    }

    fn count(steps: &[Step], kind: StepKind) -> usize {
        steps.iter().filter(|s| s.kind == kind).count()
    }

    #[tokio::test]
    async fn direct_final_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Final Answer: 4"]));
        let outcome = react(provider.clone(), ActionCatalog::new())
            .run("What is 2+2?", CancellationToken::new())
            .await;

        assert_eq!(outcome.answer, "4");
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].kind, StepKind::FinalAnswer);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.actions_taken, 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn action_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Thought: look it up\nAction: lookup\nAction Input: {\"q\": \"rust\"}",
            "Thought: got it\nFinal Answer: Rust is a language",
        ]));
        let catalog =
            ActionCatalog::new().with(StaticAction::structured("lookup", json!({"hit": "language"})));
        let outcome = react(provider.clone(), catalog)
            .run("What is Rust?", CancellationToken::new())
            .await;

        assert_eq!(
            kinds(&outcome.steps),
            vec![
                StepKind::Thought,
                StepKind::Action,
                StepKind::Observation,
                StepKind::FinalAnswer
            ]
        );
        assert_eq!(outcome.steps[1].action_name.as_deref(), Some("lookup"));
        assert_eq!(
            outcome.steps[1].action_input.as_ref().and_then(|i| i.get("q")),
            Some(&json!("rust"))
        );
        assert!(outcome.steps[2].content.contains("\"hit\": \"language\""));
        assert_eq!(outcome.answer, "Rust is a language");
        assert_eq!(outcome.actions_taken, 1);

        // The second prompt carries the first exchange.
        let prompts = provider.prompts();
        assert!(!prompts[0].contains("Action: lookup"));
        assert!(prompts[1].contains("Action: lookup\nAction Input: {\"q\":\"rust\"}\nObservation: {"));
    }

    #[tokio::test]
    async fn every_request_carries_stop_sequences() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Thought: thinking",
            "Final Answer: done",
        ]));
        react(provider.clone(), ActionCatalog::new())
            .run("t", CancellationToken::new())
            .await;

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        for request in requests {
            assert_eq!(request.stop, vec!["Observation:", "\nObservation"]);
            assert_eq!(request.model, "mock-model");
        }
    }

    #[test]
    fn new_loop_uses_agent_config_defaults() {
        let defaults = AgentConfig::default();
        let react = react(Arc::new(ScriptedProvider::repeating("x")), ActionCatalog::new());
        assert_eq!(react.max_iterations(), defaults.max_iterations);
        assert_eq!(react.stop_sequences, defaults.stop_sequences);
        assert_eq!(react.completion_sentinel, defaults.completion_sentinel);
    }

    #[tokio::test]
    async fn empty_stop_list_is_ignored() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Final Answer: ok"]));
        react(provider.clone(), ActionCatalog::new())
            .with_stop_sequences(vec![])
            .run("t", CancellationToken::new())
            .await;
        assert_eq!(provider.requests()[0].stop.len(), 2);
    }

    #[tokio::test]
    async fn iteration_cap_counts_model_calls() {
        let provider = Arc::new(ScriptedProvider::repeating("Thought: still thinking"));
        let outcome = react(provider.clone(), ActionCatalog::new())
            .with_max_iterations(3)
            .run("t", CancellationToken::new())
            .await;

        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.termination, Termination::IterationCap);
        assert!(outcome.answer.contains("maximum number of reasoning steps (3)"));
        assert_eq!(
            kinds(&outcome.steps),
            vec![
                StepKind::Thought,
                StepKind::Thought,
                StepKind::Thought,
                StepKind::FinalAnswer
            ]
        );
    }

    #[tokio::test]
    async fn endless_actions_stop_at_cap_with_paired_observations() {
        let provider = Arc::new(ScriptedProvider::repeating(
            "Thought: again\nAction: ping\nAction Input: {}",
        ));
        let catalog = ActionCatalog::new().with(StaticAction::text("ping", "", "pong"));
        let outcome = react(provider.clone(), catalog)
            .with_max_iterations(4)
            .run("t", CancellationToken::new())
            .await;

        assert_eq!(provider.call_count(), 4);
        assert_eq!(outcome.actions_taken, 4);
        assert_eq!(count(&outcome.steps, StepKind::Action), 4);
        assert_eq!(count(&outcome.steps, StepKind::Observation), 4);
        assert_eq!(outcome.steps.iter().filter(|s| s.is_terminal()).count(), 1);
        assert_eq!(outcome.termination, Termination::IterationCap);
        assert_eq!(outcome.steps.last().map(|s| s.kind), Some(StepKind::FinalAnswer));
    }

    #[tokio::test]
    async fn zero_iterations_ends_immediately() {
        let provider = Arc::new(ScriptedProvider::repeating("Final Answer: never"));
        let outcome = react(provider.clone(), ActionCatalog::new())
            .with_max_iterations(0)
            .run("t", CancellationToken::new())
            .await;
        assert_eq!(provider.call_count(), 0);
        assert_eq!(outcome.termination, Termination::IterationCap);
        assert_eq!(outcome.steps.len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_replies_emit_nothing() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Sure, happy to help!",
            "Final Answer: ok",
        ]));
        let outcome = react(provider.clone(), ActionCatalog::new())
            .run("t", CancellationToken::new())
            .await;
        assert_eq!(kinds(&outcome.steps), vec![StepKind::FinalAnswer]);
        assert_eq!(outcome.iterations, 2);
        assert!(provider.prompts()[1].contains("Sure, happy to help!"));
    }

    #[tokio::test]
    async fn pre_cancelled_run_calls_nothing() {
        let provider = Arc::new(ScriptedProvider::repeating("Final Answer: x"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = react(provider.clone(), ActionCatalog::new())
            .run("t", cancel)
            .await;

        assert_eq!(provider.call_count(), 0);
        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.answer, CANCELLED_NOTICE);
        assert_eq!(outcome.steps.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_wins_over_cap() {
        let provider = Arc::new(ScriptedProvider::repeating("Final Answer: x"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = react(provider, ActionCatalog::new())
            .with_max_iterations(0)
            .run("t", cancel)
            .await;
        assert_eq!(outcome.termination, Termination::Cancelled);
    }

    #[tokio::test]
    async fn cancel_from_observer_stops_before_next_iteration() {
        let provider = Arc::new(ScriptedProvider::repeating(
            "Thought: again\nAction: ping\nAction Input: {}",
        ));
        let catalog = ActionCatalog::new().with(StaticAction::text("ping", "", "pong"));
        let cancel = CancellationToken::new();
        let observations = Arc::new(Mutex::new(0usize));

        let observer = {
            let cancel = cancel.clone();
            let observations = observations.clone();
            move |step: &Step| {
                if step.kind == StepKind::Observation {
                    let mut n = observations.lock().unwrap();
                    *n += 1;
                    if *n == 2 {
                        cancel.cancel();
                    }
                }
            }
        };

        let outcome = react(provider.clone(), catalog)
            .start("t", cancel)
            .with_observer(Arc::new(observer))
            .run()
            .await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(*observations.lock().unwrap(), 2);
        assert_eq!(count(&outcome.steps, StepKind::Action), 2);
        assert_eq!(count(&outcome.steps, StepKind::Observation), 2);
        assert_eq!(outcome.termination, Termination::Cancelled);
        let last = outcome.steps.last().unwrap();
        assert_eq!(last.content, CANCELLED_NOTICE);
        assert_eq!(
            outcome.steps.iter().filter(|s| s.is_terminal()).count(),
            1
        );
    }

    #[tokio::test]
    async fn model_failure_is_terminal_error() {
        let provider = Arc::new(ScriptedProvider::with_replies(vec![Err(
            ProviderError::Network("connection reset".into()),
        )]));
        let outcome = react(provider, ActionCatalog::new())
            .run("t", CancellationToken::new())
            .await;

        assert_eq!(outcome.termination, Termination::ModelFailure);
        assert_eq!(kinds(&outcome.steps), vec![StepKind::Error]);
        assert!(outcome.answer.starts_with("Model error:"));
        assert!(outcome.answer.contains("connection reset"));
    }

    #[tokio::test]
    async fn context_length_failure_gets_diagnostic() {
        let provider = Arc::new(ScriptedProvider::with_replies(vec![
            Ok("Thought: a\nAction: ping\nAction Input: {}".into()),
            Err(ProviderError::ContextLengthExceeded(
                "maximum context length is 8192 tokens".into(),
            )),
        ]));
        let catalog = ActionCatalog::new().with(StaticAction::text("ping", "", "pong"));
        let outcome = react(provider, catalog)
            .run("t", CancellationToken::new())
            .await;

        assert_eq!(outcome.termination, Termination::ModelFailure);
        let last = outcome.steps.last().unwrap();
        assert_eq!(last.kind, StepKind::Error);
        assert!(last.content.contains("Context length exceeded"));
        assert!(last.content.contains("Start a new run"));
    }

    #[tokio::test]
    async fn unknown_action_is_observed_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Thought: try\nAction: nonexistent_tool\nAction Input: {}",
            "Final Answer: recovered",
        ]));
        let catalog = ActionCatalog::new().with(StaticAction::text("ping", "", "pong"));
        let outcome = react(provider, catalog)
            .run("t", CancellationToken::new())
            .await;

        let observation = outcome
            .steps
            .iter()
            .find(|s| s.kind == StepKind::Observation)
            .unwrap();
        assert!(observation.content.contains("not found"));
        assert!(observation.content.contains("nonexistent_tool"));
        assert_eq!(outcome.answer, "recovered");
    }

    #[tokio::test]
    async fn sentinel_adds_completion_note() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Thought: finish\nAction: wrap\nAction Input: {}",
            "Final Answer: all done",
        ]));
        let catalog = ActionCatalog::new().with(StaticAction::text("wrap", "", "done [END_TASK]"));
        react(provider.clone(), catalog)
            .run("t", CancellationToken::new())
            .await;
        assert!(provider.prompts()[1].contains("[SYSTEM]: Task marked as complete."));
    }

    #[tokio::test]
    async fn history_reaches_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Final Answer: yes"]));
        let request = RunRequest::new("and now?").with_history(vec![
            PriorTurn::user("find me saas leads"),
            PriorTurn::assistant("saved 3 leads"),
        ]);
        react(provider.clone(), ActionCatalog::new())
            .run(request, CancellationToken::new())
            .await;
        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("User: find me saas leads"));
        assert!(prompt.contains("Assistant: saved 3 leads"));
        assert!(prompt.contains("Question: and now?"));
    }

    #[tokio::test]
    async fn stream_matches_collected_steps() {
        let script = vec![
            "Thought: look\nAction: lookup\nAction Input: {\"q\": 1}",
            "Thought: hmm",
            "Final Answer: done",
        ];
        let catalog = || ActionCatalog::new().with(StaticAction::text("lookup", "", "found"));

        let collected = react(Arc::new(ScriptedProvider::new(script.clone())), catalog())
            .run("t", CancellationToken::new())
            .await;

        let streamed: Vec<Step> = react(Arc::new(ScriptedProvider::new(script)), catalog())
            .run_stream("t", CancellationToken::new())
            .collect()
            .await;

        assert_eq!(kinds(&streamed), kinds(&collected.steps));
        let contents = |steps: &[Step]| steps.iter().map(|s| s.content.clone()).collect::<Vec<_>>();
        assert_eq!(contents(&streamed), contents(&collected.steps));
        assert!(streamed.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn dropped_consumer_stops_run() {
        let provider = Arc::new(ScriptedProvider::repeating(
            "Thought: again\nAction: ping\nAction Input: {}",
        ));
        let catalog = ActionCatalog::new().with(StaticAction::text("ping", "", "pong"));
        let mut stream = react(provider.clone(), catalog)
            .with_max_iterations(1000)
            .with_stream_capacity(1)
            .run_stream("t", CancellationToken::new());

        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, StepKind::Thought);
        drop(stream);

        // Give the spawned task time to notice.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let calls = provider.call_count();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(provider.call_count(), calls);
        assert!(calls < 1000);
    }
}
