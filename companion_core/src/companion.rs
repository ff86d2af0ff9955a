// Per-agent dispatcher.
//
// A `Companion` owns exactly one active task and the inbox its intents
// arrive on. Each tick it first drains the inbox, keeps the newest intent
// that parses, and swaps in the matching task (the old task, with its work
// queues and material ledger, is dropped on the spot). Then the active task
// runs one step. A gather or build task that finishes, successfully or not,
// hands control back to survival mode; only an explicit `stop` leaves the
// agent idle.
//
// Rejected intents and requests that cannot be resolved (an unknown block or
// blueprint) are reported to the user and leave the current task running.
//
// See also: `intent.rs` (`Intent`, `Command`, the channel), `survival.rs`,
// `gather.rs`, `construction.rs` (the tasks), `src/bin/sandbox.rs`.
//
// **Critical constraint: determinism.** Intents only take effect at the
// start of a tick, in send order, so a replay that feeds the same intents
// before the same ticks reproduces the run.

use crate::config::CompanionConfig;
use crate::construction::{BuildSession, BuildStatus};
use crate::gather::{GatherSession, GatherStatus};
use crate::host::TickContext;
use crate::intent::{intent_channel, Command, IntentInbox, IntentSender};
use crate::survival::{SurvivalMachine, SurvivalStatus};
use crate::types::VoxelCoord;
use serde::Serialize;

/// Where a build goes when the user did not give an origin: this far along
/// +x from the agent, at its feet.
pub const DEFAULT_BUILD_OFFSET: i32 = 3;

#[derive(Clone, Debug)]
pub enum ActiveTask {
    Survival(SurvivalMachine),
    Gather(GatherSession),
    Build(BuildSession),
    Idle,
}

impl ActiveTask {
    pub fn name(&self) -> &'static str {
        match self {
            ActiveTask::Survival(_) => "survival",
            ActiveTask::Gather(_) => "gather",
            ActiveTask::Build(_) => "build",
            ActiveTask::Idle => "idle",
        }
    }
}

/// Snapshot of whatever task is active, for progress display.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum CompanionStatus {
    Survival(SurvivalStatus),
    Gather(GatherStatus),
    Build(BuildStatus),
    Idle,
}

#[derive(Debug)]
pub struct Companion {
    config: CompanionConfig,
    inbox: IntentInbox,
    task: ActiveTask,
}

impl Companion {
    /// A companion in survival mode, plus the sender its intents go through.
    pub fn new(config: CompanionConfig) -> (Self, IntentSender) {
        let (tx, inbox) = intent_channel();
        (Self::with_inbox(config, inbox), tx)
    }

    pub fn with_inbox(config: CompanionConfig, inbox: IntentInbox) -> Self {
        let task = ActiveTask::Survival(SurvivalMachine::new(&config.survival, &config.gather));
        Self { config, inbox, task }
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    pub fn task(&self) -> &ActiveTask {
        &self.task
    }

    pub fn status(&self) -> CompanionStatus {
        match &self.task {
            ActiveTask::Survival(m) => CompanionStatus::Survival(m.status()),
            ActiveTask::Gather(s) => CompanionStatus::Gather(s.status()),
            ActiveTask::Build(s) => CompanionStatus::Build(s.status()),
            ActiveTask::Idle => CompanionStatus::Idle,
        }
    }

    pub fn tick(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(command) = self.newest_command(ctx) {
            self.apply(command, ctx);
        }
        self.run_active(ctx);
    }

    /// Drain the inbox. Every intent that fails to parse is reported; the
    /// last one that parses wins, and its reply line (if any) is spoken.
    fn newest_command(&mut self, ctx: &mut TickContext<'_>) -> Option<Command> {
        let mut newest = None;
        for intent in self.inbox.drain() {
            match Command::parse(&intent) {
                Ok(command) => newest = Some((command, intent.message)),
                Err(err) => {
                    tracing::warn!(verb = %intent.verb, %err, "intent rejected");
                    ctx.reporter.report(&err.to_string());
                }
            }
        }
        let (command, message) = newest?;
        if let Some(message) = message {
            ctx.reporter.report(&message);
        }
        Some(command)
    }

    /// Replace the active task. A request that cannot be resolved is
    /// reported and changes nothing.
    pub fn apply(&mut self, command: Command, ctx: &mut TickContext<'_>) {
        let next = match command {
            Command::Gather { block, count } => GatherSession::start(&block, count, &self.config.gather).map(ActiveTask::Gather),
            Command::Build { blueprint, origin } => {
                let origin = origin.unwrap_or_else(|| default_build_origin(ctx.position()));
                BuildSession::start(&blueprint, origin, &self.config.construction, &self.config.gather)
                    .map(ActiveTask::Build)
            }
            Command::Survive => Ok(self.survival()),
            Command::Stop => Ok(ActiveTask::Idle),
        };
        match next {
            Ok(task) => {
                tracing::info!(from = self.task.name(), to = task.name(), "task replaced");
                ctx.nav.stop();
                self.task = task;
            }
            Err(err) => {
                tracing::info!(%err, "request refused");
                ctx.reporter.report(&err.to_string());
            }
        }
    }

    fn run_active(&mut self, ctx: &mut TickContext<'_>) {
        let status = match &mut self.task {
            ActiveTask::Survival(machine) => {
                machine.tick(ctx);
                return;
            }
            ActiveTask::Gather(session) => session.tick(ctx),
            ActiveTask::Build(session) => session.tick(ctx),
            ActiveTask::Idle => return,
        };
        if status.is_finished() {
            tracing::info!(task = self.task.name(), ?status, "task finished, back to survival");
            self.task = self.survival();
        }
    }

    fn survival(&self) -> ActiveTask {
        ActiveTask::Survival(SurvivalMachine::new(&self.config.survival, &self.config.gather))
    }
}

fn default_build_origin(agent: VoxelCoord) -> VoxelCoord {
    agent.offset(DEFAULT_BUILD_OFFSET, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::BuildState;
    use crate::intent::Intent;
    use crate::sandbox::{GridWorld, Harness};
    use crate::types::{Block, WoodSpecies};

    fn flat_world() -> GridWorld {
        let mut w = GridWorld::new(24, 24, 24);
        w.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(23, 4, 23), Block::Dirt);
        w
    }

    fn harness() -> Harness {
        Harness::new(flat_world(), VoxelCoord::new(8, 5, 8), 3)
    }

    #[test]
    fn starts_in_survival() {
        let (companion, _tx) = Companion::new(CompanionConfig::default());
        assert_eq!(companion.task().name(), "survival");
        assert!(matches!(companion.status(), CompanionStatus::Survival(_)));
    }

    #[test]
    fn newest_valid_intent_wins() {
        let mut h = harness();
        let (mut companion, tx) = Companion::new(CompanionConfig::default());
        tx.send(Intent::new("gather").with("block", "iron").with("count", "4"));
        tx.send(Intent::new("build").with("blueprint", "hut").with_message("On it!"));
        tx.send(Intent::new("dance"));
        h.step(|ctx| companion.tick(ctx));
        let ActiveTask::Build(session) = companion.task() else {
            panic!("expected a build, got {}", companion.task().name());
        };
        assert_eq!(session.origin(), VoxelCoord::new(8 + DEFAULT_BUILD_OFFSET, 5, 8));
        assert_eq!(h.reporter.count_containing("unknown command \"dance\""), 1);
        assert_eq!(h.reporter.count_containing("On it!"), 1);
    }

    #[test]
    fn unresolvable_request_keeps_current_task() {
        let mut h = harness();
        let (mut companion, tx) = Companion::new(CompanionConfig::default());
        tx.send(Intent::new("gather").with("block", "mithril"));
        h.step(|ctx| companion.tick(ctx));
        assert_eq!(companion.task().name(), "survival");
        assert_eq!(h.reporter.count_containing("I don't know what \"mithril\" is"), 1);

        tx.send(Intent::new("build").with("blueprint", "castle"));
        h.step(|ctx| companion.tick(ctx));
        assert_eq!(companion.task().name(), "survival");
        assert_eq!(h.reporter.count_containing("I don't know how to build a \"castle\""), 1);
    }

    #[test]
    fn replacing_a_task_discards_it_and_stops_movement() {
        let mut h = harness();
        let (mut companion, tx) = Companion::new(CompanionConfig::default());
        tx.send(Intent::new("build").with("blueprint", "hut").with("origin", "16,5,16"));
        h.step(|ctx| companion.tick(ctx));
        assert!(h.nav.goal().is_some());

        tx.send(Intent::new("stop"));
        h.step(|ctx| companion.tick(ctx));
        assert!(matches!(companion.task(), ActiveTask::Idle));
        assert!(h.nav.goal().is_none());

        let before = h.body.position;
        for _ in 0..20 {
            h.step(|ctx| companion.tick(ctx));
        }
        assert_eq!(h.body.position, before);
        assert!(matches!(companion.status(), CompanionStatus::Idle));

        tx.send(Intent::new("survive"));
        h.step(|ctx| companion.tick(ctx));
        assert_eq!(companion.task().name(), "survival");
    }

    #[test]
    fn finished_gather_falls_back_to_survival() {
        let mut w = flat_world();
        for y in 5..8 {
            w.set_block(VoxelCoord::new(11, y, 8), Block::Log(WoodSpecies::Oak));
        }
        let mut h = Harness::new(w, VoxelCoord::new(8, 5, 8), 3);
        let (mut companion, tx) = Companion::new(CompanionConfig::default());
        tx.send(Intent::new("gather").with("block", "wood").with("count", "3"));
        let mut saw_gather = false;
        for _ in 0..2000 {
            h.step(|ctx| companion.tick(ctx));
            match companion.task() {
                ActiveTask::Gather(_) => saw_gather = true,
                ActiveTask::Survival(_) if saw_gather => break,
                _ => {}
            }
        }
        assert!(saw_gather);
        assert_eq!(companion.task().name(), "survival");
        assert_eq!(h.reporter.count_containing("Done!"), 1);
    }

    #[test]
    fn failed_build_falls_back_to_survival() {
        let mut h = harness();
        let mut config = CompanionConfig::default();
        config.construction.travel_timeout_ticks = 5;
        let (mut companion, tx) = Companion::new(config);
        tx.send(Intent::new("build").with("blueprint", "hut").with("origin", "200,5,200"));
        h.step(|ctx| companion.tick(ctx));
        let ActiveTask::Build(session) = companion.task() else {
            panic!("expected a build");
        };
        assert_eq!(session.state(), BuildState::Starting);
        for _ in 0..20 {
            h.step(|ctx| companion.tick(ctx));
        }
        assert_eq!(companion.task().name(), "survival");
        assert_eq!(h.reporter.count_containing("I couldn't get to"), 1);
    }

    #[test]
    fn status_serializes_with_task_tag() {
        let (companion, _tx) = Companion::new(CompanionConfig::default());
        let json = serde_json::to_value(companion.status()).unwrap();
        assert_eq!(json["task"], "survival");
        assert_eq!(json["state"], "Assessing");
    }
}
