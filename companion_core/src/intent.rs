// Intents from the language front end and the queue that carries them.
//
// Free-text chat is turned into an `Intent` (verb, string parameters, and an
// optional reply line) somewhere off the tick thread. The parser holds an
// `IntentSender`; the companion owns the single `IntentInbox` and drains it
// once, at the start of its tick, so results land atomically between ticks
// and never in the middle of a state machine step.
//
// `Command` is the validated form of an intent. Parsing is where unknown
// verbs and bad parameters are rejected; the dispatcher never sees them.
//
// See also: `companion.rs` (drains the inbox and applies commands),
// `error.rs` for `IntentError`, `src/bin/sandbox.rs` (sends intents from a
// separate thread).

use crate::error::IntentError;
use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// Raw parser output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub verb: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Something to say back to the user when the intent is applied.
    #[serde(default)]
    pub message: Option<String>,
}

impl Intent {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn optional(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<&str, IntentError> {
        self.optional(key).ok_or(IntentError::MissingParameter(key))
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Command {
    Gather { block: String, count: u32 },
    /// `origin` is `None` when the user did not say where; the companion
    /// picks a spot next to the agent.
    Build { blueprint: String, origin: Option<VoxelCoord> },
    Survive,
    Stop,
}

impl Command {
    pub fn parse(intent: &Intent) -> Result<Command, IntentError> {
        match intent.verb.trim().to_ascii_lowercase().as_str() {
            "gather" | "mine" | "collect" => {
                let block = intent.required("block")?.to_owned();
                let count = match intent.optional("count") {
                    Some(raw) => parse_count(raw)?,
                    None => 1,
                };
                Ok(Command::Gather { block, count })
            }
            "build" => {
                let blueprint = intent.required("blueprint")?.to_owned();
                let origin = intent.optional("origin").map(parse_coord).transpose()?;
                Ok(Command::Build { blueprint, origin })
            }
            "survive" | "follow" => Ok(Command::Survive),
            "stop" | "idle" => Ok(Command::Stop),
            other => Err(IntentError::UnknownVerb(other.to_owned())),
        }
    }
}

fn parse_count(raw: &str) -> Result<u32, IntentError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(IntentError::InvalidParameter {
            name: "count",
            value: raw.to_owned(),
        }),
    }
}

/// Accepts `x,y,z` or `x y z`.
fn parse_coord(raw: &str) -> Result<VoxelCoord, IntentError> {
    let invalid = || IntentError::InvalidParameter {
        name: "origin",
        value: raw.to_owned(),
    };
    let parts: Vec<i32> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<i32>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, z] => Ok(VoxelCoord::new(x, y, z)),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Producer half. Cheap to clone; hand one to each parser thread.
#[derive(Clone, Debug)]
pub struct IntentSender {
    tx: Sender<Intent>,
}

impl IntentSender {
    /// Queue an intent. Returns false once the companion has been dropped.
    pub fn send(&self, intent: Intent) -> bool {
        self.tx.send(intent).is_ok()
    }
}

/// Consumer half, owned by the companion.
#[derive(Debug)]
pub struct IntentInbox {
    rx: Receiver<Intent>,
}

impl IntentInbox {
    /// Everything queued so far, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Intent> {
        let mut out = Vec::new();
        while let Ok(intent) = self.rx.try_recv() {
            out.push(intent);
        }
        out
    }
}

pub fn intent_channel() -> (IntentSender, IntentInbox) {
    let (tx, rx) = mpsc::channel();
    (IntentSender { tx }, IntentInbox { rx })
}
