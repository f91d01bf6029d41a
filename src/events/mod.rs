//! Result bus carrying crawl events to a single consumer
//!
//! Every component reports findings, progress and non-fatal failures by
//! sending an [`Event`] through an [`EventSender`]. Senders are cheap to clone
//! and never block. The sink owns the single [`EventReceiver`] and drains it
//! until the terminal [`Event::Finish`] arrives or every sender is gone.

use crate::fs::RwStatus;
use crate::rules::{ClassifierRule, Triage};
use crossbeam::channel::{Receiver, Sender, unbounded};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::sync::Arc;

/// A share that survived share rules
#[derive(Debug, Clone, Serialize)]
pub struct ShareResult {
    pub path: String,
    pub description: Option<String>,
    pub triage: Triage,
    /// Name of the highest-triage rule that matched, if any
    pub rule: Option<String>,
}

/// One finding: a (file, rule) pair that matched
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub size: u64,
    #[serde(serialize_with = "serialize_rule_name")]
    pub rule: Arc<ClassifierRule>,
    pub triage: Triage,
    pub rw: RwStatus,
    pub context: Option<String>,
}

fn serialize_rule_name<S>(rule: &Arc<ClassifierRule>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&rule.name)
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    Trace(String),
    Debug(String),
    Info(String),
    ShareResult(ShareResult),
    FileResult(FileResult),
    Error(String),
    Fatal(String),
    Finish,
}

impl Event {
    pub fn is_finish(&self) -> bool {
        matches!(self, Event::Finish)
    }

    /// Human-readable message for log-like events
    pub fn message(&self) -> Option<&str> {
        match self {
            Event::Trace(message)
            | Event::Debug(message)
            | Event::Info(message)
            | Event::Error(message)
            | Event::Fatal(message) => Some(message),
            _ => None,
        }
    }
}

/// Create a connected sender/receiver pair
pub fn bus() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, EventReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        // A vanished sink must never fail the unit that reports to it
        let _ = self.tx.send(event);
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.send(Event::Trace(message.into()));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.send(Event::Debug(message.into()));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(Event::Info(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(Event::Error(message.into()));
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.send(Event::Fatal(message.into()));
    }

    pub fn share_result(&self, result: ShareResult) {
        self.send(Event::ShareResult(result));
    }

    pub fn file_result(&self, result: FileResult) {
        self.send(Event::FileResult(result));
    }

    pub fn finish(&self) {
        self.send(Event::Finish);
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventReceiver {
    /// Deliver events in order until `Finish` (inclusive) or channel close
    pub fn drain<F>(&self, mut handle: F)
    where
        F: FnMut(Event),
    {
        while let Ok(event) = self.rx.recv() {
            let finished = event.is_finish();
            handle(event);
            if finished {
                break;
            }
        }
    }

    pub fn collect(&self) -> Vec<Event> {
        let mut events = Vec::new();
        self.drain(|event| events.push(event));
        events
    }
}
