use std::sync::mpsc::{SendError, Sender};

/// Events the execution engine reports while a pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    EndOfStream,
    Error(String),
    StateChanged(String),
}

/// An engine event stamped with the pipeline generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sending half of a job's event channel, handed to each launched pipeline.
///
/// Every pass gets a new generation so that late events from a torn-down
/// pipeline can be told apart from the current one.
#[derive(Debug, Clone)]
pub struct Bus {
    generation: u64,
    tx: Sender<BusMessage>,
}

impl Bus {
    pub fn new(generation: u64, tx: Sender<BusMessage>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn post(&self, event: EngineEvent) -> Result<(), SendError<BusMessage>> {
        self.tx.send(BusMessage {
            generation: self.generation,
            event,
        })
    }
}
