use crate::error::Error;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::fmt;
use tracing::warn;

pub const NO_AUDIO: &str = "no audio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    NoAudio,
    /// The episode could not be processed
    Failed,
}

/// Something worth telling the user about once the run is over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Canonical episode name
    pub name: String,
    pub kind: AnomalyKind,
    pub description: String,
}

impl Anomaly {
    pub fn no_audio(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AnomalyKind::NoAudio,
            description: NO_AUDIO.to_string(),
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            kind: AnomalyKind::Failed,
            description: format!("failed: {reason}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == AnomalyKind::Failed
    }
}

/// Cloneable handle that concurrent episode tasks record anomalies through
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: UnboundedSender<Anomaly>,
}

/// Receiving end, drained once every [`Reporter`] is gone
#[derive(Debug)]
pub struct Collector {
    rx: UnboundedReceiver<Anomaly>,
}

pub fn channel() -> (Reporter, Collector) {
    let (tx, rx) = unbounded();
    (Reporter { tx }, Collector { rx })
}

impl Reporter {
    pub fn record(&self, anomaly: Anomaly) {
        if let Err(error) = self.tx.unbounded_send(anomaly) {
            warn!(anomaly = ?error.into_inner(), "Report collector already closed");
        }
    }
}

impl Collector {
    /// Wait until all reporters are dropped and return what they recorded, in arrival order
    pub async fn finish(self) -> Report {
        Report {
            anomalies: self.rx.collect().await,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub anomalies: Vec<Anomaly>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.anomalies.iter().filter(|a| a.is_failure()).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.anomalies.is_empty() {
            return writeln!(f, "No anomalies found.");
        }

        let width = self
            .anomalies
            .iter()
            .map(|a| a.name.chars().count())
            .chain(std::iter::once("NAME".len()))
            .max()
            .unwrap_or_default();

        writeln!(f, "{:<5} {:<width$} DESCRIPTION", "#", "NAME")?;
        for (index, anomaly) in self.anomalies.iter().enumerate() {
            writeln!(
                f,
                "{:<5} {:<width$} {}",
                index, anomaly.name, anomaly.description
            )?;
        }
        Ok(())
    }
}
