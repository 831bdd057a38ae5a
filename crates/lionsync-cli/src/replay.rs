//! Replaying recorded messages into a fresh forest.

use anyhow::{Context, Result};
use lionsync_core::{
    ChunkCodec, DeltaError, DeltaSerializationChunk, Forest, Language, NodeId, ParticipationId,
    TypeRegistry,
};
use lionsync_delta::{CommandReceiver, EventReceiver, EventReceiverConfig};
use lionsync_proto::DeltaMessage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(untagged)]
enum LanguageFile {
    One(Language),
    Many(Vec<Language>),
}

/// Build a type registry from language definition files.
pub fn load_languages(paths: &[PathBuf]) -> Result<TypeRegistry> {
    let mut types = TypeRegistry::new();
    for path in paths {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let languages = match serde_json::from_str(&text)
            .with_context(|| format!("Invalid language file {}", path.display()))?
        {
            LanguageFile::One(language) => vec![language],
            LanguageFile::Many(languages) => languages,
        };
        for language in &languages {
            types
                .register(language)
                .with_context(|| {
                    format!(
                        "Failed to register language {} from {}",
                        language.key,
                        path.display()
                    )
                })?;
            tracing::debug!(
                language = %language.key,
                version = %language.version,
                "Registered language"
            );
        }
    }
    Ok(types)
}

/// Outcome of a replay.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// Messages read
    pub messages: usize,
    /// Commands and events applied
    pub applied: usize,
    /// Duplicate events dropped
    pub dropped: usize,
    /// Messages of other categories, not replayed
    pub skipped: usize,
    /// Partition events raised
    pub changes: usize,
    /// Partitions at the end of the replay
    pub partitions: Vec<PartitionSummary>,
}

/// One partition at the end of a replay.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    /// Partition root id
    pub id: NodeId,
    /// Nodes in the partition, root included
    pub nodes: usize,
}

/// Applies recorded commands and events to a forest.
pub struct Replayer {
    forest: Forest,
    participation: ParticipationId,
    commands: CommandReceiver,
    events: EventReceiver,
}

impl Replayer {
    /// Start from an empty forest.
    pub fn new(
        types: TypeRegistry,
        participation: ParticipationId,
        enforce_sequence: bool,
    ) -> Self {
        Self {
            forest: Forest::new(Arc::new(types)),
            participation,
            commands: CommandReceiver::new(ChunkCodec),
            events: EventReceiver::new(EventReceiverConfig { enforce_sequence }, ChunkCodec),
        }
    }

    /// Replay messages in order, stopping at the first rejected one.
    pub fn replay(&mut self, messages: &[DeltaMessage]) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary {
            messages: messages.len(),
            ..ReplaySummary::default()
        };

        for (index, message) in messages.iter().enumerate() {
            let raised = match message {
                DeltaMessage::Command(_) => {
                    self.commands
                        .receive_message(&mut self.forest, &self.participation, message)
                }
                DeltaMessage::Event(_) => self.events.receive_message(&mut self.forest, message),
                other => {
                    tracing::debug!(
                        index,
                        category = %other.category(),
                        kind = other.kind(),
                        "Skipped message"
                    );
                    summary.skipped += 1;
                    continue;
                }
            }
            .with_context(|| format!("Message {index} ({}) was rejected", message.kind()))?;

            if raised.is_empty() && matches!(message, DeltaMessage::Event(_)) {
                summary.dropped += 1;
            } else {
                summary.applied += 1;
                summary.changes += raised.len();
            }
        }

        summary.partitions = self
            .forest
            .partitions()
            .iter()
            .map(|id| -> Result<PartitionSummary, DeltaError> {
                let nodes = self.forest.registry().nodes().collect_subtree(id)?.len();
                Ok(PartitionSummary { id: id.clone(), nodes })
            })
            .collect::<Result<_, DeltaError>>()?;
        tracing::info!(
            applied = summary.applied,
            dropped = summary.dropped,
            skipped = summary.skipped,
            "Replay finished"
        );
        Ok(summary)
    }

    /// Serialize every partition with its descendants.
    pub fn partitions(&self) -> Result<Vec<DeltaSerializationChunk>> {
        self.forest
            .partitions()
            .iter()
            .map(|id| {
                ChunkCodec
                    .serialize_node(self.forest.registry(), id)
                    .with_context(|| format!("Failed to serialize partition {id}"))
            })
            .collect()
    }
}
