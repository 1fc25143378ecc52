//! # Media Queue Synchronizer
//!
//! Keeps the engine playlist in step with the queue the player last applied.
//!
//! Incremental updates replay a move-aware diff against the engine, so items
//! that stay in the queue keep their loaded sources. A full replacement
//! reloads the playlist and re-prepares the engine.
//!
//! The stored queue only ever names a playlist the engine really holds. When
//! an edit fails halfway, or the engine playlist no longer has the stored
//! length, the synchronizer falls back to a full reload. A failed reload
//! leaves no stored queue, so the next update reloads again.

use crate::diff::{difference_of, ListOperation};
use crate::error::Result;
use crate::model::{QueueItem, QueueState};
use bridge_traits::engine::{EngineSource, MediaEngine};
use bridge_traits::media::MediaObject;
use core_runtime::logging::strip_path;
use tracing::{debug, trace, warn};

/// Owner of the "currently applied" queue.
///
/// Single writer: the player keeps it behind its state lock together with
/// the engine.
#[derive(Debug)]
pub struct MediaQueue<M> {
    current: Option<QueueState<M>>,
}

impl<M> Default for MediaQueue<M> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<M: MediaObject> MediaQueue<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue the engine playlist currently mirrors.
    pub fn current(&self) -> Option<&QueueState<M>> {
        self.current.as_ref()
    }

    /// Bring the engine playlist from the current queue to `new` with the
    /// fewest playlist edits. `None` empties the playlist.
    ///
    /// If an edit fails the playlist is reloaded from `new` instead; only a
    /// failed reload is reported.
    pub fn update_queue(
        &mut self,
        engine: &mut dyn MediaEngine,
        new: Option<QueueState<M>>,
    ) -> Result<()> {
        let applied_len = self.current.as_ref().map_or(0, QueueState::len);
        if engine.source_count() != applied_len {
            warn!(
                engine = engine.source_count(),
                applied = applied_len,
                "Engine playlist out of step, reloading"
            );
            return self.reload(engine, new);
        }

        let operations = {
            let old_items: &[QueueItem<M>] =
                self.current.as_ref().map(|q| q.queue()).unwrap_or(&[]);
            let new_items: &[QueueItem<M>] = new.as_ref().map(|q| q.queue()).unwrap_or(&[]);
            difference_of(old_items, new_items, true)
        };

        debug!(operations = operations.len(), "Synchronizing engine playlist");
        for operation in &operations {
            if let Err(err) = apply_to_engine(engine, operation) {
                warn!(error = %err, "Playlist edit failed, reloading");
                return self.reload(engine, new);
            }
        }

        self.current = new;
        Ok(())
    }

    /// Full reload keeping the position of the loaded entry.
    fn reload(&mut self, engine: &mut dyn MediaEngine, new: Option<QueueState<M>>) -> Result<()> {
        let position_ms = engine.current_position_ms();
        self.current = None;
        match new {
            Some(new) => self.replace_queue(engine, new, position_ms),
            None => {
                engine.clear_sources()?;
                Ok(())
            }
        }
    }

    /// Reload the whole playlist, positioned at the queue index.
    pub fn replace_queue(
        &mut self,
        engine: &mut dyn MediaEngine,
        new: QueueState<M>,
        start_position_ms: u64,
    ) -> Result<()> {
        debug!(
            items = new.len(),
            queue_index = new.queue_index(),
            now_playing = %strip_path(new.now_playing().media_item.playback_uri()),
            "Reloading engine playlist"
        );

        let sources = new.queue().iter().map(engine_source).collect();
        engine.set_sources(sources, new.queue_index(), start_position_ms)?;
        engine.prepare()?;

        self.current = Some(new);
        Ok(())
    }

    /// Drop every playlist entry.
    pub fn clear(&mut self, engine: &mut dyn MediaEngine) -> Result<()> {
        if self.current.take().is_some() || engine.source_count() > 0 {
            engine.clear_sources()?;
        }
        Ok(())
    }
}

/// Engine-facing form of a queue item. The tag is the queue id.
pub fn engine_source<M: MediaObject>(item: &QueueItem<M>) -> EngineSource {
    EngineSource::new(item.queue_id.to_string(), item.media_item.playback_uri())
}

fn apply_to_engine<M: MediaObject>(
    engine: &mut dyn MediaEngine,
    operation: &ListOperation<QueueItem<M>>,
) -> Result<()> {
    trace!(?operation, "Engine playlist edit");
    match operation {
        ListOperation::Remove { index } => engine.remove_sources(*index, index + 1)?,
        ListOperation::RemoveRange { start, end } => engine.remove_sources(*start, *end)?,
        ListOperation::Add { item, index } => {
            engine.insert_sources(*index, vec![engine_source(item)])?
        }
        ListOperation::AddAll { items, index } => {
            engine.insert_sources(*index, items.iter().map(engine_source).collect())?
        }
        ListOperation::Move { from, .. } => {
            // Forward moves land one slot earlier once the source is vacated
            let destination = operation.move_destination().unwrap_or(*from);
            engine.move_sources(*from, from + 1, destination)?
        }
        ListOperation::MoveRange { from, count, .. } => {
            let destination = operation.move_destination().unwrap_or(*from);
            engine.move_sources(*from, from + count, destination)?
        }
    }
    Ok(())
}
