//! Media content contracts.
//!
//! The playback core never inspects concrete track types. It works with any
//! [`MediaObject`] and resolves content through a host-supplied
//! [`MediaProvider`] (a MediaStore query layer on Android, a library database
//! on desktop).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Descriptive metadata produced on demand by a [`MediaObject`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Display title for the item.
    pub title: Option<String>,
    /// Display artist string.
    pub artist: Option<String>,
    /// Album or collection name.
    pub album: Option<String>,
    /// Locator for artwork (content URI, file path, URL).
    pub artwork_uri: Option<String>,
    /// Duration as known by the provider, before the engine measures it.
    pub duration_ms: Option<u64>,
    /// Arbitrary extra fields (genre, track number, ...).
    pub extra: HashMap<String, String>,
}

impl MediaMetadata {
    /// Create metadata carrying only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artwork_uri(mut self, uri: impl Into<String>) -> Self {
        self.artwork_uri = Some(uri.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// A playable unit of content with a stable identity.
///
/// `id` is unique within the provider that produced the object.
/// `playback_uri` is an opaque locator handed to the engine untouched.
pub trait MediaObject: Clone + fmt::Debug + Eq + Send + Sync + 'static {
    /// Provider-scoped identifier.
    fn id(&self) -> &str;

    /// Opaque locator the engine loads.
    fn playback_uri(&self) -> &str;

    /// Descriptive metadata for sessions, notifications and UI.
    fn metadata(&self) -> MediaMetadata;
}

/// Free-form search arguments forwarded by the host (voice search extras).
pub type SearchArguments = HashMap<String, String>;

/// Result of a provider search.
///
/// `search_results` are the items that matched the query. The optional
/// `playback_continuation` holds items to keep playing once the matches run
/// out (the rest of an album, say).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults<M> {
    pub search_results: Vec<M>,
    pub playback_continuation: Vec<M>,
}

impl<M> SearchResults<M> {
    pub fn new(search_results: Vec<M>, playback_continuation: Vec<M>) -> Self {
        Self {
            search_results,
            playback_continuation,
        }
    }

    /// Results with no continuation.
    pub fn only(search_results: Vec<M>) -> Self {
        Self::new(search_results, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.search_results.is_empty()
    }
}

impl<M> Default for SearchResults<M> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Narrow content lookup contract consumed by the playback core.
#[async_trait::async_trait]
pub trait MediaProvider<M: MediaObject>: Send + Sync {
    /// Resolve a single item, `Ok(None)` when the id is unknown.
    async fn get_media_item_by_id(&self, id: &str) -> Result<Option<M>>;

    /// Resolve several items. Unknown ids are skipped; order follows `ids`.
    async fn get_media_items_by_ids(&self, ids: &[String]) -> Result<Vec<M>>;

    /// Run a free-text search.
    async fn search_for_media_items(
        &self,
        query: &str,
        arguments: &SearchArguments,
    ) -> Result<SearchResults<M>>;
}
