/// Progress events emitted by the cloner and pusher.
///
/// The engines stay terminal-free; a frontend implements [`EventSink`] to
/// render progress, and tests use [`NullSink`] or a recording sink.

/// Events emitted while cloning a host.
#[derive(Debug, Clone, PartialEq)]
pub enum CloneEvent {
    /// Boards listed on the host, after the filter was applied.
    BoardsSelected { total: usize, selected: usize },
    /// The board filter matched nothing; the clone continues with zero
    /// boards.
    FilterMatchedNothing { filter: String },
    BoardStarted { title: String },
    BoardFinished { title: String, lists: usize, cards: usize },
    BoardFailed { title: String, reason: String },
    ListFailed { board: String, list: String, reason: String },
    CardFailed { card: String, reason: String },
    /// A sidecar cache could not be fetched; the entity is still produced
    /// with reduced content.
    CacheSkipped { name: String, reason: String },
    /// A checklist or comment section could not be fetched; the card file
    /// is still written without it.
    SectionSkipped { card: String, section: String, reason: String },
}

/// Events emitted while detecting and applying push changes.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    ChangesDetected { count: usize },
    ChangeApplied { description: String },
    ChangeFailed { description: String, reason: String },
}

/// Sink for engine progress. All methods default to no-ops so an
/// implementation only overrides what it renders.
pub trait EventSink: Send + Sync {
    fn clone_event(&self, _event: CloneEvent) {}
    fn push_event(&self, _event: PushEvent) {}
}

/// Sink that discards every event.
pub struct NullSink;

impl EventSink for NullSink {}
