/// Core library for mirroring a Wekan host into a local markdown tree and
/// reconciling local edits back to the server.
///
/// The flow has two halves. `clone` walks the remote hierarchy
/// (host -> board -> list -> card) and materializes it as directories with
/// metadata sidecars plus one markdown file per card. `read` parses such a
/// tree back into card records, and `push` diffs them against the live
/// server state and applies the resulting changes.
pub mod cardfile;
pub mod clone;
pub mod events;
pub mod layout;
pub mod names;
pub mod push;
pub mod read;
pub mod remote;
pub mod types;

pub use clone::{BoardFilter, CloneOptions, CloneReport, Cloner};
pub use events::{CloneEvent, EventSink, NullSink, PushEvent};
pub use push::{CardChange, ChangeKind, Detection, PushOptions, PushOutcome, PushReport, Pusher};
pub use read::find_board_id;
pub use remote::http::HttpWekanClient;
pub use remote::{ClientError, WekanApi};
