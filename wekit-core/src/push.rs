/// Push: reconcile a locally edited board directory against the live board.
///
/// Detection joins local and remote state on card id and produces a flat,
/// deterministic change list. A card whose title or normalized body differs
/// is an update; a card sitting in a differently named directory is a move
/// (one card can be both). Local files without a known id are creates, and
/// remote cards with no local file are archived. Nothing is ever
/// hard-deleted.
///
/// Application is all-or-nothing per change, never per push: each change is
/// applied in isolation and a failure only skips that change. The report's
/// `success()` therefore means every detected change went through.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cardfile;
use crate::events::{EventSink, PushEvent};
use crate::names::sanitize_name;
use crate::read::{read_board_dir, LocalCard, LocalSnapshot, ReadError};
use crate::remote::{ClientError, WekanApi};
use crate::types::{Card, CardPatch, ListInfo};

/// One remote card with the list it currently sits in. `list_name` is the
/// sanitized list title, directly comparable to local directory names.
#[derive(Debug, Clone)]
pub struct RemoteCard {
    pub card: Card,
    pub list_id: String,
    pub list_name: String,
}

/// Remote board state at one point in time, keyed like the local snapshot.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    pub board_id: String,
    pub cards: BTreeMap<String, RemoteCard>,
    pub lists: Vec<ListInfo>,
}

impl RemoteSnapshot {
    /// Fetch the board's lists and all their cards. Any fetch failure fails
    /// the snapshot as a whole: detecting changes against a partial view
    /// would turn missing data into bogus creates and deletes.
    pub fn fetch(api: &dyn WekanApi, board_id: &str) -> Result<Self, ClientError> {
        let lists = api.get_lists(board_id)?;
        let mut cards = BTreeMap::new();
        for list in &lists {
            let list_name = sanitize_name(&list.title);
            for card in api.get_cards(board_id, &list.id)? {
                cards.insert(
                    card.id.clone(),
                    RemoteCard {
                        card,
                        list_id: list.id.clone(),
                        list_name: list_name.clone(),
                    },
                );
            }
        }
        Ok(RemoteSnapshot {
            board_id: board_id.to_string(),
            cards,
            lists,
        })
    }

    pub fn list_id_for_name(&self, sanitized: &str) -> Option<&str> {
        self.lists
            .iter()
            .find(|list| sanitize_name(&list.title) == sanitized)
            .map(|list| list.id.as_str())
    }
}

/// Title, body and containing list of one side of a change, for previews.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPayload {
    pub title: String,
    pub body: String,
    pub list_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardChange {
    Create {
        file: PathBuf,
        new: CardPayload,
    },
    Update {
        card_id: String,
        old: CardPayload,
        new: CardPayload,
    },
    Move {
        card_id: String,
        title: String,
        old_list: String,
        new_list: String,
    },
    Delete {
        card_id: String,
        title: String,
        list_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Move,
    Delete,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Move => "MOVE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

impl CardChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            CardChange::Create { .. } => ChangeKind::Create,
            CardChange::Update { .. } => ChangeKind::Update,
            CardChange::Move { .. } => ChangeKind::Move,
            CardChange::Delete { .. } => ChangeKind::Delete,
        }
    }
}

impl fmt::Display for CardChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardChange::Create { new, .. } => {
                write!(f, "create '{}' in {}", new.title, new.list_name)
            }
            CardChange::Update { new, .. } => write!(f, "update '{}'", new.title),
            CardChange::Move {
                title,
                old_list,
                new_list,
                ..
            } => write!(f, "move '{}' from {} to {}", title, old_list, new_list),
            CardChange::Delete {
                title, list_name, ..
            } => write!(f, "archive '{}' in {}", title, list_name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("remote error: {0}")]
    Remote(#[from] ClientError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("no list named '{name}' on the remote board")]
    UnknownList { name: String },

    #[error("card {card_id} is not on the remote board")]
    UnknownCard { card_id: String },

    #[error("board {board_id} has no swimlanes")]
    NoSwimlanes { board_id: String },
}

/// Compare local and remote snapshots and list what pushing would do.
///
/// Order is stable for a given pair of snapshots: changes for id-bearing
/// local cards (by id), then creates for new local files (by path), then
/// archives for remote-only cards (by id).
pub fn detect_changes(local: &LocalSnapshot, remote: &RemoteSnapshot) -> Vec<CardChange> {
    let mut changes = Vec::new();

    for (card_id, card) in &local.cards {
        let Some(remote_card) = remote.cards.get(card_id) else {
            // The preamble id is not on the board; treat the file the same
            // as one with no id at all.
            changes.push(create_change(card));
            continue;
        };

        let local_title = card
            .header
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| remote_card.card.title.clone());
        let local_body = cardfile::strip_title_heading(&card.body, &local_title);
        let remote_title = remote_card.card.title.clone();
        let remote_body = remote_card
            .card
            .description
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string();

        let local_list = sanitize_name(&card.list_name);

        if local_title != remote_title || local_body != remote_body {
            changes.push(CardChange::Update {
                card_id: card_id.clone(),
                old: CardPayload {
                    title: remote_title,
                    body: remote_body,
                    list_name: remote_card.list_name.clone(),
                },
                new: CardPayload {
                    title: local_title.clone(),
                    body: local_body,
                    list_name: local_list.clone(),
                },
            });
        }

        if local_list != remote_card.list_name {
            changes.push(CardChange::Move {
                card_id: card_id.clone(),
                title: local_title,
                old_list: remote_card.list_name.clone(),
                new_list: local_list,
            });
        }
    }

    for card in &local.new_cards {
        changes.push(create_change(card));
    }

    for (card_id, remote_card) in &remote.cards {
        if !local.cards.contains_key(card_id) {
            changes.push(CardChange::Delete {
                card_id: card_id.clone(),
                title: remote_card.card.title.clone(),
                list_name: remote_card.list_name.clone(),
            });
        }
    }

    changes
}

fn create_change(card: &LocalCard) -> CardChange {
    let title = card
        .header
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_stem(&card.file));
    CardChange::Create {
        file: card.file.clone(),
        new: CardPayload {
            title,
            // New cards go up verbatim; only known cards get the synthetic
            // heading stripped.
            body: card.body.clone(),
            list_name: sanitize_name(&card.list_name),
        },
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ChangeFailure {
    pub change: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub applied: usize,
    pub total: usize,
    pub failures: Vec<ChangeFailure>,
}

impl PushReport {
    /// True only when every detected change was applied.
    pub fn success(&self) -> bool {
        self.applied == self.total
    }
}

/// Apply a detected change list against the remote board. Each change is
/// isolated: failures are recorded and the rest still run.
pub fn apply_changes(
    api: &dyn WekanApi,
    remote: &RemoteSnapshot,
    changes: &[CardChange],
    events: &dyn EventSink,
) -> PushReport {
    let mut report = PushReport {
        total: changes.len(),
        ..PushReport::default()
    };
    let mut default_swimlane: Option<String> = None;

    for change in changes {
        match apply_one(api, remote, change, &mut default_swimlane) {
            Ok(()) => {
                report.applied += 1;
                log::info!("[wekit.push] {}", change);
                events.push_event(PushEvent::ChangeApplied {
                    description: change.to_string(),
                });
            }
            Err(e) => {
                log::warn!("[wekit.push] {} failed: {}", change, e);
                report.failures.push(ChangeFailure {
                    change: change.to_string(),
                    reason: e.to_string(),
                });
                events.push_event(PushEvent::ChangeFailed {
                    description: change.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

fn apply_one(
    api: &dyn WekanApi,
    remote: &RemoteSnapshot,
    change: &CardChange,
    default_swimlane: &mut Option<String>,
) -> Result<(), PushError> {
    match change {
        CardChange::Create { new, .. } => {
            let list_id = remote.list_id_for_name(&new.list_name).ok_or_else(|| {
                PushError::UnknownList {
                    name: new.list_name.clone(),
                }
            })?;
            // Cards land on the board's first swimlane; the local record's
            // swimlane id may be stale and is not trusted.
            let swimlane = match default_swimlane {
                Some(id) => id.clone(),
                None => {
                    let swimlanes = api.get_swimlanes(&remote.board_id)?;
                    let id = swimlanes.first().map(|s| s.id.clone()).ok_or_else(|| {
                        PushError::NoSwimlanes {
                            board_id: remote.board_id.clone(),
                        }
                    })?;
                    *default_swimlane = Some(id.clone());
                    id
                }
            };
            api.create_card(&remote.board_id, list_id, &swimlane, &new.title, &new.body)?;
            Ok(())
        }
        CardChange::Update { card_id, new, .. } => {
            let entry = remote
                .cards
                .get(card_id)
                .ok_or_else(|| PushError::UnknownCard {
                    card_id: card_id.clone(),
                })?;
            let patch = CardPatch {
                title: Some(new.title.clone()),
                description: Some(new.body.clone()),
                ..CardPatch::default()
            };
            api.edit_card(&remote.board_id, &entry.list_id, card_id, &patch)?;
            Ok(())
        }
        CardChange::Move {
            card_id, new_list, ..
        } => {
            let entry = remote
                .cards
                .get(card_id)
                .ok_or_else(|| PushError::UnknownCard {
                    card_id: card_id.clone(),
                })?;
            let target = remote
                .list_id_for_name(new_list)
                .ok_or_else(|| PushError::UnknownList {
                    name: new_list.clone(),
                })?;
            let patch = CardPatch {
                list_id: Some(target.to_string()),
                ..CardPatch::default()
            };
            api.edit_card(&remote.board_id, &entry.list_id, card_id, &patch)?;
            Ok(())
        }
        CardChange::Delete { card_id, .. } => {
            // Archiving is idempotent: a card that is already gone counts
            // as archived.
            let Some(entry) = remote.cards.get(card_id) else {
                return Ok(());
            };
            match api.archive_card(&remote.board_id, &entry.list_id, card_id) {
                Ok(()) => Ok(()),
                Err(ClientError::NotFound { .. }) => Ok(()),
                Err(e) => Err(PushError::Remote(e)),
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub dry_run: bool,
}

/// Everything `detect` learned, kept around so `apply_changes` reuses the
/// same remote view the changes were computed from.
#[derive(Debug)]
pub struct Detection {
    pub changes: Vec<CardChange>,
    pub local: LocalSnapshot,
    pub remote: RemoteSnapshot,
}

#[derive(Debug)]
pub enum PushOutcome {
    NoChanges,
    DryRun { changes: Vec<CardChange> },
    Declined { changes: Vec<CardChange> },
    Applied { report: PushReport },
}

pub struct Pusher<'a> {
    api: &'a dyn WekanApi,
    events: &'a dyn EventSink,
}

impl<'a> Pusher<'a> {
    pub fn new(api: &'a dyn WekanApi, events: &'a dyn EventSink) -> Self {
        Pusher { api, events }
    }

    /// Read the board directory, fetch remote state and list the changes
    /// pushing would apply. Used on its own for status and dry runs.
    pub fn detect(&self, board_dir: &Path, board_id: &str) -> Result<Detection, PushError> {
        let local = read_board_dir(board_dir)?;
        for failure in &local.soft_failures {
            log::warn!(
                "[wekit.push] skipping {}: {}",
                failure.file.display(),
                failure.reason
            );
        }
        let remote = RemoteSnapshot::fetch(self.api, board_id)?;
        let changes = detect_changes(&local, &remote);
        self.events.push_event(PushEvent::ChangesDetected {
            count: changes.len(),
        });
        Ok(Detection {
            changes,
            local,
            remote,
        })
    }

    /// Full push: detect, confirm, apply. `confirm` is only called when
    /// there are changes and this is not a dry run.
    pub fn push_board<F>(
        &self,
        board_dir: &Path,
        board_id: &str,
        opts: &PushOptions,
        confirm: F,
    ) -> Result<PushOutcome, PushError>
    where
        F: FnOnce(&[CardChange]) -> bool,
    {
        let detection = self.detect(board_dir, board_id)?;
        if detection.changes.is_empty() {
            return Ok(PushOutcome::NoChanges);
        }
        if opts.dry_run {
            return Ok(PushOutcome::DryRun {
                changes: detection.changes,
            });
        }
        if !confirm(&detection.changes) {
            return Ok(PushOutcome::Declined {
                changes: detection.changes,
            });
        }
        let report = apply_changes(self.api, &detection.remote, &detection.changes, self.events);
        Ok(PushOutcome::Applied { report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardfile::CardHeader;

    fn list(id: &str, title: &str) -> ListInfo {
        ListInfo {
            id: id.to_string(),
            title: title.to_string(),
            ..ListInfo::default()
        }
    }

    fn remote_card(id: &str, title: &str, desc: Option<&str>, list_id: &str) -> Card {
        Card {
            id: id.to_string(),
            title: title.to_string(),
            description: desc.map(str::to_string),
            list_id: Some(list_id.to_string()),
            ..Card::default()
        }
    }

    fn remote_snapshot(lists: Vec<ListInfo>, cards: Vec<Card>) -> RemoteSnapshot {
        let mut by_id = BTreeMap::new();
        for card in cards {
            let list_id = card.list_id.clone().unwrap_or_default();
            let list_name = lists
                .iter()
                .find(|l| l.id == list_id)
                .map(|l| sanitize_name(&l.title))
                .unwrap_or_default();
            by_id.insert(
                card.id.clone(),
                RemoteCard {
                    card,
                    list_id,
                    list_name,
                },
            );
        }
        RemoteSnapshot {
            board_id: "b1".to_string(),
            cards: by_id,
            lists,
        }
    }

    fn local_card(id: Option<&str>, title: &str, body: &str, list: &str) -> LocalCard {
        LocalCard {
            header: CardHeader {
                id: id.map(str::to_string),
                title: Some(title.to_string()),
                ..CardHeader::default()
            },
            body: body.to_string(),
            file: PathBuf::from(format!("{}/{}.md", list, sanitize_name(title))),
            list_name: list.to_string(),
            modified: None,
        }
    }

    fn local_snapshot(cards: Vec<LocalCard>) -> LocalSnapshot {
        let mut snapshot = LocalSnapshot::default();
        for card in cards {
            match card.header.id.clone() {
                Some(id) => {
                    snapshot.cards.insert(id, card);
                }
                None => snapshot.new_cards.push(card),
            }
        }
        snapshot
    }

    #[test]
    fn test_detect_clean_board_has_no_changes() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo")],
            vec![remote_card("c1", "Task", None, "l1")],
        );
        let local = local_snapshot(vec![local_card(Some("c1"), "Task", "# Task", "Todo")]);

        assert!(detect_changes(&local, &remote).is_empty());
    }

    #[test]
    fn test_detect_body_edit_is_an_update_with_normalized_body() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo")],
            vec![remote_card("c1", "Task", None, "l1")],
        );
        let local = local_snapshot(vec![local_card(
            Some("c1"),
            "Task",
            "# Task\n\nNow with notes",
            "Todo",
        )]);

        let changes = detect_changes(&local, &remote);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            CardChange::Update { card_id, new, .. } => {
                assert_eq!(card_id, "c1");
                assert_eq!(new.body, "Now with notes");
                assert_eq!(new.title, "Task");
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_title_edit_is_an_update() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo")],
            vec![remote_card("c1", "Old title", None, "l1")],
        );
        let local = local_snapshot(vec![local_card(
            Some("c1"),
            "New title",
            "# New title",
            "Todo",
        )]);

        let changes = detect_changes(&local, &remote);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind(), ChangeKind::Update);
    }

    #[test]
    fn test_detect_directory_change_is_a_move() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo"), list("l2", "Doing")],
            vec![remote_card("c1", "Task", None, "l1")],
        );
        let local = local_snapshot(vec![local_card(Some("c1"), "Task", "# Task", "Doing")]);

        let changes = detect_changes(&local, &remote);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            CardChange::Move {
                old_list, new_list, ..
            } => {
                assert_eq!(old_list, "Todo");
                assert_eq!(new_list, "Doing");
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_edit_and_move_produce_both_changes() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo"), list("l2", "Done")],
            vec![remote_card("c1", "Task", Some("old"), "l1")],
        );
        let local = local_snapshot(vec![local_card(
            Some("c1"),
            "Task",
            "# Task\n\nnew",
            "Done",
        )]);

        let changes = detect_changes(&local, &remote);
        let kinds: Vec<ChangeKind> = changes.iter().map(CardChange::kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Update, ChangeKind::Move]);
    }

    #[test]
    fn test_detect_new_file_is_a_create_with_verbatim_body() {
        let remote = remote_snapshot(vec![list("l1", "Todo")], vec![]);
        let local = local_snapshot(vec![local_card(
            None,
            "Fresh card",
            "# Fresh card\n\ndetails",
            "Todo",
        )]);

        let changes = detect_changes(&local, &remote);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            CardChange::Create { new, .. } => {
                assert_eq!(new.title, "Fresh card");
                assert_eq!(new.body, "# Fresh card\n\ndetails");
                assert_eq!(new.list_name, "Todo");
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_unknown_id_is_a_create() {
        let remote = remote_snapshot(vec![list("l1", "Todo")], vec![]);
        let local = local_snapshot(vec![local_card(
            Some("gone-from-remote"),
            "Task",
            "# Task",
            "Todo",
        )]);

        let changes = detect_changes(&local, &remote);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind(), ChangeKind::Create);
    }

    #[test]
    fn test_detect_remote_only_card_is_archived_last() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo")],
            vec![
                remote_card("c1", "Keep", None, "l1"),
                remote_card("c2", "Dropped locally", None, "l1"),
            ],
        );
        let local = local_snapshot(vec![
            local_card(Some("c1"), "Keep", "# Keep\n\nedited", "Todo"),
            local_card(None, "Brand new", "# Brand new", "Todo"),
        ]);

        let changes = detect_changes(&local, &remote);
        let kinds: Vec<ChangeKind> = changes.iter().map(CardChange::kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Update, ChangeKind::Create, ChangeKind::Delete]
        );
        match changes.last() {
            Some(CardChange::Delete { card_id, title, .. }) => {
                assert_eq!(card_id, "c2");
                assert_eq!(title, "Dropped locally");
            }
            other => panic!("expected delete, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_is_deterministic() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo"), list("l2", "Done")],
            vec![
                remote_card("c1", "A", None, "l1"),
                remote_card("c2", "B", None, "l2"),
                remote_card("c3", "C", None, "l1"),
            ],
        );
        let local = local_snapshot(vec![
            local_card(Some("c1"), "A", "# A\n\nx", "Todo"),
            local_card(Some("c2"), "B", "# B", "Todo"),
            local_card(None, "D", "# D", "Done"),
        ]);

        let first = detect_changes(&local, &remote);
        let second = detect_changes(&local, &remote);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_detect_missing_local_title_keeps_remote_title() {
        let remote = remote_snapshot(
            vec![list("l1", "Todo")],
            vec![remote_card("c1", "Remote title", None, "l1")],
        );
        let mut card = local_card(Some("c1"), "", "# Remote title", "Todo");
        card.header.title = None;
        let local = local_snapshot(vec![card]);

        assert!(detect_changes(&local, &remote).is_empty());
    }

    #[test]
    fn test_create_title_falls_back_to_file_stem() {
        let mut card = local_card(None, "", "some text", "Todo");
        card.header.title = None;
        card.file = PathBuf::from("Todo/scratch-note.md");

        match create_change(&card) {
            CardChange::Create { new, .. } => assert_eq!(new.title, "scratch-note"),
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_report_success_requires_every_change_applied() {
        let mut report = PushReport {
            applied: 2,
            total: 3,
            failures: vec![ChangeFailure {
                change: "update 'x'".to_string(),
                reason: "boom".to_string(),
            }],
        };
        assert!(!report.success());
        report.applied = 3;
        report.total = 3;
        assert!(report.success());
    }
}
