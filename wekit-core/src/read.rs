/// Local snapshot reader: parses a cloned board directory back into card
/// records keyed by card id.
///
/// Only the id in a card's preamble ties it to the remote card; filenames
/// are display-only and never parsed for identity. Files that parse cleanly
/// but carry no id are new cards, not errors. Malformed files are soft
/// failures: they are reported on the snapshot and skipped, never an error
/// for the whole read.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::cardfile::{self, CardHeader, PREAMBLE_MARKER};
use crate::layout::{is_export_dump, is_metadata_child, BOARD_META_DIR};

#[derive(Debug, Clone)]
pub struct LocalCard {
    pub header: CardHeader,
    pub body: String,
    pub file: PathBuf,
    /// Name of the containing directory, which is the sanitized list name.
    pub list_name: String,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct SoftFailure {
    pub file: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LocalSnapshot {
    pub cards: BTreeMap<String, LocalCard>,
    /// Card files without an id in the preamble. They cannot join against
    /// remote state and exist only locally.
    pub new_cards: Vec<LocalCard>,
    pub soft_failures: Vec<SoftFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("not a board directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read every card file under a board directory.
///
/// Skips metadata children, hidden entries and export dumps. Files with a
/// damaged preamble are recorded as soft failures; files with no preamble
/// or no id land in `new_cards`.
pub fn read_board_dir(board_dir: &Path) -> Result<LocalSnapshot, ReadError> {
    if !board_dir.is_dir() {
        return Err(ReadError::NotADirectory(board_dir.to_path_buf()));
    }

    let mut snapshot = LocalSnapshot::default();

    let walker = WalkDir::new(board_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_metadata_child(&entry.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let file = e.path().map(Path::to_path_buf).unwrap_or_default();
                log::warn!("[wekit.read] walk error at {}: {}", file.display(), e);
                snapshot.soft_failures.push(SoftFailure {
                    file,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".md") || is_export_dump(&name) {
            continue;
        }

        let content = match fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("[wekit.read] cannot read {}: {}", entry.path().display(), e);
                snapshot.soft_failures.push(SoftFailure {
                    file: entry.path().to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let parsed = cardfile::parse_card_file(&content);
        if let Some(reason) = parsed.header_error {
            // A file that starts with a preamble marker but will not parse
            // is damaged and gets skipped. A plain markdown file without
            // any preamble is just a hand-written new card.
            let attempted = content
                .trim_start_matches('\u{feff}')
                .trim_start()
                .starts_with(PREAMBLE_MARKER);
            if attempted {
                log::warn!("[wekit.read] {}: {}", entry.path().display(), reason);
                snapshot.soft_failures.push(SoftFailure {
                    file: entry.path().to_path_buf(),
                    reason,
                });
                continue;
            }
        }

        let list_name = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        let card = LocalCard {
            header: parsed.header,
            body: parsed.body,
            file: entry.into_path(),
            list_name,
            modified,
        };

        match card.header.id.clone().filter(|id| !id.is_empty()) {
            Some(id) => {
                snapshot.cards.insert(id, card);
            }
            None => snapshot.new_cards.push(card),
        }
    }

    Ok(snapshot)
}

/// Recover the board id from a cloned board directory: an export dump's
/// `_id` field wins, then the `**ID:**` line of the board sidecar
/// descriptor.
pub fn find_board_id(board_dir: &Path) -> Option<String> {
    if let Ok(entries) = fs::read_dir(board_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_export_dump(&name) && name.ends_with(".json") {
                if let Some(id) = export_dump_board_id(&entry.path()) {
                    return Some(id);
                }
            }
        }
    }

    let config = board_dir.join(BOARD_META_DIR).join("config.md");
    let content = fs::read_to_string(config).ok()?;
    for line in content.lines() {
        if line.starts_with("**ID:**") {
            // Line looks like: **ID:** `c9GQbri46ub3nbivP`
            if let Some(id) = line.split('`').nth(1) {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

fn export_dump_board_id(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value.get("_id")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn card_file(id: &str, title: &str, body: &str) -> String {
        format!("---\nid: {}\ntitle: {}\narchived: false\n---\n\n{}\n", id, title, body)
    }

    #[test]
    fn test_read_collects_cards_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(
            &board.join("Todo/001-Buy_milk.md"),
            &card_file("card1", "Buy milk", "# Buy milk"),
        );
        write(
            &board.join("Doing/002-Fix_bug.md"),
            &card_file("card2", "Fix bug", "# Fix bug\n\n## Description\nIt crashes"),
        );

        let snapshot = read_board_dir(board).unwrap();
        assert_eq!(snapshot.cards.len(), 2);
        assert_eq!(snapshot.cards["card1"].list_name, "Todo");
        assert_eq!(snapshot.cards["card2"].list_name, "Doing");
        assert!(snapshot.cards["card2"].body.contains("It crashes"));
        assert!(snapshot.soft_failures.is_empty());
    }

    #[test]
    fn test_read_skips_metadata_and_export_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(&board.join(".wekan-board/config.md"), "# Board\n\n**ID:** `b1`\n");
        write(&board.join("Todo/.wekan-list/config.md"), "# Todo\n");
        write(&board.join("export-board-b1.json"), r#"{"_id": "b1"}"#);
        write(
            &board.join("Todo/001-Task.md"),
            &card_file("card1", "Task", "# Task"),
        );

        let snapshot = read_board_dir(board).unwrap();
        assert_eq!(snapshot.cards.len(), 1);
        assert!(snapshot.cards.contains_key("card1"));
    }

    #[test]
    fn test_read_reports_malformed_preamble_as_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(&board.join("Todo/broken.md"), "---\nid: [unclosed\n---\n\nBody\n");
        write(
            &board.join("Todo/001-Good.md"),
            &card_file("card1", "Good", "# Good"),
        );

        let snapshot = read_board_dir(board).unwrap();
        assert_eq!(snapshot.cards.len(), 1);
        assert_eq!(snapshot.soft_failures.len(), 1);
        assert!(snapshot.soft_failures[0]
            .file
            .to_string_lossy()
            .contains("broken.md"));
    }

    #[test]
    fn test_read_bare_markdown_is_a_new_card() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(&board.join("Todo/idea.md"), "# An idea\n\nJust notes so far\n");

        let snapshot = read_board_dir(board).unwrap();
        assert!(snapshot.cards.is_empty());
        assert!(snapshot.soft_failures.is_empty());
        assert_eq!(snapshot.new_cards.len(), 1);
        assert_eq!(snapshot.new_cards[0].body, "# An idea\n\nJust notes so far");
        assert!(snapshot.new_cards[0].header.id.is_none());
    }

    #[test]
    fn test_read_file_without_id_is_a_new_card() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(
            &board.join("Todo/no-id.md"),
            "---\ntitle: No identity\n---\n\n# No identity\n",
        );

        let snapshot = read_board_dir(board).unwrap();
        assert!(snapshot.cards.is_empty());
        assert!(snapshot.soft_failures.is_empty());
        assert_eq!(snapshot.new_cards.len(), 1);
        assert_eq!(
            snapshot.new_cards[0].header.title.as_deref(),
            Some("No identity")
        );
        assert_eq!(snapshot.new_cards[0].list_name, "Todo");
    }

    #[test]
    fn test_read_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            read_board_dir(&missing),
            Err(ReadError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_find_board_id_prefers_export_dump() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(&board.join(".wekan-board/config.md"), "# B\n\n**ID:** `from-config`\n");
        write(&board.join("export-board-x.json"), r#"{"_id": "from-dump"}"#);

        assert_eq!(find_board_id(board).as_deref(), Some("from-dump"));
    }

    #[test]
    fn test_find_board_id_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let board = dir.path();
        write(
            &board.join(".wekan-board/config.md"),
            "# My Board\n\n**ID:** `c9GQbri46ub3nbivP`\n**Cloned:** whenever\n",
        );

        assert_eq!(find_board_id(board).as_deref(), Some("c9GQbri46ub3nbivP"));
    }

    #[test]
    fn test_find_board_id_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_board_id(dir.path()), None);
    }
}
