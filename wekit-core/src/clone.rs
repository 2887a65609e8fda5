/// Board cloner: walks a Wekan host over its REST API and materializes the
/// host -> board -> list -> card hierarchy as a markdown tree.
///
/// Partial failure is the normal case on real hosts, so failures are scoped:
/// a board, list or card that cannot be fetched or written is logged,
/// surfaced as an event and counted, while the rest of the tree is still
/// produced. Only host-scope failures (listing boards, writing the host
/// sidecar) abort the clone.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use regex::RegexBuilder;

use crate::cardfile::{self, CardHeader};
use crate::events::{CloneEvent, EventSink};
use crate::layout::{card_file_name, BOARD_META_DIR, HOST_META_DIR, LIST_META_DIR};
use crate::names::{host_dir_name, sanitize_name};
use crate::remote::{ClientError, WekanApi};
use crate::types::{BoardSummary, Card, Label, ListInfo, User};

/// Selects which boards to clone. A bare integer is a zero-based position in
/// the server's board listing; anything else matches an exact board id first
/// and falls back to a case-insensitive title regex.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardFilter {
    Index(usize),
    IdOrPattern(String),
}

impl BoardFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) => BoardFilter::Index(index),
            Err(_) => BoardFilter::IdOrPattern(raw.to_string()),
        }
    }

    fn select(&self, boards: &[BoardSummary]) -> Result<Vec<BoardSummary>, regex::Error> {
        match self {
            BoardFilter::Index(index) => Ok(boards.get(*index).cloned().into_iter().collect()),
            BoardFilter::IdOrPattern(raw) => {
                let by_id: Vec<BoardSummary> =
                    boards.iter().filter(|b| b.id == *raw).cloned().collect();
                if !by_id.is_empty() {
                    return Ok(by_id);
                }
                let pattern = RegexBuilder::new(raw).case_insensitive(true).build()?;
                Ok(boards
                    .iter()
                    .filter(|b| pattern.is_match(&b.title))
                    .cloned()
                    .collect())
            }
        }
    }
}

impl fmt::Display for BoardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardFilter::Index(index) => write!(f, "{}", index),
            BoardFilter::IdOrPattern(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub output_dir: PathBuf,
    pub board_filter: Option<BoardFilter>,
}

#[derive(Debug, Clone, Default)]
pub struct CloneReport {
    pub host_dir: PathBuf,
    /// Boards walked to completion. A board that failed midway counts under
    /// `failures` instead.
    pub boards: usize,
    pub lists: usize,
    pub cards: usize,
    /// Sub-operations (board, list or card scope) that were skipped.
    pub failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("remote error: {0}")]
    Remote(#[from] ClientError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid board filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("card serialize error: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

pub struct Cloner<'a> {
    api: &'a dyn WekanApi,
    events: &'a dyn EventSink,
}

impl<'a> Cloner<'a> {
    pub fn new(api: &'a dyn WekanApi, events: &'a dyn EventSink) -> Self {
        Cloner { api, events }
    }

    /// Clone every selected board of the host under
    /// `{output_dir}/{sanitized host}/`.
    pub fn clone_host(&self, opts: &CloneOptions) -> Result<CloneReport, CloneError> {
        let host_dir = opts.output_dir.join(host_dir_name(self.api.base_url()));
        let host_meta = host_dir.join(HOST_META_DIR);
        fs::create_dir_all(&host_meta)?;

        self.write_host_config(&host_meta)?;
        self.write_users_cache(&host_meta)?;
        // Enrichment reads the cache back from disk so that cards always
        // reflect what the sidecar actually holds.
        let users: Vec<User> = read_json_cache(&host_meta.join("users.json"));

        let all_boards = self.api.list_boards()?;
        let total = all_boards.len();
        let boards = match &opts.board_filter {
            Some(filter) => {
                let selected = filter.select(&all_boards)?;
                if selected.is_empty() {
                    log::warn!("[wekit.clone] no boards matched filter {}", filter);
                    self.events.clone_event(CloneEvent::FilterMatchedNothing {
                        filter: filter.to_string(),
                    });
                }
                selected
            }
            None => all_boards,
        };
        self.events.clone_event(CloneEvent::BoardsSelected {
            total,
            selected: boards.len(),
        });

        let mut report = CloneReport {
            host_dir: host_dir.clone(),
            ..CloneReport::default()
        };
        for board in &boards {
            self.events.clone_event(CloneEvent::BoardStarted {
                title: board.title.clone(),
            });
            match self.clone_board(&host_dir, board, &users, &mut report) {
                Ok((lists, cards)) => {
                    report.boards += 1;
                    self.events.clone_event(CloneEvent::BoardFinished {
                        title: board.title.clone(),
                        lists,
                        cards,
                    });
                }
                Err(e) => {
                    report.failures += 1;
                    log::warn!("[wekit.clone] board '{}' failed: {}", board.title, e);
                    self.events.clone_event(CloneEvent::BoardFailed {
                        title: board.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn clone_board(
        &self,
        host_dir: &Path,
        board: &BoardSummary,
        users: &[User],
        report: &mut CloneReport,
    ) -> Result<(usize, usize), CloneError> {
        let board_dir = host_dir.join(sanitize_name(&board.title));
        let board_meta = board_dir.join(BOARD_META_DIR);
        fs::create_dir_all(&board_meta)?;

        self.write_board_config(&board_meta, board)?;
        self.write_board_caches(&board.id, &board_meta)?;
        let labels: Vec<Label> = read_json_cache(&board_meta.join("labels.json"));

        let lists = self.api.get_lists(&board.id)?;
        let mut lists_done = 0;
        let mut cards_done = 0;
        for list in &lists {
            match self.clone_list(&board_dir, &board.id, list, &labels, users, report) {
                Ok(cards) => {
                    lists_done += 1;
                    cards_done += cards;
                }
                Err(e) => {
                    report.failures += 1;
                    log::warn!(
                        "[wekit.clone] list '{}' of '{}' failed: {}",
                        list.title,
                        board.title,
                        e
                    );
                    self.events.clone_event(CloneEvent::ListFailed {
                        board: board.title.clone(),
                        list: list.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.lists += lists_done;
        report.cards += cards_done;
        Ok((lists_done, cards_done))
    }

    fn clone_list(
        &self,
        board_dir: &Path,
        board_id: &str,
        list: &ListInfo,
        labels: &[Label],
        users: &[User],
        report: &mut CloneReport,
    ) -> Result<usize, CloneError> {
        let list_dir = board_dir.join(sanitize_name(&list.title));
        let list_meta = list_dir.join(LIST_META_DIR);
        fs::create_dir_all(&list_meta)?;
        self.write_list_config(&list_meta, list)?;

        let cards = self.api.get_cards(board_id, &list.id)?;
        let mut written = 0;
        for card in &cards {
            match self.write_card(&list_dir, board_id, card, labels, users) {
                Ok(()) => written += 1,
                Err(e) => {
                    report.failures += 1;
                    log::warn!("[wekit.clone] card '{}' failed: {}", card.title, e);
                    self.events.clone_event(CloneEvent::CardFailed {
                        card: card.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(written)
    }

    fn write_card(
        &self,
        list_dir: &Path,
        board_id: &str,
        card: &Card,
        labels: &[Label],
        users: &[User],
    ) -> Result<(), CloneError> {
        let mut header = CardHeader::from_remote(card);
        header.labels = resolve_label_names(&card.label_ids, labels);
        header.members = resolve_usernames(&card.members, users);
        header.assignees = resolve_usernames(&card.assignees, users);

        let body = self.card_body(board_id, card, users);
        let content = cardfile::render_card_file(&header, &body)?;
        let file = list_dir.join(card_file_name(card.card_number, &card.title));
        fs::write(file, content)?;
        Ok(())
    }

    /// Assemble the markdown body: title heading, then description,
    /// checklists and comments as far as the server will hand them out.
    fn card_body(&self, board_id: &str, card: &Card, users: &[User]) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(cardfile::title_heading(&card.title));
        parts.push(String::new());

        if let Some(desc) = card.description.as_deref() {
            if !desc.is_empty() {
                parts.push("## Description".to_string());
                parts.push(desc.to_string());
                parts.push(String::new());
            }
        }

        match self.api.get_checklists(board_id, &card.id) {
            Ok(checklists) => {
                if !checklists.is_empty() {
                    parts.push("## Checklists".to_string());
                    parts.push(String::new());
                    for checklist in &checklists {
                        parts.push(format!("### {}", checklist.title));
                        for item in &checklist.items {
                            let mark = if item.is_finished { "x" } else { " " };
                            parts.push(format!("- [{}] {}", mark, item.title));
                        }
                        parts.push(String::new());
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "[wekit.clone] checklists for '{}' unavailable: {}",
                    card.title,
                    e
                );
                self.events.clone_event(CloneEvent::SectionSkipped {
                    card: card.title.clone(),
                    section: "checklists".to_string(),
                    reason: e.to_string(),
                });
            }
        }

        match self.api.get_comments(board_id, &card.id) {
            Ok(comments) => {
                if !comments.is_empty() {
                    parts.push("## Comments".to_string());
                    parts.push(String::new());
                    for comment in &comments {
                        let author = comment
                            .author_id
                            .as_deref()
                            .and_then(|id| users.iter().find(|u| u.id == id))
                            .map(|u| u.username.clone())
                            .unwrap_or_else(|| "Unknown".to_string());
                        match comment.created_at {
                            Some(ts) => parts.push(format!(
                                "### {} - {}",
                                author,
                                cardfile::format_timestamp(ts)
                            )),
                            None => parts.push(format!("### {}", author)),
                        }
                        parts.push(comment.text.clone());
                        parts.push(String::new());
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "[wekit.clone] comments for '{}' unavailable: {}",
                    card.title,
                    e
                );
                self.events.clone_event(CloneEvent::SectionSkipped {
                    card: card.title.clone(),
                    section: "comments".to_string(),
                    reason: e.to_string(),
                });
            }
        }

        let mut body = parts.join("\n");
        while body.ends_with('\n') {
            body.pop();
        }
        body
    }

    fn write_host_config(&self, host_meta: &Path) -> io::Result<()> {
        let content = format!(
            "# Wekan Host\n\n**Base URL:** {}\n**User:** {}\n**Last Cloned:** {}\n",
            self.api.base_url(),
            self.api.username(),
            now_stamp()
        );
        fs::write(host_meta.join("config.md"), content)
    }

    fn write_users_cache(&self, host_meta: &Path) -> Result<(), CloneError> {
        match self.api.get_users() {
            Ok(users) => write_json(&host_meta.join("users.json"), &users)?,
            Err(e) => {
                // Listing users needs admin rights on most instances.
                self.skip_cache("users.json", e);
            }
        }
        Ok(())
    }

    fn write_board_config(
        &self,
        board_meta: &Path,
        board: &BoardSummary,
    ) -> Result<(), CloneError> {
        // The **ID:** line is what ties the directory back to the remote
        // board when no export dump is around, so keep its shape stable.
        let mut content = format!(
            "# {}\n\n**ID:** `{}`\n**Cloned:** {}\n\n## Swimlanes\n",
            board.title,
            board.id,
            now_stamp()
        );
        match self.api.get_swimlanes(&board.id) {
            Ok(swimlanes) => {
                for swimlane in &swimlanes {
                    content.push_str(&format!("- {}: `{}`\n", swimlane.title, swimlane.id));
                }
            }
            Err(e) => self.skip_cache("swimlanes", e),
        }
        fs::write(board_meta.join("config.md"), content)?;
        Ok(())
    }

    /// Board-level caches. A failed fetch still produces the sidecar file,
    /// as an empty list.
    fn write_board_caches(&self, board_id: &str, board_meta: &Path) -> Result<(), CloneError> {
        let labels = self.api.get_labels(board_id).unwrap_or_else(|e| {
            self.skip_cache("labels.json", e);
            Vec::new()
        });
        write_json(&board_meta.join("labels.json"), &labels)?;

        let fields = self.api.get_custom_fields(board_id).unwrap_or_else(|e| {
            self.skip_cache("custom-fields.json", e);
            Vec::new()
        });
        write_json(&board_meta.join("custom-fields.json"), &fields)?;

        let integrations = self.api.get_integrations(board_id).unwrap_or_else(|e| {
            self.skip_cache("integrations.json", e);
            Vec::new()
        });
        write_json(&board_meta.join("integrations.json"), &integrations)?;

        let members = self.api.get_members(board_id).unwrap_or_else(|e| {
            self.skip_cache("members.json", e);
            Vec::new()
        });
        write_json(&board_meta.join("members.json"), &members)?;
        Ok(())
    }

    fn skip_cache(&self, name: &str, error: ClientError) {
        log::warn!("[wekit.clone] cache {} unavailable: {}", name, error);
        self.events.clone_event(CloneEvent::CacheSkipped {
            name: name.to_string(),
            reason: error.to_string(),
        });
    }

    fn write_list_config(&self, list_meta: &Path, list: &ListInfo) -> io::Result<()> {
        let wip = match &list.wip_limit {
            Some(limit) if limit.enabled => limit.value.to_string(),
            _ => "none".to_string(),
        };
        let content = format!(
            "# {}\n\n**ID:** `{}`\n**Sort:** {}\n**Color:** {}\n**WIP Limit:** {}\n\
             **Swimlane:** {}\n**Created:** {}\n**Updated:** {}\n",
            list.title,
            list.id,
            list.sort
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            list.color.as_deref().unwrap_or("-"),
            wip,
            list.swimlane_id.as_deref().unwrap_or("-"),
            list.created_at
                .map(cardfile::format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
            list.updated_at
                .map(cardfile::format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
        );
        fs::write(list_meta.join("config.md"), content)
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
}

fn read_json_cache<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

fn resolve_label_names(label_ids: &[String], labels: &[Label]) -> Vec<String> {
    label_ids
        .iter()
        .filter_map(|id| labels.iter().find(|label| label.id == *id))
        .map(|label| label.name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

fn resolve_usernames(ids: &[String], users: &[User]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| users.iter().find(|user| user.id == *id))
        .map(|user| user.username.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(id: &str, title: &str) -> BoardSummary {
        BoardSummary {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_filter_parse_distinguishes_index_from_pattern() {
        assert_eq!(BoardFilter::parse("2"), BoardFilter::Index(2));
        assert_eq!(
            BoardFilter::parse("dev.*"),
            BoardFilter::IdOrPattern("dev.*".to_string())
        );
    }

    #[test]
    fn test_filter_by_index() {
        let boards = vec![board("b1", "One"), board("b2", "Two")];
        let selected = BoardFilter::Index(1).select(&boards).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "b2");
        assert!(BoardFilter::Index(5).select(&boards).unwrap().is_empty());
    }

    #[test]
    fn test_filter_exact_id_wins_over_pattern() {
        let boards = vec![board("dev", "dev board"), board("b2", "Development")];
        let selected = BoardFilter::IdOrPattern("dev".to_string())
            .select(&boards)
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "dev");
    }

    #[test]
    fn test_filter_title_regex_is_case_insensitive() {
        let boards = vec![
            board("b1", "Development"),
            board("b2", "Ops"),
            board("b3", "DEVOPS"),
        ];
        let selected = BoardFilter::IdOrPattern("dev".to_string())
            .select(&boards)
            .unwrap();
        let ids: Vec<&str> = selected.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b3"]);
    }

    #[test]
    fn test_filter_invalid_pattern_is_an_error() {
        let boards = vec![board("b1", "One")];
        assert!(BoardFilter::IdOrPattern("[".to_string())
            .select(&boards)
            .is_err());
    }

    #[test]
    fn test_resolve_label_names_skips_unknown_and_unnamed() {
        let labels = vec![
            Label {
                id: "l1".to_string(),
                name: "bug".to_string(),
                color: Some("red".to_string()),
            },
            Label {
                id: "l2".to_string(),
                name: String::new(),
                color: None,
            },
        ];
        let ids = vec!["l1".to_string(), "l2".to_string(), "l3".to_string()];
        assert_eq!(resolve_label_names(&ids, &labels), vec!["bug"]);
    }

    #[test]
    fn test_json_cache_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let users = vec![User {
            id: "u1".to_string(),
            username: "ada".to_string(),
        }];
        write_json(&path, &users).unwrap();
        let back: Vec<User> = read_json_cache(&path);
        assert_eq!(back, users);

        let missing: Vec<User> = read_json_cache(&dir.path().join("absent.json"));
        assert!(missing.is_empty());
    }
}
