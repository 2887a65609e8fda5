/// Directory layout of a cloned host.
///
/// Each container directory owns exactly one reserved metadata child, named
/// with a fixed dot prefix:
///
///   <output>/<host>/            .wekan-host/   (config.md, users.json)
///     <board>/                  .wekan-board/  (config.md, labels.json, ...)
///       <list>/                 .wekan-list/   (config.md)
///         NNN-<title>.md        one file per card
///
/// Every directory listing in the crate decides "data child or metadata?"
/// through [`is_metadata_child`], never through ad hoc prefix checks.
use crate::names::sanitize_name;

pub const HOST_META_DIR: &str = ".wekan-host";
pub const BOARD_META_DIR: &str = ".wekan-board";
pub const LIST_META_DIR: &str = ".wekan-list";

/// Prefix of board export dumps dropped into a board directory by hand.
/// They carry the board id but are never card data.
pub const EXPORT_DUMP_PREFIX: &str = "export-board-";

/// True for the reserved metadata child of a container directory (and for
/// any other hidden entry, which the data walk must skip the same way).
pub fn is_metadata_child(name: &str) -> bool {
    name.starts_with('.')
}

/// True for files matching the export-dump naming pattern.
pub fn is_export_dump(name: &str) -> bool {
    name.starts_with(EXPORT_DUMP_PREFIX)
}

/// File name for a card: `NNN-<sanitized title>.md` when the card carries a
/// card number, else the sanitized title alone. Without a number the list
/// ordering is not recoverable from the name.
pub fn card_file_name(card_number: Option<i64>, title: &str) -> String {
    let base = sanitize_name(title);
    match card_number {
        Some(n) => format!("{:03}-{}.md", n, base),
        None => format!("{}.md", base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_child_predicate() {
        assert!(is_metadata_child(HOST_META_DIR));
        assert!(is_metadata_child(BOARD_META_DIR));
        assert!(is_metadata_child(LIST_META_DIR));
        assert!(is_metadata_child(".hidden"));
        assert!(!is_metadata_child("Todo"));
        assert!(!is_metadata_child("001-fix-bug.md"));
    }

    #[test]
    fn test_export_dump_predicate() {
        assert!(is_export_dump("export-board-c9GQbri46ub3nbivP.json"));
        assert!(!is_export_dump("board-export.json"));
        assert!(!is_export_dump("001-export-plan.md"));
    }

    #[test]
    fn test_card_file_name_with_number() {
        assert_eq!(card_file_name(Some(7), "Fix login"), "007-Fix_login.md");
        assert_eq!(card_file_name(Some(123), "Fix login"), "123-Fix_login.md");
        assert_eq!(card_file_name(Some(1234), "big"), "1234-big.md");
    }

    #[test]
    fn test_card_file_name_without_number() {
        assert_eq!(card_file_name(None, "Fix: login/logout"), "Fix_login_logout.md");
        assert_eq!(card_file_name(None, ""), "untitled.md");
    }
}
