/// Card file format: a YAML preamble between `---` marker lines, then a
/// markdown body that starts with a synthetic `# <title>` heading.
///
/// The preamble carries the card's identity and remote attributes. The `id`
/// key is the join key for reconciliation; label/member/assignee names are
/// display data resolved from sidecar caches, with the raw ids kept in the
/// `*_ids` keys so a stale cache can never lose identity.
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::types::{Card, CardCustomField};

pub const PREAMBLE_MARKER: &str = "---";

/// Typed view of the card file preamble. Everything except `archived` is
/// optional so that hand-edited files with missing keys still parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swimlane_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<f64>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CardCustomField>,
}

impl CardHeader {
    /// Map a remote card's own attributes into a preamble. Display names
    /// (labels, members, assignees) are filled in separately by the cloner
    /// once the sidecar caches exist.
    pub fn from_remote(card: &Card) -> Self {
        CardHeader {
            id: Some(card.id.clone()),
            title: Some(card.title.clone()),
            card_number: card.card_number,
            swimlane_id: card.swimlane_id.clone(),
            sort: card.sort,
            archived: card.archived,
            created_at: card.created_at.map(format_timestamp),
            modified_at: card.modified_at.map(format_timestamp),
            due_at: card.due_at.map(format_timestamp),
            labels: Vec::new(),
            label_ids: card.label_ids.clone(),
            members: Vec::new(),
            member_ids: card.members.clone(),
            assignees: Vec::new(),
            assignee_ids: card.assignees.clone(),
            custom_fields: card.custom_fields.clone(),
        }
    }
}

pub(crate) fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The synthetic heading the serializer puts at the top of every card body.
pub fn title_heading(title: &str) -> String {
    format!("# {}", title)
}

/// Result of parsing a card file. `header_error` is set when the preamble
/// was missing or malformed; the header is then empty and the body holds
/// the whole file (a soft parse failure, never an error).
#[derive(Debug, Clone)]
pub struct ParsedCardFile {
    pub header: CardHeader,
    pub body: String,
    pub header_error: Option<String>,
}

/// Render a card file from its preamble and body.
pub fn render_card_file(header: &CardHeader, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(header)?;
    let mut out = String::new();
    out.push_str(PREAMBLE_MARKER);
    out.push('\n');
    out.push_str(yaml.trim_end());
    out.push('\n');
    out.push_str(PREAMBLE_MARKER);
    out.push_str("\n\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Parse a card file into preamble and body. Never fails: malformed input
/// degrades to an empty header with the whole file as body.
pub fn parse_card_file(content: &str) -> ParsedCardFile {
    let normalized = content.replace("\r\n", "\n");

    let soft = |reason: &str, normalized: &str| ParsedCardFile {
        header: CardHeader::default(),
        body: normalized.trim().to_string(),
        header_error: Some(reason.to_string()),
    };

    let mut lines = normalized.lines();
    match lines.next() {
        Some(first) if first.trim_start_matches('\u{feff}').trim_end() == PREAMBLE_MARKER => {}
        _ => return soft("missing preamble marker", &normalized),
    }

    let mut yaml_lines: Vec<&str> = Vec::new();
    let mut closed = false;
    for line in &mut lines {
        if line.trim_end() == PREAMBLE_MARKER {
            closed = true;
            break;
        }
        yaml_lines.push(line);
    }
    if !closed {
        return soft("unterminated preamble", &normalized);
    }

    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    let yaml_src = yaml_lines.join("\n");
    if yaml_src.trim().is_empty() {
        return ParsedCardFile {
            header: CardHeader::default(),
            body,
            header_error: None,
        };
    }

    match serde_yaml::from_str::<CardHeader>(&yaml_src) {
        Ok(header) => ParsedCardFile {
            header,
            body,
            header_error: None,
        },
        Err(e) => soft(&format!("invalid preamble: {}", e), &normalized),
    }
}

/// Strip the serializer's synthetic `# <title>` heading (plus blank lines
/// after it) from a body. The heading is generated, not authored, so it
/// must not take part in content comparison against the remote
/// description. Anything else is left untouched.
pub fn strip_title_heading(body: &str, title: &str) -> String {
    let trimmed = body.trim();
    let heading = title_heading(title);
    let Some(rest) = trimmed.strip_prefix(&heading) else {
        return trimmed.to_string();
    };
    // Only a full heading line counts, not a title that happens to be a
    // prefix of the first line
    if !(rest.is_empty() || rest.starts_with('\n')) {
        return trimmed.to_string();
    }
    rest.trim_start_matches('\n').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> CardHeader {
        CardHeader {
            id: Some("c9GQbri46ub3nbivP".to_string()),
            title: Some("Fix login".to_string()),
            card_number: Some(12),
            sort: Some(1.5),
            labels: vec!["bug".to_string()],
            label_ids: vec!["lbl1".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_render_then_parse_round_trip() {
        let body = "# Fix login\n\n## Description\nBroken on Safari";
        let rendered = render_card_file(&sample_header(), body).unwrap();
        let parsed = parse_card_file(&rendered);
        assert!(parsed.header_error.is_none());
        assert_eq!(parsed.header, sample_header());
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn test_round_trip_preserves_body_minus_heading() {
        let body = "# Card title\n\nactual content";
        let rendered = render_card_file(&sample_header(), body).unwrap();
        let parsed = parse_card_file(&rendered);
        let stripped = strip_title_heading(&parsed.body, "Card title");
        assert_eq!(stripped, "actual content");
    }

    #[test]
    fn test_parse_without_preamble_is_soft() {
        let parsed = parse_card_file("# Just a heading\n\nSome text");
        assert!(parsed.header_error.is_some());
        assert_eq!(parsed.header, CardHeader::default());
        assert_eq!(parsed.body, "# Just a heading\n\nSome text");
    }

    #[test]
    fn test_parse_unterminated_preamble_is_soft() {
        let parsed = parse_card_file("---\nid: abc\nno closing marker");
        assert!(parsed.header_error.is_some());
        assert!(parsed.body.contains("id: abc"));
    }

    #[test]
    fn test_parse_invalid_yaml_is_soft() {
        let parsed = parse_card_file("---\nid: [unclosed\n---\n\nBody");
        assert!(parsed.header_error.is_some());
        assert_eq!(parsed.header, CardHeader::default());
        // Whole file becomes the body so nothing is lost
        assert!(parsed.body.contains("Body"));
        assert!(parsed.body.contains("[unclosed"));
    }

    #[test]
    fn test_parse_empty_preamble() {
        let parsed = parse_card_file("---\n---\n\nOnly body");
        assert!(parsed.header_error.is_none());
        assert_eq!(parsed.header, CardHeader::default());
        assert_eq!(parsed.body, "Only body");
    }

    #[test]
    fn test_parse_crlf_input() {
        let parsed = parse_card_file("---\r\nid: abc\r\n---\r\n\r\nBody line\r\n");
        assert!(parsed.header_error.is_none());
        assert_eq!(parsed.header.id.as_deref(), Some("abc"));
        assert_eq!(parsed.body, "Body line");
    }

    #[test]
    fn test_archived_key_always_rendered() {
        let rendered = render_card_file(&sample_header(), "# Fix login").unwrap();
        assert!(rendered.contains("archived: false"));
    }

    #[test]
    fn test_strip_title_heading_exact() {
        assert_eq!(strip_title_heading("# Fix login\n\nBody", "Fix login"), "Body");
        assert_eq!(strip_title_heading("# Fix login", "Fix login"), "");
        assert_eq!(strip_title_heading("# Fix login\n\n\nBody", "Fix login"), "Body");
    }

    #[test]
    fn test_strip_title_heading_requires_line_boundary() {
        // "Fix" is a prefix of the first line but not the whole heading
        assert_eq!(
            strip_title_heading("# Fix login now\nBody", "Fix login"),
            "# Fix login now\nBody"
        );
    }

    #[test]
    fn test_strip_title_heading_absent() {
        assert_eq!(strip_title_heading("plain body", "Fix login"), "plain body");
        assert_eq!(strip_title_heading("", "Fix login"), "");
    }

    #[test]
    fn test_header_from_remote_retains_raw_ids() {
        let card = Card {
            id: "c1".to_string(),
            title: "Tagged".to_string(),
            label_ids: vec!["lbl1".to_string(), "lbl2".to_string()],
            members: vec!["u1".to_string()],
            assignees: vec!["u2".to_string()],
            ..Default::default()
        };
        let header = CardHeader::from_remote(&card);
        assert_eq!(header.label_ids, vec!["lbl1", "lbl2"]);
        assert_eq!(header.member_ids, vec!["u1"]);
        assert_eq!(header.assignee_ids, vec!["u2"]);
        assert!(header.labels.is_empty());
    }
}
