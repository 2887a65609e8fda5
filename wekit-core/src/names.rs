/// Name codec for the mirror tree.
///
/// Every remote title that becomes a directory or file name goes through
/// `sanitize_name`; host URLs go through `host_dir_name`. Both are pure and
/// deterministic so repeated clones land on the same paths, and the pusher
/// can re-derive a list's directory name from its remote title when joining
/// the two sides.
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Maximum length (in characters) of a sanitized name.
pub const MAX_NAME_LEN: usize = 200;

fn invalid_chars_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid invalid-chars regex"))
}

fn separator_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_\s]+").expect("valid separator-run regex"))
}

fn is_trim_char(c: char) -> bool {
    c == '_' || c == '.' || c == ' '
}

/// Make a title safe for use as a file or directory name.
///
/// Filesystem-unsafe characters become `_`, runs of underscores and
/// whitespace collapse into a single `_`, leading/trailing `_`, `.` and
/// spaces are trimmed, and the result is capped at [`MAX_NAME_LEN`]
/// characters. An empty result falls back to `"untitled"`.
pub fn sanitize_name(text: &str) -> String {
    let replaced = invalid_chars_regex().replace_all(text, "_");
    let collapsed = separator_run_regex().replace_all(&replaced, "_");
    let mut name = collapsed.trim_matches(is_trim_char).to_string();
    if name.chars().count() > MAX_NAME_LEN {
        name = name.chars().take(MAX_NAME_LEN).collect();
        name = name.trim_end_matches(is_trim_char).to_string();
    }
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}

/// Derive the host directory name from a base URL.
///
/// Extracts `host[:port]` and runs it through the same sanitizer as every
/// other name, so `http://localhost:8080` maps to `localhost_8080`. Inputs
/// the URL parser rejects (bare host names without a scheme) fall back to
/// stripping any scheme and path by hand.
pub fn host_dir_name(base_url: &str) -> String {
    let host_port = match Url::parse(base_url) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }
        }
        Err(_) => {
            let rest = base_url.split("://").nth(1).unwrap_or(base_url);
            rest.split('/').next().unwrap_or(rest).to_string()
        }
    };
    sanitize_name(&host_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_name("Project: Alpha/Beta"), "Project_Alpha_Beta");
        assert_eq!(sanitize_name("Test<>File"), "Test_File");
        assert_eq!(sanitize_name(r"back\slash|pipe"), "back_slash_pipe");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_name("   Multiple   Spaces   "), "Multiple_Spaces");
        assert_eq!(sanitize_name("tabs\t\tand\nnewlines"), "tabs_and_newlines");
    }

    #[test]
    fn test_sanitize_trims_dots_and_underscores() {
        assert_eq!(sanitize_name("__name__"), "name");
        assert_eq!(sanitize_name("...hidden..."), "hidden");
        assert_eq!(sanitize_name("_. mixed ._"), "mixed");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_name(""), "untitled");
        assert_eq!(sanitize_name("???"), "untitled");
        assert_eq!(sanitize_name("   "), "untitled");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(250);
        let out = sanitize_name(&long);
        assert_eq!(out.len(), 200);
        assert_eq!(out, "a".repeat(200));

        // Cut must not leave a trailing separator behind
        let mut tricky = "b".repeat(199);
        tricky.push('_');
        tricky.push_str(&"c".repeat(50));
        let out = sanitize_name(&tricky);
        assert_eq!(out, "b".repeat(199));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in ["Project: Alpha/Beta", "  spaced  out  ", "", "a b c", "???"] {
            let once = sanitize_name(input);
            assert_eq!(sanitize_name(&once), once);
        }
    }

    #[test]
    fn test_sanitize_multibyte_near_cap() {
        let long = "ä".repeat(230);
        let out = sanitize_name(&long);
        assert_eq!(out.chars().count(), 200);
    }

    #[test]
    fn test_host_dir_name_with_port() {
        assert_eq!(host_dir_name("http://localhost:8080"), "localhost_8080");
        assert_eq!(
            host_dir_name("https://wekan.example.com:3000"),
            "wekan.example.com_3000"
        );
    }

    #[test]
    fn test_host_dir_name_without_port() {
        assert_eq!(host_dir_name("https://wekan.example.com"), "wekan.example.com");
        assert_eq!(host_dir_name("https://wekan.example.com/path/x"), "wekan.example.com");
    }

    #[test]
    fn test_host_dir_name_without_scheme() {
        assert_eq!(host_dir_name("wekan.example.com"), "wekan.example.com");
        assert_eq!(host_dir_name("wekan.example.com/some/path"), "wekan.example.com");
    }
}
