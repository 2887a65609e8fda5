pub mod http;

use crate::types::{
    BoardMember, BoardSummary, Card, CardPatch, Checklist, Comment, CustomFieldDef, Integration,
    Label, ListInfo, Swimlane, User,
};

/// Read/write operations against one Wekan host.
///
/// Implemented by [`http::HttpWekanClient`] for a live server and by
/// in-memory fakes in tests. Any call may fail; whether a failure aborts
/// the run or only the entity being processed is the caller's decision.
pub trait WekanApi: Send + Sync {
    /// Base URL the client is bound to, for descriptor files.
    fn base_url(&self) -> &str;
    /// Username the client authenticated as.
    fn username(&self) -> &str;

    fn list_boards(&self) -> Result<Vec<BoardSummary>, ClientError>;
    fn get_lists(&self, board_id: &str) -> Result<Vec<ListInfo>, ClientError>;
    /// Cards of one list with the full field set (not just summaries).
    fn get_cards(&self, board_id: &str, list_id: &str) -> Result<Vec<Card>, ClientError>;
    fn get_checklists(&self, board_id: &str, card_id: &str) -> Result<Vec<Checklist>, ClientError>;
    fn get_comments(&self, board_id: &str, card_id: &str) -> Result<Vec<Comment>, ClientError>;
    fn get_swimlanes(&self, board_id: &str) -> Result<Vec<Swimlane>, ClientError>;
    fn get_labels(&self, board_id: &str) -> Result<Vec<Label>, ClientError>;
    fn get_custom_fields(&self, board_id: &str) -> Result<Vec<CustomFieldDef>, ClientError>;
    fn get_integrations(&self, board_id: &str) -> Result<Vec<Integration>, ClientError>;
    fn get_members(&self, board_id: &str) -> Result<Vec<BoardMember>, ClientError>;
    /// All users of the host. Requires admin rights on most instances;
    /// callers treat a failure as "no user cache".
    fn get_users(&self) -> Result<Vec<User>, ClientError>;

    /// Create a card and return its new id.
    fn create_card(
        &self,
        board_id: &str,
        list_id: &str,
        swimlane_id: &str,
        title: &str,
        description: &str,
    ) -> Result<String, ClientError>;
    fn edit_card(
        &self,
        board_id: &str,
        list_id: &str,
        card_id: &str,
        patch: &CardPatch,
    ) -> Result<(), ClientError>;
    /// Archive a card (this tool never hard-deletes).
    fn archive_card(&self, board_id: &str, list_id: &str, card_id: &str)
        -> Result<(), ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("login failed for {username} at {url}: {reason}")]
    Auth {
        url: String,
        username: String,
        reason: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status} for {url}")]
    Api { status: u16, url: String },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("decode error for {url}: {reason}")]
    Decode { url: String, reason: String },
}
