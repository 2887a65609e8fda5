/// Blocking HTTP client for the Wekan REST API.
///
/// Authenticates once with `POST /users/login` and sends the bearer token
/// on every call. Card listing is the server's two-step dance: the list
/// endpoint returns summaries, so each card is re-fetched individually for
/// the full field set.
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ClientError, WekanApi};
use crate::types::{
    BoardMember, BoardSummary, Card, CardPatch, Checklist, Comment, CustomFieldDef, Integration,
    Label, ListInfo, Swimlane, User,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpWekanClient {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    user_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    id: String,
    token: String,
}

/// Subset of the board detail document; labels and members only exist
/// there, not behind their own endpoints.
#[derive(Debug, Deserialize)]
struct BoardDetail {
    #[serde(default)]
    labels: Vec<Label>,
    #[serde(default)]
    members: Vec<BoardMember>,
}

#[derive(Debug, Deserialize)]
struct CardSummary {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChecklistSummary {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedCard {
    #[serde(rename = "_id")]
    id: String,
}

impl HttpWekanClient {
    /// Connect and authenticate against a Wekan host.
    pub fn connect(base_url: &str, username: &str, password: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let login_url = format!("{}/users/login", base_url);
        let resp = http
            .post(&login_url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()?;

        if !resp.status().is_success() {
            return Err(ClientError::Auth {
                url: base_url,
                username: username.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }

        let login: LoginResponse = resp.json().map_err(|e| ClientError::Decode {
            url: login_url,
            reason: e.to_string(),
        })?;

        log::info!("[wekit.remote] authenticated as {} at {}", username, base_url);

        Ok(HttpWekanClient {
            http,
            base_url,
            username: username.to_string(),
            user_id: login.id,
            token: login.token,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).bearer_auth(&self.token).send()?;
        decode_json(resp, &url)
    }

    fn put_json(&self, path: &str, body: &impl serde::Serialize) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()?;
        check_status(&resp, &url)?;
        Ok(())
    }

    fn board_detail(&self, board_id: &str) -> Result<BoardDetail, ClientError> {
        self.get_json(&format!("/api/boards/{}", board_id))
    }
}

fn check_status(resp: &reqwest::blocking::Response, url: &str) -> Result<(), ClientError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(())
}

fn decode_json<T: DeserializeOwned>(
    resp: reqwest::blocking::Response,
    url: &str,
) -> Result<T, ClientError> {
    check_status(&resp, url)?;
    resp.json().map_err(|e| ClientError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

impl WekanApi for HttpWekanClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn list_boards(&self) -> Result<Vec<BoardSummary>, ClientError> {
        self.get_json(&format!("/api/users/{}/boards", self.user_id))
    }

    fn get_lists(&self, board_id: &str) -> Result<Vec<ListInfo>, ClientError> {
        self.get_json(&format!("/api/boards/{}/lists", board_id))
    }

    fn get_cards(&self, board_id: &str, list_id: &str) -> Result<Vec<Card>, ClientError> {
        let summaries: Vec<CardSummary> =
            self.get_json(&format!("/api/boards/{}/lists/{}/cards", board_id, list_id))?;
        let mut cards = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let card: Card = self.get_json(&format!(
                "/api/boards/{}/lists/{}/cards/{}",
                board_id, list_id, summary.id
            ))?;
            cards.push(card);
        }
        Ok(cards)
    }

    fn get_checklists(&self, board_id: &str, card_id: &str) -> Result<Vec<Checklist>, ClientError> {
        let summaries: Vec<ChecklistSummary> = self.get_json(&format!(
            "/api/boards/{}/cards/{}/checklists",
            board_id, card_id
        ))?;
        let mut checklists = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let checklist: Checklist = self.get_json(&format!(
                "/api/boards/{}/cards/{}/checklists/{}",
                board_id, card_id, summary.id
            ))?;
            checklists.push(checklist);
        }
        Ok(checklists)
    }

    fn get_comments(&self, board_id: &str, card_id: &str) -> Result<Vec<Comment>, ClientError> {
        self.get_json(&format!("/api/boards/{}/cards/{}/comments", board_id, card_id))
    }

    fn get_swimlanes(&self, board_id: &str) -> Result<Vec<Swimlane>, ClientError> {
        self.get_json(&format!("/api/boards/{}/swimlanes", board_id))
    }

    fn get_labels(&self, board_id: &str) -> Result<Vec<Label>, ClientError> {
        Ok(self.board_detail(board_id)?.labels)
    }

    fn get_custom_fields(&self, board_id: &str) -> Result<Vec<CustomFieldDef>, ClientError> {
        self.get_json(&format!("/api/boards/{}/custom-fields", board_id))
    }

    fn get_integrations(&self, board_id: &str) -> Result<Vec<Integration>, ClientError> {
        self.get_json(&format!("/api/boards/{}/integrations", board_id))
    }

    fn get_members(&self, board_id: &str) -> Result<Vec<BoardMember>, ClientError> {
        Ok(self.board_detail(board_id)?.members)
    }

    fn get_users(&self) -> Result<Vec<User>, ClientError> {
        self.get_json("/api/users")
    }

    fn create_card(
        &self,
        board_id: &str,
        list_id: &str,
        swimlane_id: &str,
        title: &str,
        description: &str,
    ) -> Result<String, ClientError> {
        let url = format!("{}/api/boards/{}/lists/{}/cards", self.base_url, board_id, list_id);
        let body = serde_json::json!({
            "title": title,
            "description": description,
            "authorId": self.user_id,
            "swimlaneId": swimlane_id,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        let created: CreatedCard = decode_json(resp, &url)?;
        Ok(created.id)
    }

    fn edit_card(
        &self,
        board_id: &str,
        list_id: &str,
        card_id: &str,
        patch: &CardPatch,
    ) -> Result<(), ClientError> {
        self.put_json(
            &format!("/api/boards/{}/lists/{}/cards/{}", board_id, list_id, card_id),
            patch,
        )
    }

    fn archive_card(
        &self,
        board_id: &str,
        list_id: &str,
        card_id: &str,
    ) -> Result<(), ClientError> {
        let patch = CardPatch {
            archive: Some(true),
            ..Default::default()
        };
        self.edit_card(board_id, list_id, card_id, &patch)
    }
}
