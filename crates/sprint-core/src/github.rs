//! GitHub adapter: REST for issues, milestones and comments; GraphQL for the
//! Projects (v2) "Status" single-select field.

use crate::config::{BoardConfig, ProjectConfig};
use crate::error::{Result, SprintError};
use crate::store::{Issue, IssueState, IssueStore};
use crate::types::BoardStatus;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const PAGE_SIZE: usize = 100;

const ITEM_QUERY: &str = r#"query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    issue(number: $number) {
      id
      projectItems(first: 50) {
        nodes {
          id
          project { id }
          fieldValueByName(name: "Status") {
            ... on ProjectV2ItemFieldSingleSelectValue { name }
          }
        }
      }
    }
  }
}"#;

const ADD_ITEM_MUTATION: &str = r#"mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: {projectId: $project, contentId: $content}) {
    item { id }
  }
}"#;

const SET_STATUS_MUTATION: &str = r#"mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
  updateProjectV2ItemFieldValue(
    input: {projectId: $project, itemId: $item, fieldId: $field, value: {singleSelectOptionId: $option}}
  ) {
    projectV2Item { id }
  }
}"#;

#[derive(Debug, Deserialize)]
struct RestMilestoneRef {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct RestIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    milestone: Option<RestMilestoneRef>,
    #[serde(default)]
    pull_request: Option<Value>,
}

impl From<RestIssue> for Issue {
    fn from(r: RestIssue) -> Self {
        Issue {
            number: r.number,
            title: r.title,
            body: r.body.unwrap_or_default(),
            state: if r.state == "closed" {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            milestone: r.milestone.map(|m| m.number),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestMilestone {
    number: u64,
    title: String,
}

/// Board membership of one issue in the configured project.
#[derive(Debug, Clone, PartialEq)]
struct ProjectItem {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubStore {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
    project: ProjectConfig,
}

impl GitHubStore {
    pub fn new(board: &BoardConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("sprint/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: board.api_url.trim_end_matches('/').to_string(),
            owner: board.owner.clone(),
            repo: board.repo.clone(),
            token: token.into(),
            project: board.project.clone(),
        })
    }

    /// Build a client with a token from the environment or the `gh` CLI.
    pub fn from_config(board: &BoardConfig) -> Result<Self> {
        Self::new(board, resolve_token()?)
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_url, self.owner, self.repo, path)
    }

    /// github.com serves GraphQL at `/graphql` on the API host; Enterprise
    /// serves it at `/api/graphql`, next to the `/api/v3` REST root.
    fn graphql_url(&self) -> String {
        match self.api_url.strip_suffix("/api/v3") {
            Some(host) => format!("{host}/api/graphql"),
            None => format!("{}/graphql", self.api_url),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn handle<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .map_err(|e| SprintError::Transport(format!("invalid response: {e}")));
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");
        let message = response
            .json::<Value>()
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        Err(match status.as_u16() {
            401 => SprintError::Unauthorized,
            403 | 429 if rate_limited => SprintError::RateLimited,
            404 => SprintError::NotFound(message),
            code => SprintError::Api {
                status: code,
                message,
            },
        })
    }

    fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = self.graphql_url();
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()?;
        let body: Value = self.handle(response)?;
        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown GraphQL error")
                    .to_string();
                return Err(SprintError::Api {
                    status: 200,
                    message,
                });
            }
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Returns the issue's node id and its item in the configured project.
    fn project_item(&self, number: u64) -> Result<(String, Option<ProjectItem>)> {
        let data = self.graphql(
            ITEM_QUERY,
            json!({ "owner": self.owner, "repo": self.repo, "number": number }),
        )?;
        let issue = &data["repository"]["issue"];
        let Some(node_id) = issue["id"].as_str() else {
            return Err(SprintError::IssueNotFound(number));
        };

        let item = issue["projectItems"]["nodes"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|n| n["project"]["id"].as_str() == Some(self.project.id.as_str()))
            .and_then(|n| {
                Some(ProjectItem {
                    id: n["id"].as_str()?.to_string(),
                    status: n["fieldValueByName"]["name"].as_str().map(String::from),
                })
            });
        Ok((node_id.to_string(), item))
    }
}

impl IssueStore for GitHubStore {
    fn get_issue(&self, number: u64) -> Result<Issue> {
        debug!(issue = number, "fetching issue");
        let url = self.repo_url(&format!("/issues/{number}"));
        let response = self.request(reqwest::Method::GET, &url).send()?;
        match self.handle::<RestIssue>(response) {
            Ok(issue) => Ok(issue.into()),
            Err(SprintError::NotFound(_)) => Err(SprintError::IssueNotFound(number)),
            Err(e) => Err(e),
        }
    }

    fn set_body(&self, number: u64, body: &str) -> Result<()> {
        debug!(issue = number, bytes = body.len(), "writing issue body");
        let url = self.repo_url(&format!("/issues/{number}"));
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&json!({ "body": body }))
            .send()?;
        let _: Value = self.handle(response)?;
        Ok(())
    }

    fn comment(&self, number: u64, text: &str) -> Result<()> {
        debug!(issue = number, "posting comment");
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": text }))
            .send()?;
        let _: Value = self.handle(response)?;
        Ok(())
    }

    fn resolve_milestone(&self, title: &str) -> Result<u64> {
        let mut page = 1;
        loop {
            let url = self.repo_url(&format!(
                "/milestones?state=all&per_page={PAGE_SIZE}&page={page}"
            ));
            let response = self.request(reqwest::Method::GET, &url).send()?;
            let milestones: Vec<RestMilestone> = self.handle(response)?;
            if let Some(m) = milestones.iter().find(|m| m.title == title) {
                return Ok(m.number);
            }
            if milestones.len() < PAGE_SIZE {
                return Err(SprintError::MilestoneNotFound(title.to_string()));
            }
            page += 1;
        }
    }

    fn list_by_milestone(&self, milestone: u64) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url(&format!(
                "/issues?milestone={milestone}&state=all&sort=created&direction=asc&per_page={PAGE_SIZE}&page={page}"
            ));
            let response = self.request(reqwest::Method::GET, &url).send()?;
            let batch: Vec<RestIssue> = self.handle(response)?;
            let len = batch.len();
            issues.extend(
                batch
                    .into_iter()
                    .filter(|i| i.pull_request.is_none())
                    .map(Issue::from),
            );
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        debug!(milestone, count = issues.len(), "listed milestone issues");
        Ok(issues)
    }

    fn board_status(&self, number: u64) -> Result<Option<String>> {
        let (_, item) = self.project_item(number)?;
        Ok(item.and_then(|i| i.status))
    }

    fn set_board_status(&self, number: u64, status: BoardStatus) -> Result<()> {
        let option = self
            .project
            .option_for(status)
            .filter(|o| !o.is_empty())
            .ok_or_else(|| SprintError::MissingStatusOption(status.label().to_string()))?
            .to_string();

        let (node_id, item) = self.project_item(number)?;
        let item_id = match item {
            Some(item) => item.id,
            None => {
                debug!(issue = number, "adding issue to project board");
                let data = self.graphql(
                    ADD_ITEM_MUTATION,
                    json!({ "project": self.project.id, "content": node_id }),
                )?;
                data["addProjectV2ItemById"]["item"]["id"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| {
                        SprintError::Transport("project item id missing from response".into())
                    })?
            }
        };

        debug!(issue = number, status = status.label(), "setting board status");
        self.graphql(
            SET_STATUS_MUTATION,
            json!({
                "project": self.project.id,
                "item": item_id,
                "field": self.project.status_field_id,
                "option": option,
            }),
        )?;
        Ok(())
    }

    fn issue_url(&self, number: u64) -> String {
        let web = if self.api_url == "https://api.github.com" {
            "https://github.com".to_string()
        } else {
            self.api_url.trim_end_matches("/api/v3").to_string()
        };
        format!("{web}/{}/{}/issues/{number}", self.owner, self.repo)
    }
}

/// Find an API token: `GITHUB_TOKEN`, then `GH_TOKEN`, then `gh auth token`.
pub fn resolve_token() -> Result<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
    }

    let gh = which::which("gh").map_err(|_| SprintError::Unauthorized)?;
    let output = std::process::Command::new(gh)
        .args(["auth", "token"])
        .output()?;
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || token.is_empty() {
        return Err(SprintError::Unauthorized);
    }
    Ok(token)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::collections::BTreeMap;

    fn board(url: &str) -> BoardConfig {
        let mut options = BTreeMap::new();
        options.insert("todo".to_string(), "opt-todo".to_string());
        options.insert("in_progress".to_string(), "opt-progress".to_string());
        options.insert("testing".to_string(), "opt-testing".to_string());
        options.insert("review".to_string(), "opt-review".to_string());
        BoardConfig {
            owner: "acme".to_string(),
            repo: "webapp".to_string(),
            api_url: url.to_string(),
            project: ProjectConfig {
                id: "PVT_1".to_string(),
                number: Some(3),
                status_field_id: "FIELD_1".to_string(),
                options,
            },
        }
    }

    fn store(server: &Server) -> GitHubStore {
        GitHubStore::new(&board(&server.url()), "test-token").unwrap()
    }

    #[test]
    fn get_issue_maps_fields() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/repos/acme/webapp/issues/35")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "number": 35,
                    "title": "Sprint1.3: Auth form",
                    "body": "- [x] a\n- [ ] b\n",
                    "state": "closed",
                    "milestone": { "number": 4 }
                })
                .to_string(),
            )
            .create();

        let issue = store(&server).get_issue(35).unwrap();
        mock.assert();
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.milestone, Some(4));
        assert_eq!(issue.checklist().progress().to_string(), "1/2");
    }

    #[test]
    fn set_body_sends_full_document() {
        let mut server = Server::new();
        let mock = server
            .mock("PATCH", "/repos/acme/webapp/issues/35")
            .match_body(Matcher::Json(json!({ "body": "- [x] a\n" })))
            .with_status(200)
            .with_body("{}")
            .create();
        store(&server).set_body(35, "- [x] a\n").unwrap();
        mock.assert();
    }

    #[test]
    fn list_skips_pull_requests() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/webapp/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("milestone".into(), "4".into()),
                Matcher::UrlEncoded("state".into(), "all".into()),
            ]))
            .with_status(200)
            .with_body(
                json!([
                    { "number": 1, "title": "Sprint1.1", "body": null, "state": "open" },
                    { "number": 2, "title": "PR", "body": "", "state": "open", "pull_request": {} }
                ])
                .to_string(),
            )
            .create();
        let issues = store(&server).list_by_milestone(4).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].body, "");
    }

    #[test]
    fn resolve_milestone_by_title() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/webapp/milestones")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([{ "number": 9, "title": "Sprint 2: Auth" }]).to_string())
            .create();
        let s = store(&server);
        assert_eq!(s.resolve_milestone("Sprint 2: Auth").unwrap(), 9);
        assert!(matches!(
            s.resolve_milestone("Sprint 3"),
            Err(SprintError::MilestoneNotFound(_))
        ));
    }

    #[test]
    fn board_status_reads_configured_project_only() {
        let mut server = Server::new();
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("projectItems".into()))
            .with_status(200)
            .with_body(
                json!({ "data": { "repository": { "issue": {
                    "id": "I_35",
                    "projectItems": { "nodes": [
                        { "id": "ITEM_OTHER", "project": { "id": "PVT_other" },
                          "fieldValueByName": { "name": "Done" } },
                        { "id": "ITEM_1", "project": { "id": "PVT_1" },
                          "fieldValueByName": { "name": "Testing | Validating" } }
                    ] }
                } } } })
                .to_string(),
            )
            .create();
        let status = store(&server).board_status(35).unwrap();
        assert_eq!(status.as_deref(), Some("Testing | Validating"));
    }

    #[test]
    fn board_status_none_when_not_on_board() {
        let mut server = Server::new();
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({ "data": { "repository": { "issue": {
                    "id": "I_35", "projectItems": { "nodes": [] }
                } } } })
                .to_string(),
            )
            .create();
        assert_eq!(store(&server).board_status(35).unwrap(), None);
    }

    #[test]
    fn set_status_adds_missing_item_first() {
        let mut server = Server::new();
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("projectItems".into()))
            .with_status(200)
            .with_body(
                json!({ "data": { "repository": { "issue": {
                    "id": "I_35", "projectItems": { "nodes": [] }
                } } } })
                .to_string(),
            )
            .create();
        let add = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("addProjectV2ItemById".into()))
            .with_status(200)
            .with_body(json!({ "data": { "addProjectV2ItemById": { "item": { "id": "ITEM_NEW" } } } }).to_string())
            .create();
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("updateProjectV2ItemFieldValue".into()),
                Matcher::Regex("ITEM_NEW".into()),
                Matcher::Regex("opt-review".into()),
            ]))
            .with_status(200)
            .with_body(json!({ "data": { "updateProjectV2ItemFieldValue": { "projectV2Item": { "id": "ITEM_NEW" } } } }).to_string())
            .create();

        store(&server)
            .set_board_status(35, BoardStatus::Review)
            .unwrap();
        add.assert();
        update.assert();
    }

    #[test]
    fn set_status_without_option_fails_before_any_request() {
        let server = Server::new();
        let err = store(&server)
            .set_board_status(35, BoardStatus::Done)
            .unwrap_err();
        assert!(matches!(err, SprintError::MissingStatusOption(_)));
    }

    #[test]
    fn graphql_errors_surface_as_api_errors() {
        let mut server = Server::new();
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({ "errors": [{ "message": "Could not resolve to a node" }] }).to_string())
            .create();
        let err = store(&server).board_status(35).unwrap_err();
        assert!(err.to_string().contains("Could not resolve"));
    }

    #[test]
    fn unauthorized_and_rate_limited() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/acme/webapp/issues/1")
            .with_status(401)
            .with_body(json!({ "message": "Bad credentials" }).to_string())
            .create();
        server
            .mock("GET", "/repos/acme/webapp/issues/2")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(json!({ "message": "API rate limit exceeded" }).to_string())
            .create();
        let s = store(&server);
        assert!(matches!(s.get_issue(1), Err(SprintError::Unauthorized)));
        assert!(matches!(s.get_issue(2), Err(SprintError::RateLimited)));
    }

    #[test]
    fn enterprise_graphql_lives_beside_rest_root() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/graphql")
            .with_status(200)
            .with_body(
                json!({ "data": { "repository": { "issue": {
                    "id": "I_35", "projectItems": { "nodes": [] }
                } } } })
                .to_string(),
            )
            .create();
        let b = board(&format!("{}/api/v3", server.url()));
        let s = GitHubStore::new(&b, "t").unwrap();
        assert_eq!(s.board_status(35).unwrap(), None);
        mock.assert();
        assert_eq!(
            GitHubStore::new(&board("https://api.github.com"), "t")
                .unwrap()
                .graphql_url(),
            "https://api.github.com/graphql"
        );
    }

    #[test]
    fn issue_url_points_at_web_ui() {
        let b = board("https://api.github.com");
        let s = GitHubStore::new(&b, "t").unwrap();
        assert_eq!(s.issue_url(35), "https://github.com/acme/webapp/issues/35");
    }
}
