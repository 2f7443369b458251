use crate::config::JiraConfig;
use crate::issue::PrefetchedIssues;
use crate::models::*;
use std::collections::VecDeque;
use thiserror::Error;

const PAGE_SIZE: u64 = 50;

#[derive(Error, Debug)]
pub enum JiraClientError {
    #[error("Request to Jira failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    token: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, JiraClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            client: reqwest::Client::builder().default_headers(headers).build()?,
            base_url: config.base_url.clone(),
            email: config.email.clone(),
            token: config.token.clone(),
        })
    }

    async fn get_url<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, JiraClientError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn get_path<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, JiraClientError> {
        self.get_url(&format!("{}{}", self.base_url, path)).await
    }

    /// Page through an issue listing until `total` issues have been read.
    async fn get_all_issues(&self, path: &str) -> Result<Vec<JiraIssue>, JiraClientError> {
        let mut issues: Vec<JiraIssue> = Vec::new();
        let mut start_at = 0;

        loop {
            let page = self
                .get_path::<IssueListResponse>(&format!(
                    "{}&maxResults={}&startAt={}",
                    path, PAGE_SIZE, start_at
                ))
                .await?;

            let total = page.total;
            let page_size = page.issues.len() as u64;
            issues.extend(page.issues);
            start_at += page_size;

            if page_size == 0 || start_at >= total {
                break;
            }
        }

        Ok(issues)
    }

    /// Every sprint on the board, oldest first. The sprint listing reports
    /// `isLast` instead of a total.
    pub async fn get_sprints(&self, board_id: u64) -> Result<Vec<JiraSprint>, JiraClientError> {
        let mut sprints = Vec::new();
        let mut start_at = 0;

        loop {
            let page = self
                .get_path::<SprintListResponse>(&format!(
                    "/rest/agile/1.0/board/{}/sprint?maxResults={}&startAt={}",
                    board_id, PAGE_SIZE, start_at
                ))
                .await?;

            let page_size = page.values.len() as u64;
            sprints.extend(page.values);
            start_at += page_size;

            if page.is_last || page_size == 0 {
                break;
            }
        }

        Ok(sprints)
    }

    /// The `past` most recent closed sprints, oldest first.
    pub async fn get_closed_sprints(
        &self,
        board_id: u64,
        past: usize,
    ) -> Result<Vec<JiraSprint>, JiraClientError> {
        let closed: Vec<JiraSprint> = self
            .get_sprints(board_id)
            .await?
            .into_iter()
            .filter(|sprint| sprint.state == "closed")
            .collect();
        let skip = closed.len().saturating_sub(past);
        Ok(closed.into_iter().skip(skip).collect())
    }

    pub async fn get_sprint_issues(
        &self,
        board_id: u64,
        sprint_id: i64,
    ) -> Result<Vec<JiraIssue>, JiraClientError> {
        self.get_all_issues(&format!(
            "/rest/agile/1.0/board/{}/sprint/{}/issue?expand=changelog",
            board_id, sprint_id
        ))
        .await
    }

    pub async fn get_board_issues(&self, board_id: u64) -> Result<Vec<JiraIssue>, JiraClientError> {
        self.get_all_issues(&format!("/rest/agile/1.0/board/{}/issue?expand=changelog", board_id))
            .await
    }

    /// Fetch an issue by its `self` url, changelog included.
    pub async fn get_issue(&self, url: &str) -> Result<JiraIssue, JiraClientError> {
        self.get_url(&format!("{}?expand=changelog", url)).await
    }

    /// Fetch every subtask reachable from `issues` so that trees can be built
    /// without further requests.
    pub async fn prefetch_subtasks(
        &self,
        issues: &[JiraIssue],
    ) -> Result<PrefetchedIssues, JiraClientError> {
        let mut prefetched = PrefetchedIssues::default();
        let mut pending: VecDeque<String> = issues
            .iter()
            .flat_map(|issue| issue.fields.subtasks.iter().map(|s| s.url.clone()))
            .collect();

        while let Some(url) = pending.pop_front() {
            if prefetched.contains(&url) {
                continue;
            }
            let subtask = self.get_issue(&url).await?;
            pending.extend(subtask.fields.subtasks.iter().map(|s| s.url.clone()));
            prefetched.insert(url, subtask);
        }

        tracing::debug!(count = prefetched.len(), "prefetched subtasks");
        Ok(prefetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueFetcher;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> JiraClient {
        JiraClient::new(&JiraConfig {
            base_url: base_url.to_string(),
            email: "someone@example.com".to_string(),
            token: "secret".to_string(),
            story_points_field: "customfield_11638".to_string(),
        })
        .unwrap()
    }

    fn issue_json(key: &str, subtask_urls: &[String]) -> serde_json::Value {
        json!({
            "key": key,
            "changelog": {"histories": []},
            "fields": {
                "summary": format!("Summary of {key}"),
                "status": {"name": "To Do"},
                "issuetype": {"name": "Task"},
                "labels": [],
                "subtasks": subtask_urls.iter().map(|url| json!({"self": url})).collect::<Vec<_>>(),
            }
        })
    }

    fn issue_page(start_at: u64, total: u64, keys: &[&str]) -> serde_json::Value {
        json!({
            "startAt": start_at,
            "maxResults": 50,
            "total": total,
            "issues": keys.iter().map(|key| issue_json(key, &[])).collect::<Vec<_>>(),
        })
    }

    #[tokio::test]
    async fn sprint_issues_are_paged_until_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/130/sprint/7/issue"))
            .and(query_param("startAt", "0"))
            .and(query_param("expand", "changelog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_page(0, 3, &["CX-1", "CX-2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/130/sprint/7/issue"))
            .and(query_param("startAt", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_page(2, 3, &["CX-3"])))
            .mount(&server)
            .await;

        let issues = client(&server.uri()).get_sprint_issues(130, 7).await.unwrap();
        let keys: Vec<&str> = issues.iter().map(|issue| issue.key.as_str()).collect();
        assert_eq!(keys, vec!["CX-1", "CX-2", "CX-3"]);
    }

    #[tokio::test]
    async fn closed_sprints_keep_the_most_recent() {
        let server = MockServer::start().await;
        let sprint = |id: i64, state: &str| {
            json!({
                "id": id,
                "name": format!("Sprint {id}"),
                "state": state,
                "startDate": "2020-01-01T09:00:00.000+0100",
                "endDate": "2020-01-14T09:00:00.000+0100",
            })
        };
        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/130/sprint"))
            .and(query_param("startAt", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0, "maxResults": 50, "isLast": false,
                "values": [sprint(1, "closed"), sprint(2, "closed")],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/agile/1.0/board/130/sprint"))
            .and(query_param("startAt", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 2, "maxResults": 50, "isLast": true,
                "values": [sprint(3, "closed"), sprint(4, "active")],
            })))
            .mount(&server)
            .await;

        let sprints = client(&server.uri()).get_closed_sprints(130, 2).await.unwrap();
        let ids: Vec<i64> = sprints.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn subtasks_are_prefetched_by_url() {
        let server = MockServer::start().await;
        let subtask_url = format!("{}/rest/api/2/issue/2", server.uri());
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/2"))
            .and(query_param("expand", "changelog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json("CX-2", &[])))
            .expect(1)
            .mount(&server)
            .await;

        let parent: JiraIssue =
            serde_json::from_value(issue_json("CX-1", &[subtask_url.clone(), subtask_url.clone()])).unwrap();
        let prefetched = client(&server.uri()).prefetch_subtasks(&[parent]).await.unwrap();
        assert_eq!(prefetched.len(), 1);
        assert_eq!(prefetched.fetch_issue(&subtask_url).unwrap().key, "CX-2");
    }

    #[tokio::test]
    async fn http_errors_surface_as_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(&server.uri()).get_board_issues(130).await;
        assert!(matches!(result, Err(JiraClientError::Request(_))));
    }
}
