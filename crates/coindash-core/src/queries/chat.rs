//! Assistant chat queries.

use serde_json::{json, Value};
use urlencoding::encode;

use crate::api::{ApiClient, ApiResult};
use crate::models::{ChatRequest, ChatResponse, ChatSession};

use super::{QueryCache, QueryKey};

const SESSIONS_PATH: &str = "/chat/sessions";

#[derive(Clone)]
pub struct ChatQueries {
    api: ApiClient,
    cache: QueryCache,
}

impl ChatQueries {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn session_path(id: &str) -> String {
        format!("{}/{}", SESSIONS_PATH, encode(id))
    }

    /// Send a message. The touched session and the session list are
    /// invalidated whatever the outcome.
    pub async fn send_message(&self, request: &ChatRequest) -> ApiResult<ChatResponse> {
        let result: ApiResult<ChatResponse> = self.api.post("/chat/message", request).await;

        let created = result.as_ref().ok().and_then(|r| r.session_id.as_ref());
        if let Some(id) = created.or(request.session_id.as_ref()) {
            self.cache.invalidate(&QueryKey::ChatSession(id.clone()));
        }
        self.cache.invalidate(&QueryKey::ChatSessions);
        result
    }

    /// One-off natural language query outside any session
    pub async fn query(&self, text: &str) -> ApiResult<ChatResponse> {
        let path = format!("/chat/query?text={}", encode(text));
        self.api.get(&path).await
    }

    pub async fn sessions(&self) -> ApiResult<Vec<ChatSession>> {
        self.cache
            .fetch(QueryKey::ChatSessions, || self.api.get(SESSIONS_PATH))
            .await
    }

    pub async fn session(&self, id: &str) -> ApiResult<ChatSession> {
        let path = Self::session_path(id);
        self.cache
            .fetch(QueryKey::ChatSession(id.to_string()), || self.api.get(&path))
            .await
    }

    pub async fn create_session(&self, title: Option<&str>) -> ApiResult<ChatSession> {
        let result = self.api.post(SESSIONS_PATH, &json!({ "title": title })).await;
        self.cache.invalidate(&QueryKey::ChatSessions);
        result
    }

    pub async fn update_session(&self, id: &str, title: &str) -> ApiResult<ChatSession> {
        let result = self
            .api
            .put(&Self::session_path(id), &json!({ "title": title }))
            .await;
        self.invalidate_session(id);
        result
    }

    pub async fn delete_session(&self, id: &str) -> ApiResult<()> {
        let result = self.api.delete::<Value>(&Self::session_path(id)).await;
        self.invalidate_session(id);
        result.map(|_| ())
    }

    fn invalidate_session(&self, id: &str) {
        self.cache.invalidate(&QueryKey::ChatSession(id.to_string()));
        self.cache.invalidate(&QueryKey::ChatSessions);
    }

    pub async fn suggestions(&self) -> ApiResult<Vec<String>> {
        self.cache
            .fetch(QueryKey::ChatSuggestions, || self.api.get("/chat/suggestions"))
            .await
    }

    pub async fn popular_queries(&self) -> ApiResult<Vec<String>> {
        self.cache
            .fetch(QueryKey::PopularQueries, || self.api.get("/chat/popular-queries"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, MemoryStore};
    use crate::models::ChatRole;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn queries_for(uri: &str) -> ChatQueries {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let api = ApiClient::new(uri, Duration::from_secs(5), store).unwrap();
        ChatQueries::new(api, QueryCache::new())
    }

    fn session_json(id: i64) -> Value {
        json!({"id": id, "title": "BTC outlook", "messages": []})
    }

    #[tokio::test]
    async fn test_send_message_invalidates_sessions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/sessions/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json(7)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/message"))
            .and(body_json(json!({"message": "price of btc?", "sessionId": "7"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"id": 99, "content": "Bitcoin is at $60,000.", "role": "assistant"},
                "sessionId": "7",
                "suggestions": ["Show ETH"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        queries.session("7").await.unwrap();
        queries.session("7").await.unwrap();

        let response = queries
            .send_message(&ChatRequest {
                message: "price of btc?".to_string(),
                session_id: Some("7".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(response.message.role, ChatRole::Assistant);
        assert_eq!(response.message.id, "99");
        assert_eq!(response.suggestions, vec!["Show ETH".to_string()]);

        // Refetched after the message
        queries.session("7").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_is_url_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/query"))
            .and(query_param("text", "top 5 coins & volume?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"content": "Here you go", "role": "assistant"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = queries_for(&server.uri())
            .query("top 5 coins & volume?")
            .await
            .unwrap();
        assert_eq!(response.message.content, "Here you go");
        assert!(response.session_id.is_none());
    }

    #[tokio::test]
    async fn test_session_mutations_invalidate_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(1)])))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/sessions"))
            .and(body_json(json!({"title": null})))
            .respond_with(ResponseTemplate::new(201).set_body_json(session_json(2)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/chat/sessions/2"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        assert_eq!(queries.sessions().await.unwrap().len(), 1);

        let created = queries.create_session(None).await.unwrap();
        assert_eq!(created.id, "2");
        queries.sessions().await.unwrap();

        queries.delete_session("2").await.unwrap();
        queries.sessions().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_session_mutations_still_invalidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(1)])))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/chat/sessions/1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Too long"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/chat/sessions/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        queries.sessions().await.unwrap();

        let err = queries.update_session("1", "renamed").await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert!(!queries.cache().contains(&QueryKey::ChatSessions));
        queries.sessions().await.unwrap();

        assert!(queries.delete_session("1").await.is_err());
        assert!(!queries.cache().contains(&QueryKey::ChatSessions));
        queries.sessions().await.unwrap();
    }

    #[tokio::test]
    async fn test_suggestions_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/suggestions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["What is DeFi?"])))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        assert_eq!(queries.suggestions().await.unwrap(), vec!["What is DeFi?".to_string()]);
        assert_eq!(queries.suggestions().await.unwrap().len(), 1);
    }
}
