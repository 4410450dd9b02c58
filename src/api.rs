use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::UserId;
use crate::state::ChatMessage;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(StatusCode),

    #[error("response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("query task ended unexpectedly: {0}")]
    Aborted(String),
}

/// Body of a query POST
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub query: String,
    pub conversation_history: Vec<ChatMessage>,
    pub filters: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(user_id: &UserId, query: &str, history: &[ChatMessage]) -> Self {
        Self {
            user_id: user_id.to_string(),
            query: query.to_string(),
            conversation_history: history.to_vec(),
            filters: Map::new(),
        }
    }
}

/// Reply from the query endpoint.
///
/// Every field is read leniently: a field with an unexpected JSON type is
/// treated as absent instead of failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_count_query: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "lenient::listings")]
    pub properties: Vec<PropertyListing>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub properties_found: Option<f64>,
    #[serde(default, deserialize_with = "lenient::any")]
    pub intent: Option<Value>,
    #[serde(default, deserialize_with = "lenient::any")]
    pub filters_applied: Option<Value>,
}

impl QueryResponse {
    /// Interpret any parsed JSON document as a response. Non-object
    /// documents carry no recognised fields and read as an empty reply.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self::deserialize(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// A property record as returned by the backend. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyListing {
    #[serde(default, deserialize_with = "lenient::text")]
    pub property_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub community_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub city_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub number_of_bedrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub bathrooms_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_area_sqm: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub asking_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub asking_price_currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub for_sale: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub for_rent: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub listing_url: Option<String>,
}

/// Anything that can answer a property query
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError>;
}

/// HTTP client for the remote query endpoint
#[derive(Clone)]
pub struct PropertyApiClient {
    client: Client,
    endpoint: Url,
}

impl PropertyApiClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QueryTransport for PropertyApiClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        debug!(
            endpoint = %self.endpoint,
            history = request.conversation_history.len(),
            "posting property query"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "query endpoint returned an error status");
            return Err(ApiError::Status(status));
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        Ok(QueryResponse::from_value(value))
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::PropertyListing;

    /// Non-empty strings; numbers are rendered as text
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Numbers, or strings that parse as numbers
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Truthiness: false, 0, "" and null are false, everything else true
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        })
    }

    /// An array of listings; entries that are not objects become empty
    /// listings so they still occupy their position.
    pub fn listings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PropertyListing>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| PropertyListing::deserialize(item).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn any<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.filter(|v| !v.is_null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PropertyApiClient {
        let endpoint = Url::parse(&format!("{}/query", server.uri())).unwrap();
        PropertyApiClient::new(endpoint)
    }

    fn sample_request() -> QueryRequest {
        QueryRequest {
            user_id: "user_1700000000000_abc123xyz".to_string(),
            query: "2 bedroom villas".to_string(),
            conversation_history: vec![ChatMessage::user("2 bedroom villas")],
            filters: Map::new(),
        }
    }

    /// Client pointed at a local port nothing listens on
    fn unreachable_client() -> PropertyApiClient {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        PropertyApiClient::new(Url::parse(&format!("http://{}/query", addr)).unwrap())
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let err = unreachable_client().query(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_recovers_session() {
        use crate::chat_log::ChatLog;
        use crate::format::ERROR_MESSAGE;
        use crate::identity::UserId;
        use crate::session::{ChatSession, Outcome};
        use crate::state::TurnBody;

        let client = unreachable_client();
        let mut session = ChatSession::new(UserId::generate(), ChatLog::new());

        let outcome = session.send_message("villas in Jumeirah", &client).await;

        assert!(matches!(outcome, Outcome::Failed { .. }));
        assert_eq!(
            session.view().turns().last().unwrap().body,
            TurnBody::Error(ERROR_MESSAGE.to_string())
        );
        assert!(!session.is_processing());
        assert!(session.view().input.is_enabled());
        assert!(!session.view().has_typing_indicator());
    }

    #[tokio::test]
    async fn test_posts_expected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "user_id": "user_1700000000000_abc123xyz",
                "query": "2 bedroom villas",
                "conversation_history": [{"role": "user", "content": "2 bedroom villas"}],
                "filters": {}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Here are some villas",
                "properties_found": 1,
                "properties": [{"property_name": "Palm Villa", "asking_price": 4500000}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).query(&sample_request()).await.unwrap();

        assert_eq!(response.response.as_deref(), Some("Here are some villas"));
        assert_eq!(response.properties_found, Some(1.0));
        assert_eq!(response.properties.len(), 1);
        assert_eq!(response.properties[0].property_name.as_deref(), Some("Palm Villa"));
        assert_eq!(response.properties[0].asking_price, Some(4_500_000.0));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let err = client_for(&server).query(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)));
        assert_eq!(err.to_string(), "HTTP error! status: 500 Internal Server Error");
    }

    #[tokio::test]
    async fn test_non_json_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).query(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_lenient_fields() {
        let response = QueryResponse::from_value(json!({
            "is_count_query": "yes",
            "response": "",
            "properties_found": "3",
            "intent": null,
            "properties": [
                {"number_of_bedrooms": "2", "for_sale": 1, "for_rent": "", "city_name": 42},
                "not a listing",
                {"total_area_sqm": {"nested": true}, "listing_url": ""}
            ]
        }));

        assert!(response.is_count_query);
        assert_eq!(response.response, None);
        assert_eq!(response.properties_found, Some(3.0));
        assert_eq!(response.intent, None);
        assert_eq!(response.properties.len(), 3);

        let first = &response.properties[0];
        assert_eq!(first.number_of_bedrooms, Some(2.0));
        assert!(first.for_sale);
        assert!(!first.for_rent);
        assert_eq!(first.city_name.as_deref(), Some("42"));

        assert_eq!(response.properties[1], PropertyListing::default());
        assert_eq!(response.properties[2].total_area_sqm, None);
        assert_eq!(response.properties[2].listing_url, None);
    }

    #[test]
    fn test_non_object_documents_read_as_empty() {
        assert_eq!(QueryResponse::from_value(json!([1, 2, 3])), QueryResponse::default());
        assert_eq!(QueryResponse::from_value(json!("text")), QueryResponse::default());
        assert_eq!(QueryResponse::from_value(Value::Null), QueryResponse::default());
    }

    #[test]
    fn test_request_carries_empty_filters() {
        let id = UserId::generate();
        let history = vec![ChatMessage::user("villas")];
        let request = QueryRequest::new(&id, "villas", &history);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["filters"], json!({}));
        assert_eq!(json["user_id"], json!(id.as_str()));
        assert_eq!(json["conversation_history"][0]["role"], "user");
    }
}
