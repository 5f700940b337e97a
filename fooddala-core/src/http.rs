use crate::api::{
    ApiEnvelope, AuthApi, LoginData, MeData, NewOrderRequest, OrderApi, OrderData, OrderScope, OrdersData,
    PlacedOrder, VerificationData,
};
use crate::identity::User;
use crate::payment::VerificationRequest;
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use fooddala_shared::Masked;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// reqwest client for the Fooddala REST backend.
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<Masked<String>>>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> CoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Bearer token attached to every subsequent request. `None` signs out.
    pub async fn set_token(&self, token: Option<Masked<String>>) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_ref() {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> CoreResult<T> {
        let response = self.authorized(builder).await.send().await?;
        let envelope = read_envelope::<T>(response).await?;
        envelope
            .data
            .ok_or_else(|| CoreError::Transport("response carried no data".to_string()))
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> CoreResult<ApiEnvelope<T>> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    decode_envelope(status, &body)
}

/// Maps an HTTP status and body onto the error taxonomy:
/// 401 is `Unauthorized`, other 4xx are `Rejected` with the backend's message,
/// everything else that is not a successful envelope is `Transport`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> CoreResult<ApiEnvelope<T>> {
    if status == 401 {
        return Err(CoreError::Unauthorized);
    }

    if (400..500).contains(&status) {
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Request rejected".to_string());
        debug!("Backend rejected request with {}: {}", status, message);
        return Err(CoreError::Rejected { status, message });
    }

    if !(200..300).contains(&status) {
        warn!("Backend returned {}", status);
        return Err(CoreError::Transport(format!("backend returned status {}", status)));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| CoreError::Transport(format!("unreadable response: {}", e)))?;

    if !envelope.success {
        let message = envelope.message.unwrap_or_else(|| "Request rejected".to_string());
        return Err(CoreError::Rejected { status, message });
    }

    Ok(envelope)
}

#[async_trait]
impl OrderApi for BackendClient {
    async fn create_order(&self, request: &NewOrderRequest) -> CoreResult<PlacedOrder> {
        let data: OrderData = self.send(self.client.post(self.url("/orders")).json(request)).await?;
        Ok(data.order)
    }

    async fn update_status(&self, order_id: &str, status: &str) -> CoreResult<PlacedOrder> {
        let url = self.url(&format!("/orders/{}/status", order_id));
        let body = serde_json::json!({ "status": status });
        let data: OrderData = self.send(self.client.put(url).json(&body)).await?;
        Ok(data.order)
    }

    async fn verify_payment(&self, request: &VerificationRequest) -> CoreResult<bool> {
        let url = self.url(&format!("/orders/{}/verify-payment", request.order_id));
        let data: VerificationData = self.send(self.client.post(url).json(request)).await?;
        Ok(data.verified)
    }

    async fn list_orders(&self, scope: OrderScope, status_filter: Option<&str>) -> CoreResult<Vec<PlacedOrder>> {
        let mut builder = self.client.get(self.url(scope.path()));
        if let Some(filter) = status_filter {
            builder = builder.query(&[("status", filter)]);
        }
        let data: OrdersData = self.send(builder).await?;
        Ok(data.orders)
    }

    async fn cancel_order(&self, order_id: &str, reason: &str) -> CoreResult<PlacedOrder> {
        let url = self.url(&format!("/orders/{}/cancel", order_id));
        let body = serde_json::json!({ "reason": reason });
        let data: OrderData = self.send(self.client.post(url).json(&body)).await?;
        Ok(data.order)
    }
}

#[async_trait]
impl AuthApi for BackendClient {
    async fn login(&self, email: &str, password: &str) -> CoreResult<LoginData> {
        let body = serde_json::json!({ "email": email, "password": password });
        let data: LoginData = self.send(self.client.post(self.url("/auth/login")).json(&body)).await?;
        self.set_token(Some(data.access_token.clone())).await;
        Ok(data)
    }

    async fn me(&self) -> CoreResult<User> {
        let data: MeData = self.send(self.client.get(self.url("/auth/me"))).await?;
        Ok(data.user)
    }

    async fn logout(&self) -> CoreResult<()> {
        let builder = self.authorized(self.client.post(self.url("/auth/logout"))).await;
        // The local token is dropped even when the backend call fails.
        let result = match builder.send().await {
            Ok(response) => read_envelope::<serde_json::Value>(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        self.set_token(None).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[test]
    fn test_client_error_surfaces_backend_message() {
        let body = r#"{"success":false,"message":"Restaurant is currently closed"}"#;
        let err = decode_envelope::<OrderData>(400, body).unwrap_err();
        match err {
            CoreError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Restaurant is currently closed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_is_distinct() {
        let err = decode_envelope::<OrderData>(401, "{}").unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = decode_envelope::<OrderData>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unsuccessful_envelope_on_2xx_is_rejection() {
        let err = decode_envelope::<OrderData>(200, r#"{"success":false,"message":"Item unavailable"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Item unavailable");
    }

    #[test]
    fn test_garbage_body_is_transport_error() {
        let err = decode_envelope::<OrderData>(200, "not json").unwrap_err();
        assert!(err.is_retryable());
    }

    /// Accepts one connection, answers with `status` and `body`, and hands back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            let head_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before request head");
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < head_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
        });

        (base_url, rx)
    }

    fn client(base_url: &str) -> BackendClient {
        BackendClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_attached_to_requests() {
        let (base_url, request) = serve_once("200 OK", r#"{"success":true,"data":{"orders":[{"_id":"o1","status":"ready","total":775}]}}"#).await;
        let client = client(&base_url);
        client.set_token(Some(Masked::new("tok-123".to_string()))).await;

        let orders = client.list_orders(OrderScope::Restaurant, Some("ready")).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, Some(fooddala_shared::Money::from_rupees(775)));

        let raw = request.await.unwrap();
        assert!(raw.starts_with("GET /api/orders/restaurant/orders?status=ready HTTP/1.1"));
        assert!(raw.to_lowercase().contains("authorization: bearer tok-123"));
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let (base_url, request) = serve_once("200 OK", r#"{"success":true,"data":{"orders":[]}}"#).await;
        let orders = client(&base_url).list_orders(OrderScope::Mine, None).await.unwrap();
        assert!(orders.is_empty());

        let raw = request.await.unwrap();
        assert!(raw.starts_with("GET /api/orders HTTP/1.1"));
        assert!(!raw.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_rejection_carries_backend_message() {
        let (base_url, request) = serve_once("400 Bad Request", r#"{"success":false,"message":"Order already delivered"}"#).await;
        let err = client(&base_url).cancel_order("o1", "changed my mind").await.unwrap_err();
        match err {
            CoreError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Order already delivered");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /api/orders/o1/cancel HTTP/1.1"));
        assert!(raw.ends_with(r#"{"reason":"changed my mind"}"#));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let (base_url, _request) = serve_once("401 Unauthorized", r#"{"success":false,"message":"jwt expired"}"#).await;
        let err = client(&base_url).me().await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_transport() {
        let (base_url, _request) = serve_once("503 Service Unavailable", "upstream down").await;
        let err = client(&base_url)
            .update_status("o1", "preparing")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}/api", addr)).me().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let client = BackendClient::new("http://localhost:5000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/orders"), "http://localhost:5000/api/orders");
    }
}
