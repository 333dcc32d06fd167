use serde::de::DeserializeOwned;
use tracing::debug;

use super::{EventRecord, Session, SupabaseConfig, EVENTS_TABLE, SESSIONS_TABLE};
use crate::error::{Result, WatchError};

/// Minimal PostgREST client for the session and event tables
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        debug!(table, ?query, "selecting rows");
        let rows = self
            .http
            .get(self.table_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<T>>()
            .await?;
        Ok(rows)
    }

    /// The session row for an agent
    pub async fn fetch_session(&self, agent_id: &str) -> Result<Session> {
        let rows: Vec<Session> = self
            .select(
                SESSIONS_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("agent_id", format!("eq.{}", agent_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| WatchError::AgentNotFound(agent_id.to_string()))
    }

    /// The most recent events of a session, newest first
    pub async fn fetch_recent_events(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>> {
        self.select(
            EVENTS_TABLE,
            &[
                ("select", "*".to_string()),
                ("session_id", format!("eq.{}", session_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned JSON response and hand back the request head
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = tcp.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            tcp.write_all(response.as_bytes()).await.unwrap();
            tcp.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    fn client(url: &str) -> RestClient {
        RestClient::new(&SupabaseConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
        })
    }

    #[test]
    fn test_table_url_trims_slash() {
        let rest = client("https://demo.supabase.co/");
        assert_eq!(
            rest.table_url(SESSIONS_TABLE),
            "https://demo.supabase.co/rest/v1/ai_agent_sessions"
        );
    }

    #[tokio::test]
    async fn test_fetch_session() {
        let (url, server) =
            serve_once(r#"[{"id":"s-1","agent_id":"nex","agent_name":"Nex","status":"live"}]"#)
                .await;
        let session = client(&url).fetch_session("nex").await.unwrap();
        assert_eq!(session.id, "s-1");
        assert!(session.status.is_live());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /rest/v1/ai_agent_sessions?"));
        assert!(request.contains("agent_id=eq.nex"));
        assert!(request.to_ascii_lowercase().contains("apikey: anon"));
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let (url, server) = serve_once("[]").await;
        let err = client(&url).fetch_session("ghost").await.unwrap_err();
        assert!(matches!(err, WatchError::AgentNotFound(ref id) if id == "ghost"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_recent_events_orders_newest_first() {
        let (url, server) = serve_once(
            r#"[{"id":"2","type":"code","data":{"filename":"a.ts","content":"b"}},
                {"id":"1","type":"thinking","data":{"content":"plan"}}]"#,
        )
        .await;
        let events = client(&url).fetch_recent_events("s-1", 50).await.unwrap();
        assert_eq!(events.len(), 2);

        let request = server.await.unwrap();
        assert!(request.contains("order=created_at.desc"));
        assert!(request.contains("limit=50"));
    }
}
