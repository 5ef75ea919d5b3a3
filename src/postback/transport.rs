//! 出站 HTTP 传输
//!
//! `UreqTransport` 在 blocking 线程池中执行同步 ureq 请求；
//! 测试用替身实现同一个 trait。

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use ureq::Agent;

use super::request::PreparedRequest;
use crate::storage::models::HttpMethod;

/// 写入投递日志的响应体上限（字节）
pub const MAX_RESPONSE_BODY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PostbackTransport: Send + Sync {
    /// 发送一次请求；传输层错误（连接失败、超时）以字符串返回
    async fn send(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, String>;
}

/// 在字符边界处截断
pub fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

pub struct UreqTransport {
    agent: Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(user_agent: impl Into<String>) -> Self {
        // 非 2xx 也要拿到响应体写日志
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }

    fn send_sync(
        agent: Agent,
        user_agent: String,
        request: PreparedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, String> {
        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = agent
                    .get(&request.url)
                    .config()
                    .timeout_global(Some(timeout))
                    .build()
                    .header("User-Agent", &user_agent);
                for (k, v) in &request.headers {
                    builder = builder.header(k, v);
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = agent
                    .post(&request.url)
                    .config()
                    .timeout_global(Some(timeout))
                    .build()
                    .header("User-Agent", &user_agent);
                for (k, v) in &request.headers {
                    builder = builder.header(k, v);
                }
                builder.send(request.body.unwrap_or_default())
            }
        };

        let mut response = result.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        // 响应体读取失败不影响状态码判断
        let body = response.body_mut().read_to_string().unwrap_or_default();
        trace!("Postback {} -> {}", request.url, status);

        Ok(TransportResponse {
            status,
            body: truncate_body(body, MAX_RESPONSE_BODY),
        })
    }
}

#[async_trait]
impl PostbackTransport for UreqTransport {
    async fn send(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, String> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || Self::send_sync(agent, user_agent, request, timeout))
            .await
            .map_err(|e| format!("transport task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_on_char_boundary() {
        assert_eq!(truncate_body("abcdef".into(), 4), "abcd");
        assert_eq!(truncate_body("ab".into(), 4), "ab");
        // "é" 占 2 字节
        assert_eq!(truncate_body("aé".into(), 2), "a");
    }

    #[test]
    fn test_success_range() {
        let ok = TransportResponse {
            status: 204,
            body: String::new(),
        };
        assert!(ok.is_success());
        let redirect = TransportResponse {
            status: 302,
            body: String::new(),
        };
        assert!(!redirect.is_success());
    }

    #[tokio::test]
    async fn test_connection_error_is_reported() {
        let transport = UreqTransport::new("clicktrail-test");
        let request = PreparedRequest {
            method: HttpMethod::Get,
            // 保留端口，连接会被拒绝
            url: "http://127.0.0.1:9/pb".into(),
            body: None,
            headers: Vec::new(),
        };
        let result = transport.send(&request, Duration::from_millis(500)).await;
        assert!(result.is_err());
    }
}
