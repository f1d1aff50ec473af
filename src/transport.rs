//! 传输层抽象：打开一个流式 GET 连接并产出原始字节
//!
//! 中止连接的方式就是丢弃 [`ByteStream`]；worker 负责决定何时丢弃。

use crate::error::SseError;
use bytes::Bytes;
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;

/// 连接建立后得到的字节流
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SseError>> + Send>>;

/// 一次连接请求
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    pub url: &'a str,
    /// 重连时带上的 Last-Event-ID
    pub last_event_id: Option<&'a str>,
}

/// 可替换的传输实现（默认为 reqwest，测试中可以注入脚本化的实现）
pub trait Transport: Send + Sync {
    fn open<'a>(
        &'a self,
        request: OpenRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, SseError>> + Send + 'a>>;
}

#[cfg(feature = "client")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "client")]
mod reqwest_transport {
    use super::{ByteStream, OpenRequest, Transport};
    use crate::error::SseError;
    use futures_util::StreamExt;
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
    use reqwest::Url;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::OnceLock;
    use std::time::Duration;
    use tracing::debug;

    /// 基于 reqwest streaming body 的传输实现
    ///
    /// reqwest client 在第一次连接时才构建，构建失败会作为一次连接失败处理。
    #[derive(Debug)]
    pub struct ReqwestTransport {
        http: OnceLock<reqwest::Client>,
        connect_timeout: Option<Duration>,
        accept_identity_encoding: bool,
        headers: Vec<(String, String)>,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self {
                http: OnceLock::new(),
                connect_timeout: Some(Duration::from_secs(30)),
                accept_identity_encoding: true,
                headers: Vec::new(),
            }
        }

        /// 使用外部构建好的 reqwest client（此时 connect_timeout 不再生效）
        pub fn with_client(client: reqwest::Client) -> Self {
            let transport = Self::new();
            let _ = transport.http.set(client);
            transport
        }

        /// 设置连接超时（None 表示不限制）
        ///
        /// 只限制建立连接的时间；SSE 是长连接，不设置整个请求的超时。
        pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
            self.connect_timeout = timeout;
            self
        }

        /// 是否发送 `Accept-Encoding: identity`，避免压缩带来的缓冲
        pub fn accept_identity_encoding(mut self, enabled: bool) -> Self {
            self.accept_identity_encoding = enabled;
            self
        }

        /// 追加一个自定义请求头
        pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.headers.push((name.into(), value.into()));
            self
        }

        fn client(&self) -> Result<&reqwest::Client, SseError> {
            if let Some(client) = self.http.get() {
                return Ok(client);
            }
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = self.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            let built = builder.build()?;
            Ok(self.http.get_or_init(|| built))
        }

        fn request_headers(&self, last_event_id: Option<&str>) -> Result<HeaderMap, SseError> {
            let mut headers = HeaderMap::new();
            for (name, value) in &self.headers {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| SseError::InvalidHeaderValue)?;
                let value = HeaderValue::from_str(value).map_err(|_| SseError::InvalidHeaderValue)?;
                headers.insert(name, value);
            }
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
            if self.accept_identity_encoding {
                headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
            }
            if let Some(id) = last_event_id {
                let value = HeaderValue::from_str(id).map_err(|_| SseError::InvalidHeaderValue)?;
                headers.insert(HeaderName::from_static("last-event-id"), value);
            }
            Ok(headers)
        }
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for ReqwestTransport {
        fn open<'a>(
            &'a self,
            request: OpenRequest<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<ByteStream, SseError>> + Send + 'a>> {
            Box::pin(async move {
                let url: Url = request
                    .url
                    .parse()
                    .map_err(|e: <Url as std::str::FromStr>::Err| SseError::Url(e.to_string()))?;
                let headers = self.request_headers(request.last_event_id)?;

                debug!(
                    url = %url,
                    last_event_id = ?request.last_event_id,
                    connect_timeout = ?self.connect_timeout,
                    "Sending SSE request"
                );

                let resp = self.client()?.get(url.clone()).headers(headers).send().await?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(SseError::UnexpectedStatus(status.as_u16()));
                }

                let content_type = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                if content_type
                    .as_deref()
                    .map(|ct| ct.starts_with("text/event-stream"))
                    != Some(true)
                {
                    return Err(SseError::InvalidContentType(content_type));
                }

                debug!(url = %url, "SSE connection established");

                let stream: ByteStream = Box::pin(resp.bytes_stream().map(|chunk| chunk.map_err(SseError::from)));
                Ok(stream)
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn builds_event_stream_headers() {
            let transport = ReqwestTransport::new().header("Authorization", "Bearer t");
            let headers = transport.request_headers(Some("42")).unwrap();

            assert_eq!(headers[ACCEPT], "text/event-stream");
            assert_eq!(headers[ACCEPT_ENCODING], "identity");
            assert_eq!(headers["Last-Event-ID"], "42");
            assert_eq!(headers["Authorization"], "Bearer t");
        }

        #[test]
        fn invalid_header_is_a_configuration_error() {
            let transport = ReqwestTransport::new().header("bad header", "x");
            let err = transport.request_headers(None).unwrap_err();
            assert!(err.is_configuration());
        }

        #[tokio::test]
        async fn malformed_url_is_a_configuration_error() {
            let transport = ReqwestTransport::new();
            let err = match transport
                .open(OpenRequest { url: "not-a-valid-url", last_event_id: None })
                .await
            {
                Ok(_) => panic!("expected url error"),
                Err(e) => e,
            };
            assert!(matches!(err, SseError::Url(_)));
            assert!(err.is_configuration());
        }
    }
}
