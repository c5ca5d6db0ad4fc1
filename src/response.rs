//! 响应头的累积与响应报文的组装。

use bytes::{BufMut, Bytes, BytesMut};

use crate::param::{HttpStatus, CRLF};

/// 处理一个请求期间逐步累积的响应头。
///
/// 每个请求开始时清空；`flush` 生成完整的首部块之后也会被清空。
#[derive(Debug, Default, Clone)]
pub struct ResponseHeaders {
    lines: Vec<String>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 以状态行开头、空行结尾的首部块
    pub fn flush(&mut self, status_line: &str) -> String {
        let mut block = String::with_capacity(64 + self.lines.len() * 32);
        block.push_str(status_line);
        block.push_str(CRLF);
        for line in self.lines.drain(..) {
            block.push_str(&line);
            block.push_str(CRLF);
        }
        block.push_str(CRLF);
        block
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    status: HttpStatus,
    head: String,
    content: Bytes,
}

impl Response {
    /// 组装响应：追加 `Content-Type`（如果有）与 `Content-Length`，然后生成首部块。
    pub fn assemble(
        protocol: &str,
        status: HttpStatus,
        content_type: Option<&str>,
        content: Bytes,
        headers: &mut ResponseHeaders,
    ) -> Self {
        if let Some(mime) = content_type {
            headers.push(format!("Content-Type: {}", mime));
        }
        headers.push(format!("Content-Length: {}", content.len()));
        let head = headers.flush(&format!("{} {}", protocol, status));
        Self {
            status,
            head,
            content,
        }
    }

    /// 首部块与响应体拼接成的完整报文，一次写入 Socket
    pub fn as_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.head.len() + self.content.len());
        buf.put_slice(self.head.as_bytes());
        buf.put_slice(&self.content);
        buf.freeze()
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}
