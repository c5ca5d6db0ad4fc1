// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将一次 Socket 读取得到的原始字节解析为 `Request` 结构体。
//! 解析器是一个三状态的小型状态机，把请求行、首部块与消息体当作三段独立的语法：
//! 1. **请求行**：第一行，以单个空格切分为方法、路径、协议三个字段。
//! 2. **首部块**：直到第一个空行为止，只有包含 `": "` 的行才被视为首部。
//! 3. **消息体**：空行之后的全部内容。

use std::collections::HashMap;

use log::{debug, error};

use crate::{
    exception::Exception,
    param::{HttpRequestMethod, CRLF, HEADER_SEPARATOR},
};

/// 一条完整的 HTTP 请求。每次收到报文都重新构建，响应发出后即丢弃。
#[derive(Debug, Clone)]
pub struct Request {
    /// 请求方法，保持原样（区分大小写）
    method: String,
    /// 请求目标，尚未与文档根目录拼接
    target: String,
    /// 协议标记，例如 `HTTP/1.1`
    protocol: String,
    /// 首部，键保持收到时的大小写；重复的键以最后一次出现为准
    headers: HashMap<String, String>,
    /// 空行之后的消息体
    body: String,
    /// 原始请求文本，用于错误页面和 POST 数据回显
    raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseState {
    RequestLine,
    Headers,
    Body,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// 字节必须是合法的 UTF-8，否则返回 `RequestIsNotUtf8`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Option<Self>, Exception> {
        let text = match std::str::from_utf8(buffer) {
            Ok(text) => text,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };
        Self::parse(text, id)
    }

    /// 解析请求文本。
    ///
    /// 空白输入不是错误，返回 `Ok(None)`。请求行不足三个字段时返回
    /// `MalformedRequestLine`。
    pub fn parse(raw: &str, id: u128) -> Result<Option<Self>, Exception> {
        if raw.trim().is_empty() {
            debug!("[ID{}]收到空白请求，忽略", id);
            return Ok(None);
        }

        let mut state = ParseState::RequestLine;
        let mut method = String::new();
        let mut target = String::new();
        let mut protocol = String::new();
        let mut headers = HashMap::new();
        let mut body_lines: Vec<&str> = Vec::new();

        for line in raw.split(CRLF) {
            match state {
                ParseState::RequestLine => {
                    // 只使用 LF 分行的客户端，请求行在第一个换行处结束
                    let request_line = line.split('\n').next().unwrap_or(line);
                    let fields: Vec<&str> = request_line.split(' ').collect();
                    if fields.len() < 3 {
                        error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
                        return Err(Exception::MalformedRequestLine(request_line.to_string()));
                    }
                    method = fields[0].to_string();
                    target = fields[1].to_string();
                    protocol = fields[2].trim_end_matches('\r').to_string();
                    state = ParseState::Headers;
                }
                ParseState::Headers => {
                    if line.is_empty() {
                        state = ParseState::Body;
                    } else if let Some((key, value)) = line.split_once(HEADER_SEPARATOR) {
                        headers.insert(key.to_string(), value.trim_end_matches('\r').to_string());
                    }
                }
                ParseState::Body => body_lines.push(line),
            }
        }

        Ok(Some(Self {
            method,
            target,
            protocol,
            headers,
            body: body_lines.join(CRLF),
            raw: raw.to_string(),
        }))
    }
}

impl Request {
    /// 获取请求方法的原始文本
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 服务器支持的方法；其它方法返回 `None`
    pub fn method_kind(&self) -> Option<HttpRequestMethod> {
        HttpRequestMethod::from_token(&self.method)
    }

    /// 获取请求目标（含查询参数）
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// 按名称查找首部，名称比较不区分大小写。
    /// 大小写完全一致的键优先；否则在大小写变体中取字典序最小的键，结果与哈希顺序无关。
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// POST 表单数据：原始请求按 CRLF 切分后的最后一段
    pub fn post_data(&self) -> &str {
        self.raw.rsplit(CRLF).next().unwrap_or_default()
    }
}
