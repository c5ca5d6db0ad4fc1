// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 持久连接协商
//!
//! 根据请求的协议标记和首部，决定响应状态行中使用的协议标记，
//! 以及本次响应之后连接是否保持打开。

use log::debug;

use crate::{
    param::{PERSISTENT_PROTOCOL, PROTOCOL_PATTERN},
    request::Request,
};

/// 一次协商的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    /// 状态行中使用的协议标记
    advertised: String,
    /// 响应之后是否保持连接
    persistent: bool,
}

impl Negotiation {
    pub fn negotiate(request: &Request, id: u128) -> Self {
        let protocol = request.protocol();

        // 低于 1.0 或无法识别的版本一律按 HTTP/1.1 应答
        let advertised = match protocol_version(protocol) {
            Some(version) if version >= 1.0 => protocol.to_string(),
            _ => PERSISTENT_PROTOCOL.to_string(),
        };

        let persistent = protocol == PERSISTENT_PROTOCOL && !wants_close(request);
        debug!(
            "[ID{}]协议协商：客户端 {}，应答 {}，持久连接 {}",
            id, protocol, advertised, persistent
        );

        Self {
            advertised,
            persistent,
        }
    }

    pub fn advertised(&self) -> &str {
        &self.advertised
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// 需要追加到响应中的 `Connection` 首部
    pub fn connection_header(&self) -> &'static str {
        if self.persistent {
            "Connection: keep-alive"
        } else {
            "Connection: close"
        }
    }
}

/// 提取 `HTTP/x.y` 中的数值版本
fn protocol_version(protocol: &str) -> Option<f64> {
    PROTOCOL_PATTERN
        .captures(protocol)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn wants_close(request: &Request) -> bool {
    request
        .header("Connection")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("close"))
}
