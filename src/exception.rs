// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了 Web 服务器在启动阶段和请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 错误分类
//! - **启动期错误**：配置文件缺失或非法、端口越界、绑定失败。它们会让整个进程以非零状态退出。
//! - **连接期错误**：请求无法解码、请求行格式错误、读写失败。它们只会结束当前连接。
//!
//! 协议层面的客户端错误（不支持的方法、版本、资源不存在等）不属于异常，
//! 它们以合成的 HTTP 错误响应返回给客户端。

use std::{fmt, io};

/// 服务器运行过程中发生的异常类型。
#[derive(Debug)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不足三个字段（方法、路径、协议）。携带原始请求行。
    MalformedRequestLine(String),
    /// POST 目标文档中没有 `<html>` 标记行，无法拼接表单数据。
    PostMarkerMissing,
    /// Socket 或文件系统读写失败。
    Io(io::Error),
    /// 找不到配置文件，或没有读取权限。
    ConfigNotFound(String),
    /// 配置文件内容非法或缺少必要的键。
    InvalidConfig(String),
    /// 监听端口不在 [1024, 65535] 范围内。
    PortOutOfRange(i64),
    /// 无法创建、绑定或监听服务端 Socket。
    BindFailed(io::Error),
    /// accept 出现不可恢复的错误，服务器需要停止。
    AcceptFailed(io::Error),
    /// 无法构建 Tokio 运行时。
    RuntimeBuildFailed(io::Error),
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine(line) => write!(f, "Malformed request line: {:?}", line),
            PostMarkerMissing => write!(f, "Target document has no <html> marker line"),
            Io(e) => write!(f, "I/O error: {}", e),
            ConfigNotFound(path) => write!(f, "Configuration file not found: {}", path),
            InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
            PortOutOfRange(port) => write!(
                f,
                "Port number {} is out of range, it must be within 1024..=65535",
                port
            ),
            BindFailed(e) => write!(f, "Could not open socket: {}", e),
            AcceptFailed(e) => write!(f, "Could not accept connection: {}", e),
            RuntimeBuildFailed(e) => write!(f, "Could not build async runtime: {}", e),
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Io(e) | BindFailed(e) | AcceptFailed(e) | RuntimeBuildFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_port_out_of_range() {
        let msg = PortOutOfRange(80).to_string();
        assert!(msg.contains("80"));
        assert!(msg.contains("1024..=65535"));
    }

    #[test]
    fn test_from_io_error() {
        let e: Exception = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(e, Io(_)));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_malformed_request_line_keeps_line() {
        let msg = MalformedRequestLine("GET /".to_string()).to_string();
        assert!(msg.contains("GET /"));
    }
}
