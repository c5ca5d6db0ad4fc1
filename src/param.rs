// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Web 服务器协议参数与常量模块
//!
//! 该模块定义了服务器遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 报文分隔符、接收缓冲区大小等固定参数。
//! - 服务器可以产生的状态码及其原因短语（Reason Phrase）。
//! - 缺省的首页列表与 MIME 类型映射表（配置文件未给出时使用）。
//! - HTTP 方法的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// 服务器名称标识，用于启动日志
pub const SERVER_NAME: &str = "keepalive-webserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头中键与值之间的分隔符
pub const HEADER_SEPARATOR: &str = ": ";

/// 单次从 Socket 读取的最大字节数。一个请求必须在一次读取中完整到达。
pub const BUFFER_SIZE: usize = 1024;

/// listen(2) 的等待队列长度
pub const LISTEN_BACKLOG: u32 = 5;

/// 允许监听的端口范围（闭区间）
pub const MIN_LISTEN_PORT: i64 = 1024;
pub const MAX_LISTEN_PORT: i64 = 65535;

/// 缺省配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/development.toml";

/// 缺省日志配置文件路径
pub const LOG_CONFIG_PATH: &str = "config/log4rs.yaml";

/// 服务器接受的协议标记。请求行中的第三个字段必须是其中之一。
pub const SUPPORTED_PROTOCOLS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// 持久连接所要求的协议标记
pub const PERSISTENT_PROTOCOL: &str = "HTTP/1.1";

/// POST 数据拼接位置的标记：文档中第一个 `<html>` 行之后
pub const HTML_MARKER: &str = "<html>\n";

lazy_static! {
    /// 协议标记的语法：`HTTP/<主版本>[.<次版本>]`
    pub static ref PROTOCOL_PATTERN: Regex = Regex::new(r"^HTTP/(\d+(?:\.\d+)?)$").unwrap();
}

lazy_static! {
    /// 缺省的目录首页列表，按顺序尝试。
    pub static ref DEFAULT_DIRECTORY_INDEX: Vec<String> = {
        vec!["index.html".to_string(), "index.htm".to_string()]
    };
}

lazy_static! {
    /// 文件后缀名（含前导 `.`）到 MIME 类型的缺省映射表。
    ///
    /// 配置文件中的 `ContentType` 表会完整替换它，而不是与之合并。
    pub static ref DEFAULT_CONTENT_TYPES: HashMap<String, String> = {
        let mut map = HashMap::new();
        for (ext, mime) in [
            (".html", "text/html"),
            (".htm", "text/html"),
            (".txt", "text/plain"),
            (".css", "text/css"),
            (".js", "text/javascript"),
            (".json", "application/json"),
            (".xml", "application/xml"),
            (".pdf", "application/pdf"),
            (".png", "image/png"),
            (".gif", "image/gif"),
            (".jpg", "image/jpeg"),
            (".jpeg", "image/jpeg"),
            (".ico", "image/x-icon"),
            (".svg", "image/svg+xml"),
        ] {
            map.insert(ext.to_string(), mime.to_string());
        }
        map
    };
}

/// 服务器能够产生的响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    /// 资源已找到并且内容类型受支持
    Ok,
    /// 请求方法既不是 GET 也不是 POST
    BadRequest,
    /// 文档根目录下不存在所请求的资源
    NotFound,
    /// POST 目标文档中找不到拼接标记
    InternalServerError,
    /// 不支持的协议版本或内容类型
    NotImplemented,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        match *self {
            HttpStatus::Ok => 200,
            HttpStatus::BadRequest => 400,
            HttpStatus::NotFound => 404,
            HttpStatus::InternalServerError => 500,
            HttpStatus::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match *self {
            HttpStatus::Ok => "OK",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::InternalServerError => "Internal Server Error",
            HttpStatus::NotImplemented => "Not Implemented",
        }
    }
}

impl fmt::Display for HttpStatus {
    /// 格式化为状态行中使用的 `<码> <原因短语>`，例如 `404 Not Found`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// 服务器处理的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 提交表单数据，数据会被回显到目标文档中
    Post,
}

impl HttpRequestMethod {
    /// 按请求行中的原样文本识别方法（区分大小写）。
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(HttpRequestMethod::Get),
            "POST" => Some(HttpRequestMethod::Post),
            _ => None,
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}
