// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! `ServerConfig` 在启动时构建一次，之后以 `Arc<ServerConfig>` 的形式只读地
//! 共享给监听器与每一个连接处理器。
//!
//! 支持两种配置文件格式：
//! - TOML（缺省，`config/development.toml`），键名与下方字段的 `rename` 一致；
//! - 以制表符分隔的 `ws.conf` 旧格式，文件名以 `.conf` 结尾时启用。

use std::{collections::HashMap, fs, path::Path, time::Duration};

use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};

use crate::{
    exception::Exception,
    param::{DEFAULT_CONTENT_TYPES, DEFAULT_DIRECTORY_INDEX},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(rename = "ListenPort")]
    listen_port: i64,
    #[serde(rename = "DocumentRoot")]
    document_root: String,
    /// 持久连接的空闲超时，单位为秒
    #[serde(rename = "KeepaliveTime")]
    keepalive_time: f64,
    /// 由 `keepalive_time` 换算而来，只在规范化或 builder 中写入
    #[serde(skip)]
    keepalive: Duration,
    #[serde(rename = "DirectoryIndex", default = "default_directory_index")]
    directory_index: Vec<String>,
    /// 键为带前导 `.` 的后缀名，例如 `.html`
    #[serde(rename = "ContentType", default = "default_content_types")]
    content_types: HashMap<String, String>,
    #[serde(rename = "ListenAddress", default = "default_listen_address")]
    listen_address: String,
    #[serde(rename = "WorkerThreads", default)]
    worker_threads: usize,
}

fn default_directory_index() -> Vec<String> {
    DEFAULT_DIRECTORY_INDEX.clone()
}

fn default_content_types() -> HashMap<String, String> {
    DEFAULT_CONTENT_TYPES.clone()
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            listen_port: 8080,
            document_root: ".".to_string(),
            keepalive_time: 10.0,
            keepalive: Duration::from_secs(10),
            directory_index: default_directory_index(),
            content_types: default_content_types(),
            listen_address: default_listen_address(),
            worker_threads: num_cpus::get(),
        }
    }

    /// 根据文件后缀选择解析器：`.conf` 使用旧的制表符格式，其余按 TOML 解析。
    pub fn load(filename: &str) -> Result<Self, Exception> {
        let content = read_config_file(filename)?;
        if Path::new(filename).extension().is_some_and(|e| e == "conf") {
            Self::from_ws_conf(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, Exception> {
        let raw: ServerConfig =
            toml::from_str(content).map_err(|e| Exception::InvalidConfig(e.to_string()))?;
        raw.normalized()
    }

    /// 解析旧的 `ws.conf` 格式。
    ///
    /// 每行以制表符分隔：
    /// - `Key<TAB>Value`：普通键值，值两侧的双引号会被去掉；
    /// - `ContentType<TAB>.ext<TAB>mime`：MIME 映射；
    /// - `Key<TAB>v1<TAB>v2...`：列表，例如 `DirectoryIndex`。
    ///
    /// 以 `#` 开头的行和空行会被忽略。
    pub fn from_ws_conf(content: &str) -> Result<Self, Exception> {
        let mut values: HashMap<String, String> = HashMap::new();
        let mut lists: HashMap<String, Vec<String>> = HashMap::new();
        let mut content_types: HashMap<String, String> = HashMap::new();

        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            match fields.as_slice() {
                [key, value] => {
                    values.insert(key.to_string(), unquote(value).to_string());
                }
                [_, ext, mime] if ext.starts_with('.') => {
                    content_types.insert(ext.to_string(), unquote(mime).to_string());
                }
                [key, rest @ ..] => {
                    lists.insert(
                        key.to_string(),
                        rest.iter().map(|s| unquote(s).to_string()).collect(),
                    );
                }
                [] => {}
            }
        }

        let required = |key: &str| -> Result<String, Exception> {
            values
                .get(key)
                .cloned()
                .ok_or_else(|| Exception::InvalidConfig(format!("缺少配置项 {}", key)))
        };

        let listen_port = required("ListenPort")?.trim().parse::<i64>().map_err(|_| {
            Exception::InvalidConfig("ListenPort 必须是一个整数".to_string())
        })?;
        let keepalive_time = required("KeepaliveTime")?.trim().parse::<f64>().map_err(|_| {
            Exception::InvalidConfig("KeepaliveTime 必须是整数或浮点数".to_string())
        })?;
        let document_root = required("DocumentRoot")?;

        let directory_index = match (lists.remove("DirectoryIndex"), values.get("DirectoryIndex")) {
            (Some(list), _) => list,
            (None, Some(single)) => vec![single.clone()],
            (None, None) => default_directory_index(),
        };
        if content_types.is_empty() {
            warn!("配置文件中没有 ContentType 项，使用内置的 MIME 映射表");
            content_types = default_content_types();
        }

        let config = Self {
            listen_port,
            document_root,
            keepalive_time,
            keepalive: Duration::ZERO,
            directory_index,
            content_types,
            listen_address: values
                .get("ListenAddress")
                .cloned()
                .unwrap_or_else(default_listen_address),
            worker_threads: values
                .get("WorkerThreads")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        };
        config.normalized()
    }

    /// 统一路径分隔符、去掉末尾的斜杠，并校验数值范围。
    fn normalized(mut self) -> Result<Self, Exception> {
        self.document_root = self.document_root.replace('\\', "/");
        if self.document_root.ends_with('/') {
            self.document_root.pop();
        }
        // 负数、NaN、无穷大以及超出 Duration 表示范围的值都会被拒绝
        self.keepalive = Duration::try_from_secs_f64(self.keepalive_time).map_err(|_| {
            Exception::InvalidConfig(format!(
                "KeepaliveTime 必须是非负且有限的秒数，当前值为 {}",
                self.keepalive_time
            ))
        })?;
        if self.directory_index.is_empty() {
            warn!("DirectoryIndex 为空，所有目录请求都将返回 404");
        }
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        debug!("配置已规范化：{:?}", self);
        Ok(self)
    }
}

fn read_config_file(filename: &str) -> Result<String, Exception> {
    fs::read_to_string(filename).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            Exception::ConfigNotFound(format!("{} ({})", filename, e))
        }
        _ => Exception::InvalidConfig(format!("无法读取 {}: {}", filename, e)),
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

// 测试与嵌入场景下使用的构造器
impl ServerConfig {
    pub fn with_listen_port(mut self, port: i64) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_listen_address(mut self, address: &str) -> Self {
        self.listen_address = address.to_string();
        self
    }

    pub fn with_document_root(mut self, root: &str) -> Self {
        self.document_root = root.trim_end_matches('/').to_string();
        self
    }

    pub fn with_keepalive_time(mut self, seconds: f64) -> Self {
        self.keepalive_time = seconds;
        self.keepalive = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
        self
    }

    pub fn with_directory_index(mut self, index: &[&str]) -> Self {
        self.directory_index = index.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_content_type(mut self, ext: &str, mime: &str) -> Self {
        self.content_types.insert(ext.to_string(), mime.to_string());
        self
    }

    pub fn without_content_type(mut self, ext: &str) -> Self {
        self.content_types.remove(ext);
        self
    }
}

impl ServerConfig {
    pub fn listen_port(&self) -> i64 {
        self.listen_port
    }

    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    pub fn document_root(&self) -> &str {
        &self.document_root
    }

    pub fn keepalive_time(&self) -> Duration {
        self.keepalive
    }

    pub fn directory_index(&self) -> &[String] {
        &self.directory_index
    }

    /// 按带前导 `.` 的后缀名查询 MIME 类型
    pub fn content_type(&self, ext: &str) -> Option<&str> {
        self.content_types.get(ext).map(|s| s.as_str())
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOML_SAMPLE: &str = r#"
ListenPort = 8080
DocumentRoot = "C:\\www\\"
KeepaliveTime = 10
DirectoryIndex = ["index.html", "index.htm"]

[ContentType]
".html" = "text/html"
".png" = "image/png"
"#;

    const WS_CONF_SAMPLE: &str = "#serviceport number\n\
ListenPort\t8081\n\
#document root\n\
DocumentRoot\t\"/var/www/\"\n\
#default web page\n\
DirectoryIndex\tindex.html\tindex.htm\tindex.ws\n\
#content type\n\
ContentType\t.html\ttext/html\n\
ContentType\t.txt\ttext/plain\n\
ContentType\t.png\timage/png\n\
KeepaliveTime\t7.5\n";

    #[test]
    fn test_from_toml() {
        let config = ServerConfig::from_toml(TOML_SAMPLE).unwrap();
        assert_eq!(config.listen_port(), 8080);
        assert_eq!(config.document_root(), "C:/www");
        assert_eq!(config.keepalive_time(), Duration::from_secs(10));
        assert_eq!(config.directory_index(), &["index.html", "index.htm"]);
        assert_eq!(config.content_type(".png"), Some("image/png"));
        assert_eq!(config.content_type(".css"), None);
        assert_eq!(config.listen_address(), "0.0.0.0");
        assert!(config.worker_threads() > 0);
    }

    #[test]
    fn test_from_toml_missing_key() {
        let result = ServerConfig::from_toml("ListenPort = 8080\n");
        assert!(matches!(result, Err(Exception::InvalidConfig(_))));
    }

    #[test]
    fn test_from_toml_negative_keepalive() {
        let content = "ListenPort = 8080\nDocumentRoot = \"www\"\nKeepaliveTime = -1\n";
        let result = ServerConfig::from_toml(content);
        assert!(matches!(result, Err(Exception::InvalidConfig(_))));
    }

    #[test]
    fn test_from_toml_huge_keepalive() {
        for value in ["1e20", "inf", "nan"] {
            let content = format!(
                "ListenPort = 8080\nDocumentRoot = \"www\"\nKeepaliveTime = {}\n",
                value
            );
            let result = ServerConfig::from_toml(&content);
            assert!(matches!(result, Err(Exception::InvalidConfig(_))), "{}", value);
        }
    }

    #[test]
    fn test_builder_keepalive_saturates() {
        let config = ServerConfig::new().with_keepalive_time(1e20);
        assert_eq!(config.keepalive_time(), Duration::MAX);
        let config = ServerConfig::new().with_keepalive_time(-3.0);
        assert_eq!(config.keepalive_time(), Duration::ZERO);
        let config = ServerConfig::new().with_keepalive_time(0.25);
        assert_eq!(config.keepalive_time(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_ws_conf() {
        let config = ServerConfig::from_ws_conf(WS_CONF_SAMPLE).unwrap();
        assert_eq!(config.listen_port(), 8081);
        assert_eq!(config.document_root(), "/var/www");
        assert_eq!(config.keepalive_time(), Duration::from_millis(7500));
        assert_eq!(
            config.directory_index(),
            &["index.html", "index.htm", "index.ws"]
        );
        assert_eq!(config.content_type(".txt"), Some("text/plain"));
        assert_eq!(config.content_type(".css"), None);
    }

    #[test]
    fn test_from_ws_conf_bad_port() {
        let content = WS_CONF_SAMPLE.replace("8081", "eighty");
        let result = ServerConfig::from_ws_conf(&content);
        assert!(matches!(result, Err(Exception::InvalidConfig(_))));
    }

    #[test]
    fn test_from_ws_conf_bad_keepalive() {
        let content = WS_CONF_SAMPLE.replace("7.5", "soon");
        let result = ServerConfig::from_ws_conf(&content);
        assert!(matches!(result, Err(Exception::InvalidConfig(_))));
    }

    #[test]
    fn test_load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let conf_path = dir.path().join("ws.conf");
        let mut f = fs::File::create(&conf_path).unwrap();
        f.write_all(WS_CONF_SAMPLE.as_bytes()).unwrap();
        let config = ServerConfig::load(conf_path.to_str().unwrap()).unwrap();
        assert_eq!(config.listen_port(), 8081);

        let toml_path = dir.path().join("development.toml");
        fs::write(&toml_path, TOML_SAMPLE).unwrap();
        let config = ServerConfig::load(toml_path.to_str().unwrap()).unwrap();
        assert_eq!(config.listen_port(), 8080);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ServerConfig::load("/definitely/not/here/ws.conf");
        assert!(matches!(result, Err(Exception::ConfigNotFound(_))));
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::new()
            .with_document_root("/srv/www/")
            .with_directory_index(&["home.html"])
            .with_content_type(".xyz", "application/x-xyz")
            .without_content_type(".html");
        assert_eq!(config.document_root(), "/srv/www");
        assert_eq!(config.directory_index(), &["home.html"]);
        assert_eq!(config.content_type(".xyz"), Some("application/x-xyz"));
        assert_eq!(config.content_type(".html"), None);
    }
}
