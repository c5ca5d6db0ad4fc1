// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源解析模块
//!
//! 将请求目标映射为文档根目录下的具体文件及其 MIME 类型，或者映射为一个
//! 合成的错误页面。判定顺序：
//!
//! 1. 协议标记不是 `HTTP/1.0` / `HTTP/1.1` → `501 Not Implemented`
//! 2. 方法不是 `GET` / `POST` → `400 Bad Request`
//! 3. 以 `/` 结尾的目标按 `DirectoryIndex` 顺序寻找首页，其余目标直接拼接在根目录之后
//! 4. 文件不存在 → `404 Not Found`
//! 5. 后缀名不在 `ContentType` 表中 → `501 Not Implemented`，否则 `200 OK`
//! 6. POST 请求把表单数据拼接进目标文档

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use log::{debug, warn};

use crate::{
    config::ServerConfig,
    exception::Exception,
    param::{HttpRequestMethod, HttpStatus, SUPPORTED_PROTOCOLS},
    request::Request,
    util::HtmlBuilder,
};

/// 解析器访问文件系统的接口，只读。
#[cfg_attr(test, mockall::automock)]
pub trait ResourceStore {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// 直接访问本地磁盘
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl ResourceStore for LocalStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// 响应体的来源
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// 文档根目录下的文件，发送其原始字节
    File(PathBuf),
    /// 合成的 HTML 文本
    Html(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    status: HttpStatus,
    body: Body,
    content_type: Option<String>,
}

impl Resolution {
    fn error(status: HttpStatus, request: &Request) -> Self {
        Self {
            status,
            body: Body::Html(HtmlBuilder::error_page(status, request.raw())),
            content_type: None,
        }
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

pub struct Resolver<'a, S: ResourceStore> {
    config: &'a ServerConfig,
    store: &'a S,
}

impl<'a, S: ResourceStore> Resolver<'a, S> {
    pub fn new(config: &'a ServerConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    pub fn resolve(&self, request: &Request, id: u128) -> Result<Resolution, Exception> {
        if !SUPPORTED_PROTOCOLS.contains(&request.protocol()) {
            warn!("[ID{}]不支持的协议版本：{}，返回501", id, request.protocol());
            return Ok(Resolution::error(HttpStatus::NotImplemented, request));
        }

        let method = match request.method_kind() {
            Some(method) => method,
            None => {
                warn!("[ID{}]不支持的HTTP请求方法：{}，返回400", id, request.method());
                return Ok(Resolution::error(HttpStatus::BadRequest, request));
            }
        };

        let path = match self.candidate(request.target(), id) {
            Some(path) => path,
            None => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, request.target());
                return Ok(Resolution::error(HttpStatus::NotFound, request));
            }
        };
        debug!("[ID{}]映射物理路径：{}", id, path.display());

        let ext = extension_of(&path);
        let resolution = match self.config.content_type(&ext) {
            Some(mime) => Resolution {
                status: HttpStatus::Ok,
                body: Body::File(path.clone()),
                content_type: Some(mime.to_string()),
            },
            None => {
                warn!("[ID{}]不支持的内容类型：{}，返回501", id, ext);
                Resolution::error(HttpStatus::NotImplemented, request)
            }
        };

        match method {
            HttpRequestMethod::Get => Ok(resolution),
            HttpRequestMethod::Post => self.splice_post(resolution, &path, request, id),
        }
    }

    /// 读取响应体的字节
    pub fn load_body(&self, body: &Body) -> Result<Bytes, Exception> {
        match body {
            Body::File(path) => Ok(Bytes::from(self.store.read(path)?)),
            Body::Html(text) => Ok(Bytes::from(text.clone())),
        }
    }

    /// 计算候选路径；找不到时返回 `None`
    fn candidate(&self, target: &str, id: u128) -> Option<PathBuf> {
        // 目标直接拼接在根目录之后，必须以 `/` 开头，否则会落到同名前缀的兄弟目录
        if !target.starts_with('/') || target.split('/').any(|segment| segment == "..") {
            warn!("[ID{}]请求的路径：{} 试图越出文档根目录", id, target);
            return None;
        }

        let root = self.config.document_root();
        if target.ends_with('/') {
            self.config
                .directory_index()
                .iter()
                .map(|index| PathBuf::from(format!("{}/{}", root, index)))
                .find(|path| self.store.exists(path))
        } else {
            let path = PathBuf::from(format!("{}{}", root, target));
            self.store.exists(&path).then_some(path)
        }
    }

    /// POST：目标文档存在时，不论状态如何都以拼接后的文本作为响应体
    fn splice_post(
        &self,
        resolution: Resolution,
        path: &Path,
        request: &Request,
        id: u128,
    ) -> Result<Resolution, Exception> {
        let document = self.store.read(path)?;
        let document = String::from_utf8_lossy(&document);
        match HtmlBuilder::splice_post_data(&document, request.post_data()) {
            Ok(html) => {
                debug!("[ID{}]已将POST数据拼接到 {}", id, path.display());
                Ok(Resolution {
                    body: Body::Html(html),
                    ..resolution
                })
            }
            Err(e) => {
                warn!("[ID{}]{}：{}，返回500", id, e, path.display());
                Ok(Resolution::error(HttpStatus::InternalServerError, request))
            }
        }
    }
}

/// 文件名中最后一个 `.` 之后的部分，带前导 `.`。没有 `.` 时整个文件名被当作后缀。
fn extension_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name.rsplit('.').next().unwrap_or_default();
    format!(".{}", ext)
}
