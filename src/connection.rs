// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理器
//!
//! 一个 `Connection` 独占一条客户端连接，按照
//! `AwaitingRequest → Processing → (AwaitingRequest | Closing)` 的状态机运行，
//! 同一时刻只处理一个请求。
//!
//! 处理过程中的任何错误（解码、I/O、文件系统）都会直接结束这条连接，不做重试；
//! 协议层面的客户端错误则以 400/404/501 响应返回，连接是否保持由持久连接协商决定。

use std::{io::ErrorKind, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    config::ServerConfig,
    exception::Exception,
    param::BUFFER_SIZE,
    protocol::Negotiation,
    request::Request,
    resource::{LocalStore, Resolver},
    response::{Response, ResponseHeaders},
};

#[derive(Debug)]
pub enum ConnectionState {
    /// 等待下一个请求；首个请求之后的读取受空闲超时限制
    AwaitingRequest,
    /// 已收到一次读取的数据，正在解析并应答
    Processing(Vec<u8>),
    /// 关闭 Socket，处理器结束
    Closing,
}

pub struct Connection<S> {
    stream: S,
    id: u128,
    config: Arc<ServerConfig>,
    state: ConnectionState,
    response_headers: ResponseHeaders,
    /// 第一个请求应答完毕之前为 `None`，即不限时
    idle_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, id: u128, config: Arc<ServerConfig>) -> Self {
        Self {
            stream,
            id,
            config,
            state: ConnectionState::AwaitingRequest,
            response_headers: ResponseHeaders::new(),
            idle_timeout: None,
        }
    }

    /// 运行状态机直到连接结束
    pub async fn serve(mut self) {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closing);
            self.state = match state {
                ConnectionState::AwaitingRequest => match self.receive().await {
                    Some(data) => ConnectionState::Processing(data),
                    None => ConnectionState::Closing,
                },
                ConnectionState::Processing(data) => match self.process(&data).await {
                    Ok(true) => {
                        self.idle_timeout = Some(self.config.keepalive_time());
                        ConnectionState::AwaitingRequest
                    }
                    Ok(false) => ConnectionState::Closing,
                    Err(e) => {
                        warn!("[ID{}]处理请求失败，关闭连接：{}", self.id, e);
                        ConnectionState::Closing
                    }
                },
                ConnectionState::Closing => break,
            };
        }

        if let Err(e) = self.stream.shutdown().await {
            debug!("[ID{}]关闭连接时出错：{}", self.id, e);
        }
        debug!("[ID{}]TCP连接已关闭", self.id);
    }

    /// 读取一次，最多 `BUFFER_SIZE` 字节。对端关闭、超时或读错误都返回 `None`。
    async fn receive(&mut self) -> Option<Vec<u8>> {
        let mut buffer = vec![0; BUFFER_SIZE];
        let result = match self.idle_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.stream.read(&mut buffer)).await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!("[ID{}]持久连接空闲超时（{:?}）", self.id, limit);
                        return None;
                    }
                }
            }
            None => self.stream.read(&mut buffer).await,
        };

        match result {
            Ok(0) => {
                debug!("[ID{}]客户端已关闭连接", self.id);
                None
            }
            Ok(n) => {
                buffer.truncate(n);
                debug!("[ID{}]收到 {} 字节", self.id, n);
                Some(buffer)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                ) =>
            {
                warn!("[ID{}]连接被客户端中断：{}", self.id, e);
                None
            }
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", self.id, e);
                None
            }
        }
    }

    /// 解析、协商、解析资源、组装并发送响应。返回连接是否保持。
    async fn process(&mut self, data: &[u8]) -> Result<bool, Exception> {
        self.response_headers.clear();

        let request = match Request::try_from(data, self.id)? {
            Some(request) => request,
            None => return Ok(false),
        };

        let negotiation = Negotiation::negotiate(&request, self.id);
        self.response_headers.push(negotiation.connection_header());

        let resolver = Resolver::new(&self.config, &LocalStore);
        let resolution = resolver.resolve(&request, self.id)?;
        let content = resolver.load_body(resolution.body())?;

        let response = Response::assemble(
            negotiation.advertised(),
            resolution.status(),
            resolution.content_type(),
            content,
            &mut self.response_headers,
        );

        info!(
            "[ID{}] {}, {}, {}, {}, keep-alive={}",
            self.id,
            request.method(),
            request.target(),
            request.protocol(),
            response.status(),
            negotiation.persistent(),
        );

        self.stream.write_all(&response.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(negotiation.persistent())
    }
}
