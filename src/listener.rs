// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 监听器
//!
//! 持有服务端 Socket，循环等待新连接，并为每条连接派生一个独立的处理任务。
//! accept 循环只等待监听 Socket 就绪，从不等待某一条具体的连接。

use std::{
    future::Future,
    io,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpSocket, TcpStream},
    task::JoinSet,
};

use crate::{
    config::ServerConfig,
    connection::Connection,
    exception::Exception,
    param::{LISTEN_BACKLOG, MAX_LISTEN_PORT, MIN_LISTEN_PORT},
};

/// 新连接的来源。生产环境中就是 `TcpListener`。
pub trait Accept {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// 必须可以安全取消：`select!` 在其它分支就绪时会丢弃这个 future
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

pub struct Listener<A = TcpListener> {
    listener: A,
    config: Arc<ServerConfig>,
}

impl Listener {
    /// 校验端口范围，打开 SO_REUSEADDR 后绑定并开始监听。
    pub async fn bind(config: Arc<ServerConfig>) -> Result<Self, Exception> {
        let port = config.listen_port();
        if !(MIN_LISTEN_PORT..=MAX_LISTEN_PORT).contains(&port) {
            error!("端口号不能小于1024或大于65535：{}", port);
            return Err(Exception::PortOutOfRange(port));
        }
        let ip: IpAddr = config.listen_address().parse().map_err(|_| {
            Exception::InvalidConfig(format!("无法识别的监听地址：{}", config.listen_address()))
        })?;
        let address = SocketAddr::new(ip, port as u16);

        let socket = match address {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(Exception::BindFailed)?;
        socket.set_reuseaddr(true).map_err(Exception::BindFailed)?;
        socket.bind(address).map_err(|e| {
            error!("无法绑定端口：{}，错误：{}", port, e);
            Exception::BindFailed(e)
        })?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(Exception::BindFailed)?;
        info!("服务端已启动，在{}上监听Socket连接", address);

        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Exception> {
        Ok(self.listener.local_addr()?)
    }
}

impl<A: Accept> Listener<A> {
    /// 使用任意连接来源，跳过端口校验与绑定
    pub fn with_acceptor(listener: A, config: Arc<ServerConfig>) -> Self {
        Self { listener, config }
    }

    /// 主事件循环。正常情况下永不返回；accept 出现错误时关闭监听 Socket，
    /// 等待所有连接处理完毕后返回该错误。
    pub async fn run(self) -> Result<(), Exception> {
        let Listener { listener, config } = self;
        let mut handlers = JoinSet::new();
        let mut id: u128 = 0;

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("[ID{}]新的连接：{}", id, addr);
                        let connection = Connection::new(stream, id, Arc::clone(&config));
                        handlers.spawn(connection.serve());
                        id += 1;
                    }
                    Err(e) => {
                        error!("接受连接失败，服务器即将关闭：{}", e);
                        drop(listener);
                        info!("等待{}个连接处理完毕", handlers.len());
                        while let Some(finished) = handlers.join_next().await {
                            if let Err(e) = finished {
                                warn!("连接处理任务异常退出：{}", e);
                            }
                        }
                        return Err(Exception::AcceptFailed(e));
                    }
                },
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = finished {
                        warn!("连接处理任务异常退出：{}", e);
                    }
                }
            }
        }
    }
}

/// 绑定并运行监听器
pub async fn start(config: Arc<ServerConfig>) -> Result<(), Exception> {
    Listener::bind(config).await?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::VecDeque, sync::Mutex, time::Duration};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// 依次交出预先排好的结果，之后永远挂起
    struct ScriptedAcceptor {
        queue: Mutex<VecDeque<io::Result<DuplexStream>>>,
    }

    impl ScriptedAcceptor {
        fn new(script: Vec<io::Result<DuplexStream>>) -> Self {
            Self {
                queue: Mutex::new(script.into()),
            }
        }
    }

    impl Accept for ScriptedAcceptor {
        type Stream = DuplexStream;

        fn accept(&self) -> impl Future<Output = io::Result<(DuplexStream, SocketAddr)>> + Send {
            async move {
                let next = self.queue.lock().unwrap().pop_front();
                match next {
                    Some(result) => result.map(|stream| (stream, ([127, 0, 0, 1], 9).into())),
                    None => std::future::pending().await,
                }
            }
        }
    }

    /// 借用操作系统分配一个空闲的高位端口
    fn free_port() -> i64 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port() as i64
    }

    #[tokio::test]
    async fn test_port_below_range_is_rejected() {
        let config = Arc::new(ServerConfig::new().with_listen_port(80));
        let result = Listener::bind(config).await;
        assert!(matches!(result, Err(Exception::PortOutOfRange(80))));
    }

    #[tokio::test]
    async fn test_port_above_range_is_rejected() {
        let config = Arc::new(ServerConfig::new().with_listen_port(65536));
        let result = Listener::bind(config).await;
        assert!(matches!(result, Err(Exception::PortOutOfRange(65536))));
    }

    #[tokio::test]
    async fn test_bad_listen_address() {
        let config = Arc::new(
            ServerConfig::new()
                .with_listen_port(free_port())
                .with_listen_address("not-an-ip"),
        );
        let result = Listener::bind(config).await;
        assert!(matches!(result, Err(Exception::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_address_in_use_is_bind_failure() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port() as i64;
        let config = Arc::new(
            ServerConfig::new()
                .with_listen_port(port)
                .with_listen_address("127.0.0.1"),
        );
        let result = Listener::bind(config).await;
        assert!(matches!(result, Err(Exception::BindFailed(_))));
    }

    #[tokio::test]
    async fn test_accept_error_drains_handlers_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "hello").unwrap();
        let config = Arc::new(
            ServerConfig::new().with_document_root(dir.path().to_str().unwrap()),
        );

        let (mut client, server) = duplex(4096);
        let acceptor = ScriptedAcceptor::new(vec![
            Ok(server),
            Err(io::Error::new(io::ErrorKind::Other, "too many open files")),
        ]);
        let mut running = tokio::spawn(Listener::with_acceptor(acceptor, config).run());

        // accept 已失败，但仍有一条连接在处理中，run 不能返回
        let pending = tokio::time::timeout(Duration::from_millis(200), &mut running).await;
        assert!(pending.is_err());

        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("hello"));

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Exception::AcceptFailed(_))));
    }

    #[tokio::test]
    async fn test_serves_concurrent_connections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "hello").unwrap();
        let config = Arc::new(
            ServerConfig::new()
                .with_listen_port(free_port())
                .with_listen_address("127.0.0.1")
                .with_document_root(dir.path().to_str().unwrap()),
        );
        let listener = Listener::bind(config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        // 第一条连接保持空闲，不应阻塞第二条连接的处理
        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.0\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));
    }
}
