// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 持久连接 Web 服务器
//!
//! 基于 Tokio 运行时的 HTTP/1.0–1.1 静态文件服务器。
//! 启动流程：
//! - 初始化 log4rs 日志
//! - 载入配置（TOML 或旧的 `ws.conf` 格式），路径可由第一个命令行参数指定
//! - 按配置构建多线程运行时
//! - 启动监听器；Ctrl+C 立即以非零状态退出，不等待在途连接

use std::{env, process, sync::Arc};

use log::{error, info, warn};
use tokio::runtime::Builder;

use keepalive_webserver::{
    config::ServerConfig,
    exception::Exception,
    listener,
    param::{DEFAULT_CONFIG_PATH, LOG_CONFIG_PATH, SERVER_NAME},
};

fn main() {
    // 1. 日志系统：配置文件缺失时继续运行，只是没有日志输出
    if let Err(e) = log4rs::init_file(LOG_CONFIG_PATH, Default::default()) {
        eprintln!("无法载入日志配置 {}：{}，将不输出日志", LOG_CONFIG_PATH, e);
    }

    // 2. 环境配置加载
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("配置文件 {} 载入失败：{}", config_path, e);
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    info!("配置文件 {} 已载入", config_path);
    info!("document root: {}", config.document_root());

    if let Err(e) = run(config) {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<(), Exception> {
    // 3. 异步运行时：根据配置文件分配工作线程数
    let runtime = Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
        .map_err(Exception::RuntimeBuildFailed)?;
    info!("{} 使用 {} 个工作线程", SERVER_NAME, config.worker_threads());

    let config = Arc::new(config);
    runtime.block_on(async move {
        tokio::select! {
            result = listener::start(config) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("收到中断信号，立即退出");
                process::exit(1);
            }
        }
    })
}
