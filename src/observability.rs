//! 可观测性：tracing 初始化
//!
//! RUST_LOG 未设置时使用给定的默认过滤级别；工具调用的结构化审计日志
//! 经同一订阅器输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 以 info 为默认级别初始化
pub fn init() {
    init_with("info");
}

/// 以指定的默认过滤指令初始化；非法指令退回 info
pub fn init_with(default_directive: &str) {
    let directive = default_directive
        .parse()
        .unwrap_or_else(|_| "info".parse().expect("valid directive"));
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(directive))
        .with(fmt::layer())
        .init();
}
