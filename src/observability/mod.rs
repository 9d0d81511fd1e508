//! 可观测性：tracing 订阅器初始化
//!
//! 默认 info 级别，`RUST_LOG` 可覆盖。重复调用不会 panic（测试与嵌入方可能已安装订阅器）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
