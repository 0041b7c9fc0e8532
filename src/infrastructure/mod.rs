//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（reqwest::Client），只对外暴露能力

pub mod http_executor;

pub use http_executor::HttpExecutor;
