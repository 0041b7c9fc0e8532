//! 流程层（Workflow Layer）
//!
//! 定义"一本书"的完整处理流程

pub mod book_ctx;
pub mod book_flow;

pub use book_ctx::BookCtx;
pub use book_flow::{BookFlow, BookFlowResult};
