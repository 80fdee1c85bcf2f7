//! HTTP 接口层
//!
//! 以 REST 形式暴露促销管理、风险画像和事件处理能力。

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::{api_routes, build_router};
pub use state::AppState;
