//! 외부 서비스 연동.

pub mod wechat;

pub use wechat::{WxClient, WxError};
