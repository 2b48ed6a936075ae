//! 위챗 미니프로그램 로그인 코드 교환.
//!
//! 클라이언트가 받은 로그인 코드를 위챗 서버에서 openid로 교환합니다.

use std::time::Duration;

use pledge_core::{AppError, WechatConfig};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ApiError;

/// 위챗 코드 교환 에러.
#[derive(Debug, thiserror::Error)]
pub enum WxError {
    #[error("wechat authentication failed (status {0})")]
    Rejected(StatusCode),
    #[error("openid lookup failed: {0}")]
    LookupFailed(i64),
    #[error("openid missing from response")]
    MissingOpenid,
    #[error("wechat request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid wechat response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl From<WxError> for ApiError {
    fn from(err: WxError) -> Self {
        match err {
            WxError::Rejected(_) => AppError::authentication_failed("wechat authentication failed").into(),
            WxError::LookupFailed(code) => {
                AppError::authentication_failed(format!("openid lookup failed: {}", code)).into()
            }
            WxError::MissingOpenid => AppError::authentication_failed("openid lookup failed").into(),
            WxError::Transport(e) => e.into(),
            WxError::InvalidResponse(e) => ApiError::Unclassified(anyhow::Error::new(e)),
        }
    }
}

/// jscode2session 응답.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    openid: Option<String>,
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

/// 위챗 API 클라이언트.
pub struct WxClient {
    client: Client,
    login_url: String,
    app_id: String,
    app_secret: SecretString,
}

impl std::fmt::Debug for WxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WxClient")
            .field("login_url", &self.login_url)
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl WxClient {
    /// 설정에서 클라이언트를 생성합니다. app_id/app_secret이 없으면 `None`.
    pub fn from_config(config: &WechatConfig) -> Result<Option<Self>, WxError> {
        let (Some(app_id), Some(app_secret)) = (&config.app_id, &config.app_secret) else {
            return Ok(None);
        };

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Some(Self {
            client,
            login_url: config.login_url.clone(),
            app_id: app_id.clone(),
            app_secret: SecretString::new(app_secret.expose_secret().to_string().into_boxed_str()),
        }))
    }

    /// 로그인 코드를 openid로 교환합니다.
    pub async fn code_to_openid(&self, code: &str) -> Result<String, WxError> {
        let response = self
            .client
            .get(&self.login_url)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.expose_secret()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, "WeChat code exchange rejected");
            return Err(WxError::Rejected(status));
        }

        // 위챗은 text/plain으로 응답하기도 하므로 직접 파싱
        let body = response.text().await?;
        let session: SessionResponse = serde_json::from_str(&body)?;

        if let Some(errcode) = session.errcode.filter(|code| *code != 0) {
            warn!(
                errcode = errcode,
                errmsg = session.errmsg.as_deref().unwrap_or(""),
                "WeChat openid lookup failed"
            );
            return Err(WxError::LookupFailed(errcode));
        }

        let openid = session.openid.ok_or(WxError::MissingOpenid)?;
        debug!("WeChat code exchanged for openid");
        Ok(openid)
    }
}
