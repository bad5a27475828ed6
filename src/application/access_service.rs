// Access service - SMS one-time-code login in front of the live dashboard
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SendCodeReply {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VerifyCodeReply {
    #[serde(default)]
    pub status: String,
    #[serde(alias = "redirectPath")]
    pub redirect: Option<String>,
    pub message: Option<String>,
}

#[async_trait]
pub trait AccessGateway: Send + Sync {
    async fn send_code(&self, phone_number: &str) -> anyhow::Result<SendCodeReply>;

    async fn verify_code(&self, phone_number: &str, code: &str) -> anyhow::Result<VerifyCodeReply>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccessOutcome {
    CodeSent,
    Allowed { redirect: String },
}

/// Rejections are kept apart from transport failures so callers can show
/// them differently.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("use international format, e.g. +447471256650")]
    InvalidPhone,
    #[error("code must not be empty")]
    EmptyCode,
    #[error("{0}")]
    Rejected(String),
    #[error("access service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct AccessService {
    gateway: Arc<dyn AccessGateway>,
}

impl AccessService {
    pub fn new(gateway: Arc<dyn AccessGateway>) -> Self {
        Self { gateway }
    }

    pub async fn send_code(&self, phone_number: &str) -> Result<AccessOutcome, AccessError> {
        let phone = phone_number.trim();
        if !is_e164(phone) {
            return Err(AccessError::InvalidPhone);
        }

        let reply = self
            .gateway
            .send_code(phone)
            .await
            .map_err(AccessError::Unavailable)?;

        if reply.success {
            tracing::info!("Verification code sent");
            Ok(AccessOutcome::CodeSent)
        } else {
            Err(AccessError::Rejected(
                reply.message.unwrap_or_else(|| "could not send the code".to_string()),
            ))
        }
    }

    pub async fn verify_code(&self, phone_number: &str, code: &str) -> Result<AccessOutcome, AccessError> {
        let phone = phone_number.trim();
        let code = code.trim();
        if !is_e164(phone) {
            return Err(AccessError::InvalidPhone);
        }
        if code.is_empty() {
            return Err(AccessError::EmptyCode);
        }

        let reply = self
            .gateway
            .verify_code(phone, code)
            .await
            .map_err(AccessError::Unavailable)?;

        match (reply.status.as_str(), reply.redirect) {
            ("allowed", Some(redirect)) => Ok(AccessOutcome::Allowed { redirect }),
            ("denied", _) => Err(AccessError::Rejected(
                reply.message.unwrap_or_else(|| "access denied".to_string()),
            )),
            _ => Err(AccessError::Rejected(
                reply
                    .message
                    .unwrap_or_else(|| "wrong or expired code".to_string()),
            )),
        }
    }
}

/// `+` followed by 8 to 15 digits.
pub fn is_e164(phone: &str) -> bool {
    phone
        .strip_prefix('+')
        .map(|digits| (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGateway {
        send: Mutex<Option<SendCodeReply>>,
        verify: Mutex<Option<VerifyCodeReply>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AccessGateway for FakeGateway {
        async fn send_code(&self, phone_number: &str) -> anyhow::Result<SendCodeReply> {
            self.calls.lock().unwrap().push(format!("send {}", phone_number));
            self.send
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }

        async fn verify_code(&self, phone_number: &str, code: &str) -> anyhow::Result<VerifyCodeReply> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("verify {} {}", phone_number, code));
            self.verify
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn service(gateway: FakeGateway) -> (AccessService, Arc<FakeGateway>) {
        let gateway = Arc::new(gateway);
        (AccessService::new(gateway.clone()), gateway)
    }

    #[test]
    fn test_is_e164() {
        assert!(is_e164("+447471256650"));
        assert!(is_e164("+12345678"));
        assert!(!is_e164("447471256650"));
        assert!(!is_e164("+1234567"));
        assert!(!is_e164("+1234567890123456"));
        assert!(!is_e164("+44 7471 256650"));
    }

    #[tokio::test]
    async fn test_invalid_phone_never_reaches_gateway() {
        let (service, gateway) = service(FakeGateway::default());
        let err = service.send_code("07471256650").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidPhone));
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_code_trims_and_succeeds() {
        let (service, gateway) = service(FakeGateway {
            send: Mutex::new(Some(SendCodeReply {
                success: true,
                message: None,
            })),
            ..Default::default()
        });
        let outcome = service.send_code("  +447471256650 ").await.unwrap();
        assert_eq!(outcome, AccessOutcome::CodeSent);
        assert_eq!(gateway.calls.lock().unwrap()[0], "send +447471256650");
    }

    #[tokio::test]
    async fn test_verify_outcomes() {
        let (svc, _) = service(FakeGateway {
            verify: Mutex::new(Some(VerifyCodeReply {
                status: "allowed".to_string(),
                redirect: Some("/dashboard/cliente_1".to_string()),
                message: None,
            })),
            ..Default::default()
        });
        assert_eq!(
            svc.verify_code("+447471256650", " 123456 ").await.unwrap(),
            AccessOutcome::Allowed {
                redirect: "/dashboard/cliente_1".to_string()
            }
        );

        let (svc, _) = service(FakeGateway {
            verify: Mutex::new(Some(VerifyCodeReply {
                status: "denied".to_string(),
                redirect: None,
                message: None,
            })),
            ..Default::default()
        });
        let err = svc.verify_code("+447471256650", "1").await.unwrap_err();
        assert!(matches!(err, AccessError::Rejected(ref m) if m == "access denied"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_distinct_from_rejection() {
        let (service, _) = service(FakeGateway::default());
        let err = service.verify_code("+447471256650", "1").await.unwrap_err();
        assert!(matches!(err, AccessError::Unavailable(_)));

        let err = service.verify_code("+447471256650", "   ").await.unwrap_err();
        assert!(matches!(err, AccessError::EmptyCode));
    }

    #[test]
    fn test_verify_reply_accepts_redirect_path() {
        let reply: VerifyCodeReply =
            serde_json::from_str(r#"{"status":"allowed","redirectPath":"/dashboard/x"}"#).unwrap();
        assert_eq!(reply.redirect.as_deref(), Some("/dashboard/x"));
    }
}
