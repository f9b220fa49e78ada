//! 平台访问令牌签名
//!
//! 令牌为 EdDSA 签名的 JWT，`sig` 声明是 `method + path + body` 的 SHA-256，
//! 平台据此校验令牌只用于这一次请求。

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::repository::RequestSigner;
use crate::error::DeliveryError;

/// Ed25519 私钥的 PKCS#8 v1 DER 前缀，后接 32 字节种子
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// JWT 声明
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationClaims {
    pub uid: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub sig: String,
    pub scp: String,
}

/// 基于会话私钥的请求签名器
pub struct PlatformTokenSigner {
    client_id: String,
    session_id: String,
    key: EncodingKey,
    ttl_secs: i64,
}

impl PlatformTokenSigner {
    /// `session_key` 为 base64 编码的 Ed25519 私钥（32 字节种子或 64 字节种子+公钥）
    pub fn new(
        client_id: impl Into<String>,
        session_id: impl Into<String>,
        session_key: &str,
    ) -> Result<Self, DeliveryError> {
        let seed = decode_ed25519_seed(session_key)?;
        let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + seed.len());
        der.extend_from_slice(&ED25519_PKCS8_PREFIX);
        der.extend_from_slice(&seed);

        Ok(Self {
            client_id: client_id.into(),
            session_id: session_id.into(),
            key: EncodingKey::from_ed_der(&der),
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        })
    }

    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// 构建声明，签名前可单独使用
    pub fn claims(&self, method: &str, path: &str, body: &[u8]) -> AuthenticationClaims {
        let iat = Utc::now().timestamp();
        AuthenticationClaims {
            uid: self.client_id.clone(),
            sid: self.session_id.clone(),
            iat,
            exp: iat + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
            sig: request_signature(method, path, body),
            scp: "FULL".to_string(),
        }
    }
}

impl RequestSigner for PlatformTokenSigner {
    fn sign(&self, method: &str, path: &str, body: &[u8]) -> Result<String, DeliveryError> {
        let claims = self.claims(method, path, body);
        jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &self.key)
            .map_err(|err| DeliveryError::Signing(err.to_string()))
    }
}

/// 计算请求摘要：hex(sha256(method + path + body))
pub fn request_signature(method: &str, path: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}

fn decode_ed25519_seed(session_key: &str) -> Result<[u8; 32], DeliveryError> {
    let trimmed = session_key.trim();
    let raw = [URL_SAFE_NO_PAD, URL_SAFE, STANDARD, STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(trimmed).ok())
        .ok_or_else(|| DeliveryError::Signing("session key is not valid base64".to_string()))?;

    match raw.len() {
        32 | 64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&raw[..32]);
            Ok(seed)
        }
        len => Err(DeliveryError::Signing(format!(
            "session key must be 32 or 64 bytes, got {len}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> String {
        URL_SAFE_NO_PAD.encode([7u8; 32])
    }

    #[test]
    fn signature_is_sha256_of_method_path_body() {
        let sig = request_signature("POST", "/messages", b"[]");
        let expected = hex::encode(Sha256::digest(b"POST/messages[]"));
        assert_eq!(sig, expected);
    }

    #[test]
    fn accepts_seed_and_full_keypair_encodings() {
        assert!(PlatformTokenSigner::new("bot", "session", &sample_key()).is_ok());
        assert!(PlatformTokenSigner::new("bot", "session", &STANDARD.encode([9u8; 64])).is_ok());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(PlatformTokenSigner::new("bot", "session", "not base64 !!").is_err());
        assert!(PlatformTokenSigner::new("bot", "session", &STANDARD.encode([1u8; 10])).is_err());
    }

    #[test]
    fn claims_carry_identity_and_request_digest() {
        let signer = PlatformTokenSigner::new("bot", "session", &sample_key())
            .unwrap()
            .with_ttl_secs(60);
        let claims = signer.claims("POST", "/messages", b"[]");
        assert_eq!(claims.uid, "bot");
        assert_eq!(claims.sid, "session");
        assert_eq!(claims.exp - claims.iat, 60);
        assert_eq!(claims.scp, "FULL");
        assert_eq!(claims.sig, request_signature("POST", "/messages", b"[]"));
    }

    #[test]
    fn signed_token_is_three_part_jwt_with_claims() {
        let signer = PlatformTokenSigner::new("bot", "session", &sample_key()).unwrap();
        let token = signer.sign("POST", "/messages", b"[]").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let claims: AuthenticationClaims = serde_json::from_slice(&payload).unwrap();
        assert_eq!(claims.uid, "bot");
        assert_eq!(claims.sig, request_signature("POST", "/messages", b"[]"));
    }
}
