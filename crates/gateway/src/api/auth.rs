//! Caller identification.
//!
//! Credential storage lives outside the gateway.  A logged-in user presents
//! `Authorization: Bearer <user_id>.<hex hmac>`, where the HMAC-SHA256 is
//! computed over the user id with the key from the env var named by
//! `auth.secret_env`.  Anything else (no header, bad signature, no key
//! configured) is an anonymous caller identified by network address.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use tp_limits::Caller;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Used when no address information is available at all.
pub const UNKNOWN_CLIENT: &str = "unknown";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User tokens
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Signs and verifies user bearer tokens.
pub struct UserTokenSigner {
    /// Keyed once; every signature starts from a clone.
    mac: HmacSha256,
}

impl UserTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            // infallible: HMAC takes keys of any length
            mac: HmacSha256::new_from_slice(secret.as_ref()).expect("HMAC accepts any key length"),
        }
    }

    /// Mint a token for `user_id`.
    pub fn issue(&self, user_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        format!("{user_id}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Return the user id carried by a valid token.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (user_id, sig_hex) = token.rsplit_once('.')?;
        if user_id.is_empty() {
            return None;
        }
        let sig = hex::decode(sig_hex).ok()?;
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        // verify_slice compares in constant time.
        mac.verify_slice(&sig).ok()?;
        Some(user_id.to_owned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// First `X-Forwarded-For` address, else `X-Real-IP`, else the peer
/// address, else `"unknown"`.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_owned();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_owned();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the caller from request headers.
pub fn resolve_caller(state: &AppState, headers: &HeaderMap, peer: Option<SocketAddr>) -> Caller {
    let verified = state
        .user_tokens
        .as_ref()
        .zip(bearer(headers))
        .and_then(|(signer, token)| signer.verify(token));

    match verified {
        Some(user_id) => Caller::user(user_id),
        None => Caller::anonymous(client_identity(headers, peer)),
    }
}

/// Axum extractor yielding the resolved [`Caller`].  Never rejects: a bad
/// token simply makes the caller anonymous.
pub struct CallerIdentity(pub Caller);

impl CallerIdentity {
    /// Key of the caller's conversation in the registry.
    ///
    /// Authenticated users own one conversation.  Anonymous callers are
    /// keyed by address, optionally split further by a client-chosen label.
    pub fn conversation_key(&self, label: Option<&str>) -> String {
        match &self.0 {
            Caller::Authenticated { user_id } => user_id.clone(),
            Caller::Anonymous { client_id } => match label.map(str::trim) {
                Some(label) if !label.is_empty() => format!("anon:{client_id}:{label}"),
                _ => format!("anon:{client_id}"),
            },
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(resolve_caller(state, &parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issued_tokens_verify() {
        let signer = UserTokenSigner::new("s3cret");
        let token = signer.issue("alice@example.com");
        assert_eq!(signer.verify(&token).as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn signer_is_reusable_with_any_key_length() {
        for key in ["".to_owned(), "k".to_owned(), "x".repeat(300)] {
            let signer = UserTokenSigner::new(&key);
            let first = signer.issue("bob");
            assert_eq!(signer.issue("bob"), first);
            assert_eq!(signer.verify(&first).as_deref(), Some("bob"));
            assert!(signer.verify(&signer.issue("carol")).is_some());
        }
    }

    #[test]
    fn tampered_or_foreign_tokens_fail() {
        let signer = UserTokenSigner::new("s3cret");
        let token = signer.issue("alice");
        let forged = token.replacen("alice", "mallory", 1);
        assert!(signer.verify(&forged).is_none());
        assert!(UserTokenSigner::new("other").verify(&token).is_none());
        assert!(signer.verify("alice").is_none());
        assert!(signer.verify("alice.nothex").is_none());
        assert!(signer.verify(".abcd").is_none());
    }

    #[test]
    fn forwarded_for_wins() {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        h.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identity(&h, None), "1.2.3.4");
    }

    #[test]
    fn falls_back_through_real_ip_peer_and_unknown() {
        let mut h = HeaderMap::new();
        h.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identity(&h, None), "9.9.9.9");

        let peer: SocketAddr = "5.6.7.8:4242".parse().unwrap();
        assert_eq!(client_identity(&HeaderMap::new(), Some(peer)), "5.6.7.8");
        assert_eq!(client_identity(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn conversation_keys() {
        let user = CallerIdentity(Caller::user("alice"));
        assert_eq!(user.conversation_key(Some("tab-1")), "alice");

        let anon = CallerIdentity(Caller::anonymous("1.2.3.4"));
        assert_eq!(anon.conversation_key(None), "anon:1.2.3.4");
        assert_eq!(anon.conversation_key(Some(" ")), "anon:1.2.3.4");
        assert_eq!(anon.conversation_key(Some("tab-1")), "anon:1.2.3.4:tab-1");
    }
}
