use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::rsa::Rsa;
use serde_json::json;

pub const KEY_BITS: u32 = 4096;

/// Object key of the OpenID discovery document inside the issuer bucket
pub const DISCOVERY_DOCUMENT_KEY: &str = ".well-known/openid-configuration";
/// Object key of the JSON web key set inside the issuer bucket
pub const JWKS_KEY: &str = "keys.json";

/// Signing key for an unmanaged issuer
pub struct KeyPair {
    pub private_key_pem: String,
    pub key_id: String,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl KeyPair {
    pub fn generate(bits: u32) -> Result<Self> {
        let rsa = Rsa::generate(bits)?;
        let private_key_pem = String::from_utf8(rsa.private_key_to_pem()?)?;
        let key_id = URL_SAFE_NO_PAD.encode(openssl::sha::sha256(&rsa.public_key_to_der()?));
        Ok(Self {
            private_key_pem,
            key_id,
            modulus: rsa.n().to_vec(),
            exponent: rsa.e().to_vec(),
        })
    }

    pub fn jwks(&self) -> serde_json::Value {
        json!({
            "keys": [{
                "use": "sig",
                "kty": "RSA",
                "kid": self.key_id,
                "alg": "RS256",
                "n": URL_SAFE_NO_PAD.encode(&self.modulus),
                "e": URL_SAFE_NO_PAD.encode(&self.exponent),
            }]
        })
    }
}

/// The two public documents an OIDC issuer serves
#[derive(Clone, Debug, PartialEq)]
pub struct IssuerDocuments {
    pub discovery: serde_json::Value,
    pub jwks: serde_json::Value,
}

impl IssuerDocuments {
    pub fn new(issuer_url: &str, keys: &KeyPair) -> Self {
        let issuer_url = issuer_url.trim_end_matches('/');
        Self {
            discovery: json!({
                "issuer": issuer_url,
                "jwks_uri": format!("{}/{}", issuer_url, JWKS_KEY),
                "response_types_supported": ["id_token"],
                "subject_types_supported": ["public"],
                "id_token_signing_alg_values_supported": ["RS256"],
                "claims_supported": ["aud", "exp", "sub", "iat", "iss", "sub"],
            }),
            jwks: keys.jwks(),
        }
    }

    /// Bucket objects as (key, body) pairs
    pub fn objects(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (DISCOVERY_DOCUMENT_KEY, serde_json::to_string_pretty(&self.discovery)?),
            (JWKS_KEY, serde_json::to_string_pretty(&self.jwks)?),
        ])
    }
}
