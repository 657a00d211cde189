//! RSA 签名与验签
//!
//! `RSA2` 使用 SHA256WithRSA, `RSA` 使用 SHA1WithRSA, 填充方式均为 PKCS#1 v1.5.
//! 签名结果以标准 base64 编码.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use openssl::{
    base64,
    hash::MessageDigest,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
    sign::{Signer, Verifier},
    x509::X509,
};
use serde::{Deserialize, Serialize};

use crate::{PayError, PayResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignType {
    /// SHA1WithRSA
    #[serde(rename = "RSA")]
    Rsa,
    /// SHA256WithRSA
    #[default]
    #[serde(rename = "RSA2")]
    Rsa2,
}

impl SignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignType::Rsa => "RSA",
            SignType::Rsa2 => "RSA2",
        }
    }

    fn digest(&self) -> MessageDigest {
        match self {
            SignType::Rsa => MessageDigest::sha1(),
            SignType::Rsa2 => MessageDigest::sha256(),
        }
    }
}

impl Display for SignType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignType {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "RSA" => Ok(SignType::Rsa),
            "RSA2" => Ok(SignType::Rsa2),
            other => Err(PayError::InvalidConfig(format!("unsupported sign_type: {other}"))),
        }
    }
}

/// 应用私钥
#[derive(Clone)]
pub struct PrivateKey(PKey<Private>);

/// 支付宝公钥
#[derive(Clone)]
pub struct PublicKey(PKey<Public>);

impl PrivateKey {
    /// 解析私钥, 支持 PEM (PKCS#1 / PKCS#8)、不带头尾的 base64 主体以及 `.pem` 文件路径
    pub fn parse(content: &str) -> PayResult<Self> {
        let content = load(content, "private key")?;

        let key = if content.contains("-----BEGIN") {
            PKey::private_key_from_pem(content.as_bytes())
                .map_err(|e| PayError::InvalidKey(format!("private key: {e}")))?
        } else {
            wrap_candidates(&content, &["RSA PRIVATE KEY", "PRIVATE KEY"], "private key")?
                .iter()
                .find_map(|pem| PKey::private_key_from_pem(pem.as_bytes()).ok())
                .ok_or_else(|| PayError::InvalidKey("private key: not a PKCS#1 or PKCS#8 RSA key".into()))?
        };

        ensure_rsa(key.id(), "private key")?;

        Ok(PrivateKey(key))
    }
}

impl PublicKey {
    /// 解析公钥, 支持 SPKI / PKCS#1 PEM、X.509 证书、不带头尾的 base64 主体以及 `.pem` 文件路径
    pub fn parse(content: &str) -> PayResult<Self> {
        let content = load(content, "public key")?;
        let invalid = |e: openssl::error::ErrorStack| PayError::InvalidKey(format!("public key: {e}"));

        let key = if content.contains("-----BEGIN CERTIFICATE-----") {
            X509::from_pem(content.as_bytes())
                .and_then(|cert| cert.public_key())
                .map_err(invalid)?
        } else if content.contains("-----BEGIN RSA PUBLIC KEY-----") {
            Rsa::public_key_from_pem_pkcs1(content.as_bytes())
                .and_then(PKey::from_rsa)
                .map_err(invalid)?
        } else if content.contains("-----BEGIN") {
            PKey::public_key_from_pem(content.as_bytes()).map_err(invalid)?
        } else {
            let candidates = wrap_candidates(&content, &["PUBLIC KEY", "RSA PUBLIC KEY"], "public key")?;
            let spki = PKey::public_key_from_pem(candidates[0].as_bytes()).ok();

            match spki {
                Some(key) => key,
                None => Rsa::public_key_from_pem_pkcs1(candidates[1].as_bytes())
                    .and_then(PKey::from_rsa)
                    .map_err(invalid)?,
            }
        };

        ensure_rsa(key.id(), "public key")?;

        Ok(PublicKey(key))
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey(RSA {} bits)", self.0.bits())
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey(RSA {} bits)", self.0.bits())
    }
}

/// 对待签名内容签名, 返回 base64 编码的签名
pub fn sign(content: &[u8], key: &PrivateKey, sign_type: SignType) -> PayResult<String> {
    let mut signer = Signer::new(sign_type.digest(), &key.0)?;
    signer.update(content)?;

    Ok(base64::encode_block(signer.sign_to_vec()?.as_ref()))
}

/// 验签. 签名不匹配时返回 `Ok(false)`, 签名不是合法 base64 时返回错误.
pub fn verify(content: &[u8], signature: &str, key: &PublicKey, sign_type: SignType) -> PayResult<bool> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(PayError::MalformedSignature("signature is empty".into()));
    }

    let signature = base64::decode_block(signature)
        .map_err(|e| PayError::MalformedSignature(e.to_string()))?;

    // a PKCS#1 v1.5 signature is exactly as long as the modulus
    if signature.len() != key.0.size() {
        return Ok(false);
    }

    let mut verifier = Verifier::new(sign_type.digest(), &key.0)?;
    verifier.update(content)?;

    Ok(verifier.verify(signature.as_slice())?)
}

/// 去掉空白, 以 `.pem` 结尾的视为文件路径
pub(crate) fn load(content: &str, what: &str) -> PayResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(PayError::InvalidKey(format!("{what} is empty")));
    }

    if content.ends_with(".pem") && !content.contains("-----BEGIN") {
        return std::fs::read_to_string(content)
            .map(|s| s.trim().to_string())
            .map_err(|e| PayError::InvalidKey(format!("{what} file {content}: {e}")));
    }

    Ok(content.to_string())
}

/// 将 base64 主体按 64 列折行并加上各种 PEM 头尾.
/// 主体必须是合法的 base64, 能否作为密钥由后续解析决定.
fn wrap_candidates(body: &str, labels: &[&str], what: &str) -> PayResult<Vec<String>> {
    let body = body.split_whitespace().collect::<String>();
    let is_base64 = body
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=');
    if !is_base64 || base64::decode_block(&body).is_err() {
        return Err(PayError::InvalidKey(format!("{what} is neither PEM nor base64")));
    }

    let lines = body
        .as_bytes()
        .chunks(64)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(labels
        .iter()
        .map(|label| format!("-----BEGIN {label}-----\n{lines}\n-----END {label}-----\n"))
        .collect())
}

fn ensure_rsa(id: Id, what: &str) -> PayResult<()> {
    if id != Id::RSA {
        return Err(PayError::InvalidKey(format!("{what} is not an RSA key")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use openssl::rsa::Rsa;

    use super::*;
    use crate::testing::{bare, key_pair, key_pair_pem};

    const CONTENT: &[u8] = b"app_id=2021000000000000&method=alipay.trade.query";

    #[test]
    fn sign_then_verify() {
        let (private, public) = key_pair();

        for sign_type in [SignType::Rsa, SignType::Rsa2] {
            let signature = sign(CONTENT, &private, sign_type).unwrap();
            assert!(verify(CONTENT, &signature, &public, sign_type).unwrap());
        }
    }

    #[test]
    fn tampered_content_fails() {
        let (private, public) = key_pair();
        let signature = sign(CONTENT, &private, SignType::Rsa2).unwrap();

        for i in 0..CONTENT.len() {
            let mut tampered = CONTENT.to_vec();
            tampered[i] ^= 0x01;
            assert!(!verify(&tampered, &signature, &public, SignType::Rsa2).unwrap());
        }
    }

    #[test]
    fn tampered_signature_fails() {
        let (private, public) = key_pair();
        let raw = base64::decode_block(&sign(CONTENT, &private, SignType::Rsa2).unwrap()).unwrap();

        for i in [0, 1, raw.len() / 2, raw.len() - 1] {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x80;
            let tampered = base64::encode_block(&tampered);
            assert!(!verify(CONTENT, &tampered, &public, SignType::Rsa2).unwrap());
        }
    }

    #[test]
    fn cross_wired_algorithm_fails() {
        let (private, public) = key_pair();

        let rsa = sign(CONTENT, &private, SignType::Rsa).unwrap();
        let rsa2 = sign(CONTENT, &private, SignType::Rsa2).unwrap();

        assert!(!verify(CONTENT, &rsa, &public, SignType::Rsa2).unwrap());
        assert!(!verify(CONTENT, &rsa2, &public, SignType::Rsa).unwrap());
    }

    #[test]
    fn other_key_fails() {
        let (private, _) = key_pair();
        let (_, other_public) = key_pair();

        let signature = sign(CONTENT, &private, SignType::Rsa2).unwrap();
        assert!(!verify(CONTENT, &signature, &other_public, SignType::Rsa2).unwrap());
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let (_, public) = key_pair();

        assert!(matches!(
            verify(CONTENT, "not base64 !!", &public, SignType::Rsa2),
            Err(PayError::MalformedSignature(_))
        ));
        assert!(matches!(
            verify(CONTENT, "", &public, SignType::Rsa2),
            Err(PayError::MalformedSignature(_))
        ));
    }

    #[test]
    fn short_signature_is_a_mismatch() {
        let (_, public) = key_pair();

        assert!(!verify(CONTENT, "AAAA", &public, SignType::Rsa2).unwrap());

        // right length, but not a PKCS#1 block for this key
        let garbage = base64::encode_block(&[0x01u8; 256]);
        assert!(!verify(CONTENT, &garbage, &public, SignType::Rsa2).unwrap());
    }

    #[test]
    fn bare_keys_are_wrapped() {
        let (private_pem, public_pem) = key_pair_pem();

        let private = PrivateKey::parse(&bare(&private_pem)).unwrap();
        let public = PublicKey::parse(&bare(&public_pem)).unwrap();

        let signature = sign(CONTENT, &private, SignType::Rsa2).unwrap();
        assert!(verify(CONTENT, &signature, &public, SignType::Rsa2).unwrap());
    }

    #[test]
    fn pkcs8_and_pkcs1_keys() {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa.clone()).unwrap();

        let pkcs8 = String::from_utf8(pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();
        let pkcs1_public = String::from_utf8(rsa.public_key_to_pem_pkcs1().unwrap()).unwrap();

        let private = PrivateKey::parse(&pkcs8).unwrap();
        let bare_private = PrivateKey::parse(&bare(&pkcs8)).unwrap();
        let public = PublicKey::parse(&pkcs1_public).unwrap();
        let bare_public = PublicKey::parse(&bare(&pkcs1_public)).unwrap();

        let signature = sign(CONTENT, &private, SignType::Rsa2).unwrap();
        assert!(verify(CONTENT, &signature, &public, SignType::Rsa2).unwrap());

        let signature = sign(CONTENT, &bare_private, SignType::Rsa).unwrap();
        assert!(verify(CONTENT, &signature, &bare_public, SignType::Rsa).unwrap());
    }

    #[test]
    fn rejects_garbage_keys() {
        for content in ["", "   ", "MIIEpQIBAAKCAQEA", "not a key at all", "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----"] {
            assert!(matches!(PrivateKey::parse(content), Err(PayError::InvalidKey(_))), "{content}");
            assert!(matches!(PublicKey::parse(content), Err(PayError::InvalidKey(_))), "{content}");
        }
    }

    #[test]
    fn missing_key_file() {
        assert!(matches!(
            PrivateKey::parse("/nonexistent/app_private_key.pem"),
            Err(PayError::InvalidKey(_))
        ));
    }

    #[test]
    fn key_file() {
        let (private_pem, _) = key_pair_pem();
        let path = std::env::temp_dir().join(format!("pay-sign-test-{}.pem", std::process::id()));
        std::fs::write(&path, private_pem).unwrap();

        assert!(PrivateKey::parse(path.to_str().unwrap()).is_ok());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn sign_type_names() {
        assert_eq!("RSA".parse::<SignType>().unwrap(), SignType::Rsa);
        assert_eq!("RSA2".parse::<SignType>().unwrap(), SignType::Rsa2);
        assert!("MD5".parse::<SignType>().is_err());
        assert_eq!(SignType::default().as_str(), "RSA2");
    }
}
