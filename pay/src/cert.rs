//! 公钥证书模式
//!
//! 请求中需要携带应用公钥证书 SN (`app_cert_sn`) 与支付宝根证书 SN
//! (`alipay_root_cert_sn`). 证书 SN 为 `签发者DN + 十进制序列号` 的 MD5 小写十六进制.

use openssl::{
    hash::{hash, MessageDigest},
    nid::Nid,
    x509::{X509NameEntries, X509},
};

use crate::{PayError, PayResult};

pub struct CertX509;

impl CertX509 {
    /// 单个证书的 SN
    pub fn cert_sn(cert_content: &str) -> PayResult<String> {
        let cert = X509::from_pem(cert_content.as_bytes())
            .map_err(|e| PayError::InvalidConfig(format!("app cert: {e}")))?;

        Self::sn(&cert)
    }

    /// 根证书链中所有 RSA 签名证书的 SN, 以 `_` 连接
    pub fn root_cert_sn(root_cert_content: &str) -> PayResult<String> {
        let certs = X509::stack_from_pem(root_cert_content.as_bytes())
            .map_err(|e| PayError::InvalidConfig(format!("alipay root cert: {e}")))?;

        let sns = certs
            .iter()
            .filter(|cert| {
                let algorithm = cert.signature_algorithm().object().nid();

                algorithm == Nid::SHA256WITHRSAENCRYPTION || algorithm == Nid::SHA1WITHRSAENCRYPTION
            })
            .map(Self::sn)
            .collect::<PayResult<Vec<String>>>()?;

        if sns.is_empty() {
            return Err(PayError::InvalidConfig(
                "alipay root cert: no RSA signed certificate found".into(),
            ));
        }

        Ok(sns.join("_"))
    }

    fn sn(cert: &X509) -> PayResult<String> {
        let issuer = Self::issuer(cert.issuer_name().entries())?;
        let serial_number = cert.serial_number().to_bn()?.to_dec_str()?;

        Ok(hex::encode(hash(
            MessageDigest::md5(),
            (issuer + &serial_number).as_bytes(),
        )?))
    }

    /// 签发者 DN, 逆序拼接为 `CN=..,OU=..,O=..,C=..`
    fn issuer(entries: X509NameEntries<'_>) -> PayResult<String> {
        let mut parts = Vec::new();
        for entry in entries {
            let key = entry.object().nid().short_name()?;
            let val = entry.data().as_utf8()?;

            parts.push(format!("{key}={val}"));
        }
        parts.reverse();

        Ok(parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use openssl::asn1::{Asn1Integer, Asn1Time};
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::{X509Builder, X509NameBuilder};

    use super::*;

    fn self_signed(key: &PKey<Private>, serial: u32, digest: MessageDigest) -> String {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "CN").unwrap();
        name.append_entry_by_text("O", "Ant Financial").unwrap();
        name.append_entry_by_text("CN", "Test Root").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = Asn1Integer::from_bn(&BigNum::from_u32(serial).unwrap()).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
        builder.sign(key, digest).unwrap();

        String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
    }

    fn rsa_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn expected_sn(serial: &str) -> String {
        let content = format!("CN=Test Root,O=Ant Financial,C=CN{serial}");
        hex::encode(hash(MessageDigest::md5(), content.as_bytes()).unwrap())
    }

    #[test]
    fn cert_sn() {
        let cert = self_signed(&rsa_key(), 20240101, MessageDigest::sha256());

        assert_eq!(CertX509::cert_sn(&cert).unwrap(), expected_sn("20240101"));
    }

    #[test]
    fn root_cert_sn_skips_non_rsa() {
        let ec = EcKey::generate(&EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap()).unwrap();
        let ec = PKey::from_ec_key(ec).unwrap();

        let chain = [
            self_signed(&rsa_key(), 1, MessageDigest::sha1()),
            self_signed(&ec, 2, MessageDigest::sha256()),
            self_signed(&rsa_key(), 3, MessageDigest::sha256()),
        ]
        .concat();

        assert_eq!(
            CertX509::root_cert_sn(&chain).unwrap(),
            format!("{}_{}", expected_sn("1"), expected_sn("3"))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(CertX509::cert_sn("nope"), Err(PayError::InvalidConfig(_))));
        assert!(CertX509::root_cert_sn("nope").is_err());
    }
}
