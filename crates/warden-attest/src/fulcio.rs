//! Issuer extraction from Fulcio signing certificates.
//!
//! Fulcio records the OIDC issuer that authenticated the signer in a custom
//! X.509 extension. Two encodings exist:
//!
//! - `1.3.6.1.4.1.57264.1.8`: DER `UTF8String` (current)
//! - `1.3.6.1.4.1.57264.1.1`: raw UTF-8 bytes (deprecated, still issued)
//!
//! The current OID is preferred when both are present.

use base64::Engine;
use der::asn1::{ObjectIdentifier, Utf8StringRef};
use der::Decode;
use x509_cert::ext::Extension;
use x509_cert::Certificate;

/// OIDC issuer, DER `UTF8String` encoding.
pub const OIDC_ISSUER_V2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.8");

/// OIDC issuer, raw-bytes encoding.
pub const OIDC_ISSUER_V1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");

/// Decode the first PEM block in `pem` to DER bytes.
///
/// Returns `None` if there is no `BEGIN` marker or the body is not base64.
pub fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let mut b64 = String::new();
    let mut in_body = false;

    for line in pem.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----BEGIN ") {
            in_body = true;
            continue;
        }
        if trimmed.starts_with("-----END ") {
            break;
        }
        if in_body {
            b64.push_str(trimmed);
        }
    }

    if !in_body || b64.is_empty() {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(&b64).ok()
}

/// OIDC issuer of the leaf certificate in a PEM chain.
pub fn issuer_from_pem(pem: &str) -> Option<String> {
    let der = pem_to_der(pem)?;
    let cert = Certificate::from_der(&der)
        .map_err(|e| tracing::debug!(error = %e, "failed to parse signing certificate"))
        .ok()?;
    issuer_from_extensions(cert.tbs_certificate.extensions.as_deref().unwrap_or_default())
}

/// OIDC issuer from a certificate's extension list.
pub fn issuer_from_extensions(extensions: &[Extension]) -> Option<String> {
    let find = |oid: ObjectIdentifier| extensions.iter().find(|ext| ext.extn_id == oid);

    if let Some(ext) = find(OIDC_ISSUER_V2) {
        if let Ok(value) = Utf8StringRef::from_der(ext.extn_value.as_bytes()) {
            return Some(value.as_str().to_string());
        }
    }
    find(OIDC_ISSUER_V1)
        .and_then(|ext| std::str::from_utf8(ext.extn_value.as_bytes()).ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::asn1::OctetString;
    use der::Encode;

    fn extension(oid: ObjectIdentifier, value: Vec<u8>) -> Extension {
        Extension {
            extn_id: oid,
            critical: false,
            extn_value: OctetString::new(value).unwrap(),
        }
    }

    fn utf8_der(s: &str) -> Vec<u8> {
        Utf8StringRef::new(s).unwrap().to_der().unwrap()
    }

    #[test]
    fn reads_current_issuer_extension() {
        let exts = vec![extension(
            OIDC_ISSUER_V2,
            utf8_der("https://token.actions.githubusercontent.com"),
        )];
        assert_eq!(
            issuer_from_extensions(&exts).as_deref(),
            Some("https://token.actions.githubusercontent.com")
        );
    }

    #[test]
    fn falls_back_to_deprecated_extension() {
        let exts = vec![extension(
            OIDC_ISSUER_V1,
            b"https://accounts.google.com".to_vec(),
        )];
        assert_eq!(
            issuer_from_extensions(&exts).as_deref(),
            Some("https://accounts.google.com")
        );
    }

    #[test]
    fn current_extension_wins_over_deprecated() {
        let exts = vec![
            extension(OIDC_ISSUER_V1, b"https://old.example".to_vec()),
            extension(OIDC_ISSUER_V2, utf8_der("https://new.example")),
        ];
        assert_eq!(
            issuer_from_extensions(&exts).as_deref(),
            Some("https://new.example")
        );
    }

    #[test]
    fn no_issuer_extension_yields_none() {
        assert_eq!(issuer_from_extensions(&[]), None);
    }

    #[test]
    fn pem_to_der_decodes_body() {
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----\n";
        assert_eq!(pem_to_der(pem).unwrap(), b"hello");
    }

    #[test]
    fn pem_without_markers_is_rejected() {
        assert!(pem_to_der("aGVsbG8=").is_none());
        assert!(issuer_from_pem("not a certificate").is_none());
    }

    #[test]
    fn garbage_certificate_yields_none() {
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----\n";
        assert!(issuer_from_pem(pem).is_none());
    }
}
