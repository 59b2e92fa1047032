//! SAML login flow.
//!
//! HTTP-Redirect binding for the AuthnRequest (deflate + base64) and an
//! assertion consumer for the HTTP-POST response. Trust rests on the pinned
//! IdP certificate: the certificate embedded in the response must match the
//! configured one byte-for-byte, the response must answer a pending request
//! id, and the assertion's audience and validity window are enforced.

use std::io::Write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use flate2::{Compression, write::DeflateEncoder};
use sea_orm::ConnectionTrait;
use url::Url;

use crate::config::AppConfig;
use crate::crypto;
use crate::error::{ApiError, internal_error, unauthenticated};
use crate::repositories::SsoStateRepository;
use crate::sso::FederatedLogin;

const PROVIDER: &str = "saml";

/// SAML service-provider client bound to one configured IdP.
pub struct SamlClient {
    entity_id: String,
    idp_sso_url: String,
    idp_certificate: String,
    group_attribute: String,
    acs_url: String,
}

impl SamlClient {
    /// Build a client when SAML login is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.saml_enabled() {
            return None;
        }
        Some(Self {
            entity_id: config.saml.entity_id.clone()?,
            idp_sso_url: config.saml.idp_sso_url.clone()?,
            idp_certificate: normalize_certificate(
                config.saml.idp_certificate.as_deref().unwrap_or(""),
            ),
            group_attribute: config.saml.group_attribute.clone(),
            acs_url: format!("{}/saml/acs", config.public_url),
        })
    }

    /// Service-provider metadata served to IdP administrators.
    pub fn metadata_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0"?>"#,
                r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity_id}">"#,
                r#"<md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">"#,
                r#"<md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{acs}" index="0"/>"#,
                r#"</md:SPSSODescriptor>"#,
                r#"</md:EntityDescriptor>"#
            ),
            entity_id = self.entity_id,
            acs = self.acs_url,
        )
    }

    /// Begin a login: persist the pending state and return the redirect URL
    /// carrying the deflated AuthnRequest.
    pub async fn begin_login<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ApiError> {
        let relay_state = crypto::generate_token();
        let request_id = format!("id-{}", crypto::generate_token());

        SsoStateRepository::create(
            conn,
            &relay_state,
            PROVIDER,
            None,
            None,
            Some(request_id.clone()),
        )
        .await?;

        let issue_instant = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let authn_request = format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
                r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
                r#"ID="{id}" Version="2.0" IssueInstant="{instant}" "#,
                r#"Destination="{destination}" "#,
                r#"ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" "#,
                r#"AssertionConsumerServiceURL="{acs}">"#,
                r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                r#"</samlp:AuthnRequest>"#
            ),
            id = request_id,
            instant = issue_instant,
            destination = self.idp_sso_url,
            acs = self.acs_url,
            issuer = self.entity_id,
        );

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(authn_request.as_bytes())
            .map_err(|e| internal_error(format!("AuthnRequest deflate failed: {e}")))?;
        let deflated = encoder
            .finish()
            .map_err(|e| internal_error(format!("AuthnRequest deflate failed: {e}")))?;

        let mut url = Url::parse(&self.idp_sso_url)
            .map_err(|e| internal_error(format!("bad IdP SSO URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("SAMLRequest", &BASE64.encode(&deflated))
            .append_pair("RelayState", &relay_state);

        Ok(url.to_string())
    }

    /// Consume a posted SAMLResponse.
    pub async fn handle_acs<C: ConnectionTrait>(
        &self,
        conn: &C,
        relay_state: &str,
        saml_response_b64: &str,
    ) -> Result<FederatedLogin, ApiError> {
        let Some(pending) = SsoStateRepository::consume(conn, relay_state, PROVIDER).await? else {
            return Err(unauthenticated(Some("unknown or expired login state")));
        };

        let xml_bytes = BASE64
            .decode(saml_response_b64.trim())
            .map_err(|_| unauthenticated(Some("SAMLResponse is not valid base64")))?;
        let xml = String::from_utf8(xml_bytes)
            .map_err(|_| unauthenticated(Some("SAMLResponse is not valid UTF-8")))?;

        self.parse_response(&xml, pending.request_id.as_deref())
    }

    fn parse_response(
        &self,
        xml: &str,
        expected_request_id: Option<&str>,
    ) -> Result<FederatedLogin, ApiError> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|_| unauthenticated(Some("SAMLResponse is not well-formed XML")))?;

        let status_ok = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "StatusCode")
            .filter_map(|n| n.attribute("Value"))
            .any(|v| v.ends_with(":Success"));
        if !status_ok {
            return Err(unauthenticated(Some("IdP reported login failure")));
        }

        let response = doc
            .descendants()
            .find(|n| n.tag_name().name() == "Response")
            .ok_or_else(|| unauthenticated(Some("SAMLResponse carries no Response element")))?;
        match (expected_request_id, response.attribute("InResponseTo")) {
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => return Err(unauthenticated(Some("InResponseTo mismatch"))),
        }

        let embedded_cert = doc
            .descendants()
            .find(|n| n.tag_name().name() == "X509Certificate")
            .and_then(|n| n.text())
            .map(normalize_certificate)
            .ok_or_else(|| unauthenticated(Some("response carries no signing certificate")))?;
        if self.idp_certificate.is_empty()
            || !crypto::constant_time_eq(embedded_cert.as_bytes(), self.idp_certificate.as_bytes())
        {
            return Err(unauthenticated(Some(
                "signing certificate does not match the configured IdP certificate",
            )));
        }

        let now = Utc::now();
        if let Some(conditions) = doc.descendants().find(|n| n.tag_name().name() == "Conditions") {
            if let Some(not_before) = conditions
                .attribute("NotBefore")
                .and_then(parse_saml_instant)
            {
                if now < not_before {
                    return Err(unauthenticated(Some("assertion is not yet valid")));
                }
            }
            if let Some(not_on_or_after) = conditions
                .attribute("NotOnOrAfter")
                .and_then(parse_saml_instant)
            {
                if now >= not_on_or_after {
                    return Err(unauthenticated(Some("assertion has expired")));
                }
            }
        }

        if let Some(audience) = doc
            .descendants()
            .find(|n| n.tag_name().name() == "Audience")
            .and_then(|n| n.text())
        {
            if audience.trim() != self.entity_id {
                return Err(unauthenticated(Some("assertion audience mismatch")));
            }
        }

        let username = doc
            .descendants()
            .find(|n| n.tag_name().name() == "NameID")
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| unauthenticated(Some("assertion carries no NameID")))?
            .to_string();

        let groups = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "Attribute")
            .filter(|n| n.attribute("Name") == Some(self.group_attribute.as_str()))
            .flat_map(|attr| {
                attr.children()
                    .filter(|c| c.tag_name().name() == "AttributeValue")
                    .filter_map(|c| c.text())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(FederatedLogin { username, groups })
    }
}

/// Strip PEM framing and whitespace so certificates compare structurally.
fn normalize_certificate(cert: &str) -> String {
    cert.lines()
        .filter(|line| !line.contains("CERTIFICATE"))
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn parse_saml_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CERT: &str = "MIICertBytesForTesting+Only/Abc123==";

    fn client() -> SamlClient {
        SamlClient {
            entity_id: "https://registry.example.com".to_string(),
            idp_sso_url: "https://idp.example.com/sso".to_string(),
            idp_certificate: normalize_certificate(TEST_CERT),
            group_attribute: "groups".to_string(),
            acs_url: "https://registry.example.com/saml/acs".to_string(),
        }
    }

    fn response_xml(request_id: &str, audience: &str) -> String {
        format!(
            concat!(
                r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
                r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
                r#"xmlns:ds="http://www.w3.org/2000/09/xmldsig#" "#,
                r#"ID="r1" InResponseTo="{req}" Version="2.0">"#,
                r#"<samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>"#,
                r#"<saml:Assertion ID="a1">"#,
                r#"<ds:Signature><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#,
                r#"<saml:Subject><saml:NameID>jane.doe</saml:NameID></saml:Subject>"#,
                r#"<saml:Conditions NotBefore="2020-01-01T00:00:00Z" NotOnOrAfter="2099-01-01T00:00:00Z">"#,
                r#"<saml:AudienceRestriction><saml:Audience>{aud}</saml:Audience></saml:AudienceRestriction>"#,
                r#"</saml:Conditions>"#,
                r#"<saml:AttributeStatement>"#,
                r#"<saml:Attribute Name="groups">"#,
                r#"<saml:AttributeValue>platform-team</saml:AttributeValue>"#,
                r#"<saml:AttributeValue>ops</saml:AttributeValue>"#,
                r#"</saml:Attribute>"#,
                r#"</saml:AttributeStatement>"#,
                r#"</saml:Assertion>"#,
                r#"</samlp:Response>"#
            ),
            req = request_id,
            cert = TEST_CERT,
            aud = audience,
        )
    }

    #[test]
    fn valid_response_extracts_name_and_groups() {
        let xml = response_xml("id-123", "https://registry.example.com");
        let login = client().parse_response(&xml, Some("id-123")).unwrap();
        assert_eq!(login.username, "jane.doe");
        assert_eq!(login.groups, vec!["platform-team", "ops"]);
    }

    #[test]
    fn in_response_to_mismatch_is_rejected() {
        let xml = response_xml("id-other", "https://registry.example.com");
        assert!(client().parse_response(&xml, Some("id-123")).is_err());
    }

    #[test]
    fn audience_mismatch_is_rejected() {
        let xml = response_xml("id-123", "https://elsewhere.example.com");
        assert!(client().parse_response(&xml, Some("id-123")).is_err());
    }

    #[test]
    fn unknown_certificate_is_rejected() {
        let mut c = client();
        c.idp_certificate = normalize_certificate("DifferentCert==");
        let xml = response_xml("id-123", "https://registry.example.com");
        assert!(c.parse_response(&xml, Some("id-123")).is_err());
    }

    #[test]
    fn certificate_normalization_ignores_pem_framing() {
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            TEST_CERT
        );
        assert_eq!(normalize_certificate(&pem), normalize_certificate(TEST_CERT));
    }
}
