//! ChEBI web-service client.
//!
//! Implements the authority seam over the ChEBI SOAP endpoint. The
//! single operation is `getCompleteEntity`; faults are classified into
//! [`AuthorityError`] kinds at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header;
use tracing::{debug, trace};

use crate::error::{AuthorityError, AuthorityResult};
use crate::record::{self, AuthorityRecord};

/// Production ChEBI SOAP endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.ebi.ac.uk/webservices/chebi/2.0/webservice";

/// A source of authoritative records, one identifier at a time.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Fetch the authority's current record for an identifier.
    ///
    /// `Ok(None)` means the authority found nothing for the
    /// identifier; per-record faults and systemic faults are
    /// distinguished by [`AuthorityError::is_per_record`].
    async fn get_record(&self, identifier: &str) -> AuthorityResult<Option<AuthorityRecord>>;
}

/// SOAP client for the ChEBI web service.
#[derive(Debug, Clone)]
pub struct ChebiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChebiClient {
    /// Create a client against the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> AuthorityResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthorityError::InvalidConfiguration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    fn envelope(qualified_id: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <getCompleteEntity xmlns="https://www.ebi.ac.uk/webservices/chebi">
      <chebiId>{qualified_id}</chebiId>
    </getCompleteEntity>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#
        )
    }
}

#[async_trait]
impl AuthorityClient for ChebiClient {
    async fn get_record(&self, identifier: &str) -> AuthorityResult<Option<AuthorityRecord>> {
        let qualified = record::qualify(identifier);
        trace!(identifier = %qualified, "querying authority");

        let response = self
            .http
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "")
            .body(Self::envelope(&qualified))
            .send()
            .await
            .map_err(|e| {
                AuthorityError::network_with_source(
                    format!("request to {} failed", self.endpoint),
                    e,
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AuthorityError::network_with_source("failed to read response body", e)
        })?;

        // SOAP faults arrive with an error status and a faultstring in
        // the body; parse first so the fault classification wins.
        let parsed = parse_response(&body, identifier)?;
        if parsed.is_none() && !status.is_success() {
            return Err(AuthorityError::Service {
                message: format!("HTTP {status} from authority"),
            });
        }
        if parsed.is_none() {
            debug!(identifier = %qualified, "authority returned no entity");
        }
        Ok(parsed)
    }
}

/// Fields of interest while walking the response document.
#[derive(Debug, PartialEq, Eq)]
enum Field {
    None,
    Fault,
    ChebiId,
    AsciiName,
    FormulaData,
}

/// Parse a `getCompleteEntity` SOAP response.
///
/// Only the entity's own `chebiId`/`chebiAsciiName` (first occurrence;
/// ontology cross-references repeat the element names deeper in the
/// tree) and the `data` children of `Formulae` blocks are extracted.
fn parse_response(body: &str, identifier: &str) -> AuthorityResult<Option<AuthorityRecord>> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut fault: Option<String> = None;
    let mut chebi_id: Option<String> = None;
    let mut ascii_name: Option<String> = None;
    let mut formulae: Vec<String> = Vec::new();
    let mut saw_return = false;
    let mut in_formulae = false;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"return" => saw_return = true,
                b"faultstring" => field = Field::Fault,
                b"chebiId" if chebi_id.is_none() => field = Field::ChebiId,
                b"chebiAsciiName" if ascii_name.is_none() => field = Field::AsciiName,
                b"Formulae" => in_formulae = true,
                b"data" if in_formulae => field = Field::FormulaData,
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Formulae" {
                    in_formulae = false;
                }
                field = Field::None;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| AuthorityError::Decode {
                        message: format!("bad text node: {e}"),
                    })?
                    .into_owned();
                match field {
                    Field::Fault => fault = Some(text),
                    Field::ChebiId => chebi_id = Some(text),
                    Field::AsciiName => ascii_name = Some(text),
                    Field::FormulaData => formulae.push(text),
                    Field::None => {}
                }
                field = Field::None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AuthorityError::Decode {
                    message: format!("XML parse error: {e}"),
                })
            }
        }
    }

    if let Some(fault) = fault {
        return Err(AuthorityError::classify_fault(identifier, &fault));
    }
    if !saw_return {
        return Ok(None);
    }
    let id = chebi_id.ok_or_else(|| AuthorityError::Decode {
        message: "response entity has no chebiId".to_string(),
    })?;
    let ascii_name = ascii_name.ok_or_else(|| AuthorityError::Decode {
        message: "response entity has no chebiAsciiName".to_string(),
    })?;
    Ok(Some(AuthorityRecord {
        id,
        ascii_name,
        formulae,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/">
  <S:Body>
    <getCompleteEntityResponse xmlns="https://www.ebi.ac.uk/webservices/chebi">
      <return>
        <chebiId>CHEBI:15377</chebiId>
        <chebiAsciiName>water</chebiAsciiName>
        <definition>An oxygen hydride</definition>
        <Formulae>
          <data>H2O</data>
          <source>ChEBI</source>
        </Formulae>
        <OntologyParents>
          <chebiName>oxygen hydride</chebiName>
          <chebiId>CHEBI:33608</chebiId>
        </OntologyParents>
      </return>
    </getCompleteEntityResponse>
  </S:Body>
</S:Envelope>"#;

    #[test]
    fn test_parse_complete_entity() {
        let record = parse_response(WATER, "15377").unwrap().unwrap();
        assert_eq!(record.id, "CHEBI:15377");
        assert_eq!(record.canonical_id(), "15377");
        assert_eq!(record.ascii_name, "water");
        assert_eq!(record.formulae, vec!["H2O".to_string()]);
    }

    #[test]
    fn test_parse_takes_first_chebi_id_only() {
        // The ontology parent's chebiId must not overwrite the entity's.
        let record = parse_response(WATER, "15377").unwrap().unwrap();
        assert_ne!(record.id, "CHEBI:33608");
    }

    #[test]
    fn test_parse_fault_invalid_identifier() {
        let body = r#"<?xml version="1.0"?>
<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/">
  <S:Body>
    <S:Fault>
      <faultcode>S:Server</faultcode>
      <faultstring>error caught: invalid ChEBI identifier</faultstring>
    </S:Fault>
  </S:Body>
</S:Envelope>"#;
        let err = parse_response(body, "bogus").unwrap_err();
        assert!(matches!(err, AuthorityError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_parse_fault_obsolete() {
        let body = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><S:Fault><faultstring>the entity in question is deleted, obsolete, or not yet released</faultstring></S:Fault></S:Body></S:Envelope>"#;
        let err = parse_response(body, "12345").unwrap_err();
        assert!(matches!(err, AuthorityError::ObsoleteEntity { .. }));
    }

    #[test]
    fn test_parse_empty_response() {
        let body = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><getCompleteEntityResponse xmlns="https://www.ebi.ac.uk/webservices/chebi"/></S:Body></S:Envelope>"#;
        assert!(parse_response(body, "15377").unwrap().is_none());
    }

    #[test]
    fn test_parse_entity_without_formulae() {
        let body = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><r xmlns="https://www.ebi.ac.uk/webservices/chebi"><return><chebiId>CHEBI:1</chebiId><chebiAsciiName>thing</chebiAsciiName></return></r></S:Body></S:Envelope>"#;
        let record = parse_response(body, "1").unwrap().unwrap();
        assert!(record.formulae.is_empty());
        assert!(record.primary_formula().is_none());
    }
}
