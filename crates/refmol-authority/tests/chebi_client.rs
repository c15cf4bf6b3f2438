//! Integration tests for the SOAP client against a mock HTTP server.

use refmol_authority::{AuthorityClient, AuthorityError, ChebiClient};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WATER_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/">
  <S:Body>
    <getCompleteEntityResponse xmlns="https://www.ebi.ac.uk/webservices/chebi">
      <return>
        <chebiId>CHEBI:15377</chebiId>
        <chebiAsciiName>water</chebiAsciiName>
        <Formulae>
          <data>H2O</data>
          <source>ChEBI</source>
        </Formulae>
      </return>
    </getCompleteEntityResponse>
  </S:Body>
</S:Envelope>"#;

const INVALID_FAULT: &str = r#"<?xml version="1.0"?>
<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/">
  <S:Body>
    <S:Fault>
      <faultcode>S:Server</faultcode>
      <faultstring>error caught: invalid ChEBI identifier</faultstring>
    </S:Fault>
  </S:Body>
</S:Envelope>"#;

const EMPTY_RESPONSE: &str = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><getCompleteEntityResponse xmlns="https://www.ebi.ac.uk/webservices/chebi"/></S:Body></S:Envelope>"#;

#[tokio::test]
async fn test_get_record_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webservice"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(body_string_contains("CHEBI:15377"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WATER_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChebiClient::new(format!("{}/webservice", server.uri())).unwrap();
    let record = client.get_record("15377").await.unwrap().unwrap();
    assert_eq!(record.canonical_id(), "15377");
    assert_eq!(record.ascii_name, "water");
    assert_eq!(record.primary_formula(), Some("H2O"));
}

#[tokio::test]
async fn test_get_record_qualifies_bare_identifier() {
    let server = MockServer::start().await;
    // The request body must carry the CHEBI: prefix even for a bare id.
    Mock::given(method("POST"))
        .and(body_string_contains("<chebiId>CHEBI:15377</chebiId>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WATER_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChebiClient::new(server.uri()).unwrap();
    assert!(client.get_record("15377").await.unwrap().is_some());
}

#[tokio::test]
async fn test_fault_in_error_status_body_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(INVALID_FAULT))
        .mount(&server)
        .await;

    let client = ChebiClient::new(server.uri()).unwrap();
    let err = client.get_record("bogus").await.unwrap_err();
    assert!(matches!(err, AuthorityError::InvalidIdentifier { .. }));
    assert!(err.is_per_record());
}

#[tokio::test]
async fn test_empty_return_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_RESPONSE))
        .mount(&server)
        .await;

    let client = ChebiClient::new(server.uri()).unwrap();
    assert!(client.get_record("15377").await.unwrap().is_none());
}

#[tokio::test]
async fn test_http_error_without_fault_is_systemic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string(EMPTY_RESPONSE))
        .mount(&server)
        .await;

    let client = ChebiClient::new(server.uri()).unwrap();
    let err = client.get_record("15377").await.unwrap_err();
    assert!(matches!(err, AuthorityError::Service { .. }));
    assert!(err.is_systemic());
}
