mod common;

use common::init_tracing;
use skyflow_cloud::{
    ActionType, CloudError, ConvergenceEngine, ConvergenceState, DeletionPolicy, EngineConfig,
    StaticSchemaSource,
};
use skyflow_cloud_storage::{Bucket, BucketAdapter, BucketClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{
    body_string_contains, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

type BucketEngine = ConvergenceEngine<BucketAdapter, BucketClient>;

const NS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

fn engine_for(server: &MockServer) -> BucketEngine {
    let mut config = EngineConfig::default();
    config
        .storage_endpoints
        .insert("ch-gva-2".to_string(), server.uri());

    let client = BucketClient::new(config.clone(), "EXO1", "secret");
    ConvergenceEngine::new(
        BucketAdapter,
        Arc::new(client),
        Arc::new(StaticSchemaSource::new()),
    )
    .with_config(config)
}

fn xml(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body, "application/xml")
}

fn s3_error(status: u16, code: &str) -> ResponseTemplate {
    xml(
        status,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>{}</Code><Message>{} raised</Message><RequestId>r1</RequestId></Error>",
            code, code
        ),
    )
}

fn location(zone: &str) -> ResponseTemplate {
    xml(
        200,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <LocationConstraint xmlns=\"{}\">{}</LocationConstraint>",
            NS, zone
        ),
    )
}

/// `versions` are (key, version id); `next` is the (key, version id) marker pair
fn versions_page(
    versions: &[(&str, &str)],
    markers: &[(&str, &str)],
    next: Option<(&str, &str)>,
) -> ResponseTemplate {
    let mut body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><ListVersionsResult xmlns=\"{}\"><Name>assets</Name>",
        NS
    );
    match next {
        Some((key, version)) => body.push_str(&format!(
            "<IsTruncated>true</IsTruncated><NextKeyMarker>{}</NextKeyMarker>\
             <NextVersionIdMarker>{}</NextVersionIdMarker>",
            key, version
        )),
        None => body.push_str("<IsTruncated>false</IsTruncated>"),
    }
    for (key, version) in versions {
        body.push_str(&format!(
            "<Version><Key>{}</Key><VersionId>{}</VersionId><IsLatest>true</IsLatest></Version>",
            key, version
        ));
    }
    for (key, version) in markers {
        body.push_str(&format!(
            "<DeleteMarker><Key>{}</Key><VersionId>{}</VersionId><IsLatest>true</IsLatest></DeleteMarker>",
            key, version
        ));
    }
    body.push_str("</ListVersionsResult>");
    xml(200, body)
}

async fn expect_object_delete(server: &MockServer, key: &str, version: &str) {
    Mock::given(method("DELETE"))
        .and(path(format!("/assets/{}", key)))
        .and(query_param("versionId", version))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_missing_bucket_is_created_in_its_zone() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("location", ""))
        .respond_with(s3_error(404, "NoSuchBucket"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/assets"))
        .and(body_string_contains("<LocationConstraint>ch-gva-2</LocationConstraint>"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine
        .reconcile(&Bucket::new("assets", "ch-gva-2"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.action, ActionType::Create);
}

#[tokio::test]
async fn test_bucket_reported_in_another_zone_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("location", ""))
        .respond_with(location("de-fra-1"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .reconcile(&Bucket::new("assets", "ch-gva-2"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::ImmutableFieldChanged { ref field, .. } if field == "zone"));
}

#[tokio::test]
async fn test_existing_bucket_is_converged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("location", ""))
        .respond_with(location("ch-gva-2"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine
        .reconcile(&Bucket::new("assets", "ch-gva-2"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.action, ActionType::NoOp);
    assert_eq!(outcome.state, ConvergenceState::Converged);
}

#[tokio::test]
async fn test_recursive_delete_follows_version_markers() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("object-lock", ""))
        .respond_with(s3_error(404, "ObjectLockConfigurationNotFoundError"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("versions", ""))
        .and(query_param_is_missing("key-marker"))
        .respond_with(versions_page(
            &[("a.txt", "v1"), ("a.txt", "v2")],
            &[("b.txt", "m1")],
            Some(("b.txt", "m1")),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("versions", ""))
        .and(query_param("key-marker", "b.txt"))
        .and(query_param("version-id-marker", "m1"))
        .respond_with(versions_page(&[("c.txt", "null")], &[], None))
        .expect(1)
        .mount(&server)
        .await;

    expect_object_delete(&server, "a.txt", "v1").await;
    expect_object_delete(&server, "a.txt", "v2").await;
    expect_object_delete(&server, "b.txt", "m1").await;
    expect_object_delete(&server, "c.txt", "null").await;

    Mock::given(method("DELETE"))
        .and(path("/assets"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let bucket = Bucket::new("assets", "ch-gva-2").with_deletion_policy(DeletionPolicy::Recursive);
    let mut instance = engine.instance(&bucket).unwrap();
    let state = instance.delete(&CancellationToken::new()).await.unwrap();

    assert_eq!(state, ConvergenceState::Gone);
}

#[tokio::test]
async fn test_locked_bucket_objects_removed_with_governance_bypass() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("object-lock", ""))
        .respond_with(xml(
            200,
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <ObjectLockConfiguration xmlns=\"{}\">\
                 <ObjectLockEnabled>Enabled</ObjectLockEnabled>\
                 </ObjectLockConfiguration>",
                NS
            ),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("versions", ""))
        .respond_with(versions_page(&[("2023.tar", "v1")], &[], None))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/assets/2023.tar"))
        .and(query_param("versionId", "v1"))
        .and(header("x-amz-bypass-governance-retention", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/assets"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let bucket = Bucket::new("assets", "ch-gva-2").with_deletion_policy(DeletionPolicy::Recursive);
    let mut instance = engine.instance(&bucket).unwrap();
    let state = instance.delete(&CancellationToken::new()).await.unwrap();

    assert_eq!(state, ConvergenceState::Gone);
}

#[tokio::test]
async fn test_empty_only_refuses_bucket_with_versions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("versions", ""))
        .respond_with(versions_page(&[], &[("logo.png", "m1")], None))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let bucket = Bucket::new("assets", "ch-gva-2");
    let mut instance = engine.instance(&bucket).unwrap();
    let err = instance.delete(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, CloudError::NotEmpty(_)));
}

#[tokio::test]
async fn test_missing_bucket_delete_is_gone() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("versions", ""))
        .respond_with(s3_error(404, "NoSuchBucket"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let bucket = Bucket::new("assets", "ch-gva-2");
    let mut instance = engine.instance(&bucket).unwrap();
    let state = instance.delete(&CancellationToken::new()).await.unwrap();

    assert_eq!(state, ConvergenceState::Gone);
}

#[tokio::test]
async fn test_access_denied_is_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("location", ""))
        .respond_with(s3_error(403, "AccessDenied"))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .reconcile(&Bucket::new("assets", "ch-gva-2"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CloudError::Transport { ref operation, ref message }
            if operation == "observe" && message.contains("AccessDenied")
    ));
}
