//! Mirror fallback against local repositories and mocked upstreams.

mod common;

use common::{TestEngine, loc};
use depot::config::{MirrorCredentials, MirrorHostConfig, RepositoryConfig};
use depot::error::Error;
use depot::metadata::parse_metadata;
use depot::types::FileDetails;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JAR: &str = "org/apache/commons/1.0/commons-1.0.jar";

const UPSTREAM_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>g</groupId>
  <artifactId>lib</artifactId>
  <versioning>
    <latest>2.0</latest>
    <release>2.0</release>
    <versions>
      <version>1.0</version>
      <version>2.0</version>
    </versions>
    <lastUpdated>20240201000000</lastUpdated>
  </versioning>
</metadata>
"#;

async fn versions(engine: &TestEngine, path: &str) -> Vec<String> {
    let content = engine.read(None, "proxy", path).await.unwrap();
    parse_metadata(&content).unwrap().versions().to_vec()
}

fn proxy(mirrors: Vec<MirrorHostConfig>) -> RepositoryConfig {
    let mut config = RepositoryConfig::new("proxy");
    config.mirrors = mirrors;
    config
}

fn remote(server: &MockServer, store: bool) -> MirrorHostConfig {
    let mut mirror = MirrorHostConfig::new(server.uri());
    mirror.store = store;
    mirror
}

#[tokio::test]
async fn test_failover_and_store() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{JAR}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote jar".to_vec()))
        .expect(1)
        .mount(&healthy)
        .await;

    let engine = TestEngine::start(vec![proxy(vec![
        remote(&failing, false),
        remote(&healthy, true),
    ])])
    .await;

    let content = engine.read(None, "proxy", JAR).await.unwrap();
    assert_eq!(content, "remote jar");
    assert!(engine.stored_path("proxy", JAR).is_file());

    // Served locally from now on, the mocks verify a single upstream call.
    let content = engine.read(None, "proxy", JAR).await.unwrap();
    assert_eq!(content, "remote jar");
}

#[tokio::test]
async fn test_passthrough_without_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{JAR}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("streamed"))
        .expect(2)
        .mount(&server)
        .await;

    let engine = TestEngine::start(vec![proxy(vec![remote(&server, false)])]).await;

    for _ in 0..2 {
        assert_eq!(engine.read(None, "proxy", JAR).await.unwrap(), "streamed");
    }
    assert!(!engine.stored_path("proxy", JAR).exists());
}

#[tokio::test]
async fn test_all_hosts_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut unreachable = MirrorHostConfig::new("http://127.0.0.1:1");
    unreachable.connect_timeout_secs = 1;
    let engine =
        TestEngine::start(vec![proxy(vec![unreachable, remote(&server, true)])]).await;

    let result = engine.read(None, "proxy", JAR).await;
    let Err(Error::NotFound(message)) = result else {
        panic!("expected not found");
    };
    assert!(message.contains("not found locally or remotely"));
}

#[tokio::test]
async fn test_remote_details() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{JAR}")))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/java-archive"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TestEngine::start(vec![proxy(vec![remote(&server, true)])]).await;

    let details = engine
        .service
        .find_details(None, "proxy", &loc(JAR))
        .await
        .unwrap();
    let FileDetails::Document(document) = details else {
        panic!("expected a document");
    };
    assert_eq!(document.name, "commons-1.0.jar");
    assert_eq!(document.content_type, "application/java-archive");
    assert!(!engine.stored_path("proxy", JAR).exists());
}

#[tokio::test]
async fn test_credentials_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(basic_auth("reader", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("authorized"))
        .expect(1)
        .mount(&server)
        .await;

    let mut mirror = remote(&server, false);
    mirror.credentials = Some(MirrorCredentials {
        login: "reader".to_string(),
        password: "secret".to_string(),
    });
    let engine = TestEngine::start(vec![proxy(vec![mirror])]).await;

    assert_eq!(engine.read(None, "proxy", JAR).await.unwrap(), "authorized");
}

#[tokio::test]
async fn test_allow_lists_skip_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("nope"))
        .expect(0)
        .mount(&server)
        .await;

    let mut by_extension = remote(&server, false);
    by_extension.allowed_extensions = vec![".pom".to_string()];
    let mut by_group = remote(&server, false);
    by_group.allowed_groups = vec!["com.example".to_string()];

    let engine = TestEngine::start(vec![proxy(vec![by_extension, by_group])]).await;

    assert!(matches!(
        engine.read(None, "proxy", JAR).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_loopback_mirror() {
    let mut mirror = MirrorHostConfig::new("releases");
    mirror.store = true;
    let engine = TestEngine::start(vec![
        RepositoryConfig::new("releases"),
        proxy(vec![mirror]),
    ])
    .await;

    engine.deploy("releases", JAR, "local jar").await;

    let details = engine
        .service
        .find_details(None, "proxy", &loc(JAR))
        .await
        .unwrap();
    assert_eq!(details.name(), "commons-1.0.jar");

    assert_eq!(engine.read(None, "proxy", JAR).await.unwrap(), "local jar");
    assert!(engine.stored_path("proxy", JAR).is_file());
}

#[tokio::test]
async fn test_proxy_metadata_keeps_upstream_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/g/lib/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(UPSTREAM_METADATA))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/g/lib/1.0/lib-1.0.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("jar"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TestEngine::start(vec![proxy(vec![remote(&server, true)])]).await;
    let metadata = "g/lib/maven-metadata.xml";

    assert_eq!(versions(&engine, metadata).await, ["1.0", "2.0"]);

    engine.read(None, "proxy", "g/lib/1.0/lib-1.0.jar").await.unwrap();
    assert!(engine.stored_path("proxy", "g/lib/1.0/lib-1.0.jar").is_file());
    assert_eq!(versions(&engine, metadata).await, ["1.0", "2.0"]);

    engine.deploy("proxy", "g/lib/3.0/lib-3.0.jar", "jar").await;
    assert_eq!(versions(&engine, metadata).await, ["1.0", "2.0", "3.0"]);
}

#[tokio::test]
async fn test_stored_mirror_file_refreshes_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/g/lib/2.0/lib-2.0.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("jar"))
        .mount(&server)
        .await;

    let engine = TestEngine::start(vec![proxy(vec![remote(&server, true)])]).await;
    engine.deploy("proxy", "g/lib/1.0/lib-1.0.jar", "jar").await;

    let metadata = "g/lib/maven-metadata.xml";
    assert_eq!(versions(&engine, metadata).await, ["1.0"]);

    engine.read(None, "proxy", "g/lib/2.0/lib-2.0.jar").await.unwrap();
    assert_eq!(versions(&engine, metadata).await, ["1.0", "2.0"]);
}
