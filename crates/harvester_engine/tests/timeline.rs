use harvester_core::{Cursor, FailureKind, ItemReference, Source};
use harvester_engine::{
    ApiSettings, DetailFetcher, Discoverer, HttpClient, HttpSettings, PageRequest, PostFetcher,
    TimelineDiscoverer,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> ApiSettings {
    ApiSettings::new(server.uri(), Some("token".to_string()))
}

fn http() -> HttpClient {
    HttpClient::new(HttpSettings::default()).unwrap()
}

async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/Banxico"))
        .and(header("authorization", "Bearer token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"data":{"id":"42","name":"Banxico","username":"Banxico"}}"#),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn pages_are_threaded_by_next_token() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("pagination_token", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data":[{"id":"3","text":"tres"}],"meta":{"result_count":1}}"#,
        ))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("max_results", "100"))
        .and(query_param("exclude", "retweets,replies"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data":[{"id":"1","text":"uno"},{"id":"2","text":"dos"}],
                "meta":{"result_count":2,"next_token":"c1"}}"#,
        ))
        .mount(&server)
        .await;

    let discoverer = TimelineDiscoverer::new(http(), api(&server));
    let source = Source::paginated("banxico", "Banxico");

    let first = discoverer
        .discover(
            &source,
            &PageRequest {
                cursor: None,
                page_size: 100,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        first.items,
        vec![ItemReference::new("1", "1"), ItemReference::new("2", "2")]
    );
    assert_eq!(first.next_cursor, Some(Cursor::new("c1")));

    let second = discoverer
        .discover(
            &source,
            &PageRequest {
                cursor: first.next_cursor.clone(),
                page_size: 100,
            },
        )
        .await
        .unwrap();
    assert_eq!(second.items, vec![ItemReference::new("3", "3")]);
    assert_eq!(second.next_cursor, None);
}

#[tokio::test]
async fn requested_page_size_is_sent_unchanged() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("max_results", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"meta":{"result_count":0}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let discoverer = TimelineDiscoverer::new(http(), api(&server));
    let page = discoverer
        .discover(
            &Source::paginated("banxico", "Banxico"),
            &PageRequest {
                cursor: None,
                page_size: 7,
            },
        )
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/nadie"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"errors":[{"title":"Not Found Error","detail":"Could not find user with username: [nadie]."}]}"#,
        ))
        .mount(&server)
        .await;

    let discoverer = TimelineDiscoverer::new(http(), api(&server));
    let err = discoverer
        .discover(
            &Source::paginated("nadie", "nadie"),
            &PageRequest {
                cursor: None,
                page_size: 10,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::NotFound);
}

#[tokio::test]
async fn rate_limited_timeline_is_transient() {
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let discoverer = TimelineDiscoverer::new(http(), api(&server));
    let err = discoverer
        .discover(
            &Source::paginated("banxico", "Banxico"),
            &PageRequest {
                cursor: None,
                page_size: 10,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Transient);
}

#[tokio::test]
async fn post_fetcher_builds_record_with_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/7"))
        .and(query_param("tweet.fields", "created_at,public_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data":{"id":"7","text":"Anuncio de política monetaria",
                "created_at":"2024-11-28T19:00:00.000Z",
                "public_metrics":{"retweet_count":40,"reply_count":5,"like_count":120}}}"#,
        ))
        .mount(&server)
        .await;

    let fetcher = PostFetcher::new(http(), api(&server));
    let record = fetcher.fetch(&ItemReference::new("7", "7")).await.unwrap();

    assert_eq!(record.item_id, "7");
    assert_eq!(record.title, "Anuncio de política monetaria");
    assert_eq!(record.metrics.get("like_count"), Some(&120));
    assert_eq!(record.metrics.len(), 3);
    assert!(record.published_at.is_some());
}
