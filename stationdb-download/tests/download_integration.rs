//! Download-then-import against a local HTTP server

use std::sync::Mutex;
use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stationdb_core::config::DownloadConfig;
use stationdb_core::{CancelFlag, FormatType, StationDbError, KEY_MOST_RECENT_LICENSE_A};
use stationdb_download::{download, DownloadEvent, Downloader, PipelineEvent};
use stationdb_storage::{ImportEvent, ImportRequest, ImportSource, ListFilter};
use stationdb_test::{build_zip, license_a_dump, write_dump, TestConfig, TestEnvironment};

fn archive_bytes(date: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = build_zip(&dir.path().join("cdbs.zip"), None, &license_a_dump(date, true)).unwrap();
    std::fs::read(path).unwrap()
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

fn env_for(url: &str) -> TestEnvironment {
    TestEnvironment::with_config(TestConfig::default().with_download_url(FormatType::LicenseA, url))
        .unwrap()
}

fn downloader(env: &TestEnvironment) -> Downloader {
    Downloader::new(&env.config().download, env.workspace_dir()).unwrap()
}

fn workspace_is_empty(env: &TestEnvironment) -> bool {
    std::fs::read_dir(env.workspace_dir()).unwrap().next().is_none()
}

fn data_set_count(env: &TestEnvironment) -> usize {
    env.db().list(env.root_db(), &ListFilter::all()).unwrap().len()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_imports_archive() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/cdbs.zip",
        ResponseTemplate::new(200).set_body_bytes(archive_bytes("03/01/2024")),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let events = Mutex::new(Vec::new());
        let record = |event: &PipelineEvent| events.lock().unwrap().push(event.clone());

        let downloaded = download(
            env.db(),
            &downloader(&env),
            FormatType::LicenseA,
            &ImportRequest::new(env.root_db()).named("Nightly"),
            CancelFlag::new(),
            Some(&record),
        )
        .unwrap();

        let handle = &downloaded.imported.handle;
        assert!(handle.is_download());
        assert_eq!(handle.name(), "Nightly");
        assert_eq!(handle.id(), "CDBS 2024-03-01");
        assert_eq!(handle.version(), 3);
        assert!(downloaded.retired.is_empty());

        let events = events.into_inner().unwrap();
        assert!(events.contains(&PipelineEvent::Download(DownloadEvent::Percent(100))));
        assert!(events.contains(&PipelineEvent::Import(ImportEvent::Registering)));

        let current = env
            .db()
            .resolve(env.root_db(), KEY_MOST_RECENT_LICENSE_A, false)
            .unwrap();
        assert_eq!(current.backing_key(), downloaded.key());
        assert!(workspace_is_empty(&env));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_retires_earlier_downloads() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/cdbs.zip",
        ResponseTemplate::new(200).set_body_bytes(archive_bytes("03/01/2024")),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let downloader = downloader(&env);
        let fetch = || {
            download(
                env.db(),
                &downloader,
                FormatType::LicenseA,
                &ImportRequest::new(env.root_db()),
                CancelFlag::new(),
                None,
            )
            .unwrap()
        };

        // A manual import of the same format is never retired
        let dump = env.input_dir().join("cdbs");
        write_dump(&dump, &license_a_dump("01/15/2024", false)).unwrap();
        let manual = env
            .db()
            .import(
                FormatType::LicenseA,
                &ImportSource::from_path(&dump),
                &ImportRequest::new(env.root_db()),
                CancelFlag::new(),
                None,
            )
            .unwrap()
            .outcome
            .key;

        let first = fetch();
        assert!(first.retired.is_empty());
        let second = fetch();
        assert_eq!(second.retired, vec![first.key()]);

        assert!(matches!(
            env.db().resolve(env.root_db(), first.key(), false),
            Err(StationDbError::Deleted { .. })
        ));
        assert!(env.db().resolve(env.root_db(), manual, false).is_ok());
        assert!(env.db().resolve(env.root_db(), second.key(), false).is_ok());
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retention_skips_locked_and_can_be_disabled() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/cdbs.zip",
        ResponseTemplate::new(200).set_body_bytes(archive_bytes("03/01/2024")),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let downloader = downloader(&env);
        let fetch = || {
            download(
                env.db(),
                &downloader,
                FormatType::LicenseA,
                &ImportRequest::new(env.root_db()),
                CancelFlag::new(),
                None,
            )
            .unwrap()
        };

        let first = fetch();
        let in_use = first.imported.handle.connect(true).unwrap();
        let second = fetch();
        assert!(second.retired.is_empty());
        first.imported.handle.release(in_use).unwrap();
        assert!(env.db().resolve(env.root_db(), first.key(), false).is_ok());

        let keeper = TestEnvironment::with_config(
            TestConfig::default()
                .with_download_url(FormatType::LicenseA, url.as_str())
                .keep_previous_downloads(),
        )
        .unwrap();
        let downloader = Downloader::new(&keeper.config().download, keeper.workspace_dir()).unwrap();
        for _ in 0..2 {
            let downloaded = download(
                keeper.db(),
                &downloader,
                FormatType::LicenseA,
                &ImportRequest::new(keeper.root_db()),
                CancelFlag::new(),
                None,
            )
            .unwrap();
            assert!(downloaded.retired.is_empty());
        }
        assert_eq!(
            keeper
                .db()
                .list(keeper.root_db(), &ListFilter::all().concrete_only())
                .unwrap()
                .len(),
            2
        );
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_registers_nothing() {
    let server = MockServer::start().await;
    let url = serve(&server, "/missing.zip", ResponseTemplate::new(404)).await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let err = download(
            env.db(),
            &downloader(&env),
            FormatType::LicenseA,
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StationDbError::Network(_)));
        assert_eq!(data_set_count(&env), 0);
        assert!(workspace_is_empty(&env));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_transfer() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/cdbs.zip",
        ResponseTemplate::new(200).set_body_bytes(archive_bytes("03/01/2024")),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let cancel = CancelFlag::new();
        let watcher = cancel.clone();
        let cancel_on_first_chunk = move |event: &PipelineEvent| {
            if matches!(event, PipelineEvent::Download(_)) {
                watcher.cancel();
            }
        };

        let err = download(
            env.db(),
            &downloader(&env),
            FormatType::LicenseA,
            &ImportRequest::new(env.root_db()),
            cancel,
            Some(&cancel_on_first_chunk),
        )
        .unwrap_err();
        assert!(matches!(err, StationDbError::Cancelled));
        assert_eq!(data_set_count(&env), 0);
        assert!(workspace_is_empty(&env));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_corrupt_archive_is_removed() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/cdbs.zip",
        ResponseTemplate::new(200).set_body_bytes(b"this is not a zip archive".to_vec()),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let env = env_for(&url);
        let err = download(
            env.db(),
            &downloader(&env),
            FormatType::LicenseA,
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StationDbError::Archive(_)));
        assert_eq!(data_set_count(&env), 0);
        assert!(workspace_is_empty(&env));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/slow.zip",
        ResponseTemplate::new(200)
            .set_body_bytes(archive_bytes("03/01/2024"))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    tokio::task::spawn_blocking(move || {
        let workspace = tempfile::tempdir().unwrap();
        let config = DownloadConfig {
            timeout_secs: 1,
            connect_timeout_secs: 1,
            ..DownloadConfig::default()
        };
        let downloader = Downloader::new(&config, workspace.path()).unwrap();
        let err = downloader.fetch(&url, &CancelFlag::new(), None).unwrap_err();
        assert!(matches!(err, StationDbError::Network(_)));
        assert!(std::fs::read_dir(workspace.path()).unwrap().next().is_none());
    })
    .await
    .unwrap();
}

#[test]
fn test_missing_url_is_a_configuration_error() {
    let env = TestEnvironment::new().unwrap();
    let err = download(
        env.db(),
        &downloader(&env),
        FormatType::LicenseB,
        &ImportRequest::new(env.root_db()),
        CancelFlag::new(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, StationDbError::Configuration(_)));
}

#[test]
fn test_generic_formats_cannot_be_downloaded() {
    let env = TestEnvironment::new().unwrap();
    assert!(matches!(
        download(
            env.db(),
            &downloader(&env),
            FormatType::GenericTv,
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        ),
        Err(StationDbError::InvalidInput(_))
    ));
}

#[test]
fn test_unreachable_server_is_a_network_error() {
    let workspace = tempfile::tempdir().unwrap();
    let config = DownloadConfig {
        connect_timeout_secs: 2,
        ..DownloadConfig::default()
    };
    let downloader = Downloader::new(&config, workspace.path()).unwrap();
    let err = downloader
        .fetch("http://127.0.0.1:1/cdbs.zip", &CancelFlag::new(), None)
        .unwrap_err();
    assert!(matches!(err, StationDbError::Network(_)));
}
