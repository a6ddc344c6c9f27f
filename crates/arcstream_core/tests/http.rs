use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use arcstream_core::{Orchestrator, WorkerError, WorkerOptions, WorkerReport};
use arcstream_extract::OpenError;
use arcstream_progress::{NoProgressHandler, ProgressHandler};
use arcstream_test_utils::{Compression, Route, TestEntry, TestHttpServer, compress, tar_archive};
use arcstream_transfer::{HttpEngine, SourceLocator, TransferConfig, TransferError};
use axum::http::StatusCode;
use indicatif::ProgressBar;
use tokio::runtime::Handle;

/// Collects the reported entries per source.
#[derive(Default)]
struct EntryLog(Mutex<Vec<(String, PathBuf)>>);

impl EntryLog {
    fn paths_of(&self, source: &str) -> BTreeSet<PathBuf> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(reported, _)| reported == source)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl ProgressHandler for EntryLog {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        NoProgressHandler.add_progress_bar(bar)
    }

    fn on_entry(&self, source: &str, path: &Path) {
        self.0
            .lock()
            .unwrap()
            .push((source.to_string(), path.to_path_buf()));
    }
}

fn orchestrator(destination: &Path, log: Arc<EntryLog>) -> Orchestrator<HttpEngine> {
    let config = TransferConfig {
        poll_interval: Duration::from_millis(50),
        ..TransferConfig::default()
    };
    let mut options = WorkerOptions::new(destination);
    options.poll_interval = config.poll_interval;
    let engine = HttpEngine::new(config, Handle::current()).unwrap();
    Orchestrator::new(Arc::new(engine), options).with_progress(log)
}

fn locator(server: &TestHttpServer, path: &str) -> SourceLocator {
    SourceLocator::parse(server.url(path).to_string()).unwrap()
}

fn summary(report: &WorkerReport) -> usize {
    report.outcome.as_ref().unwrap().entries
}

#[tokio::test(flavor = "multi_thread")]
async fn extracts_a_single_file_archive() {
    let server = TestHttpServer::spawn([(
        "hello.tar.gz",
        Route::Body(compress(
            &tar_archive(&[TestEntry::file("hello.txt", "hi")]),
            Compression::Gzip,
        )),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(EntryLog::default());

    let source = locator(&server, "hello.tar.gz");
    let reports = orchestrator(dir.path(), log.clone())
        .run(vec![source.clone()])
        .await
        .unwrap();

    assert_eq!(summary(&reports[0]), 1);
    assert_eq!(
        log.paths_of(source.as_str()),
        BTreeSet::from([PathBuf::from("hello.txt")])
    );
    assert_eq!(fs_err::read(dir.path().join("hello.txt")).unwrap(), b"hi");
}

#[tokio::test(flavor = "multi_thread")]
async fn non_archive_responses_extract_nothing() {
    let server = TestHttpServer::spawn([(
        "index.html",
        Route::Body(b"<html><body>moved</body></html>".to_vec()),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out");
    let log = Arc::new(EntryLog::default());

    let reports = orchestrator(&destination, log.clone())
        .run(vec![locator(&server, "index.html")])
        .await
        .unwrap();

    assert!(matches!(
        reports[0].outcome,
        Err(WorkerError::Open(OpenError::NotAnArchive))
    ));
    assert!(log.0.lock().unwrap().is_empty());
    assert!(!destination.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_archives_report_the_status() {
    let server = TestHttpServer::spawn([("gone.tar", Route::Status(StatusCode::GONE))]).await;
    let dir = tempfile::tempdir().unwrap();

    let reports = orchestrator(dir.path(), Arc::default())
        .run(vec![
            locator(&server, "gone.tar"),
            locator(&server, "unknown.tar"),
        ])
        .await
        .unwrap();

    let statuses: Vec<_> = reports
        .iter()
        .map(|report| match &report.outcome {
            Err(WorkerError::Transfer(TransferError::HttpStatus { status, .. })) => *status,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(statuses, vec![StatusCode::GONE, StatusCode::NOT_FOUND]);
}

#[tokio::test(flavor = "multi_thread")]
async fn extracts_two_archives_concurrently() {
    let first = tar_archive(&[
        TestEntry::dir("first"),
        TestEntry::file("first/a.txt", "a"),
        TestEntry::file("first/big.bin", vec![3u8; 200_000]),
    ]);
    let second = tar_archive(&[
        TestEntry::dir("second"),
        TestEntry::file("second/b.txt", "b"),
        TestEntry::file("second/empty.txt", ""),
    ]);
    let server = TestHttpServer::spawn([
        (
            "first.tar.zst",
            Route::chunked(
                &compress(&first, Compression::Zstd),
                512,
                Duration::from_millis(2),
            ),
        ),
        (
            "second.tar.xz",
            Route::chunked(
                &compress(&second, Compression::Xz),
                256,
                Duration::from_millis(3),
            ),
        ),
    ])
    .await;
    let first_source = locator(&server, "first.tar.zst");
    let second_source = locator(&server, "second.tar.xz");

    // Sequential runs are the reference for the concurrent one.
    let sequential_dir = tempfile::tempdir().unwrap();
    let sequential_log = Arc::new(EntryLog::default());
    let sequential = orchestrator(sequential_dir.path(), sequential_log.clone());
    for source in [&first_source, &second_source] {
        let reports = sequential.run(vec![source.clone()]).await.unwrap();
        assert!(reports[0].is_success(), "{}", reports[0]);
    }

    let concurrent_dir = tempfile::tempdir().unwrap();
    let concurrent_log = Arc::new(EntryLog::default());
    let reports = orchestrator(concurrent_dir.path(), concurrent_log.clone())
        .run(vec![first_source.clone(), second_source.clone()])
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(summary(&reports[0]), 3);
    assert_eq!(summary(&reports[1]), 3);
    for source in [&first_source, &second_source] {
        assert_eq!(
            concurrent_log.paths_of(source.as_str()),
            sequential_log.paths_of(source.as_str())
        );
    }
    assert_eq!(
        fs_err::read(concurrent_dir.path().join("first/big.bin")).unwrap(),
        vec![3u8; 200_000]
    );
    assert_eq!(
        fs_err::read(concurrent_dir.path().join("second/b.txt")).unwrap(),
        b"b"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_stalled_transfers() {
    let tar = tar_archive(&[TestEntry::file("slow.txt", vec![b'x'; 4096])]);
    let server = TestHttpServer::spawn([(
        "slow.tar",
        Route::chunked(&tar, 64, Duration::from_millis(200)),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), Arc::default());

    let token = orchestrator.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });
    let reports = orchestrator
        .run(vec![locator(&server, "slow.tar")])
        .await
        .unwrap();

    let err = reports[0].outcome.as_ref().unwrap_err();
    assert!(err.is_cancelled(), "{err}");
}
