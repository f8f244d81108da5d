//! Library update runs wired to the download queue through the public API

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{LibrarySource, download_config, files_under, wait_for_completed};
use manga_dl::{
    Config, DownloadQueue, Error, Event, LibraryUpdater, MemoryStore, NotificationKind,
    ProgressRecorder, TrackingStore, UpdateConfig, run_until,
};

const WAIT: Duration = Duration::from_secs(10);

fn update_config() -> UpdateConfig {
    UpdateConfig {
        interval: Duration::ZERO,
        only_with_history: true,
        ..UpdateConfig::default()
    }
}

#[tokio::test]
async fn new_chapters_found_by_update_are_downloaded() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        LibrarySource::new(2)
            .with_series("bk", "Berserk", 3)
            .with_series("vs", "Vinland Saga", 5)
            .with_series("ub", "Unread Book", 1),
    );
    let store = Arc::new(MemoryStore::new());
    store.record_history("bk", "bk-ch3", 10).await;
    store.record_history("vs", "vs-ch2", 4).await;

    let updater = LibraryUpdater::new(update_config(), source.clone(), store.clone()).unwrap();
    let queue = DownloadQueue::new(download_config(temp_dir.path(), 2), source.clone()).unwrap();

    // First run only records the baseline
    let baseline = updater.update_library().await.unwrap();
    assert_eq!(baseline.total_manga, 2);
    assert_eq!(baseline.new_chapters, 0);
    assert_eq!(store.get_tracking("bk").await.unwrap(), Some(3));
    assert_eq!(store.get_tracking("ub").await.unwrap(), None);

    source.publish("bk");
    source.publish("bk");
    source.publish("ub");

    let mut events = updater.subscribe();
    let summary = updater.update_library().await.unwrap();
    assert_eq!(summary.updated_manga, 1);
    assert_eq!(summary.new_chapters, 2);

    // Queue every chapter past the old count for the updated items
    for task in summary.tasks.iter().filter(|t| t.has_new_chapters()) {
        let item = source.item(&task.item_id);
        for chapter in source
            .chapters_of(&task.item_id)
            .into_iter()
            .skip(task.old_chapter_count)
        {
            queue.enqueue(item.clone(), chapter, 0).await.unwrap();
        }
    }
    queue.start().await.unwrap();
    wait_for_completed(&queue, 2, WAIT).await;

    let root = temp_dir.path().join("library");
    assert_eq!(
        files_under(&root),
        vec![
            "Berserk/Chapter 4/0001.webp",
            "Berserk/Chapter 4/0002.jpg",
            "Berserk/Chapter 5/0001.webp",
            "Berserk/Chapter 5/0002.jpg",
        ]
    );

    let mut notified = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Notification { notification } = event {
            notified.push((notification.kind, notification.item_id));
        }
    }
    assert_eq!(
        notified,
        vec![
            (NotificationKind::NewChapter, Some("bk".to_string())),
            (NotificationKind::UpdateComplete, None),
        ]
    );

    let history = updater.update_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].new_chapters, 2);

    updater.shutdown().await;
    queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn services_built_from_json_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{
            "download": {{
                "download_dir": {dir:?},
                "max_concurrent_downloads": 1,
                "poll_interval": 10
            }},
            "update": {{
                "interval": 25,
                "max_concurrent_checks": 2,
                "only_with_history": false
            }}
        }}"#,
        dir = temp_dir.path().join("dl").display().to_string()
    );
    let config = Config::from_json_str(&json).unwrap();
    assert_eq!(config.update.interval, Duration::from_millis(25));

    let source = Arc::new(LibrarySource::new(1).with_series("mb", "Monster", 2));
    let updater =
        LibraryUpdater::new(config.update, source.clone(), Arc::new(MemoryStore::new())).unwrap();
    let queue = DownloadQueue::new(config.download, source).unwrap();

    updater.start().await.unwrap();
    tokio::time::timeout(WAIT, async {
        while updater.update_history().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scheduled update never ran");
    assert_eq!(updater.update_history().await[0].total_manga, 1);

    assert_eq!(queue.config().max_concurrent_downloads, 1);

    updater.shutdown().await;
    queue.shutdown().await.unwrap();
    assert!(!updater.is_running().await);
}

#[tokio::test]
async fn reading_progress_is_saved_through_recorder() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ProgressRecorder::new(store.clone());

    assert!(recorder.record("bk", "Berserk", "bk-ch4", 7, 20).await);
    assert_eq!(recorder.saved(), 1);
    assert_eq!(recorder.failures(), 0);

    let progress = store.progress("bk").await.unwrap();
    assert_eq!(progress.current_page, 7);
    assert_eq!(progress.item_title, "Berserk");
}

#[tokio::test]
async fn services_stop_when_shutdown_future_resolves() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(LibrarySource::new(1).with_series("gt", "GTO", 1));
    let updater = LibraryUpdater::new(
        UpdateConfig {
            interval: Duration::from_secs(3600),
            ..update_config()
        },
        source.clone(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    let queue = DownloadQueue::new(download_config(temp_dir.path(), 1), source).unwrap();
    queue.start().await.unwrap();
    updater.start().await.unwrap();

    let (trigger, shutdown) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(run_until(queue.clone(), updater.clone(), async move {
        let _ = shutdown.await;
    }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!running.is_finished());
    assert!(queue.is_running().await);
    assert!(updater.is_running().await);

    trigger.send(()).unwrap();
    tokio::time::timeout(WAIT, running)
        .await
        .expect("services did not stop")
        .unwrap()
        .unwrap();

    assert!(!queue.is_running().await);
    assert!(!updater.is_running().await);
    assert!(matches!(queue.start().await, Err(Error::ShuttingDown)));
}
