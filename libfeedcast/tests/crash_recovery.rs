//! Crash between recording and publishing
//!
//! The title reaches the disk before the publish starts, so a process killed
//! mid-publish loses at most that one post and never repeats it after a
//! restart.

use libfeedcast::config::ScheduleConfig;
use libfeedcast::feed::StaticFeed;
use libfeedcast::publisher::mock::MockPublisher;
use libfeedcast::{Bot, CycleOutcome, FeedEntry, TitleStore};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn entries() -> Vec<FeedEntry> {
    vec![
        FeedEntry::new("Interrupted", "<b>in flight</b>", "https://x/1"),
        FeedEntry::new("Older", "already out", "https://x/0"),
    ]
}

fn restarted_bot(path: &Path, publisher: MockPublisher) -> Bot {
    let store = TitleStore::open(path).unwrap();
    Bot::new(
        Box::new(StaticFeed::new(entries())),
        Box::new(store),
        Box::new(publisher),
    )
    .with_schedule(ScheduleConfig {
        idle_interval: 0,
        post_interval: 0,
        retry_delay: 0,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_killed_during_publish_is_not_repeated() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("titles.txt");
    std::fs::write(&path, "Older\n").unwrap();

    // First process: publishing hangs, then the process "dies"
    let stalled = MockPublisher::with_delay(Duration::from_secs(30));
    let stalled_handle = stalled.clone();
    let mut bot = restarted_bot(&path, stalled);
    let task = tokio::spawn(async move { bot.run_cycle().await });

    let mut recorded = false;
    for _ in 0..500 {
        if std::fs::read_to_string(&path).unwrap() == "Older\nInterrupted\n" {
            recorded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(recorded, "title was not recorded before publishing");

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(stalled_handle.posted_content().is_empty());

    // Second process: starts from the file alone
    let publisher = MockPublisher::success();
    let mut bot = restarted_bot(&path, publisher.clone());

    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::NothingNew);
    assert_eq!(publisher.post_call_count(), 0);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Older\nInterrupted\n"
    );
}

#[tokio::test]
async fn test_restart_with_partially_written_history() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("titles.txt");
    // No trailing newline, as left by an interrupted writer of another tool
    std::fs::write(&path, "Interrupted").unwrap();

    let publisher = MockPublisher::success();
    let mut bot = restarted_bot(&path, publisher.clone());

    let outcome = bot.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Published { ref title, .. } if title == "Older"));
    assert_eq!(publisher.post_call_count(), 1);
    assert_eq!(
        publisher.posted_content(),
        vec!["Older\n\nalready out...\n#awseducate\nhttps://x/0"]
    );
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Interrupted\nOlder\n"
    );
}
