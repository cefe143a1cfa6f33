//! Tests for TaskQueue shared between callers.

use std::time::Duration;

use gamepack_lib::queue::{CompileJob, CompilerCall};
use tokio_util::sync::CancellationToken;

use super::common::*;

fn job(fixture: &Fixture, name: &str, cancel: &CancellationToken) -> CompileJob {
  let out = fixture.generated_dir().join(name);
  CompileJob::new(
    CompilerCall::compile(fixture.temp.path().join("in.cpp"), out),
    format!("Compilation of {}", name),
    cancel.clone(),
  )
}

#[tokio::test]
async fn jobs_run_in_submission_order() {
  let fixture = Fixture::new();
  std::fs::create_dir_all(fixture.generated_dir()).unwrap();
  let backend = FakeBackend::new();
  let queue = fixture.queue(backend.clone());
  let cancel = CancellationToken::new();

  let names: Vec<String> = (0..8).map(|i| format!("unit{}.o", i)).collect();
  for name in &names {
    queue.submit(job(&fixture, name, &cancel));
  }
  assert!(queue.is_busy());
  assert_eq!(queue.submitted_count(), 8);

  queue
    .wait_idle(Duration::from_millis(5), &cancel, || {})
    .await
    .unwrap();

  assert!(!queue.is_busy());
  assert_eq!(backend.outputs(), names);
  for name in &names {
    assert!(fixture.generated_dir().join(name).exists());
  }
}

#[tokio::test]
async fn idle_only_once_every_output_exists() {
  let fixture = Fixture::new();
  std::fs::create_dir_all(fixture.generated_dir()).unwrap();
  let queue = fixture.queue(FakeBackend::new());
  let cancel = CancellationToken::new();
  let names = ["a.o", "b.o", "c.o"];

  let mut idle = queue.subscribe();
  for name in names {
    queue.submit(job(&fixture, name, &cancel));
  }

  loop {
    if *idle.borrow_and_update() == 0 {
      break;
    }
    idle.changed().await.unwrap();
  }
  for name in names {
    assert!(fixture.generated_dir().join(name).exists(), "{} missing while idle", name);
  }
}

#[tokio::test]
async fn clones_share_one_worker() {
  let fixture = Fixture::new();
  std::fs::create_dir_all(fixture.generated_dir()).unwrap();
  let backend = FakeBackend::with_delay(Duration::from_millis(20));
  let queue = fixture.queue(backend.clone());
  let other = queue.clone();
  let cancel = CancellationToken::new();

  queue.submit(job(&fixture, "first.o", &cancel));
  other.submit(job(&fixture, "second.o", &cancel));
  assert_eq!(queue.pending(), 2);
  assert_eq!(other.submitted_count(), 2);

  other
    .wait_idle(Duration::from_millis(5), &cancel, || {})
    .await
    .unwrap();
  assert_eq!(backend.outputs(), vec!["first.o", "second.o"]);
}

#[tokio::test]
async fn cancelled_wait_returns_early() {
  let fixture = Fixture::new();
  std::fs::create_dir_all(fixture.generated_dir()).unwrap();
  let queue = fixture.queue(FakeBackend::with_delay(Duration::from_secs(5)));
  let cancel = CancellationToken::new();

  queue.submit(job(&fixture, "slow.o", &cancel));

  let canceller = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    canceller.cancel();
  });

  let mut ticks = 0;
  let waited = queue.wait_idle(Duration::from_millis(5), &cancel, || ticks += 1).await;
  assert!(waited.is_err());
  assert!(ticks > 0);
}
