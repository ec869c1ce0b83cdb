//! Configuration reload through SIGHUP

mod support;

use nix::sys::signal::{Signal, raise};
use promoter::Outcome;
use promoter_daemon::{Config, FileConfigSource, WatchdogServer};
use std::time::Duration;
use support::{FailingAfter, RecordingPromoter, write_config};
use tokio::time::{sleep, timeout};

const PRIMARY: &str = "postgres://replicator@127.0.0.1:5432/postgres";

#[tokio::test]
async fn test_sighup_shortens_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), PRIMARY, "60s", 1);
    let config = Config::load_from_file(&path).unwrap();

    let prober = FailingAfter::new(1);
    let promoter = RecordingPromoter::default();
    let server = WatchdogServer::new(config, FileConfigSource::new(&path));
    let handle = tokio::spawn(server.run_with(prober.clone(), promoter.clone()));

    // Let the server install its signal handlers and finish startup
    sleep(Duration::from_millis(500)).await;
    assert_eq!(prober.calls(), 1);

    write_config(dir.path(), PRIMARY, "1s", 1);
    raise(Signal::SIGHUP).unwrap();

    // Without the reload the next probe would be a minute away
    let outcome = timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(outcome, Outcome::Promoted);
    assert_eq!(promoter.promotions().len(), 1);
}
