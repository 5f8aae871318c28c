//! Login watch over a real utmp file.

mod support;

use chrono::{TimeZone, Utc};
use hp_core::login_watch::{CancellationToken, LoginWatch, TargetUser};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use support::fake_host::FakeHost;

const T0: i32 = 1_700_000_000;

fn at(secs: i32) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(i64::from(T0 + secs), 0).unwrap()
}

#[test]
fn fires_for_new_login_written_while_watching() {
    let host = FakeHost::new();
    host.write_logins(&[("alice", T0 - 3600)]);

    let cancel = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let writer = {
        let utmp_host_path = host.utmp_path();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            let mut bytes = std::fs::read(&utmp_host_path).unwrap();
            bytes.extend(hp_core::collect::login::encode_utmp_record(
                hp_core::collect::login::USER_PROCESS,
                "bob",
                "pts/9",
                "192.0.2.4",
                4242,
                T0 + 5,
            ));
            std::fs::write(&utmp_host_path, bytes).unwrap();
        })
    };

    let source = host.source();
    let mut watch = LoginWatch::starting_at(TargetUser::Any, Duration::from_millis(10), at(0));
    let stopper = cancel.clone();
    let sink = Arc::clone(&seen);
    let summary = watch.run_with_clock(&source, &cancel, || at(10), move |record| {
        sink.lock().unwrap().push(record.user.clone());
        stopper.cancel();
        Ok(())
    });
    writer.join().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["bob".to_string()]);
    assert_eq!(summary.matches, 1);
    assert_eq!(summary.watermark, at(10));
    assert!(summary.ticks >= 1);
}

#[test]
fn named_target_ignores_other_users() {
    let host = FakeHost::new();
    host.write_logins(&[("mallory", T0 + 1), ("root", T0 + 2)]);

    let mut watch = LoginWatch::starting_at(
        TargetUser::parse("root"),
        Duration::from_millis(5),
        at(0),
    );
    let records = {
        use hp_core::collect::EvidenceSource;
        host.source().list_login_records().unwrap()
    };
    let mut users = Vec::new();
    let outcome = watch.tick(&records, at(3), &mut |r: &hp_core::collect::LoginRecord| {
        users.push(r.user.clone());
        Ok(())
    });
    assert_eq!(outcome.matched, 1);
    assert_eq!(users, vec!["root"]);
}

#[test]
fn missing_utmp_counts_source_failures_and_keeps_polling() {
    let host = FakeHost::new();
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(80));
        timer.cancel();
    });

    let start = Instant::now();
    let mut watch = LoginWatch::new(TargetUser::Any, Duration::from_millis(10));
    let summary = watch.run(&host.source(), &cancel, |_| Ok(()));
    handle.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.ticks >= 1);
    assert_eq!(summary.source_failures, summary.ticks);
    assert_eq!(summary.matches, 0);
}
