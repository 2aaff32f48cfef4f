//! Blocking session API.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{Recorder, init_tracing, quick};
use regex::Regex;
use termshot::{Phase, SessionError, SyncSession};

#[test]
fn sync_session_drives_cat() {
    init_tracing();
    let mut session = SyncSession::start(quick("cat").build()).expect("cat starts");
    assert_eq!(session.phase(), Phase::Running);
    assert!(session.pid().is_some());

    session.key_press_str("sync<Enter><WaitFor sync>").unwrap();
    assert!(session.assert_line_eq(1, "sync"));
    assert!(session.assert_screen_contains("sync"));
    assert!(session.assert_screen_matches(&Regex::new("(?m)^sync$").unwrap()));

    session.key_press([b"x\r"]).unwrap();
    session.wait_for("x", Duration::from_secs(5)).unwrap();
    assert!(session.assert_line_eq(3, "x"));

    session.close().unwrap();
    assert_eq!(session.phase(), Phase::Closed);
}

#[test]
fn sync_session_reads_screen() {
    init_tracing();
    let mut session = SyncSession::start(
        quick("printf")
            .arg("one\\ntwo")
            .size(4, 20)
            .collect_raw_bytes(true)
            .build(),
    )
    .unwrap();

    session.wait_for("two", Duration::from_secs(5)).unwrap();
    assert_eq!(session.line(0), "one");
    assert_eq!(session.screen_text(), "one\ntwo\n\n");
    assert_eq!(session.snapshot().len(), 4);
    assert_eq!(session.cursor_position(), Some((2, 4)));
    assert!(!session.raw_bytes().is_empty());
    assert!(session.wait_stable(Duration::from_millis(30), Duration::from_secs(2)));

    session.close().unwrap();
}

#[test]
fn sync_session_resize() {
    init_tracing();
    let mut session = SyncSession::start(quick("cat").build()).unwrap();
    session.resize(6, 30).unwrap();
    assert_eq!(session.snapshot().len(), 6);
    assert!(matches!(session.resize(0, 30), Err(SessionError::Config { .. })));
    session.close().unwrap();
}

#[test]
fn sync_session_cancel() {
    init_tracing();
    let mut session = SyncSession::start(quick("sleep").arg("30").build()).unwrap();
    session.cancel();

    let mut exit = None;
    for _ in 0..250 {
        exit = session.reader_exit();
        if exit.is_some() {
            break;
        }
        // Drive the reader while polling.
        session.wait_stable(Duration::from_millis(1), Duration::from_millis(20));
    }
    assert!(exit.is_some_and(|e| e.is_clean()));
    session.close().unwrap();
}

#[test]
fn sync_session_assertion_hook() {
    init_tracing();
    let recorder = Recorder::default();
    let mut session = SyncSession::start(
        recorder
            .install(quick("printf").arg("here"))
            .max_attempts(2)
            .initial_delay(Duration::from_millis(5))
            .build(),
    )
    .unwrap();

    session.wait_for("here", Duration::from_secs(5)).unwrap();
    assert!(!session.assert_screen_eq("elsewhere"));
    assert_eq!(recorder.messages().len(), 1);

    session.close().unwrap();
}

#[test]
fn sync_session_start_failure() {
    init_tracing();
    let err = SyncSession::start(quick("/nonexistent/termshot-missing-binary").build()).unwrap_err();
    assert!(matches!(err, SessionError::Startup(_)));
}
