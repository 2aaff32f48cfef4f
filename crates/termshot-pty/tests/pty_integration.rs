//! Integration tests for pty allocation and child control.

#![cfg(unix)]

use std::time::Duration;

use termshot_pty::{
    ExitStatus, PtyConfig, PtyControl, PtyError, PtyReader, PtySignal, WindowSize,
    signal_process_group, spawn,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Read until the slave side hangs up, or until `needle` shows up.
async fn read_until(reader: &mut PtyReader, needle: &str) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    let read_all = async {
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    if String::from_utf8_lossy(&out).contains(needle) {
                        break;
                    }
                }
                Err(e) if PtyError::is_hangup(&e) => break,
                Err(e) => panic!("read failed: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read_all)
        .await
        .expect("output before timeout");
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn output_translates_newlines() {
    let (master, mut child) = spawn("printf", ["a\\nb"], &PtyConfig::default()).unwrap();
    let (mut reader, _writer) = master.into_split();

    let out = read_until(&mut reader, "b").await;
    assert_eq!(out, "a\r\nb");
    assert!(child.wait().await.unwrap().success());
}

#[tokio::test]
async fn input_is_echoed_and_delivered() {
    let (master, mut child) = spawn("cat", Vec::<&str>::new(), &PtyConfig::default()).unwrap();
    let (mut reader, mut writer) = master.into_split();

    writer.write_all(b"ping\r").await.unwrap();
    let out = read_until(&mut reader, "ping\r\nping\r\n").await;
    assert_eq!(out, "ping\r\nping\r\n");

    child.kill().unwrap();
    assert_eq!(child.wait().await.unwrap(), ExitStatus::Signaled(9));
}

#[tokio::test]
async fn environment_reaches_child() {
    let config = PtyConfig::builder()
        .env("TERMSHOT_PTY_TEST", "present")
        .build();
    let (master, mut child) = spawn("sh", ["-c", "printf %s \"$TERMSHOT_PTY_TEST\""], &config).unwrap();
    let (mut reader, _writer) = master.into_split();

    assert_eq!(read_until(&mut reader, "present").await, "present");
    child.wait().await.unwrap();
}

#[tokio::test]
async fn resize_is_visible_to_child() {
    let config = PtyConfig::builder().window_size(100, 30).build();
    let (master, mut child) = spawn("sh", ["-c", "stty size; sleep 0.5; stty size"], &config).unwrap();
    let (mut reader, writer) = master.into_split();

    let first = read_until(&mut reader, "30 100").await;
    assert!(first.contains("30 100"));

    writer.resize(WindowSize::new(50, 12)).unwrap();
    assert_eq!(writer.window_size().unwrap(), WindowSize::new(50, 12));

    let second = read_until(&mut reader, "12 50").await;
    assert!(second.contains("12 50"));
    child.wait().await.unwrap();
}

#[tokio::test]
async fn process_group_signal_reaches_grandchildren() {
    let (master, mut child) = spawn(
        "sh",
        ["-c", "sleep 30 & echo started; wait"],
        &PtyConfig::default(),
    )
    .unwrap();
    let (mut reader, _writer) = master.into_split();
    read_until(&mut reader, "started").await;

    signal_process_group(child.pid(), PtySignal::Kill).unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("child exits")
        .unwrap();
    assert_eq!(status, ExitStatus::Signaled(9));

    // The backgrounded sleep held the slave open; hangup means it died too.
    read_until(&mut reader, "\u{0}never").await;
}

#[tokio::test]
async fn signalling_exited_group_reports_already_exited() {
    let (_master, mut child) = spawn("true", Vec::<&str>::new(), &PtyConfig::default()).unwrap();
    let pid = child.pid();
    child.wait().await.unwrap();

    let err = signal_process_group(pid, PtySignal::Terminate).unwrap_err();
    assert!(matches!(err, PtyError::AlreadyExited));
}
