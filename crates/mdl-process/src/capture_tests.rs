use super::*;
use std::collections::BTreeMap;

fn spec(program: &str, args: &[&str], cwd: &std::path::Path) -> ProcessSpec {
    ProcessSpec {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cwd: cwd.to_path_buf(),
        env: BTreeMap::new(),
        stdin: None,
    }
}

#[tokio::test]
async fn captures_stdout_to_the_configured_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let child = spawn(spec("/bin/echo", &["hello-mdl"], dir.path()))
        .await
        .unwrap();
    let options = CaptureOptions {
        stdout_log: dir.path().join("stdout.log"),
        stderr_log: dir.path().join("stderr.log"),
        idle_timeout: Duration::from_secs(5),
        echo: ConsoleEcho::Silent,
        node_label: "echo-test".to_string(),
    };
    let result = wait_and_capture(child, &options).await.unwrap();
    assert!(result.succeeded());
    let captured = std::fs::read_to_string(&options.stdout_log).unwrap();
    assert_eq!(captured.trim(), "hello-mdl");
}

#[tokio::test]
async fn nonzero_exit_is_not_success() {
    let dir = tempfile::tempdir().unwrap();
    let child = spawn(spec("/bin/sh", &["-c", "exit 3"], dir.path()))
        .await
        .unwrap();
    let options = CaptureOptions {
        stdout_log: dir.path().join("stdout.log"),
        stderr_log: dir.path().join("stderr.log"),
        idle_timeout: Duration::from_secs(5),
        echo: ConsoleEcho::Silent,
        node_label: "fail-test".to_string(),
    };
    let result = wait_and_capture(child, &options).await.unwrap();
    assert!(!result.succeeded());
    assert_eq!(result.exit_code, 3);
    assert!(!result.timed_out);
}

#[tokio::test]
async fn idle_timeout_kills_a_silent_process() {
    let dir = tempfile::tempdir().unwrap();
    let child = spawn(spec("/bin/sh", &["-c", "sleep 30"], dir.path()))
        .await
        .unwrap();
    let options = CaptureOptions {
        stdout_log: dir.path().join("stdout.log"),
        stderr_log: dir.path().join("stderr.log"),
        idle_timeout: Duration::from_millis(300),
        echo: ConsoleEcho::Silent,
        node_label: "hang-test".to_string(),
    };
    let result = wait_and_capture(child, &options).await.unwrap();
    assert!(result.timed_out);
    assert_eq!(result.exit_code, 137);
}
