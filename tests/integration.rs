use livestats::types::AnalysisReport;
use std::{
    env, fs,
    fs::File,
    io::BufReader,
    path::PathBuf,
    process::{Command, Output},
};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[sweep]\n"
        + "start = -1.0\n"
        + "stop = 1.0\n"
        + "step = 0.25\n"
        + "\n"
        + "[source]\n"
        + "amp = 1.0\n"
        + "period = 2.0\n"
        + "offset_i = 0.0\n"
        + "offset_q = 0.5\n"
        + "noise = 0.2\n"
        + "\n"
        + "[fetch]\n"
        + "reps = 2000\n"
        + "max_batch = 64\n"
        + "prob_idle = 0.2\n"
        + "polls_per_file = 8\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) -> Output {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_livestats"));

        Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command")
    }

    fn run_bin_ok(args: &[&str]) {
        let output = run_bin(args);

        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let steps: &[&[&str]] = &[
        &["--run-root", test_dir_str, "create"],
        &["--run-root", test_dir_str, "create"],
        &["--run-root", test_dir_str, "resume", "--run-idx", "0"],
        &["--run-root", test_dir_str, "resume", "--run-idx", "0"],
        &["--run-root", test_dir_str, "resume", "--run-idx", "1"],
        &["--run-root", test_dir_str, "analyze"],
    ];
    for args in steps {
        run_bin_ok(args);
    }

    let missing = run_bin(&["--run-root", test_dir_str, "resume", "--run-idx", "7"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("failed to resume run 7"));

    for run_idx in 0..2 {
        let run_dir = test_dir.join(format!("run-{run_idx:04}"));
        assert!(run_dir.join("checkpoint.msgpack").is_file());
        assert!(run_dir.join("acquisition-0000.msgpack").is_file());

        let file = File::open(run_dir.join("results.msgpack")).expect("failed to open results");
        let report: AnalysisReport = rmp_serde::decode::from_read(BufReader::new(file))
            .expect("failed to deserialize results");

        assert!(report.n_vals >= 2);
        assert_eq!(report.sem.len(), 9);
        assert!(
            report.max_abs_dev < 1e-9,
            "streamed estimate deviates by {}",
            report.max_abs_dev
        );
    }

    run_bin_ok(&["--run-root", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}
