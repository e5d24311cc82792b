//! Scenario tests from the spec's TESTABLE PROPERTIES section: clean build / touch / rebuild,
//! failure propagation, and duplicate outputs.

use std::fs;
use std::time::Duration;

use orchestra_engine::{Session, SystemDiskInterface};
use orchestra_rule::{Outcome, Rule, Value};

fn run<F: std::future::Future>(fut: F) -> F::Output {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, fut)
}

fn strings(values: &[&str]) -> Value {
    Value::list(values.iter().map(|s| Value::string(*s)))
}

#[test]
fn test_clean_build_touch_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("a.c"), "int main() {}").unwrap();

    run(async {
        let session = Session::new(root.clone(), 1, true, Box::new(SystemDiskInterface));
        let config = Rule::root();

        let handle = session.submit(
            &config,
            strings(&["a.c"]),
            strings(&["a.o"]),
            vec![("command".to_string(), Value::string("cp a.c a.o"))],
            root.clone(),
        );
        let outcome = handle.await;
        assert!(matches!(outcome, Outcome::Outputs(_)));
        assert_eq!(session.counters.borrow().pass, 1);
        assert!(root.join("a.o").exists());
    });

    // Run 2: no edits, should skip.
    run(async {
        let session = Session::new(root.clone(), 1, true, Box::new(SystemDiskInterface));
        let config = Rule::root();
        let handle = session.submit(
            &config,
            strings(&["a.c"]),
            strings(&["a.o"]),
            vec![("command".to_string(), Value::string("cp a.c a.o"))],
            root.clone(),
        );
        handle.await;
        assert_eq!(session.counters.borrow().skip, 1);
        assert_eq!(session.counters.borrow().pass, 0);
    });

    // Touch a.c, then rerun: should pass again.
    std::thread::sleep(Duration::from_secs(1));
    fs::write(root.join("a.c"), "int main() { return 1; }").unwrap();

    run(async {
        let session = Session::new(root.clone(), 1, true, Box::new(SystemDiskInterface));
        let config = Rule::root();
        let handle = session.submit(
            &config,
            strings(&["a.c"]),
            strings(&["a.o"]),
            vec![("command".to_string(), Value::string("cp a.c a.o"))],
            root.clone(),
        );
        handle.await;
        assert_eq!(session.counters.borrow().pass, 1);
    });
}

#[test]
fn test_failure_propagation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("a.c"), "broken").unwrap();

    run(async {
        let session = Session::new(root.clone(), 2, true, Box::new(SystemDiskInterface));
        let config = Rule::root();

        let a = session.submit(
            &config,
            strings(&["a.c"]),
            strings(&["a.o"]),
            vec![("command".to_string(), Value::string("exit 1"))],
            root.clone(),
        );

        let b_files_in = Value::List(vec![Value::Task(a.clone())]);
        let b = session.submit(
            &config,
            b_files_in,
            strings(&["b.o"]),
            vec![("command".to_string(), Value::string("cp a.o b.o"))],
            root.clone(),
        );

        let outcome_a = a.await;
        let outcome_b = b.await;
        assert!(matches!(outcome_a, Outcome::Cancelled));
        assert!(matches!(outcome_b, Outcome::Cancelled));
        assert_eq!(session.counters.borrow().fail, 1);
        assert_eq!(session.counters.borrow().skip, 1);
        assert!(!root.join("b.o").exists());
        assert_ne!(session.exit_code(), 0);
    });
}

#[test]
fn test_duplicate_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("a.c"), "int main() {}").unwrap();
    fs::write(root.join("b.c"), "int main() {}").unwrap();

    run(async {
        let session = Session::new(root.clone(), 2, true, Box::new(SystemDiskInterface));
        let config = Rule::root();

        let first = session.submit(
            &config,
            strings(&["a.c"]),
            strings(&["x.o"]),
            vec![("command".to_string(), Value::string("cp a.c x.o"))],
            root.clone(),
        );
        let second = session.submit(
            &config,
            strings(&["b.c"]),
            strings(&["x.o"]),
            vec![("command".to_string(), Value::string("cp b.c x.o"))],
            root.clone(),
        );

        let outcome_first = first.await;
        let outcome_second = second.await;
        assert!(matches!(outcome_first, Outcome::Outputs(_)));
        assert!(matches!(outcome_second, Outcome::Cancelled));
        assert_eq!(session.counters.borrow().pass, 1);
        assert_eq!(session.counters.borrow().fail, 1);
    });
}
