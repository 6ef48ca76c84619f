//! Concurrent requests: shared in-flight builds, cross-request cycles,
//! cancellation, and parallel compilation.

mod common;

use common::{cycle_names, paths, type_error_messages, Workspace};
use keel_config::GraphConfig;
use keel_graph::{CancellationToken, GraphError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

fn parallel(jobs: usize) -> GraphConfig {
    GraphConfig {
        jobs,
        ..GraphConfig::default()
    }
}

#[test]
fn concurrent_requests_share_one_build() {
    let ws = Workspace::new();
    ws.package("lib", "value 1");
    ws.package("app", "import lib");
    ws.lang.set_delay(Duration::from_millis(30));
    let graph = Arc::new(ws.graph());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                graph.compile("app").map(|p| p.handle)
            })
        })
        .collect();
    let handles: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(ws.lang.parses("app"), 1);
    assert_eq!(ws.lang.analyses("app"), 1);
    assert_eq!(ws.lang.parses("lib"), 1);
    assert_eq!(ws.lang.analyses("lib"), 1);
}

#[test]
fn cycle_across_requests_fails_both() {
    let ws = Workspace::new();
    ws.package("a", "import b");
    ws.package("b", "import a");
    ws.lang.set_delay(Duration::from_millis(30));
    let graph = Arc::new(ws.graph());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|root| {
            let graph = Arc::clone(&graph);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                graph.compile(root).map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        let cycle = cycle_names(&err);
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.first(), cycle.last());
    }
    assert!(graph.get("a").is_none());
    assert!(graph.get("b").is_none());
}

/// Runs `compile("lib")` on one thread and, once lib's analysis is under
/// way, `compile("app")` on another, so that the second request waits on
/// the first one's build of lib. Returns app's error.
fn app_error_while_lib_builds_elsewhere(ws: &Workspace) -> GraphError {
    let graph = Arc::new(ws.graph());
    let (started, lib_started) = mpsc::channel();
    let started = Mutex::new(Some(started));
    ws.lang.set_hook(move |path| {
        if path == "lib" {
            if let Some(started) = started.lock().unwrap().take() {
                started.send(()).unwrap();
                thread::sleep(Duration::from_millis(80));
            }
        }
    });

    let owner = {
        let graph = Arc::clone(&graph);
        thread::spawn(move || graph.compile("lib").map(|_| ()))
    };
    lib_started.recv().unwrap();
    let err = graph.compile("app").unwrap_err();
    assert!(owner.join().unwrap().is_err());
    ws.lang.clear_hook();
    err
}

#[test]
fn waiter_reports_the_same_type_errors_as_a_sequential_compile() {
    let ws = Workspace::new();
    ws.package("dep", "error bad dep");
    ws.package("lib", "import dep\nerror bad lib");
    ws.package("app", "import lib");

    let sequential = type_error_messages(&ws.graph().compile("app").unwrap_err());
    assert_eq!(sequential, vec!["bad dep", "bad lib"]);

    let shared = app_error_while_lib_builds_elsewhere(&ws);
    assert_eq!(type_error_messages(&shared), sequential);
    // lib was analysed once for the sequential compile and once for both threads.
    assert_eq!(ws.lang.analyses("lib"), 2);
}

#[test]
fn waiter_sees_type_errors_behind_a_missing_import() {
    let ws = Workspace::new();
    ws.package("lib", "import dep\nerror bad lib");
    ws.package("app", "import lib");

    let sequential = type_error_messages(&ws.graph().compile("app").unwrap_err());
    assert_eq!(sequential, vec!["bad lib"]);

    let shared = app_error_while_lib_builds_elsewhere(&ws);
    assert_eq!(type_error_messages(&shared), sequential);
    assert_eq!(ws.lang.analyses("lib"), 2);
}

#[test]
fn cancelled_foreign_build_is_retried() {
    let ws = Workspace::new();
    ws.package("lib", "value 1");
    let graph = Arc::new(ws.graph());
    let token = CancellationToken::new();
    let (started, lib_started) = mpsc::channel();
    let started = Mutex::new(started);
    let calls = AtomicUsize::new(0);
    let trigger = token.clone();
    ws.lang.set_hook(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            started.lock().unwrap().send(()).unwrap();
            // Give the second request time to start waiting on this build.
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        }
    });

    let owner = {
        let graph = Arc::clone(&graph);
        thread::spawn(move || graph.compile_with("lib", token).map(|_| ()))
    };
    lib_started.recv().unwrap();
    let lib = graph.compile("lib").unwrap();

    assert!(matches!(
        owner.join().unwrap(),
        Err(GraphError::Cancelled { .. })
    ));
    assert_eq!(ws.lang.analyses("lib"), 2);
    assert!(!lib.is_dirty());
    assert_eq!(graph.get("lib").unwrap().handle, lib.handle);
}

#[test]
fn lanes_of_one_recompile_report_a_shared_failure_once() {
    let ws = Workspace::new();
    ws.package("p1", "value 1");
    ws.package("p2", "value 2");
    let graph = ws.graph_with(parallel(2));
    graph.compile("p1").unwrap();
    graph.compile("p2").unwrap();

    ws.package("extra", "error bad extra");
    ws.edit("p1", "import extra");
    ws.edit("p2", "import extra");
    graph.mark_dirty_externally("p1");
    graph.mark_dirty_externally("p2");
    ws.lang.set_delay(Duration::from_millis(20));

    let err = graph.recompile_dirty().unwrap_err();
    assert_eq!(type_error_messages(&err), vec!["bad extra"]);
    assert_eq!(ws.lang.analyses("extra"), 1);
}

#[test]
fn cancelled_token_stops_before_parsing() {
    let ws = Workspace::new();
    ws.package("app", "value 1");
    let graph = ws.graph();
    let token = CancellationToken::new();
    token.cancel();

    let err = graph.compile_with("app", token).unwrap_err();
    assert!(matches!(err, GraphError::Cancelled { .. }));
    assert_eq!(ws.lang.total_parses(), 0);
    assert!(graph.get("app").is_none());
    assert!(graph.source_db().is_empty());
}

#[test]
fn cancellation_before_ir_leaves_no_entry() {
    let ws = Workspace::new();
    ws.package("lib", "value 1");
    ws.package("app", "import lib");
    let graph = ws.graph();
    let token = CancellationToken::new();
    let trigger = token.clone();
    ws.lang.set_hook(move |path| {
        if path == "app" {
            trigger.cancel();
        }
    });

    let err = graph.compile_with("app", token).unwrap_err();
    assert!(matches!(err, GraphError::Cancelled { .. }));
    assert_eq!(ws.lang.builds("app"), 0);
    assert_eq!(ws.lang.builds("lib"), 0);
    assert!(graph.get("app").is_none());
    assert!(graph.get("lib").is_none());

    ws.lang.clear_hook();
    assert!(graph.compile("app").is_ok());
}

#[test]
fn external_edit_cancels_in_flight_build() {
    let ws = Workspace::new();
    ws.package("lib", "value 1");
    ws.package("app", "import lib");
    let graph = Arc::new(ws.graph());

    let weak = Arc::downgrade(&graph);
    ws.lang.set_hook(move |path| {
        if path == "lib" {
            if let Some(graph) = weak.upgrade() {
                graph.mark_dirty_externally("lib");
            }
        }
    });

    let err = graph.compile("app").unwrap_err();
    assert!(matches!(err, GraphError::Cancelled { .. }));
    assert!(graph.get("lib").is_none());
    assert!(graph.get("app").is_none());

    ws.lang.clear_hook();
    let app = graph.compile("app").unwrap();
    assert!(!app.is_dirty());
}

#[test]
fn compile_all_shares_common_dependencies() {
    let ws = Workspace::new();
    ws.package("common", "value c");
    for root in ["a", "b", "c", "d"] {
        ws.package(root, "import common");
    }
    ws.lang.set_delay(Duration::from_millis(10));
    let graph = ws.graph_with(parallel(4));

    let results = graph.compile_all(&paths(&["a", "b", "c", "d"]));

    let names: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().path.to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
    assert_eq!(ws.lang.parses("common"), 1);
    assert_eq!(ws.lang.analyses("common"), 1);
    assert_eq!(graph.explicit_packages().len(), 4);
}

#[test]
fn parallel_recompile_rebuilds_each_package_once() {
    let ws = Workspace::new();
    ws.package("base", "value 0");
    let roots = ["p1", "p2", "p3", "p4", "p5"];
    for root in roots {
        ws.package(root, "import base");
    }
    ws.package("top", "import p1\nimport p2\nimport p3\nimport p4\nimport p5");
    let graph = ws.graph_with(parallel(3));
    graph.compile("top").unwrap();

    ws.edit("base", "value 1");
    let dirtied = graph.mark_dirty_externally("base");
    assert_eq!(dirtied.len(), 7);

    graph.recompile_dirty().unwrap();

    assert!(graph.packages().iter().all(|p| !p.is_dirty()));
    for path in roots.into_iter().chain(["base", "top"]) {
        assert_eq!(ws.lang.analyses(path), 2, "{path}");
    }
    let top = graph.get("top").unwrap();
    assert_eq!(top.ir.as_deref(), Some(" [p1= p2= p3= p4= p5=]"));
    assert_eq!(graph.get("p3").unwrap().ir.as_deref(), Some(" [base=1]"));
}
