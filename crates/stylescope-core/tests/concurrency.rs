//! Request coalescing and reload races.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use stylescope_core::{ContextManager, MatchCache, MatchedPosition};
use stylescope_test_utils::{CountingScanner, GatedLoader, TestWorkspace, init_test_tracing};

fn tokens(positions: &[MatchedPosition]) -> Vec<&str> {
    positions.iter().map(|p| p.token.as_str()).collect()
}

async fn two_level() -> TestWorkspace {
    let ws = TestWorkspace::with_root_config().await;
    ws.write_config("app", "presets = [\"core\"]\n[shortcuts]\nbtn = \"px-4\"\n")
        .await;
    ws.mkdir("app/src").await;
    ws
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_share_one_loader_call() {
    init_test_tracing();
    let ws = two_level().await;
    let loader = Arc::new(GatedLoader::new());
    let manager = Arc::new(ws.manager(loader.clone()));
    let app = ws.path("app");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            manager.load_context_in_directory(&app, false).await
        }));
    }

    loader.wait_entered(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    loader.open();

    let mut contexts = Vec::new();
    for task in tasks {
        contexts.push(task.await.unwrap().unwrap().unwrap());
    }
    assert_eq!(loader.calls_for(&app), 1);
    assert!(contexts.iter().all(|ctx| Arc::ptr_eq(ctx, &contexts[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolutions_share_one_loader_call() {
    let ws = two_level().await;
    let loader = Arc::new(GatedLoader::new());
    loader.open();
    let manager = Arc::new(ws.manager(loader.clone()));
    manager.reload().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let manager = Arc::clone(&manager);
        let file = ws.path(&format!("app/src/file{i}.tsx"));
        tasks.push(tokio::spawn(async move {
            manager.resolve_closest_context("", &file).await
        }));
    }
    for task in tasks {
        let ctx = task.await.unwrap().unwrap();
        assert_eq!(ctx.config_dir(), ws.path("app"));
    }
    assert_eq!(loader.calls_for(&ws.path("app")), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_leader_lets_waiters_retry() {
    let ws = two_level().await;
    let loader = Arc::new(GatedLoader::new());
    let manager = Arc::new(ws.manager(loader.clone()));
    let app = ws.path("app");

    let leader = {
        let manager = Arc::clone(&manager);
        let app = app.clone();
        tokio::spawn(async move { manager.load_context_in_directory(&app, false).await })
    };
    loader.wait_entered(1).await;

    let waiter = {
        let manager = Arc::clone(&manager);
        let app = app.clone();
        tokio::spawn(async move { manager.load_context_in_directory(&app, false).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    // The waiter retries as the new leader and reaches the gate again.
    loader.wait_entered(2).await;
    loader.open();
    let ctx = waiter.await.unwrap().unwrap().unwrap();
    assert_eq!(ctx.config_dir(), app);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_isolates_in_flight_resolution() {
    let ws = two_level().await;
    let loader = Arc::new(GatedLoader::new());
    let manager: Arc<ContextManager> = Arc::new(ws.manager(loader.clone()));

    loader.release_one();
    let first_root = manager.reload().await.unwrap();
    loader.wait_entered(1).await;

    // Park a resolution inside the loader for `app`.
    let file = ws.path("app/src/main.tsx");
    let pending = {
        let manager = Arc::clone(&manager);
        let file = file.clone();
        tokio::spawn(async move { manager.resolve_closest_context("", &file).await })
    };
    loader.wait_entered(2).await;

    // Reload swaps the generation before its own root load parks.
    let reload = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.reload().await })
    };
    loader.wait_entered(3).await;
    loader.open();

    let stale = pending.await.unwrap().unwrap();
    let new_root = reload.await.unwrap().unwrap();

    assert_eq!(stale.config_dir(), ws.path("app"));
    assert!(!manager.is_current(&stale));
    assert!(!manager.is_current(&first_root));
    assert!(manager.is_current(&new_root));

    // The late load did not leak into the new generation.
    let dirs: Vec<_> = manager
        .contexts()
        .iter()
        .map(|ctx| ctx.config_dir().to_path_buf())
        .collect();
    assert_eq!(dirs, vec![ws.root().to_path_buf()]);

    let fresh = manager.resolve_closest_context("", &file).await.unwrap();
    assert!(manager.is_current(&fresh));
    assert!(!Arc::ptr_eq(&fresh, &stale));
    assert_eq!(loader.calls_for(&ws.path("app")), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_during_resolution_keeps_positions_out_of_cache() {
    let ws = two_level().await;
    let loader = Arc::new(GatedLoader::only(ws.path("app")));
    let scanner = Arc::new(CountingScanner::new());
    let workspace = Arc::new(ws.workspace_with(
        loader.clone(),
        MatchCache::with_scanner(scanner.clone()),
    ));
    workspace.reload().await.unwrap();

    // Park the resolution of `app` inside the first generation.
    let file = ws.path("app/src/view.html");
    let pending = {
        let workspace = Arc::clone(&workspace);
        let file = file.clone();
        tokio::spawn(async move {
            workspace
                .matched_positions(&file, "doc", r#""btn flex""#, false)
                .await
        })
    };
    loader.wait_entered(1).await;

    workspace.reload().await.unwrap();
    assert!(workspace.cache().is_empty());
    loader.open();

    let stale = pending.await.unwrap().unwrap();
    assert_eq!(tokens(&stale), vec!["btn", "flex"]);
    assert_eq!(scanner.calls(), 1);

    // A hit would hand back the stale positions for the new content.
    let fresh = workspace
        .matched_positions(&file, "doc", r#""block""#, false)
        .await
        .unwrap();
    assert_eq!(tokens(&fresh), vec!["block"]);
    assert_eq!(scanner.calls(), 2);
    assert_eq!(loader.calls_for(&ws.path("app")), 2);
}
