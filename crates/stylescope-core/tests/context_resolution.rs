//! Context discovery across nested configurations.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use stylescope_core::{ContextEvent, FsConfigLoader};
use stylescope_test_utils::{CountingLoader, TestWorkspace};

const NESTED: &str = r#"
presets = ["core"]

[shortcuts]
btn = "px-4 py-1 rounded"
"#;

async fn monorepo() -> TestWorkspace {
    let ws = TestWorkspace::with_root_config().await;
    ws.write_config("packages/app", NESTED).await;
    ws.mkdir("packages/app/src/components").await;
    ws.mkdir("packages/lib/src").await;
    ws
}

#[test_log::test(tokio::test)]
async fn test_nearest_configured_ancestor_wins() {
    let ws = monorepo().await;
    ws.write_config("packages/app/src", "presets = [\"core\"]\n").await;
    let manager = ws.manager(Arc::new(FsConfigLoader));
    manager.reload().await.unwrap();

    let file = ws.path("packages/app/src/components/Button.tsx");
    let ctx = manager.resolve_closest_context("", &file).await.unwrap();
    assert_eq!(ctx.config_dir(), ws.path("packages/app/src"));

    // With the intermediate context already loaded the deeper one still wins.
    let file = ws.path("packages/app/src/index.ts");
    let ctx = manager.resolve_closest_context("", &file).await.unwrap();
    assert_eq!(ctx.config_dir(), ws.path("packages/app/src"));

    let file = ws.path("packages/app/vite.config.ts");
    let ctx = manager.resolve_closest_context("", &file).await.unwrap();
    assert_eq!(ctx.config_dir(), ws.path("packages/app"));
}

#[tokio::test]
async fn test_nested_shortcut_is_scoped_to_its_context() {
    let ws = monorepo().await;
    let manager = ws.manager(Arc::new(FsConfigLoader));
    manager.reload().await.unwrap();

    let app = manager
        .resolve_closest_context("", &ws.path("packages/app/src/components/Button.tsx"))
        .await
        .unwrap();
    let lib = manager
        .resolve_closest_context("", &ws.path("packages/lib/src/index.ts"))
        .await
        .unwrap();
    let root = manager
        .resolve_closest_context("", &ws.path("README.md"))
        .await
        .unwrap();

    assert!(!app.generator().generate(&["btn"]).css.is_empty());
    assert!(lib.generator().generate(&["btn"]).css.is_empty());
    assert!(root.generator().generate(&["btn"]).css.is_empty());
    assert!(Arc::ptr_eq(&lib, &root));
}

#[tokio::test]
async fn test_resolution_is_cached_per_file() {
    let ws = monorepo().await;
    let loader = Arc::new(CountingLoader::new());
    let manager = ws.manager(loader.clone());
    manager.reload().await.unwrap();

    let file = ws.path("packages/app/src/components/Button.tsx");
    let first = manager.resolve_closest_context("", &file).await.unwrap();
    let listings = manager.probe_listings();
    let second = manager.resolve_closest_context("", &file).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.probe_listings(), listings);
    assert_eq!(loader.calls_for(&ws.path("packages/app")), 1);
}

#[tokio::test]
async fn test_unconfigured_directory_never_gets_a_context() {
    let ws = monorepo().await;
    let loader = Arc::new(CountingLoader::new());
    let manager = ws.manager(loader.clone());
    manager.reload().await.unwrap();

    let lib = ws.path("packages/lib");
    for _ in 0..4 {
        let loaded = manager.load_context_in_directory(&lib, false).await.unwrap();
        assert!(loaded.is_none());
        let ctx = manager
            .resolve_closest_context("", &ws.path("packages/lib/src/index.ts"))
            .await
            .unwrap();
        assert_eq!(ctx.config_dir(), ws.root());
    }

    assert_eq!(loader.calls_for(&lib), 1);
    assert!(manager.contexts().iter().all(|ctx| ctx.config_dir() != lib));
}

#[tokio::test]
async fn test_extends_sources_are_tracked() {
    let ws = TestWorkspace::with_root_config().await;
    ws.write_file("shared/base.toml", "[shortcuts]\ncard = \"rounded p-4\"\n")
        .await;
    ws.write_config("site", "extends = [\"../shared/base.toml\"]\npresets = [\"core\"]\n")
        .await;
    let manager = ws.manager(Arc::new(FsConfigLoader));
    manager.reload().await.unwrap();

    let ctx = manager
        .resolve_closest_context("", &ws.path("site/index.html"))
        .await
        .unwrap();
    assert_eq!(
        ctx.config_sources(),
        &[ws.path("site/stylescope.toml"), ws.path("site/../shared/base.toml")]
    );
    assert!(ctx.generator().is_valid("card"));
    assert!(manager.is_config_source(&ws.path("site/../shared/base.toml")));
}

#[tokio::test]
async fn test_broken_nested_config_falls_back_to_root() {
    let ws = TestWorkspace::with_root_config().await;
    ws.write_config("broken", "presets = [\"nope\"]\n").await;
    let manager = ws.manager(Arc::new(FsConfigLoader));
    manager.reload().await.unwrap();
    let mut events = manager.subscribe();

    let ctx = manager
        .resolve_closest_context("", &ws.path("broken/page.html"))
        .await
        .unwrap();
    assert_eq!(ctx.config_dir(), ws.root());

    match events.recv().await.unwrap() {
        ContextEvent::LoadFailed { dir, .. } => assert_eq!(dir, ws.path("broken")),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(
        manager
            .load_context_in_directory(&ws.path("broken"), false)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_workspace_without_any_config_uses_defaults() {
    let ws = TestWorkspace::new().await;
    ws.mkdir("src").await;
    let manager = ws.manager(Arc::new(FsConfigLoader));

    let root = manager.reload().await.unwrap();
    assert!(root.is_default());

    let ctx = manager
        .resolve_closest_context("", &ws.path("src/main.ts"))
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&ctx, &root));
    assert!(ctx.generator().is_valid("flex"));
}
