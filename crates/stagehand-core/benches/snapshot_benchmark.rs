use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use stagehand_core::{
    ClientRuntime, ExtensionOptions, GroupConfig, GroupRegistry, LangFromHeader, LoaderExtension,
    RequestScope, SeedList, StaticRuntime, DEFAULT_NAMESPACE,
};
use std::sync::Arc;

fn extension() -> LoaderExtension {
    let options = ExtensionOptions::default()
        .with_runtime_source(Arc::new(StaticRuntime(ClientRuntime::new("yui", "3.18.1"))));
    let ext = LoaderExtension::new(&options).unwrap();

    let groups = GroupRegistry::new();
    for name in ["app", "admin", "shared"] {
        groups
            .register_group(
                name,
                GroupConfig::new()
                    .with_base(format!("/static/{}/", name))
                    .with_module(format!("{}-main", name), json!({ "requires": ["node", "io"] })),
            )
            .unwrap();
    }

    ext.configure([json!({ "fetchCSS": false, "modules": { "a": { "path": "a.js" } } })])
        .unwrap()
        .add_contributor(Arc::new(groups))
        .unwrap()
        .add_contributor(Arc::new(SeedList::new(["yui-base", "loader", "app-main"]).unwrap()))
        .unwrap()
        .add_contributor(Arc::new(LangFromHeader))
        .unwrap();
    ext
}

fn benchmark_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ext = extension();
    let scope = RequestScope::new("/").with_header("accept-language", "fr-CA,fr;q=0.9");

    c.bench_function("snapshot_three_contributors", |b| {
        b.to_async(&rt)
            .iter(|| async { ext.snapshot(black_box(&scope)).await.unwrap() })
    });
}

fn benchmark_inline_script(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ext = extension();
    let snapshot = rt
        .block_on(ext.snapshot(&RequestScope::new("/")))
        .unwrap();

    c.bench_function("inline_script_serialize", |b| {
        b.iter(|| snapshot.to_inline_script(black_box(DEFAULT_NAMESPACE)).unwrap())
    });
}

criterion_group!(benches, benchmark_snapshot, benchmark_inline_script);
criterion_main!(benches);
