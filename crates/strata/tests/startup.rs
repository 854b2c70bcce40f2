//! End-to-end start-up over a small catalog domain: registry -> storage ->
//! manager configure/init in dependency order.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use strata::prelude::*;

///
/// LoggingManager
///

struct LoggingManager {
    name: &'static str,
    main: TypeKey,
    fail_configure: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl LoggingManager {
    fn register(
        registry: &mut Registry,
        name: &'static str,
        main: TypeKey,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        registry.register_manager(Arc::new(Self {
            name,
            main,
            fail_configure: false,
            log: log.clone(),
        }));
    }
}

#[async_trait]
impl DataManager for LoggingManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn main_type(&self) -> TypeKey {
        self.main
    }

    async fn configure(
        &self,
        info: &PyramidInfo,
        _config: &StorageConfig,
    ) -> Result<(), ManagerError> {
        if self.fail_configure {
            return Err(ManagerError::new("backing store unavailable"));
        }

        self.log
            .lock()
            .unwrap()
            .push(format!("configure:{}:{}", self.name, info.tables.len()));
        Ok(())
    }

    async fn init(&self) -> Result<(), ManagerError> {
        self.log.lock().unwrap().push(format!("init:{}", self.name));
        Ok(())
    }
}

///
/// RecordingSink
///

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<BuildTraceEvent>>,
}

impl BuildTraceSink for RecordingSink {
    fn on_event(&self, event: BuildTraceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn catalog_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_type(TypeDescriptor::interface("ICatalog"))
        .register_type(
            TypeDescriptor::generic_abstract("CatalogItem")
                .constrained_by("ICatalog")
                .with_member(MemberDescriptor::primitive("title", Primitive::Text)),
        )
        .register_type(
            TypeDescriptor::class("Book")
                .with_base("CatalogItem")
                .with_member(MemberDescriptor::primitive("pages", Primitive::Int32))
                .with_member(MemberDescriptor::reference("author", "Author")),
        )
        .register_type(
            TypeDescriptor::class("Disc")
                .with_base("CatalogItem")
                .with_member(MemberDescriptor::primitive("minutes", Primitive::Int32)),
        )
        .register_type(
            TypeDescriptor::class("Author")
                .with_member(MemberDescriptor::primitive("name", Primitive::Text)),
        );
    registry
}

fn config() -> StorageConfig {
    StorageConfig::new().with_default_manager(PlaceholderManager::factory())
}

#[tokio::test]
async fn managers_initialize_in_dependency_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = catalog_registry();
    LoggingManager::register(&mut registry, "catalog", "ICatalog", &log);
    LoggingManager::register(&mut registry, "authors", "Author", &log);

    let storage = start(&registry, &config(), None).await.unwrap();

    // the catalog manager references Author through Book, so authors must
    // come up first, each manager configured before it is initialized
    let entries = log.lock().unwrap().clone();
    assert_eq!(
        entries,
        vec![
            "configure:authors:1",
            "init:authors",
            "configure:catalog:3",
            "init:catalog",
        ]
    );

    // the whole hierarchy folded into the catalog manager
    let catalog = storage
        .managers()
        .iter()
        .find(|manager| manager.name == "catalog")
        .unwrap();
    for key in ["ICatalog", "CatalogItem", "Book", "Disc"] {
        assert!(catalog.owned.contains(&key), "missing {key}");
    }
}

#[tokio::test]
async fn derived_tables_are_reachable_after_start() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = catalog_registry();
    LoggingManager::register(&mut registry, "catalog", "ICatalog", &log);

    let storage = start(&registry, &config(), None).await.unwrap();

    let book = storage.table("book").unwrap();
    assert_eq!(book.parent_table.as_deref(), Some("catalog_item"));
    assert_eq!(book.columns[0].kind, ColumnKind::PrimaryKey);
    assert!(!book.columns[0].auto_increment);

    let author = book.columns.iter().find(|c| c.name == "author").unwrap();
    assert_eq!(author.foreign_key.as_ref().unwrap().table, "author");
}

#[tokio::test]
async fn root_only_managers_are_skipped() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    registry.register_type(
        TypeDescriptor::class("Note").with_member(MemberDescriptor::primitive(
            "body",
            Primitive::Text,
        )),
    );
    LoggingManager::register(&mut registry, "rooty", ROOT_TYPE, &log);
    LoggingManager::register(&mut registry, "notes", "Note", &log);

    let sink = RecordingSink::default();
    let config = config().with_trace(TraceConfig::all());
    start(&registry, &config, Some(&sink)).await.unwrap();

    let entries = log.lock().unwrap().clone();
    assert!(entries.iter().all(|entry| !entry.contains("rooty")));
    assert!(entries.contains(&"init:notes".to_string()));

    let events = sink.events.lock().unwrap().clone();
    assert!(events.iter().any(|event| matches!(
        event,
        BuildTraceEvent::ManagerOnlyRoot { name } if name == "rooty"
    )));
}

#[tokio::test]
async fn a_failing_manager_aborts_startup() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = catalog_registry();
    LoggingManager::register(&mut registry, "catalog", "ICatalog", &log);
    registry.register_manager(Arc::new(LoggingManager {
        name: "authors",
        main: "Author",
        fail_configure: true,
        log: log.clone(),
    }));

    let err = start(&registry, &config(), None).await.unwrap_err();

    match err {
        StartError::Init(InitError::Configure { manager, source }) => {
            assert_eq!(manager, "authors");
            assert!(source.message.contains("unavailable"));
        }
        other => panic!("expected configure failure, got {other}"),
    }

    // the dependent manager never came up
    let entries = log.lock().unwrap().clone();
    assert!(entries.iter().all(|entry| !entry.contains("catalog")));
}

#[test]
fn version_matches_the_workspace() {
    assert_eq!(strata::VERSION, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn restarting_yields_structurally_identical_storage() {
    async fn start_catalog() -> Storage {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = catalog_registry();
        LoggingManager::register(&mut registry, "catalog", "ICatalog", &log);
        LoggingManager::register(&mut registry, "authors", "Author", &log);
        start(&registry, &config(), None).await.unwrap()
    }

    let first = start_catalog().await;
    let second = start_catalog().await;

    assert_eq!(first.type_order(), second.type_order());
    for (a, b) in first.managers().iter().zip(second.managers()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.owned, b.owned);
        assert_eq!(
            serde_json::to_value(&a.info).unwrap(),
            serde_json::to_value(&b.info).unwrap()
        );
    }
}

#[tokio::test]
async fn root_only_diagnostic_honors_the_trace_toggles() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    registry.register_type(
        TypeDescriptor::class("Note").with_member(MemberDescriptor::primitive(
            "body",
            Primitive::Text,
        )),
    );
    LoggingManager::register(&mut registry, "rooty", ROOT_TYPE, &log);
    LoggingManager::register(&mut registry, "notes", "Note", &log);

    // all toggles off: the skip still happens, silently
    let sink = RecordingSink::default();
    start(&registry, &config(), Some(&sink)).await.unwrap();

    let events = sink.events.lock().unwrap().clone();
    assert!(events.is_empty());

    let entries = log.lock().unwrap().clone();
    assert!(entries.iter().all(|entry| !entry.contains("rooty")));
}
