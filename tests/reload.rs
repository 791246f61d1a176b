use std::fs;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use proptree::{
    ConfigHandle, ConfigService, PropertySource, ReloadState, Resource, ServiceOptions,
    StringResource,
};
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio::time::sleep;

fn service() -> ConfigService {
    ConfigService::builder()
        .options(ServiceOptions::default())
        .build()
        .unwrap()
}

fn source(name: &str, port: i32) -> String {
    format!("name = \"{name}\"\n[reload]\ncheck-every = \"10s\"\n[elements]\nport = {port}\n")
}

fn port(handle: &ConfigHandle) -> Option<i32> {
    handle.integer("port").unwrap()
}

/// Rewrite a file and push its modification time forward so the change is
/// visible regardless of timestamp granularity.
fn rewrite(path: &FsPath, content: &str, bump_secs: u64) {
    fs::write(path, content).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn string_resource_changes_are_picked_up() {
    let service = service();
    let resource = Arc::new(StringResource::new(&source("app", 1)));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();
    assert_eq!(service.reload_state(&app).await.unwrap(), Some(ReloadState::Active));

    resource.set_content(&source("app", 2));
    sleep(Duration::from_secs(5)).await;
    assert_eq!(port(&app), Some(1));
    sleep(Duration::from_secs(6)).await;
    assert_eq!(port(&app), Some(2));

    // Lookups by name return the same live handle.
    let by_name = service.configuration("app").unwrap();
    assert_eq!(port(&by_name), Some(2));
}

/// A string resource whose next read can be held open until released.
#[derive(Debug)]
struct HeldResource {
    inner: StringResource,
    hold: AtomicBool,
    entered: Notify,
    release: Mutex<mpsc::Receiver<()>>,
}

impl HeldResource {
    fn new(content: &str) -> (Arc<Self>, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel();
        let resource = Arc::new(Self {
            inner: StringResource::new(content),
            hold: AtomicBool::new(false),
            entered: Notify::new(),
            release: Mutex::new(gate),
        });
        (resource, release)
    }
}

impl Resource for HeldResource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self) -> proptree::error::Result<String> {
        let content = self.inner.read();
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            let _ = self.release.lock().recv();
        }
        content
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn is_changed(&self) -> bool {
        self.inner.is_changed()
    }

    fn reload(&self) -> bool {
        self.inner.reload()
    }
}

#[tokio::test(start_paused = true)]
async fn change_read_across_a_suspend_is_applied_on_resume() {
    let service = service();
    let (resource, release) = HeldResource::new(&source("app", 1));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();

    resource.inner.set_content(&source("app", 2));
    resource.hold.store(true, Ordering::SeqCst);
    resource.entered.notified().await;

    // The read has consumed the change but not delivered it yet.
    assert!(service.suspend(&app).await.unwrap());
    release.send(()).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(!resource.is_changed());
    assert_eq!(port(&app), Some(1));

    assert!(service.resume(&app).await.unwrap());
    assert_eq!(port(&app), Some(2));
}

#[tokio::test(start_paused = true)]
async fn change_read_across_an_unload_is_not_applied() {
    let service = service();
    let (resource, release) = HeldResource::new(&source("app", 1));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();

    resource.inner.set_content(&source("app", 2));
    resource.hold.store(true, Ordering::SeqCst);
    resource.entered.notified().await;

    assert!(service.unload(&app));
    release.send(()).unwrap();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(port(&app), Some(1));
}

#[tokio::test(start_paused = true)]
async fn snapshot_taken_before_a_swap_is_unchanged() {
    let service = service();
    let resource = Arc::new(StringResource::new(&source("app", 1)));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();
    let before = app.current();

    resource.set_content(&source("app", 2));
    sleep(Duration::from_secs(11)).await;
    assert_eq!(before.integer("port").unwrap(), Some(1));
    assert_eq!(app.current().integer("port").unwrap(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn suspend_and_resume_through_the_service() {
    let service = service();
    let first = Arc::new(StringResource::new(&source("first", 1)));
    let second = Arc::new(StringResource::new(&source("second", 10)));
    let a = service
        .load_resource(Arc::clone(&first) as Arc<dyn Resource>)
        .unwrap();
    let b = service
        .load_resource(Arc::clone(&second) as Arc<dyn Resource>)
        .unwrap();

    assert!(service.suspend(&a).await.unwrap());
    assert_eq!(service.reload_state(&a).await.unwrap(), Some(ReloadState::Suspended));
    first.set_content(&source("first", 2));
    second.set_content(&source("second", 11));
    sleep(Duration::from_secs(25)).await;
    assert_eq!(port(&a), Some(1));
    assert_eq!(port(&b), Some(11));

    assert!(service.resume(&a).await.unwrap());
    sleep(Duration::from_secs(11)).await;
    assert_eq!(port(&a), Some(2));

    assert_eq!(service.suspend_all().await.unwrap(), 2);
    first.set_content(&source("first", 3));
    sleep(Duration::from_secs(25)).await;
    assert_eq!(port(&a), Some(2));
    assert_eq!(service.resume_all().await.unwrap(), 2);
    sleep(Duration::from_secs(11)).await;
    assert_eq!(port(&a), Some(3));
}

#[tokio::test(start_paused = true)]
async fn unloaded_configurations_stop_reloading() {
    let service = service();
    let resource = Arc::new(StringResource::new(&source("app", 1)));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();
    assert!(service.unload(&app));
    assert_eq!(service.reload_state(&app).await.unwrap(), None);

    resource.set_content(&source("app", 2));
    sleep(Duration::from_secs(30)).await;
    assert_eq!(port(&app), Some(1));
}

#[tokio::test(start_paused = true)]
async fn file_reload_rereads_includes() {
    let dir = TempDir::new().unwrap();
    let shared = dir.path().join("shared.toml");
    let app_path = dir.path().join("app.toml");
    fs::write(&shared, "name = \"shared\"\n[elements]\nregion = \"eu\"\n").unwrap();
    let app_source = |port: i32| {
        format!(
            "name = \"app\"\ninclude = [\"file:{}\"]\n[reload]\ncheck-every = \"10s\"\n[elements]\nport = {port}\n",
            shared.display()
        )
    };
    fs::write(&app_path, app_source(1)).unwrap();

    let service = service();
    let app = service
        .load(&format!("file:{}", app_path.display()))
        .unwrap();
    assert_eq!(app.string("region").unwrap().as_deref(), Some("eu"));

    rewrite(&shared, "name = \"shared\"\n[elements]\nregion = \"us\"\n", 10);
    rewrite(&app_path, &app_source(2), 10);
    sleep(Duration::from_secs(11)).await;
    assert_eq!(port(&app), Some(2));
    assert_eq!(app.string("region").unwrap().as_deref(), Some("us"));
}

#[tokio::test(start_paused = true)]
async fn broken_file_keeps_the_previous_configuration() {
    let dir = TempDir::new().unwrap();
    let app_path = dir.path().join("app.toml");
    fs::write(&app_path, source("app", 1)).unwrap();

    let service = service();
    let app = service
        .load(&format!("file:{}", app_path.display()))
        .unwrap();

    rewrite(&app_path, "name = \"app\"\n[elements]\nport = ", 10);
    sleep(Duration::from_secs(11)).await;
    assert_eq!(port(&app), Some(1));

    rewrite(&app_path, &source("app", 5), 20);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(port(&app), Some(5));

    fs::remove_file(&app_path).unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(port(&app), Some(5));
    assert_eq!(service.reload_state(&app).await.unwrap(), Some(ReloadState::Active));
}

#[tokio::test(start_paused = true)]
async fn minimum_interval_applies_to_every_configuration() {
    let service = ConfigService::builder()
        .options(ServiceOptions {
            min_check_every_secs: 60,
            ..ServiceOptions::default()
        })
        .build()
        .unwrap();
    let resource = Arc::new(StringResource::new(&source("app", 1)));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();

    resource.set_content(&source("app", 2));
    sleep(Duration::from_secs(30)).await;
    assert_eq!(port(&app), Some(1));
    sleep(Duration::from_secs(31)).await;
    assert_eq!(port(&app), Some(2));
}

#[tokio::test(start_paused = true)]
async fn destroy_stops_reloading() {
    let service = service();
    let resource = Arc::new(StringResource::new(&source("app", 1)));
    let app = service
        .load_resource(Arc::clone(&resource) as Arc<dyn Resource>)
        .unwrap();
    service.destroy().await.unwrap();

    resource.set_content(&source("app", 2));
    sleep(Duration::from_secs(30)).await;
    assert_eq!(port(&app), Some(1));
    assert!(service.suspend(&app).await.is_err());
}
