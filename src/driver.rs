//! Checkpoint driver mirroring host lifecycle callbacks.
//!
//! The driver decides *when* snapshots are taken; the tracer decides *how*.
//! Each lifecycle callback of a component maps to one snapshot labelled
//! `"<component>-<suffix>"`, e.g. `MainScreen-OnResume`.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collector::source::MetricsSource;
use crate::storage::model::{SessionResult, Snapshot};
use crate::tracer::{TraceError, Tracer};

/// Lifecycle transition of a host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The application itself was created. Labelled with the package name.
    AppCreate,
    Create,
    PostCreate,
    Start,
    Restart,
    Resume,
    Pause,
    Stop,
    Destroy,
    NewIntent,
    SaveInstanceState,
    RestoreInstanceState,
    UserLeaving,
}

impl LifecycleEvent {
    /// Label suffix for this event.
    pub fn suffix(self) -> &'static str {
        match self {
            LifecycleEvent::AppCreate => "OnAppCreate",
            LifecycleEvent::Create => "OnCreate",
            LifecycleEvent::PostCreate => "OnPostCreate",
            LifecycleEvent::Start => "OnStart",
            LifecycleEvent::Restart => "OnRestart",
            LifecycleEvent::Resume => "OnResume",
            LifecycleEvent::Pause => "OnPause",
            LifecycleEvent::Stop => "OnStop",
            LifecycleEvent::Destroy => "OnDestroy",
            LifecycleEvent::NewIntent => "OnNewIntent",
            LifecycleEvent::SaveInstanceState => "OnSaveInstanceState",
            LifecycleEvent::RestoreInstanceState => "OnRestoreInstanceState",
            LifecycleEvent::UserLeaving => "OnUserLeaving",
        }
    }

    /// Snapshot label for `component` going through this event.
    pub fn label(self, component: &str) -> String {
        format!("{}-{}", component, self.suffix())
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Forwards host lifecycle callbacks to a shared `Tracer`.
///
/// A whole instrumentation run is one tracing session: it starts in
/// `on_instrumentation_create` and ends in `on_instrumentation_destroy`.
pub struct CheckpointDriver<S: MetricsSource> {
    tracer: Arc<Tracer<S>>,
    debug: bool,
}

impl<S: MetricsSource> CheckpointDriver<S> {
    pub fn new(tracer: Arc<Tracer<S>>) -> Self {
        Self {
            tracer,
            debug: false,
        }
    }

    /// Logs every snapshot at debug level when enabled.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn tracer(&self) -> &Arc<Tracer<S>> {
        &self.tracer
    }

    /// Starts the session, labelled with the instrumented package name.
    ///
    /// Writer failures are logged; only metric failures are returned.
    pub fn on_instrumentation_create(&self, package: &str) -> Result<(), TraceError> {
        debug!(package, "instrumentation created");
        let result = self.tracer.start_tracing(package);
        self.log_sink_errors();
        result
    }

    /// Takes the snapshot for one lifecycle callback.
    pub fn on_event(&self, component: &str, event: LifecycleEvent) -> Result<Snapshot, TraceError> {
        let label = event.label(component);
        let result = self.tracer.add_snapshot(&label);
        self.log_sink_errors();
        let snapshot = result?;
        if self.debug {
            debug!("[{}] {}", label, snapshot);
        }
        Ok(snapshot)
    }

    /// Ends the session.
    pub fn on_instrumentation_destroy(&self) -> Result<Option<SessionResult>, TraceError> {
        if self.debug {
            debug!("instrumentation destroyed");
        }
        let result = self.tracer.stop_tracing();
        self.log_sink_errors();
        result
    }

    fn log_sink_errors(&self) {
        for e in self.tracer.take_sink_errors() {
            warn!("Trace writer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{RecordingWriter, StubSource, TraceEvent};

    fn driver() -> (CheckpointDriver<StubSource>, RecordingWriter) {
        let writer = RecordingWriter::new();
        let tracer = Tracer::new(StubSource::new()).with_writer(writer.clone());
        (
            CheckpointDriver::new(Arc::new(tracer)).with_debug(true),
            writer,
        )
    }

    #[test]
    fn test_event_labels() {
        assert_eq!(LifecycleEvent::Create.label("Main"), "Main-OnCreate");
        assert_eq!(
            LifecycleEvent::AppCreate.label("org.example.app"),
            "org.example.app-OnAppCreate"
        );
        assert_eq!(
            LifecycleEvent::RestoreInstanceState.to_string(),
            "OnRestoreInstanceState"
        );
    }

    #[test]
    fn test_instrumentation_run() {
        let (driver, writer) = driver();
        driver.on_instrumentation_create("org.example.app").unwrap();
        driver
            .on_event("org.example.app", LifecycleEvent::AppCreate)
            .unwrap();
        driver.on_event("Main", LifecycleEvent::Create).unwrap();
        driver.on_event("Main", LifecycleEvent::Resume).unwrap();
        let result = driver.on_instrumentation_destroy().unwrap().unwrap();

        assert_eq!(result.label, "org.example.app");
        assert_eq!(
            result.labels().collect::<Vec<_>>(),
            vec!["org.example.app-OnAppCreate", "Main-OnCreate", "Main-OnResume"]
        );
        assert_eq!(writer.events().len(), 5);
        assert!(matches!(writer.events().last(), Some(TraceEvent::Stop(_))));
    }

    #[test]
    fn test_events_outside_session_still_snapshot() {
        let (driver, writer) = driver();
        let snapshot = driver.on_event("Main", LifecycleEvent::Pause).unwrap();
        assert_eq!(snapshot.label(), "Main-OnPause");
        assert_eq!(writer.snapshot_labels(), vec!["Main-OnPause"]);
        assert!(driver.on_instrumentation_destroy().unwrap().is_none());
    }

    #[test]
    fn test_writer_failure_does_not_stop_instrumentation() {
        let (driver, writer) = driver();
        writer.fail_start(true);
        driver.on_instrumentation_create("pkg").unwrap();
        assert!(driver.tracer().is_running());

        driver.on_event("Main", LifecycleEvent::Create).unwrap();
        // Errors were drained and logged by the driver.
        assert!(driver.tracer().take_sink_errors().is_empty());
        assert!(driver.on_instrumentation_destroy().unwrap().is_some());
    }

    #[test]
    fn test_shared_tracer() {
        let (driver, _writer) = driver();
        let other = CheckpointDriver::new(Arc::clone(driver.tracer()));
        driver.on_instrumentation_create("pkg").unwrap();
        other.on_event("Second", LifecycleEvent::Start).unwrap();
        let result = driver.on_instrumentation_destroy().unwrap().unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["Second-OnStart"]);
    }
}
