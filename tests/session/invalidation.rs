//! Live cache invalidation from filesystem and editor events

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::common::*;
use layerprof::{Session, SessionEvent};

const APP: &str = "FROM base\nRUN a\nCOPY src /app\nCOPY f /x\n";
const MAIN_RS: &str = "fn main() {}\n";

/// Built session over a context with a copied file and a copied directory
struct Fixture {
    ctx: TestContext,
    session: Session,
    events: layerprof::events::CapturedEvents,
    tx: Sender<SessionEvent>,
    _rx: Receiver<SessionEvent>,
}

impl Fixture {
    fn new() -> Self {
        let ctx = TestContext::new();
        ctx.dockerfile(APP)
            .add_file("f", "hello")
            .add_file("src/main.rs", MAIN_RS)
            .add_file("src/util/mod.rs", "pub fn util() {}\n")
            .add_file("notes.txt", "not copied");

        let engine = Arc::new(FakeEngine::new());
        engine.script(FakeBuild::success(
            &["FROM base", "RUN a", "COPY src /app", "COPY f /x"],
            &[100, 20, 30, 5],
            &[Step::Done("0.00"), Step::Done("1.00"), Step::Cached, Step::Cached],
        ));
        let (mut session, events) = ctx.session(engine);
        session.build_blocking("").unwrap();

        let (tx, rx) = mpsc::channel();
        Self {
            ctx,
            session,
            events,
            tx,
            _rx: rx,
        }
    }

    fn send(&mut self, event: SessionEvent) {
        assert!(self.session.handle(event, &self.tx));
    }

    fn written(&mut self, relative: &str) {
        let path = self.ctx.join(relative);
        self.send(SessionEvent::PathWritten(path));
    }

    fn created(&mut self, relative: &str) {
        let path = self.ctx.join(relative);
        self.send(SessionEvent::PathCreated(path));
    }

    fn deleted(&mut self, relative: &str) {
        let path = self.ctx.join(relative);
        self.send(SessionEvent::PathDeleted(path));
    }
}

#[test]
fn test_dependencies_resolved_per_layer() {
    let fx = Fixture::new();
    let layers = fx.session.layers();
    assert!(layers[2].depends_on(&fx.ctx.join("src")));
    assert!(layers[2].depends_on(&fx.ctx.join("src/util/mod.rs")));
    assert!(layers[3].depends_on(&fx.ctx.join("f")));
    assert!(layers[1].dependencies.is_empty());
    assert!(!layers.iter().any(|l| l.depends_on(&fx.ctx.join("notes.txt"))));
}

#[test]
fn test_modified_file_and_revert() {
    let mut fx = Fixture::new();

    fx.ctx.add_file("src/main.rs", "fn main() { run() }\n");
    fx.written("src/main.rs");
    assert_eq!(fx.session.tracker().boundary().external_boundary, 2);
    assert_flags(&fx.session, &[false, false, true, true]);
    assert_view_in_sync(&fx.session);

    fx.ctx.add_file("src/main.rs", MAIN_RS);
    fx.written("src/main.rs");
    assert!(fx.session.tracker().ledger().is_empty());
    assert_flags(&fx.session, &[false, false, false, false]);
    assert_eq!(fx.events.of_type("invalidation_changed").len(), 2);
}

#[test]
fn test_unsaved_buffer_change() {
    let mut fx = Fixture::new();
    let f = fx.ctx.join("f");

    fx.send(SessionEvent::DocumentChanged {
        path: f.clone(),
        content: "hello, world".to_string(),
    });
    assert_flags(&fx.session, &[false, false, false, true]);

    fx.send(SessionEvent::DocumentChanged {
        path: f,
        content: "hello".to_string(),
    });
    assert_flags(&fx.session, &[false, false, false, false]);
}

#[test]
fn test_delete_then_recreate_empties_ledger() {
    let mut fx = Fixture::new();

    fx.ctx.remove_file("src/main.rs");
    fx.deleted("src/main.rs");
    assert_flags(&fx.session, &[false, false, true, true]);

    fx.ctx.add_file("src/main.rs", MAIN_RS);
    fx.created("src/main.rs");
    assert!(fx.session.tracker().ledger().is_empty());
    assert_flags(&fx.session, &[false, false, false, false]);
}

#[test]
fn test_recreated_with_other_content_stays_modified() {
    let mut fx = Fixture::new();

    fx.ctx.remove_file("src/main.rs");
    fx.deleted("src/main.rs");
    fx.ctx.add_file("src/main.rs", "fn main() { other() }\n");
    fx.created("src/main.rs");

    assert_eq!(fx.session.tracker().ledger().len(), 1);
    assert_flags(&fx.session, &[false, false, true, true]);
}

#[test]
fn test_added_file_invalidates_copied_directory() {
    let mut fx = Fixture::new();

    fx.ctx.add_file("src/new.rs", "");
    fx.created("src/new.rs");
    assert_eq!(fx.session.tracker().boundary().external_boundary, 2);

    fx.ctx.remove_file("src/new.rs");
    fx.deleted("src/new.rs");
    assert!(fx.session.tracker().ledger().is_empty());
    assert_flags(&fx.session, &[false, false, false, false]);
}

#[test]
fn test_deleted_directory_marks_everything_under_it() {
    let mut fx = Fixture::new();

    fx.ctx.remove_dir("src");
    fx.deleted("src");
    // src, src/main.rs, src/util, src/util/mod.rs
    assert_eq!(fx.session.tracker().ledger().len(), 4);
    assert_flags(&fx.session, &[false, false, true, true]);

    fx.ctx
        .add_file("src/main.rs", MAIN_RS)
        .add_file("src/util/mod.rs", "pub fn util() {}\n");
    fx.created("src");
    assert!(fx.session.tracker().ledger().is_empty());
    assert_flags(&fx.session, &[false, false, false, false]);
}

#[test]
fn test_unrelated_paths_do_not_invalidate() {
    let mut fx = Fixture::new();

    fx.ctx.add_file("notes.txt", "still not copied");
    fx.written("notes.txt");
    fx.ctx.add_file("README.md", "new");
    fx.created("README.md");

    assert_flags(&fx.session, &[false, false, false, false]);
    assert!(fx.events.of_type("invalidation_changed").is_empty());
}

#[test]
fn test_source_and_external_dimensions_combine() {
    let mut fx = Fixture::new();

    fx.ctx.add_file("src/main.rs", "fn main() { run() }\n");
    fx.written("src/main.rs");
    fx.send(edit(3, 3, "y", "FROM base\nRUN a\nCOPY src /app\nCOPY f /y\n"));

    let boundary = fx.session.tracker().boundary();
    assert_eq!(boundary.external_boundary, 2);
    assert_eq!(boundary.source_boundary, 3);
    assert_flags(&fx.session, &[false, false, true, true]);

    // Reverting the file leaves the source dimension in place
    fx.ctx.add_file("src/main.rs", MAIN_RS);
    fx.written("src/main.rs");
    assert_flags(&fx.session, &[false, false, false, true]);
    assert_view_in_sync(&fx.session);
}

#[test]
fn test_edits_ignored_while_source_not_focused() {
    let mut fx = Fixture::new();

    fx.send(SessionEvent::FocusChanged {
        source_active: false,
    });
    fx.send(edit(1, 1, "b", "FROM base\nRUN ab\nCOPY src /app\nCOPY f /x\n"));
    assert_flags(&fx.session, &[false, false, false, false]);

    fx.send(SessionEvent::FocusChanged { source_active: true });
    fx.send(edit(1, 1, "c", "FROM base\nRUN abc\nCOPY src /app\nCOPY f /x\n"));
    assert_flags(&fx.session, &[false, true, true, true]);
}
