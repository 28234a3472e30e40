//! Contract Invariant Tests
//!
//! These tests verify the guarantees the rest of the pipeline builds on.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use cg3_core::{
    providers::{attach, MemoryTable, TableRow},
    publish::{RunState, SceneGraph, SceneNode},
    Action, Asset, AssetContext, AssetCreator, AssetProvider, EventBus, FilesystemProvider,
    FixtureProvider, Playlist, ProjectSettings, PublishError, Publisher, Stage, StageRegistry,
    StageReport, TabularProvider, UserSettings, VersionSelector,
};

fn context_at(root: &Path) -> Arc<AssetContext> {
    let user = UserSettings {
        local_project_location: root.to_path_buf(),
        username: "jo".to_string(),
        project_settings: None,
    };
    AssetContext::new(&ProjectSettings::default(), &user).unwrap()
}

fn default_context() -> Arc<AssetContext> {
    AssetContext::new(&ProjectSettings::default(), &UserSettings::default()).unwrap()
}

#[test]
fn invariant_new_version_counts_from_one() {
    let mut asset = Asset::new("char", "bob", "ma", default_context());
    for expected in 1..=5 {
        assert_eq!(asset.new_version("rig", "jo").unwrap().number, expected);
    }
    // departments are independent
    assert_eq!(asset.new_version("model", "jo").unwrap().number, 1);
    assert_eq!(asset.new_version("rig", "jo").unwrap().number, 6);
}

#[test]
fn invariant_latest_is_numeric_maximum() {
    let mut asset = Asset::reconciled("char", "bob", "ma", default_context());
    for number in [3, 10, 1, 9, 2] {
        asset.add_version_scene("model", "jo", number, None).unwrap();
    }
    assert_eq!(asset.latest("model").unwrap().number, 10);

    let latest = asset
        .get_version("model", VersionSelector::Latest)
        .unwrap()
        .unwrap();
    assert!(latest.to_string_lossy().contains("bob_model_v0010_jo.ma"));

    // missing versions are an answer, not an error
    assert!(asset
        .get_version("model", VersionSelector::Number(4))
        .unwrap()
        .is_none());
    assert!(asset.get_version("lookdev", VersionSelector::Latest).unwrap().is_none());
}

/// A stage that records whether it ran and optionally fails its check.
struct Recorder {
    name: &'static str,
    action: Action,
    fails: bool,
    ran: Rc<Cell<bool>>,
    state: RunState,
}

impl Recorder {
    fn new(name: &'static str, action: Action, fails: bool) -> (Self, Rc<Cell<bool>>) {
        let ran = Rc::new(Cell::new(false));
        let recorder = Self {
            name,
            action,
            fails,
            ran: ran.clone(),
            state: RunState::default(),
        };
        (recorder, ran)
    }
}

impl Stage for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn label(&self) -> &'static str {
        self.name
    }

    fn action(&self) -> Action {
        self.action
    }

    fn state(&self) -> &RunState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RunState {
        &mut self.state
    }

    fn collect(&mut self, _scene: &SceneGraph) -> Result<Vec<SceneNode>, PublishError> {
        self.ran.set(true);
        if self.action == Action::Collect {
            return Ok(vec![SceneNode::transform("body_geo")]);
        }
        Ok(vec![])
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        if self.fails {
            self.state.fail(format!("{} items rejected", items.len()));
        }
        Ok(())
    }
}

#[test]
fn invariant_stop_on_failed_skips_remaining_stages() {
    let (collect_a, ran_a) = Recorder::new("CollectA", Action::Collect, false);
    let (check_b, ran_b) = Recorder::new("CheckB", Action::Check, true);
    let (check_c, ran_c) = Recorder::new("CheckC", Action::Check, false);

    let mut registry = StageRegistry::new();
    registry.register(Box::new(collect_a));
    registry.register(Box::new(check_b));
    registry.register(Box::new(check_c));

    let reported = Rc::new(RefCell::new(Vec::<StageReport>::new()));
    let sink = reported.clone();
    let mut publisher = Publisher::new(registry).with_reporters(vec![]);
    publisher.add_reporter(move |r| sink.borrow_mut().push(r.clone()));

    let playlist: Playlist = ["CollectA", "CheckB", "CheckC"].into_iter().collect();
    let report = publisher.publish(&playlist, &SceneGraph::default()).unwrap();

    assert!(ran_a.get());
    assert!(ran_b.get());
    assert!(!ran_c.get());
    assert_eq!(reported.borrow().len(), 2);
    assert!(reported.borrow()[1].failed);
    assert_eq!(report.item_count, 1);
    assert!(!report.passed());
}

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

#[test]
fn invariant_filesystem_scan_matches_only_template_paths() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "char/bob/model/versions/bob_model_v0001_jo.ma");
    touch(root, "char/bob/model/versions/bob_model_v0002_al.ma");
    touch(root, "char/bob/rig/versions/bob_rig_v0001_jo.ma");
    touch(root, "prop/cup/model/versions/cup_model_v0003_jo.ma");
    // near misses
    touch(root, "char/bob/model/versions/bob_model_v0003.ma");
    touch(root, "char/bob/model/versions/bob_model_vXX_jo.ma");
    touch(root, "char/bob/model/versions/lisa_model_v0001_jo.ma");
    touch(root, "char/bob/model/release/bob_model.ma");
    touch(root, "notes.txt");

    let mut provider = FilesystemProvider::new(context_at(root)).unwrap();
    let summary = provider.scan().unwrap();
    assert_eq!(summary.scanned, 9);
    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.matched, 4);

    let names: Vec<_> = provider.list_assets().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["bob", "cup"]);

    let bob = provider.get("bob").unwrap();
    assert_eq!(bob.kind, "char");
    assert_eq!(bob.versions("model").unwrap().len(), 2);
    assert_eq!(bob.versions("rig").unwrap().len(), 1);
    assert_eq!(bob.latest("model").unwrap().user, "al");
    assert_eq!(provider.get("cup").unwrap().latest("model").unwrap().number, 3);
}

#[test]
fn invariant_table_rows_build_assets() {
    let table = MemoryTable::new(vec![
        TableRow::from(["bob", "char", "ma", "", "", "", "", ""]),
        TableRow::from(["bob", "", "", "model", "1", "jo", "1000", ""]),
    ]);
    let provider = TabularProvider::open(default_context(), table).unwrap();

    let assets = provider.list_assets();
    assert_eq!(assets.len(), 1);
    let bob = assets[0];
    assert_eq!(bob.name, "bob");
    assert_eq!(bob.kind, "char");
    assert_eq!(bob.departments(), vec!["model"]);

    let versions = bob.versions("model").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].number, 1);
    assert_eq!(versions[0].user, "jo");
    assert_eq!(versions[0].timestamp, Some(1000));
}

#[test]
fn invariant_created_asset_reaches_provider_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_at(dir.path());
    let provider = Rc::new(RefCell::new(FixtureProvider::empty(ctx.clone())));
    let bus = EventBus::new();
    attach(&bus, provider.clone());

    let creator = AssetCreator::new(ctx.clone());
    let mut asset = creator
        .create(&*provider, &bus, "prop", "cup")
        .unwrap()
        .unwrap();
    let (_, v2) = creator.new_version(&mut asset, "model").unwrap();
    fs::write(&v2, "cup v2").unwrap();

    // a fresh scan finds exactly what the creator wrote
    let mut scanned = FilesystemProvider::new(ctx).unwrap();
    scanned.scan().unwrap();
    let cup = scanned.get("cup").unwrap();
    assert_eq!(cup.latest("model").unwrap().number, 2);
    assert!(provider.borrow().get("cup").is_some());
}

#[test]
fn invariant_demo_documents_load() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let project = ProjectSettings::load(&demos.join("project.json")).unwrap();
    assert_eq!(project.start_dep("seq"), "layout");
    let user = UserSettings::load(&demos.join("user.json")).unwrap();
    assert_eq!(user.username, "jo");
    AssetContext::new(&project, &user).unwrap();

    let table = TabularProvider::open(default_context(), cg3_core::providers::JsonTable::new(demos.join("table.json"))).unwrap();
    assert_eq!(table.get("bob").unwrap().latest("model").unwrap().user, "al");

    let scene = SceneGraph::load(&demos.join("scene.json")).unwrap();
    let mut playlist = Playlist::load(&demos.join("playlist.json")).unwrap();
    let out = tempfile::tempdir().unwrap();
    for entry in &mut playlist.stages {
        if entry.name == "ExportItemManifest" {
            entry
                .parameters
                .insert("path".into(), out.path().join("manifest.json").to_string_lossy().into());
        }
    }

    let mut publisher = Publisher::default().with_reporters(vec![]);
    let report = publisher.publish(&playlist, &scene).unwrap();
    // history is tolerated, the moved leg is not
    assert_eq!(report.outcome, cg3_core::PipelineState::Aborted);
    assert_eq!(report.stages.len(), 6);
    assert_eq!(report.stages.last().unwrap().name, "CheckFreezedTransforms");
    assert_eq!(report.item_count, 3);
}
