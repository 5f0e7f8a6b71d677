//! Integration tests for Topodelta
//!
//! These tests drive the tracking session, save coordinator and file
//! repository together, and the CLI binary end to end.

use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Mutex;

use topodelta_core::{Edge, Node, TrackingConfig, TrackingSession, state_hash};
use topodelta_store::{
    Diagram, EditEvent, FileRepository, Repository, SaveCoordinator, SaveOutcome, SharedDiagram,
};

struct Editor {
    session: Arc<Mutex<TrackingSession>>,
    diagram: SharedDiagram,
    coordinator: SaveCoordinator<FileRepository, SharedDiagram>,
}

impl Editor {
    async fn open(store: &TempDir, project: i64) -> Self {
        let repository = Arc::new(FileRepository::new(store.path()));
        let mut session = TrackingSession::new(&TrackingConfig::default());
        session.set_project_id(project);

        let diagram = match repository.load(project).await.unwrap() {
            Some(stored) => {
                session.initialize_from(stored.nodes.clone(), stored.edges.clone(), stored.sequence);
                Diagram::from_parts(stored.nodes, stored.edges)
            }
            None => {
                session.initialize(vec![], vec![]);
                Diagram::new()
            }
        };

        let session = Arc::new(Mutex::new(session));
        let diagram = SharedDiagram::new(diagram);
        let coordinator =
            SaveCoordinator::new(Arc::clone(&session), repository, Arc::new(diagram.clone()));
        Editor {
            session,
            diagram,
            coordinator,
        }
    }

    async fn edit(&self, event: EditEvent) {
        let mut session = self.session.lock().await;
        self.diagram.apply(&event, &mut session);
    }
}

#[tokio::test]
async fn test_edits_survive_store_and_load() {
    let store = TempDir::new().unwrap();
    let editor = Editor::open(&store, 1).await;

    editor
        .edit(EditEvent::AddNode { node: Node::boundary("dmz", 0.0, 0.0) })
        .await;
    editor
        .edit(EditEvent::AddNode { node: Node::device("fw", 5.0, 5.0).with_parent("dmz") })
        .await;
    editor
        .edit(EditEvent::AddNode { node: Node::device("web", 80.0, 5.0) })
        .await;
    editor
        .edit(EditEvent::AddEdge { edge: Edge::new("fw-web", "fw", "web") })
        .await;

    let first = editor.coordinator.save_now().await.unwrap();
    assert!(matches!(first, SaveOutcome::Full { sequence: 0, nodes: 3, edges: 1, .. }));

    let moved = Node::device("fw", 40.0, 5.0).with_parent("dmz");
    editor.edit(EditEvent::UpdateNode { node: moved }).await;
    // Hover state alone is not a change.
    editor
        .edit(EditEvent::UpdateNode {
            node: Node::device("web", 80.0, 5.0).with_data("isHovered", true),
        })
        .await;
    let second = editor.coordinator.save_now().await.unwrap();
    assert_eq!(second, SaveOutcome::Delta { sequence: 1, cleared: 1, retained: 0 });

    editor.edit(EditEvent::RemoveNode { id: "web".into() }).await;
    let third = editor.coordinator.save_now().await.unwrap();
    assert_eq!(third, SaveOutcome::Delta { sequence: 2, cleared: 2, retained: 0 });

    let stored = FileRepository::new(store.path()).load(1).await.unwrap().unwrap();
    let live = editor.diagram.snapshot();
    let transient = TrackingConfig::default().transient_fields;

    assert_eq!(stored.sequence, 2);
    assert_eq!(stored.deltas_applied, 2);
    assert_eq!(stored.nodes.len(), 2);
    assert!(stored.edges.is_empty());
    assert_eq!(
        stored.state_hash(&transient),
        state_hash(&live.nodes(), &live.edges(), &transient)
    );
}

#[tokio::test]
async fn test_reopened_project_continues_sequence() {
    let store = TempDir::new().unwrap();
    {
        let editor = Editor::open(&store, 7).await;
        editor
            .edit(EditEvent::AddNode { node: Node::device("a", 0.0, 0.0) })
            .await;
        editor.coordinator.save_now().await.unwrap();
        editor
            .edit(EditEvent::AddNode { node: Node::device("b", 1.0, 0.0) })
            .await;
        editor.coordinator.save_now().await.unwrap();
    }

    let editor = Editor::open(&store, 7).await;
    assert_eq!(editor.session.lock().await.sequence(), 2);

    editor
        .edit(EditEvent::AddEdge { edge: Edge::new("ab", "a", "b") })
        .await;
    let outcome = editor.coordinator.save_now().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Delta { sequence: 2, cleared: 1, retained: 0 });

    let stored = FileRepository::new(store.path()).load(7).await.unwrap().unwrap();
    assert_eq!(stored.nodes.len(), 2);
    assert_eq!(stored.edges, vec![Edge::new("ab", "a", "b")]);
}

#[tokio::test]
async fn test_separate_projects_do_not_mix() {
    let store = TempDir::new().unwrap();
    let first = Editor::open(&store, 1).await;
    let second = Editor::open(&store, 2).await;

    first
        .edit(EditEvent::AddNode { node: Node::device("only-in-1", 0.0, 0.0) })
        .await;
    first.coordinator.save_now().await.unwrap();
    second.coordinator.save_now().await.unwrap();

    let repository = FileRepository::new(store.path());
    assert_eq!(repository.load(1).await.unwrap().unwrap().nodes.len(), 1);
    assert!(repository.load(2).await.unwrap().unwrap().nodes.is_empty());
}

const JOURNAL: &str = r#"# two devices behind a firewall zone
{"op":"addNode","node":{"id":"zone","type":"boundary","position":{"x":0,"y":0},"dimensions":{"width":400,"height":300}}}
{"op":"addNode","node":{"id":"fw","type":"device","position":{"x":20,"y":20},"parentId":"zone"}}
{"op":"addNode","node":{"id":"db","type":"device","position":{"x":500,"y":20}}}
{"op":"addEdge","edge":{"id":"fw-db","source":"fw","target":"db"}}
{"op":"save"}
{"op":"updateNode","node":{"id":"db","type":"device","position":{"x":520,"y":20},"data":{"label":"Primary DB"}}}
"#;

fn topodelta(workdir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_topodelta"))
        .args(args)
        .current_dir(workdir.path())
        .output()
        .expect("Failed to execute topodelta")
}

#[test]
fn test_cli_replay_then_inspect() {
    let workdir = TempDir::new().unwrap();
    std::fs::write(workdir.path().join("edits.jsonl"), JOURNAL).unwrap();

    let replay = topodelta(&workdir, &["replay", "--project", "3", "--journal", "edits.jsonl"]);
    assert!(replay.status.success(), "{}", String::from_utf8_lossy(&replay.stderr));
    let snapshot: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(workdir.path().join(".topodelta/3/snapshot.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot["projectId"], 3);
    assert_eq!(snapshot["sequence"], 0);
    assert_eq!(snapshot["transientFieldsVersion"], 1);
    assert_eq!(snapshot["nodes"].as_array().map(Vec::len), Some(3));
    assert_eq!(snapshot["stateHash"].as_str().map(str::len), Some(64));
    assert!(
        workdir
            .path()
            .join(".topodelta/3/deltas/00000001.json")
            .exists()
    );

    let inspect = topodelta(&workdir, &["inspect", "--project", "3"]);
    let stdout = String::from_utf8_lossy(&inspect.stdout);
    assert!(inspect.status.success());
    assert!(stdout.contains("Sequence:      1"));
    assert!(stdout.contains("Nodes:         3"));
    assert!(stdout.contains("Edges:         1"));
    assert!(stdout.contains("Nesting:       clean"));

    let clear = topodelta(&workdir, &["clear", "--project", "3"]);
    assert!(clear.status.success());
    let inspect = topodelta(&workdir, &["inspect", "--project", "3"]);
    assert!(String::from_utf8_lossy(&inspect.stdout).contains("No stored state"));
}

#[test]
fn test_cli_version() {
    let workdir = TempDir::new().unwrap();
    let output = topodelta(&workdir, &["version"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Topodelta v"));
}
