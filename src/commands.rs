//! CLI command implementations

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use topodelta_core::{CONFIG_FILE, ProjectId, Topology, TrackingConfig, TrackingSession};
use topodelta_store::{
    Diagram, EditEvent, FileRepository, Repository, SaveCoordinator, SaveOutcome, SharedDiagram,
    parse_journal,
};

pub async fn replay(
    store: PathBuf,
    project: ProjectId,
    journal: PathBuf,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config_path = config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = TrackingConfig::load(&config_path)?;

    let text = tokio::fs::read_to_string(&journal)
        .await
        .with_context(|| format!("failed to read journal {}", journal.display()))?;
    let events = parse_journal(&text)?;
    tracing::info!("Replaying {} events into project {}", events.len(), project);

    let repository = Arc::new(FileRepository::new(store));
    let mut session = TrackingSession::new(&config);
    session.set_project_id(project);

    let diagram = match repository.load(project).await? {
        Some(stored) => {
            if stored
                .transient_fields_version
                .is_some_and(|v| v != config.transient_fields.version)
            {
                tracing::warn!(
                    "Stored snapshot uses transient fields v{:?}, config has v{}",
                    stored.transient_fields_version,
                    config.transient_fields.version
                );
            }
            tracing::info!(
                "Resuming project {} at sequence {} ({} nodes, {} edges)",
                project,
                stored.sequence,
                stored.nodes.len(),
                stored.edges.len()
            );
            session.initialize_from(stored.nodes.clone(), stored.edges.clone(), stored.sequence);
            Diagram::from_parts(stored.nodes, stored.edges)
        }
        None => {
            session.initialize(Vec::new(), Vec::new());
            Diagram::new()
        }
    };

    let session = Arc::new(Mutex::new(session));
    let diagram = SharedDiagram::new(diagram);
    let coordinator = SaveCoordinator::new(
        Arc::clone(&session),
        Arc::clone(&repository),
        Arc::new(diagram.clone()),
    );

    for event in &events {
        if *event == EditEvent::Save {
            report(coordinator.save_now().await?);
        } else {
            let mut session = session.lock().await;
            diagram.apply(event, &mut session);
        }
    }
    report(coordinator.save_now().await?);

    let stats = session.lock().await.stats();
    let state = diagram.snapshot();
    println!(
        "Project {}: {} nodes, {} edges, next sequence {}",
        project,
        state.node_count(),
        state.edge_count(),
        stats.sequence
    );
    Ok(())
}

fn report(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Skipped => tracing::debug!("Nothing to save"),
        SaveOutcome::Delta {
            sequence,
            cleared,
            retained,
        } => tracing::info!(
            "Saved delta {} ({} changes, {} retained)",
            sequence,
            cleared,
            retained
        ),
        SaveOutcome::Full {
            sequence,
            reason,
            nodes,
            edges,
        } => tracing::info!(
            "Saved snapshot {} ({} nodes, {} edges): {}",
            sequence,
            nodes,
            edges,
            reason
        ),
    }
}

pub async fn inspect(store: PathBuf, project: ProjectId) -> anyhow::Result<()> {
    let repository = FileRepository::new(store);
    let Some(stored) = repository.load(project).await? else {
        println!("No stored state for project {}", project);
        return Ok(());
    };

    let config = TrackingConfig::load(Path::new(CONFIG_FILE))?;
    println!("Project:       {}", stored.project_id);
    println!("Sequence:      {}", stored.sequence);
    println!("Nodes:         {}", stored.nodes.len());
    println!("Edges:         {}", stored.edges.len());
    println!("Deltas:        {}", stored.deltas_applied);
    println!("State hash:    {}", stored.state_hash(&config.transient_fields));

    let report = Topology::build(&stored.nodes, &stored.edges).report();
    println!("Nesting depth: {}", report.max_depth);
    if report.is_clean() {
        println!("Nesting:       clean");
        return Ok(());
    }
    for id in &report.cyclic {
        println!("  cycle through {}", id);
    }
    for (child, parent) in &report.dangling_parents {
        println!("  {} has missing parent {}", child, parent);
    }
    for (child, parent) in &report.non_boundary_parents {
        println!("  {} is nested in non-boundary {}", child, parent);
    }
    for id in &report.dangling_edges {
        println!("  edge {} has a missing endpoint", id);
    }
    Ok(())
}

pub async fn clear(store: PathBuf, project: ProjectId) -> anyhow::Result<()> {
    tracing::info!("Clearing stored state for project {}", project);
    FileRepository::new(store).clear(project).await?;
    tracing::info!("Project {} cleared", project);
    Ok(())
}
