//! End-to-end usage: analyze a workflow file, match it against a local
//! models directory, and print what's missing with its best catalog hit.

use resolver_core::{Config, Core};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let models_root = args
        .next()
        .unwrap_or_else(|| "./example-models".to_string());
    let workflow_path = args
        .next()
        .unwrap_or_else(|| "./workflow.json".to_string());

    let models_root = std::fs::canonicalize(&models_root)
        .unwrap_or_else(|_| std::path::PathBuf::from(&models_root));
    let config = Config::new(models_root)?;
    let core = Core::new(config)?;

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&workflow_path)?)?;

    let plan = core.plan(&document).await?;
    if plan.is_empty() {
        println!("every artifact is already present locally");
        return Ok(());
    }

    for candidate in &plan {
        println!(
            "{} ({:?}) - rating {}/5",
            candidate.artifact_ref.filename, candidate.artifact_ref.kind, candidate.rating
        );
        match candidate.hits.first() {
            Some(hit) => println!("  best hit: {} [{}]", hit.direct_url, hit.repository_or_author),
            None => println!("  no hits, try: {}", candidate.suggestions.join(", ")),
        }
    }

    Ok(())
}
