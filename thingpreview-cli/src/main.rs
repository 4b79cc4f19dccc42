use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde_json::Value;
use thingpreview_adapters_openlibrary::{OpenLibraryConfig, OpenLibraryLookup};
use thingpreview_core::{
    scan_placeholders, CoalescerConfig, Entity, Placeholder, RenderRegistry, RenderedPreview,
    RequestCoalescer,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "thingpreview")]
#[command(version)]
#[command(about = "Batched previews of Open Library works, editions and authors", long_about = None)]
struct Cli {
    /// Open Library base URL (defaults to THINGPREVIEW_BASE_URL or https://openlibrary.org)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Debounce window in milliseconds (defaults to THINGPREVIEW_DEBOUNCE_MS or 100)
    #[arg(long, global = true)]
    window_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve keys such as /works/OL45804W and print them as JSON
    Resolve {
        /// Keys to resolve
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Find preview placeholders in a markup file and render them
    Scan {
        /// HTML file containing `lazy-thing-preview` placeholders
        file: PathBuf,

        /// Render every placeholder with this built-in renderer (json, title)
        /// instead of the name the placeholder asks for
        #[arg(short, long)]
        renderer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("thingpreview=info,thingpreview_core=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let coalescer = build_coalescer(&cli)?;

    match cli.command {
        Commands::Resolve { keys } => {
            let resolved = join_all(keys.iter().map(|key| coalescer.resolve(key.clone()))).await;

            let output: BTreeMap<&str, Value> = keys
                .iter()
                .map(String::as_str)
                .zip(resolved.into_iter().map(|e| e.map(Entity::into_value).unwrap_or(Value::Null)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Scan { file, renderer } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut placeholders = scan_placeholders(&html);
            if let Some(name) = renderer {
                for placeholder in &mut placeholders {
                    placeholder.render = Some(name.clone());
                }
            }
            info!(file = %file.display(), found = placeholders.len(), "Scanned markup");

            for preview in render_placeholders(&coalescer, &placeholders).await {
                println!("[{}] {} => {}", preview.index, preview.key, preview.markup);
            }
        }
    }

    let metrics = coalescer.metrics();
    info!(
        lookups = metrics.lookups_issued,
        failed = metrics.lookups_failed,
        unresolved = metrics.unresolved_keys,
        "Done"
    );

    Ok(())
}

fn build_coalescer(cli: &Cli) -> anyhow::Result<RequestCoalescer> {
    let mut http = OpenLibraryConfig::from_env();
    if let Some(ref url) = cli.base_url {
        http.base_url = url.clone();
    }

    let mut config =
        CoalescerConfig::try_from_env().context("Invalid coalescer configuration")?;
    if let Some(ms) = cli.window_ms {
        anyhow::ensure!(ms > 0, "--window-ms must be greater than zero");
        config.debounce_window = Duration::from_millis(ms);
    }

    let lookup = OpenLibraryLookup::new(&http).context("Failed to create HTTP client")?;
    Ok(RequestCoalescer::new(lookup, config))
}

/// Built-in render functions available to `scan`
fn builtin_renderers() -> RenderRegistry {
    let mut registry = RenderRegistry::new();
    registry
        .register("json", |entity: Option<&Entity>| match entity {
            Some(e) => serde_json::to_string(e.fields()).unwrap_or_default(),
            None => "null".to_string(),
        })
        .register("title", |entity: Option<&Entity>| {
            entity
                .and_then(|e| {
                    let title = e.full_title().or_else(|| {
                        e.get("name").and_then(Value::as_str).map(str::to_string)
                    })?;
                    Some(match e.author_names().as_slice() {
                        [] => title,
                        names => format!("{} by {}", title, names.join(", ")),
                    })
                })
                .unwrap_or_else(|| "(unavailable)".to_string())
        });
    registry
}

/// Initialize the coalescer from placeholders and collect every rendering
async fn render_placeholders(
    coalescer: &RequestCoalescer,
    placeholders: &[Placeholder],
) -> Vec<RenderedPreview> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queued = coalescer.initialize_from_markup(placeholders, &builtin_renderers(), move |preview| {
        let _ = tx.send(preview);
    });

    let mut rendered = Vec::with_capacity(queued);
    while rendered.len() < queued {
        match rx.recv().await {
            Some(preview) => rendered.push(preview),
            None => break,
        }
    }
    rendered.sort_by_key(|p| p.index);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::parse_from(["thingpreview", "--window-ms", "50", "resolve", "/works/OL1W"]);
        assert_eq!(cli.window_ms, Some(50));
        assert!(matches!(cli.command, Commands::Resolve { ref keys } if keys == &["/works/OL1W"]));
    }

    #[test]
    fn test_builtin_title_renderer() {
        let registry = builtin_renderers();
        let title = registry.get("title").unwrap();

        let work = Entity::from_value(json!({
            "key": "/works/OL1W",
            "title": "Emma",
            "author_name": ["Jane Austen"]
        }))
        .unwrap();
        assert_eq!(title(Some(&work)), "Emma by Jane Austen");

        let author = Entity::from_value(json!({"key": "/authors/OL3A", "name": "Jane Austen"})).unwrap();
        assert_eq!(title(Some(&author)), "Jane Austen");
        assert_eq!(title(None), "(unavailable)");
    }

    #[test]
    fn test_builtin_json_renderer() {
        let registry = builtin_renderers();
        let render = registry.get("json").unwrap();
        assert_eq!(render(None), "null");

        let entity = Entity::from_value(json!({"key": "/works/OL1W"})).unwrap();
        assert_eq!(render(Some(&entity)), r#"{"key":"/works/OL1W"}"#);
    }
}
