use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use view_engine::merge::{resolve, resolve_view};
use view_engine::{EngineConfig, LifecycleState, ViewEngine, ViewError};
use view_types::{View, ViewConfig, ViewId, ViewPatch};

#[derive(Parser, Debug)]
#[command(name = "view-sync", version, about = "Inspect and select saved table views")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every view, persisted and local
    List,
    /// Print the resolved configuration of a view (default: the last selected one)
    Resolve { id: Option<String> },
    /// Remember a view as selected; `none` goes back to the defaults
    Select { id: String },
}

#[derive(Serialize)]
struct ViewSummary {
    id: ViewId,
    name: String,
    is_global: bool,
    lifecycle: Option<LifecycleState>,
}

#[derive(Serialize)]
struct Resolved {
    view: Option<View>,
    config: ViewConfig,
}

fn parse_selection(raw: &str) -> anyhow::Result<Option<ViewId>> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(raw.parse::<ViewId>()?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "view_engine=info,view_sync=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;
    let engine = ViewEngine::from_config(config)?;
    engine.load().await?;

    let mut controller = engine.controller();
    controller.restore_selection();

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => {
            let manager = engine.manager();
            let summaries: Vec<ViewSummary> = controller
                .views()
                .into_iter()
                .map(|view| ViewSummary {
                    lifecycle: manager.lifecycle(&view.id),
                    id: view.id,
                    name: view.name,
                    is_global: view.is_global,
                })
                .collect();
            print_json(&summaries)?;
        }
        Commands::Resolve { id: None } => {
            print_json(&Resolved {
                view: controller.resolved_view(),
                config: controller.resolved(),
            })?;
        }
        Commands::Resolve { id: Some(raw) } => {
            // inspect without touching the remembered selection
            let defaults = &engine.defaults().view;
            let resolved = match parse_selection(&raw)? {
                Some(id) => {
                    let id = engine.manager().resolve_alias(&id);
                    let view = engine
                        .manager()
                        .get(&id)
                        .ok_or(ViewError::ViewNotFound(id))?;
                    let view = resolve_view(defaults, &view, &ViewPatch::default());
                    Resolved {
                        config: view.config.clone(),
                        view: Some(view),
                    }
                }
                None => Resolved {
                    view: None,
                    config: resolve(defaults, None, &ViewPatch::default()),
                },
            };
            print_json(&resolved)?;
        }
        Commands::Select { id } => {
            let selection = parse_selection(&id)?;
            controller.select_view(selection.clone())?;
            tracing::info!(
                view_id = ?selection.as_ref().map(ToString::to_string),
                "Selection saved"
            );
            print_json(&controller.selected_id())?;
        }
    }

    Ok(())
}
