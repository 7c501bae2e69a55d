use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gateway::GeminiGateway;
use shared::{
    domain::{ImageRef, WardrobeItem},
    wardrobe::default_wardrobe,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tryon_core::{ActionOutcome, InteractionController, PoseCatalog};

mod config;
mod media;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "tryon", about = "Virtual try-on sessions driven by a generative image model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the pose catalog.
    Poses,
    /// List the built-in wardrobe.
    Wardrobe,
    /// Create a model from a photo, dress it and write the results.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    photo: PathBuf,
    /// Wardrobe id or path to a garment image; repeat to layer garments.
    #[arg(long = "garment")]
    garments: Vec<String>,
    /// Colour override applied to every garment.
    #[arg(long)]
    color: Option<String>,
    /// Pose index to switch to after dressing; repeatable.
    #[arg(long = "pose")]
    poses: Vec<usize>,
    /// Layers to step back before writing output.
    #[arg(long, default_value_t = 0)]
    undo: usize,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Poses => {
            let poses = PoseCatalog::default();
            for (index, instruction) in poses.iter().enumerate() {
                println!("{index}: {instruction}");
            }
            Ok(())
        }
        Command::Wardrobe => {
            for item in default_wardrobe() {
                println!("{:<14} {}", item.id, item.display_name);
            }
            Ok(())
        }
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let settings = load_settings();
    let gateway = GeminiGateway::new(settings.gemini_config()?)?;
    let controller = InteractionController::new(Arc::new(gateway));
    let http = reqwest::Client::new();
    let wardrobe = default_wardrobe();

    let photo = media::read_image_file(&args.photo).await?;
    println!("Creating studio model from {}...", args.photo.display());
    if !report("create model", controller.create_model(photo).await) {
        bail!("could not create a model from '{}'", args.photo.display());
    }

    for garment in &args.garments {
        let (item, image) = match media::load_garment(&http, &wardrobe, garment).await {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(garment = %garment, error = %format!("{err:#}"), "could not load garment");
                println!("skipped {garment}: {err:#}");
                continue;
            }
        };
        let worn = controller.history().await.active_garment_ids();
        if worn.contains(&item.id) {
            println!("skipped {}: already worn", item.display_name);
            continue;
        }

        println!("Dressing {}...", item.display_name);
        dress(&controller, item, image, args.color.clone()).await;
    }

    for pose in &args.poses {
        let label = controller
            .poses()
            .label(*pose)
            .map(str::to_string)
            .unwrap_or_else(|| format!("pose #{pose}"));
        println!("Changing pose to {label}...");
        report(&format!("pose {label}"), controller.select_pose(*pose).await);
    }

    for _ in 0..args.undo {
        if !report("undo", controller.undo().await) {
            break;
        }
    }

    let snapshot = controller.snapshot().await;
    let history = controller.history().await;
    let out_dir = args.out.unwrap_or(settings.output_dir);
    let written = media::write_session(
        &out_dir,
        &history,
        controller.poses(),
        snapshot.display_image.as_ref(),
    )
    .await
    .context("failed to write session output")?;

    info!(files = written.len(), dir = %out_dir.display(), "session written");
    println!(
        "Wearing {} garment(s) in pose '{}'; wrote {} file(s) to {}",
        snapshot.worn.len(),
        snapshot.pose_label.unwrap_or_default(),
        written.len(),
        out_dir.display()
    );
    Ok(())
}

/// Stages the garment and puts it on; stops if staging was refused.
async fn dress(
    controller: &InteractionController,
    item: WardrobeItem,
    image: ImageRef,
    color: Option<String>,
) -> bool {
    let name = item.display_name.clone();
    let staged = controller.stage_garment(item, image, color).await;
    if !report(&format!("stage {name}"), staged) {
        return false;
    }
    report(&format!("apply {name}"), controller.apply_staged_garment().await)
}

fn report(action: &str, outcome: ActionOutcome) -> bool {
    match outcome {
        ActionOutcome::Completed => true,
        ActionOutcome::Rejected(reason) => {
            println!("{action}: not applied ({reason:?})");
            false
        }
        ActionOutcome::Failed(err) => {
            println!("{action}: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gateway::GeminiConfig;
    use tokio::net::TcpListener;

    /// Controller whose model endpoint accepts connections and never answers.
    async fn controller_with_silent_model() -> (Arc<InteractionController>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let mut config = GeminiConfig::new("test-key");
        config.api_base_url = format!("http://{addr}");
        config.request_timeout = Duration::from_secs(30);
        let gateway = GeminiGateway::new(config).expect("gateway");
        (Arc::new(InteractionController::new(Arc::new(gateway))), server)
    }

    #[tokio::test]
    async fn dressing_stops_when_staging_is_refused() {
        let (controller, server) = controller_with_silent_model().await;
        let creating = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move {
                controller
                    .create_model(ImageRef::from_bytes("image/png", b"photo"))
                    .await
            }
        });
        while !controller.is_busy() {
            tokio::task::yield_now().await;
        }

        let item = default_wardrobe()[0].clone();
        let dressed = dress(
            &controller,
            item,
            ImageRef::from_bytes("image/png", b"garment"),
            None,
        )
        .await;

        assert!(!dressed);
        assert_eq!(controller.snapshot().await.staged, None);
        assert!(controller.history().await.is_empty());
        creating.abort();
        server.abort();
    }
}
