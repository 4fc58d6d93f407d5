use anyhow::Context;
use clap::Parser;
use engine::EngineServer;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::ScenarioConfig;
use workflow::runner::Runner;

mod engine;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "MR streaming-reconstruction workflow driver")]
struct Args {
    /// Run one offline phantom-to-image scenario and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a scenario config from YAML
    #[arg(long)]
    scenario: Option<PathBuf>,
    #[arg(long, default_value_t = 32)]
    matrix_size: usize,
    #[arg(long, default_value_t = 48)]
    readout: usize,
    #[arg(long, default_value_t = 4)]
    coils: usize,
    #[arg(long, default_value_t = 0.0)]
    noise: f32,
    /// Keep the mock engine listening for external client sessions
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Engine port in serve mode
    #[arg(long, default_value_t = 9002)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scenario = if let Some(path) = args.scenario {
        ScenarioConfig::load(path)?
    } else {
        ScenarioConfig::from_args(args.matrix_size, args.readout, args.coils, args.noise)
    };

    if args.offline {
        let summary = Runner::new(scenario.clone()).execute()?;

        println!(
            "Offline run -> {} records streamed, {} images, norm {:.4} (truth {:.4})",
            summary.records_streamed,
            summary.images_collected,
            summary.image_norm,
            summary.truth_norm
        );

        let report = serde_json::to_string(&summary).context("serializing run summary")?;
        let report_path = PathBuf::from("tools/data/offline_recon.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_path)?;
        writeln!(file, "{report}")?;
    }

    if args.serve {
        EngineServer::bind("127.0.0.1", args.port)?.spawn()?;
        println!("Engine serving on port {} (Ctrl+C to stop)...", args.port);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
