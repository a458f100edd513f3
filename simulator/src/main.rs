use anyhow::Context;
use clap::Parser;
use generator::profile::build_stream;
use gui_bridge::bridge::{default_bind_address, FrameBridge};
use mmwcore::transport::MockTransport;
use mmwcore::SensorInterface;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Tick-loop driver for mmWave radar sensors")]
struct Args {
    /// Replay a synthetic capture instead of opening serial ports
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Enhanced (CLI) serial port
    #[arg(long)]
    user_port: Option<String>,
    /// Standard (data) serial port
    #[arg(long)]
    data_port: Option<String>,
    /// Vendor configuration script to send before starting
    #[arg(long)]
    config_script: Option<PathBuf>,
    /// Stop after this many decoded frames
    #[arg(long)]
    frames: Option<usize>,
    /// Milliseconds between ticks
    #[arg(long)]
    tick_ms: Option<u64>,
    /// Append a one-line run summary to this file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Serve the latest frame over HTTP and keep running until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn workflow_from_args(args: &Args) -> anyhow::Result<WorkflowConfig> {
    let mut config = match args.workflow.as_ref() {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    if let Some(port) = args.user_port.clone() {
        config.user_port = Some(port);
    }
    if let Some(port) = args.data_port.clone() {
        config.data_port = Some(port);
    }
    if let Some(script) = args.config_script.clone() {
        config.config_script = Some(script);
    }
    if args.frames.is_some() {
        config.max_frames = args.frames;
    }
    if let Some(tick) = args.tick_ms {
        config.tick_interval_ms = tick;
    }
    Ok(config)
}

fn open_sensor(config: &WorkflowConfig, offline: bool) -> anyhow::Result<SensorInterface> {
    let mut sensor =
        SensorInterface::new(config.sensor.clone()).context("building sensor interface")?;

    if offline {
        let data = MockTransport::new();
        let capture = build_stream(&config.generator)?;
        sensor
            .connect_with(Box::new(MockTransport::new()), Box::new(data.clone()))
            .context("attaching synthetic sensor")?;
        data.inject_read(&capture);
        sensor.start().context("starting synthetic sensor")?;
        return Ok(sensor);
    }

    let (user_port, data_port) = config
        .ports()
        .context("both --user-port and --data-port are required unless --offline")?;
    sensor
        .connect(user_port, data_port)
        .with_context(|| format!("connecting to {} / {}", user_port, data_port))?;
    match config.config_script.as_ref() {
        Some(script) => sensor
            .send_config(script)
            .with_context(|| format!("sending config {}", script.display()))?,
        None => sensor.start().context("starting sensor")?,
    }
    Ok(sensor)
}

fn append_report(path: &PathBuf, result: &WorkflowResult) -> anyhow::Result<()> {
    let report = format!(
        "frames={} points={} ticks={} last_frame={:?} stop={:?}\n",
        result.frames, result.points, result.ticks, result.last_frame_number, result.stop_reason
    );
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(report.as_bytes())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = workflow_from_args(&args)?;
    if args.offline && workflow_config.max_idle_ticks.is_none() {
        // a finished replay never produces another frame
        workflow_config.max_idle_ticks = Some(workflow_config.sensor.buffer_size);
    }

    let bridge = FrameBridge::new();
    if args.serve {
        bridge.serve(args.bind.unwrap_or_else(default_bind_address));
    }

    let mut sensor = open_sensor(&workflow_config, args.offline)?;
    bridge.publish_status("Sensor running");

    let runner = Runner::new(workflow_config);
    let outcome = runner.run(&mut sensor, |frame| bridge.publish(frame));
    if let Err(err) = sensor.close_connection() {
        log::warn!("closing sensor: {}", err);
    }
    let result = outcome?;

    println!(
        "Run finished -> frames {}, points {}, ticks {}, stop {:?}",
        result.frames, result.points, result.ticks, result.stop_reason
    );
    bridge.publish_status(&format!("Sensor stopped ({:?})", result.stop_reason));
    if let Some(path) = args.report.as_ref() {
        append_report(path, &result)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    if args.serve {
        bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
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
