//! harp-updater - list Harp devices and deploy firmware through HarpRegulator

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use harp_updater::{
    DeployRequest, DeploymentWorkflow, GatewayConfig, HealthStatus, TypeFilter, WorkflowEvent,
};

#[derive(Parser)]
#[command(name = "harp-updater")]
#[command(about = "List Harp devices and deploy firmware through HarpRegulator")]
struct Cli {
    /// Path to the HarpRegulator executable
    #[arg(long, env = "HARP_REGULATOR", default_value = harp_updater::gateway::DEFAULT_CLI_PATH)]
    cli: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered devices
    List {
        /// Case-insensitive text matched against name, port and description
        #[arg(short, long, default_value = "")]
        search: String,

        /// "All types", "Pico", "ATxmega", "Healthy", "Error" or "Needs update"
        #[arg(short = 't', long = "type", default_value = "All types")]
        type_filter: TypeFilter,

        /// Healthy, Bootloader, Error or Unknown
        #[arg(long)]
        health: Option<HealthStatus>,

        /// Do not let the tool connect to devices while listing
        #[arg(long)]
        no_connect: bool,
    },

    /// Upload firmware to the device on a port
    Deploy {
        /// Port of the target device (e.g. COM5, /dev/ttyACM0)
        #[arg(short, long)]
        port: String,

        /// Firmware image (.uf2 or .hex)
        #[arg(value_name = "FILE")]
        firmware: PathBuf,

        /// Bypass the tool's safety checks
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the level picked by -v
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_default_env()
        .init();

    let workflow = match harp_updater::regulator_workflow(
        GatewayConfig::new().with_cli_path(&cli.cli),
        harp_updater::new_config(),
    ) {
        Ok(workflow) => workflow,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::List {
            search,
            type_filter,
            health,
            no_connect,
        } => list(&workflow, &search, type_filter, health, !no_connect).await,
        Commands::Deploy {
            port,
            firmware,
            force,
        } => deploy(&workflow, &port, firmware, force).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

async fn list(
    workflow: &DeploymentWorkflow,
    search: &str,
    type_filter: TypeFilter,
    health: Option<HealthStatus>,
    allow_connect: bool,
) -> Result<(), String> {
    let registry = workflow.registry();
    registry
        .refresh(workflow.config().include_all, allow_connect)
        .await
        .map_err(|e| e.to_string())?;

    let devices = registry.filter(search, type_filter, health);
    if devices.is_empty() {
        println!("No devices found");
        return Ok(());
    }

    println!(
        "{:<24} {:<14} {:<10} {:<8} {:<10} {}",
        "Name", "Port", "Kind", "Health", "Firmware", "Confidence"
    );
    println!("{}", "-".repeat(80));
    for device in devices {
        println!(
            "{:<24} {:<14} {:<10} {:<8} {:<10} {}",
            device.display_name(),
            device.port_name,
            device.kind,
            device.health_status(),
            device.firmware_version.as_deref().unwrap_or("-"),
            device.confidence
        );
    }

    Ok(())
}

async fn deploy(
    workflow: &DeploymentWorkflow,
    port: &str,
    firmware: PathBuf,
    force: bool,
) -> Result<(), String> {
    let registry = workflow.registry();
    registry
        .refresh(workflow.config().include_all, true)
        .await
        .map_err(|e| e.to_string())?;

    let device = registry
        .find_by_port(port)
        .ok_or_else(|| format!("No device found on {}", port))?;
    registry.select(device);

    let mut events = workflow.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                WorkflowEvent::Log(line) => println!("{}", line),
                WorkflowEvent::Finished(_) => break,
                _ => {}
            }
        }
    });

    let request = DeployRequest {
        device: registry.selected(),
        ..DeployRequest::new().with_firmware_file(firmware).force(force)
    };
    let result = workflow.deploy(request).await;
    let _ = printer.await;

    match result {
        Ok(report) => {
            if let Some(device) = report.device {
                println!("{}", device);
            }
            Ok(())
        }
        Err(failure) => {
            let mut message = failure.to_string();
            if let Some(hint) = failure.remediation() {
                message.push('\n');
                message.push_str(hint);
            }
            Err(message)
        }
    }
}
