use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pmd_anim_packer::{
    data::Direction,
    graphics::atlas::splitter::default_shadow_marker,
    progress::ProgressFile,
    project::{export_multi_sheet, pack_directory, SingleSheet},
    AtlasConfig, AtlasError,
};

#[derive(Parser, Debug)]
#[command(
    name = "pmd_anim_packer",
    about = "Pack per-animation sprite sheets into one deduplicated sheet and back",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// JSON file with packing options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Keep the latest progress in this JSON file
    #[arg(long, global = true)]
    progress: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack the sheets listed in an AnimData.xml into a single sheet
    Pack {
        /// Path to AnimData.xml
        anim_data: PathBuf,
        /// Output directory for FrameData.xml, Anim.png and Offsets.png
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
    },
    /// Split a single sheet into one sheet set per animation
    Split {
        /// Directory containing FrameData.xml and Anim.png
        sheet_dir: PathBuf,
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// Image drawn at each shadow anchor (a single white pixel by default)
        #[arg(long)]
        shadow_marker: Option<PathBuf>,
    },
    /// Print the animation groups of a single sheet
    Inspect {
        sheet_dir: PathBuf,
    },
}

fn inspect(sheet: &SingleSheet) {
    let data = &sheet.frame_data;
    println!(
        "{} sheet frames of {}x{}, shadow size {}",
        sheet.frame_count(),
        data.frame_width,
        data.frame_height,
        data.shadow_size
    );
    for group in &data.groups {
        let idx = group
            .idx
            .map_or_else(|| "-".to_string(), |idx| idx.to_string());
        if let Some(copy_of) = group.copy_name.as_deref().filter(|_| group.is_alias()) {
            println!("  [{:>2}] {} (copy of {})", idx, group.name, copy_of);
            continue;
        }
        let counts: Vec<String> = Direction::ALL
            .iter()
            .map(|&direction| group.sequence(direction).len().to_string())
            .collect();
        println!(
            "  [{:>2}] {}: frames per direction {}{}",
            idx,
            group.name,
            counts.join("/"),
            if group.is_collapsible() { " (collapsible)" } else { "" }
        );
    }
}

fn run(cli: Cli) -> Result<(), AtlasError> {
    let config = match &cli.config {
        Some(path) => AtlasConfig::from_json_file(path)?,
        None => AtlasConfig::default(),
    };
    let progress = ProgressFile::new(cli.progress);

    match cli.command {
        Commands::Pack { anim_data, out_dir } => {
            let sheet = pack_directory(&anim_data, &out_dir, &config, &progress)?;
            info!(
                "Packed {} groups into {} frames of {}x{}",
                sheet.frame_data.groups.len(),
                sheet.frame_count(),
                sheet.frame_data.frame_width,
                sheet.frame_data.frame_height
            );
        }
        Commands::Split {
            sheet_dir,
            out_dir,
            shadow_marker,
        } => {
            let (sheet, _) = SingleSheet::load(&sheet_dir, &config)?;
            let marker = match shadow_marker {
                Some(path) => image::open(path)?.to_rgba8(),
                None => default_shadow_marker(),
            };
            let split = export_multi_sheet(&sheet, &out_dir, &marker, &config, &progress)?;
            info!("Split into {} sheet sets", split.len());
        }
        Commands::Inspect { sheet_dir } => {
            let (sheet, _) = SingleSheet::load(&sheet_dir, &config)?;
            inspect(&sheet);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pmd_anim_packer=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
