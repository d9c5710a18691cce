use clap::{Parser, Subcommand};
use dr_common::db::Design;
use dr_common::util::config::Config;
use dr_common::util::{check, generator, logger, visualization};
use dr_router::report;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Route,
    Generate {
        #[arg(long, default_value_t = 4)]
        layers: usize,
        #[arg(long, default_value_t = 64)]
        tracks: usize,
        #[arg(long, default_value_t = 100)]
        nets: usize,
        #[arg(long, default_value_t = 10)]
        obstacles: usize,
        #[arg(long, default_value = "inputs/random.toml")]
        output: String,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    match args.command.unwrap_or(Commands::Route) {
        Commands::Generate {
            layers,
            tracks,
            nets,
            obstacles,
            output,
        } => {
            prepare_output_dir(&output)?;
            generator::generate_random_design(&output, layers, tracks, nets, obstacles)?;
            log::info!("Generated: {}", output);
        }
        Commands::Route => {
            if !Path::new(&config.input.design_file).exists() {
                return Err(anyhow::anyhow!(
                    "Design file missing: '{}'. Did you run 'generate'?",
                    config.input.design_file
                ));
            }
            if let Err(e) = run_routing(&config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_routing(config: &Config) -> anyhow::Result<()> {
    log::info!("Parsing design: {}", config.input.design_file);
    let mut design = Design::load(Path::new(&config.input.design_file))?;
    log::info!(
        "Design '{}': {} layers, {} nets, {} obstacles",
        design.name,
        design.layers.num_layers(),
        design.nets.len(),
        design.obstacles.len()
    );

    let summary = dr_router::route(&mut design, config).map_err(|e| anyhow::anyhow!(e))?;
    log::info!(
        "Finished after {} iterations: {} failed nets, score {:.1}",
        summary.iterations,
        summary.num_failed(),
        summary.score
    );

    let output = Path::new(&config.input.output_file);
    log::info!("Writing routed nets to {:?}", output);
    report::save_report(output, &design, &summary.status, Some(&summary.stats))?;

    log::info!("Generating routed visualization...");
    prepare_output_dir(&config.input.image_file)?;
    visualization::draw_routed_design(&design, &config.input.image_file, 2000, 2000);

    check::run(&design).map_err(|e| anyhow::anyhow!("Verification Failed: {}", e))?;
    Ok(())
}
