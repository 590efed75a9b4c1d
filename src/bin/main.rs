//! Command-line driver: reads a TOML parameter file, builds a `Simulation`,
//! and runs it to completion, periodically writing field and particle
//! diagnostics and a resumable snapshot.

mod output_path;

use clap::Parser;
use colored::*;
use log::{error, info};
use pbr::ProgressBar;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zigzag_pic::diagnostics::{AxisMeta, ZdfFileWriter, ZdfWriter};
use zigzag_pic::field::FieldKind;
use zigzag_pic::grid::Grid;
use zigzag_pic::settings::Settings;
use zigzag_pic::simulation::Simulation;

use crate::output_path::OutputPath;

#[derive(Parser, Debug)]
#[clap(
    name = "zigzag-pic",
    version,
    about = "2D relativistic electromagnetic particle-in-cell engine"
)]
struct Args {
    /// TOML parameter file describing the run.
    parameter_file: PathBuf,

    /// Root directory under which a timestamped output directory is created.
    #[clap(short, long, default_value = "output")]
    output_directory: PathBuf,

    /// How often (in steps) to write field and particle diagnostics.
    #[clap(long, default_value_t = 100)]
    diag_every: u64,

    /// Show a live progress bar while the simulation runs.
    #[clap(long)]
    progress_bar: bool,
}

fn main() {
    env_logger::init();

    if let Err(ref e) = run() {
        error!("{}: {}", "error".red(), e);

        for cause in e.iter().skip(1) {
            error!("caused by: {}", cause);
        }

        if let Some(backtrace) = e.backtrace() {
            error!("backtrace: {:?}", backtrace);
        }

        std::process::exit(1);
    }

    std::process::exit(0);
}

fn run() -> zigzag_pic::Result<()> {
    let args = Args::parse();

    let param_path = args
        .parameter_file
        .to_str()
        .ok_or_else(|| zigzag_pic::ErrorKind::Configuration("parameter file path is not valid UTF-8".into()))?;
    let settings = Settings::read_parameter_file(param_path)?;

    let output = OutputPath::new(&args.output_directory, &settings.environment.prefix);
    output.create()?;
    info!("writing diagnostics to {}", output.dir().display());

    let species = settings
        .species
        .iter()
        .map(|s| s.build())
        .collect::<zigzag_pic::Result<Vec<_>>>()?;

    let mut simulation = Simulation::new(
        settings.grid.nx,
        settings.grid.box_size,
        settings.grid.dt,
        settings.grid.boundary(),
        species,
        None,
        settings.environment.seed,
    )?;

    simulation.set_smooth(settings.smoothing.build());
    simulation.set_moving_window(settings.moving_window);
    for laser_settings in &settings.laser {
        let laser = laser_settings.build()?;
        simulation.add_laser(&laser);
    }

    let mut writer = ZdfFileWriter::new(output.dir())?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .expect("failed to install SIGINT handler");
    }

    let n_steps = settings.environment.n_steps;
    let mut pb = ProgressBar::new(n_steps);
    pb.format("┫██░┣");
    pb.show_bar = args.progress_bar;
    pb.show_counter = args.progress_bar;
    pb.show_percent = args.progress_bar;
    pb.show_speed = args.progress_bar;
    pb.show_time_left = args.progress_bar;
    pb.show_message = args.progress_bar;

    while simulation.n() < n_steps {
        if interrupted.load(Ordering::SeqCst) {
            info!("interrupted at step {}, writing final snapshot", simulation.n());
            break;
        }

        simulation.iter();
        pb.inc();

        if args.diag_every > 0 && simulation.n() % args.diag_every == 0 {
            write_diagnostics(&mut writer, &simulation)?;
        }
    }

    write_diagnostics(&mut writer, &simulation)?;
    write_snapshot(&output, &simulation)?;

    pb.finish_print(&format!("{} ", "done".green().bold()));
    Ok(())
}

fn write_diagnostics(writer: &mut ZdfFileWriter, simulation: &Simulation) -> zigzag_pic::Result<()> {
    let n = simulation.n();
    let t = simulation.t();
    let axes = grid_axes(simulation.grid());

    for (name, kind, component) in [
        ("e1", FieldKind::E, 0),
        ("e2", FieldKind::E, 1),
        ("e3", FieldKind::E, 2),
        ("b1", FieldKind::B, 0),
        ("b2", FieldKind::B, 1),
        ("b3", FieldKind::B, 2),
    ] {
        let data = simulation.emf().report(kind, component);
        writer.write_vector_grid(name, n, t, component, &data, &axes)?;
    }

    for species in simulation.species() {
        writer.write_particles(&species.name, n, t, species)?;
    }

    Ok(())
}

fn write_snapshot(output: &OutputPath, simulation: &Simulation) -> zigzag_pic::Result<()> {
    let snapshot = simulation.get_snapshot();
    let path = output.with_extension("bincode");
    let file = std::fs::File::create(path)?;
    bincode::serialize_into(file, &snapshot)?;
    Ok(())
}

fn grid_axes(grid: &Grid) -> [AxisMeta; 2] {
    let box_size = grid.box_size();
    [
        AxisMeta::new("x1", "c/omega0", 0.0, box_size[0]),
        AxisMeta::new("x2", "c/omega0", 0.0, box_size[1]),
    ]
}
