use crate::cli::{Cli, Commands, JobArgs, PresetArgs};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use transcast::config::Config;
use transcast::engine::elements::{GstInspectRegistry, inspector_version};
use transcast::engine::worker::{JobBackends, TranscodeJob, WorkerMessage, WorkerPool, run_job};
use transcast::engine::{
    Catalog, Discoverer, ElementRegistry, GraphBuilder, Locator, MAX_DISC_TITLES, MediaInfo,
    Notification, Preset, TranscodeOptions, find_longest_title, format_friendly_time, generate_output_path,
    job_pass_count,
};

/// Devices shipped with the program; files in the search paths override them
const BUILTIN_DEVICES: &[(&str, &str)] = &[
    ("computer", include_str!("../presets/computer.json")),
    ("web", include_str!("../presets/web.json")),
    ("psp", include_str!("../presets/psp.json")),
];

pub fn run(cli: Cli) {
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::Transcode { input, preset, job } => {
            handle_transcode(&config, &cli.preset_dirs, input, preset, job)
        }
        Commands::DryRun { input, preset, job } => {
            handle_dry_run(&config, &cli.preset_dirs, input, preset, job)
        }
        Commands::Batch {
            inputs,
            preset,
            workers,
        } => handle_batch(&config, &cli.preset_dirs, inputs, preset, workers),
        Commands::Presets => handle_presets(&config, &cli.preset_dirs),
        Commands::Check { preset } => handle_check(&config, &cli.preset_dirs, preset),
        Commands::Inspect { element } => handle_inspect(&config, &element),
        Commands::Probe { input } => handle_probe(&config, &input),
        Commands::InitConfig => handle_init_config(),
    }
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {:#}", message);
    process::exit(1);
}

fn load_catalog(config: &Config, extra_dirs: &[PathBuf]) -> Catalog {
    let mut catalog = Catalog::new();
    for (short_name, json) in BUILTIN_DEVICES {
        if let Err(e) = catalog.load_json(short_name, json) {
            tracing::warn!("Built-in device {} is invalid: {:#}", short_name, e);
        }
    }

    let mut paths = config.preset_search_paths();
    paths.extend(extra_dirs.iter().cloned());
    catalog.load_search_paths(&paths);
    catalog
}

/// The device short name and the preset chosen by flags, then config
fn select_preset(config: &Config, catalog: &Catalog, args: &PresetArgs) -> (String, Preset) {
    let Some(device) = args
        .device
        .clone()
        .or_else(|| config.presets.default_device.clone())
    else {
        exit_with("No device given. Use --device or set presets.default_device in the config.");
    };
    let name = args
        .preset
        .clone()
        .or_else(|| config.presets.default_preset.clone())
        .unwrap_or_default();

    match catalog.preset(&device, &name) {
        Ok(preset) => (device, preset.clone()),
        Err(e) => exit_with(e),
    }
}

fn build_options(config: &Config, input: &str, output: PathBuf, job: &JobArgs) -> TranscodeOptions {
    let mut options = TranscodeOptions::new(input, output);
    options.subtitle_file = job.subtitle.clone();
    options.subtitle_charset = job.subtitle_charset.clone();
    options.ssa = job.ssa;
    options.font = job.font.clone().unwrap_or_else(|| config.subtitles.font.clone());
    options.deinterlace = job.deinterlace();
    options.crop = job.crop;
    options.title = job.title;
    options.chapter = job.chapter;
    options.audio_stream = job.audio_stream;
    options.report_progress = config.engine.report_progress;
    options
}

fn backends(config: &Config) -> JobBackends {
    match config.backends() {
        Ok(backends) => backends,
        Err(e) => exit_with(e),
    }
}

fn handle_transcode(config: &Config, dirs: &[PathBuf], input: String, args: PresetArgs, job: JobArgs) {
    let catalog = load_catalog(config, dirs);
    let (device, preset) = select_preset(config, &catalog, &args);
    let output = job
        .output
        .clone()
        .unwrap_or_else(|| generate_output_path(&input, &preset, &[], &device));
    let options = build_options(config, &input, output.clone(), &job);
    let backends = backends(config);

    let missing = preset.missing_elements(backends.registry.as_ref());
    if !missing.is_empty() {
        exit_with(format!("Missing GStreamer elements: {}", missing.join(", ")));
    }

    println!("{} -> {} ({} / {})", input, output.display(), device, preset.name);
    let job = TranscodeJob::new(options, preset);
    let result = run_job(&job, &backends, &mut |message| print_message(&message));
    println!();

    match result {
        Ok(()) => println!("Transcoded: {}", output.display()),
        Err(e) => exit_with(format!("Transcoding failed: {:#}", e)),
    }
}

fn print_message(message: &WorkerMessage) {
    match message {
        WorkerMessage::Progress {
            pass,
            total_passes,
            fraction,
            remaining,
            ..
        } => {
            print!(
                "\rPass {}/{}: {:5.1}% ({} remaining)   ",
                pass + 1,
                total_passes,
                fraction * 100.0,
                remaining
            );
            let _ = std::io::stdout().flush();
        }
        WorkerMessage::Notification { notification, .. } => match notification {
            Notification::Discovered { info, .. } => {
                if let Some(duration) = info.duration {
                    println!("Duration: {}", format_friendly_time(duration.as_secs()));
                }
            }
            Notification::PassComplete { pass, total } => {
                println!("\nPass {}/{} complete", pass + 1, total)
            }
            Notification::Error(reason) => eprintln!("\n{}", reason),
            _ => {}
        },
        _ => {}
    }
}

fn handle_dry_run(config: &Config, dirs: &[PathBuf], input: String, args: PresetArgs, job: JobArgs) {
    let catalog = load_catalog(config, dirs);
    let (device, mut preset) = select_preset(config, &catalog, &args);
    let output = job
        .output
        .clone()
        .unwrap_or_else(|| generate_output_path(&input, &preset, &[], &device));
    let options = build_options(config, &input, output, &job);
    let backends = backends(config);

    let locator = match Locator::parse(&options.input) {
        Ok(locator) => locator.with_selection(options.title, options.chapter, options.audio_stream),
        Err(e) => exit_with(e),
    };
    let (locator, info) = match discover(backends.discoverer.as_ref(), locator) {
        Ok(found) => found,
        Err(e) => exit_with(e),
    };

    let builder = GraphBuilder::new(backends.registry.as_ref(), backends.settings.threads);
    let total = job_pass_count(&preset, &info);
    println!("Dry run: {} ({} / {})", locator, device, preset.name);
    for pass in 0..total {
        match builder.build(&info, &mut preset, &options, &locator, pass) {
            Ok(spec) => println!("Pass {}/{}:\n{}\n", pass + 1, total, spec),
            Err(e) => exit_with(e),
        }
    }
}

/// Discover an input, searching discs without a title for their longest one
fn discover(
    discoverer: &dyn Discoverer,
    locator: Locator,
) -> anyhow::Result<(Locator, MediaInfo)> {
    if let Locator::Disc {
        device,
        title: None,
        chapter,
        audio,
    } = &locator
    {
        let (title, info) = find_longest_title(discoverer, device, *chapter, *audio, MAX_DISC_TITLES)?;
        return Ok((locator.clone().with_selection(Some(title), None, None), info));
    }
    let info = discoverer.discover(&locator)?;
    Ok((locator, info))
}

fn handle_batch(
    config: &Config,
    dirs: &[PathBuf],
    inputs: Vec<String>,
    args: PresetArgs,
    workers: Option<usize>,
) {
    let catalog = load_catalog(config, dirs);
    let (device, preset) = select_preset(config, &catalog, &args);
    let backends = backends(config);

    let missing = preset.missing_elements(backends.registry.as_ref());
    if !missing.is_empty() {
        exit_with(format!("Missing GStreamer elements: {}", missing.join(", ")));
    }

    let mut queued: Vec<PathBuf> = Vec::new();
    let mut jobs = Vec::new();
    for input in &inputs {
        let output = generate_output_path(input, &preset, &queued, &device);
        queued.push(output.clone());
        let options = build_options(config, input, output, &JobArgs::default());
        jobs.push(TranscodeJob::new(options, preset.clone()));
    }

    let pool = WorkerPool::new(workers.unwrap_or(config.engine.max_workers));
    println!("Transcoding {} inputs with {} workers", jobs.len(), pool.max_workers());
    let names: Vec<(uuid::Uuid, String)> = jobs.iter().map(|j| (j.id, j.options.input.clone())).collect();
    let name_of = |id: &uuid::Uuid| {
        names
            .iter()
            .find(|(job_id, _)| job_id == id)
            .map(|(_, name)| name.as_str())
            .unwrap_or("?")
    };

    let outcomes = pool.run_queue(jobs, &backends, |message| match message {
        WorkerMessage::JobStarted { job_id } => println!("Started {}", name_of(job_id)),
        WorkerMessage::JobCompleted { job_id } => println!("Finished {}", name_of(job_id)),
        WorkerMessage::JobFailed { job_id, error } => {
            eprintln!("Failed {}: {}", name_of(job_id), error)
        }
        _ => {}
    });

    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    println!("{} succeeded, {} failed", outcomes.len() - failed, failed);
    if failed > 0 {
        process::exit(1);
    }
}

fn handle_presets(config: &Config, dirs: &[PathBuf]) {
    let catalog = load_catalog(config, dirs);
    if catalog.is_empty() {
        println!("No devices found");
        return;
    }
    for device in catalog.devices() {
        println!("{} ({}) version {}", device.name(), device.short_name, device.version);
        for preset in &device.presets {
            let marker = if preset.name == device.default { "*" } else { " " };
            println!(
                "  {} {} [{}, {} pass{}]",
                marker,
                preset.name,
                preset.extension,
                preset.pass_count(),
                if preset.pass_count() == 1 { "" } else { "es" }
            );
        }
    }
}

fn handle_check(config: &Config, dirs: &[PathBuf], args: PresetArgs) {
    let catalog = load_catalog(config, dirs);
    let (device, preset) = select_preset(config, &catalog, &args);

    match inspector_version(&config.engine.inspector) {
        Ok(version) => println!("{}", version),
        Err(e) => exit_with(e),
    }

    let registry = GstInspectRegistry::new(config.engine.inspector.clone());
    let missing = preset.missing_elements(&registry);
    if missing.is_empty() {
        println!("{} / {}: all elements available", device, preset.name);
    } else {
        println!("{} / {}: missing {}", device, preset.name, missing.join(", "));
        process::exit(1);
    }
}

fn handle_inspect(config: &Config, element: &str) {
    let registry = GstInspectRegistry::new(config.engine.inspector.clone());
    if !registry.has_element(element) {
        exit_with(format!("No such element: {}", element));
    }
    match registry.sink_caps(element) {
        Ok(caps) => {
            for structure in caps {
                println!("{}", structure.media_type);
                for (field, bound) in &structure.fields {
                    println!("  {}: {}", field, bound);
                }
            }
        }
        Err(e) => exit_with(e),
    }
}

fn handle_probe(config: &Config, input: &str) {
    let backends = backends(config);
    let locator = match Locator::parse(input) {
        Ok(locator) => locator,
        Err(e) => exit_with(e),
    };
    match discover(backends.discoverer.as_ref(), locator) {
        Ok((locator, info)) => {
            println!("Input: {}", locator);
            match info.duration {
                Some(d) => println!("Duration: {}", format_friendly_time(d.as_secs())),
                None => println!("Duration: unknown"),
            }
            if let Some(video) = &info.video {
                println!(
                    "Video: {}x{} PAR {}:{}{}",
                    video.width,
                    video.height,
                    video.pixel_aspect_ratio.num,
                    video.pixel_aspect_ratio.denom,
                    match video.interlaced {
                        Some(true) => " interlaced",
                        _ => "",
                    }
                );
            }
            if let Some(audio) = &info.audio {
                println!(
                    "Audio: {} channels, {} Hz, {} bit",
                    audio.channels, audio.sample_rate, audio.depth
                );
            }
            if !info.is_usable() {
                exit_with("Input has neither audio nor video");
            }
        }
        Err(e) => exit_with(e),
    }
}

fn handle_init_config() {
    match Config::config_path() {
        Ok(path) if path.exists() => match Config::load_from(&path) {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", path.display());
                println!("{:#?}", cfg);
            }
            Err(e) => exit_with(format!("Config invalid: {:#}", e)),
        },
        Ok(path) => {
            println!("Creating default config...");
            if let Err(e) = Config::default().save_to(&path) {
                exit_with(format!("Failed to save default config: {:#}", e));
            }
            println!("Default config saved to {}", path.display());
        }
        Err(e) => exit_with(e),
    }
}
