use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use std::io;
use std::path::PathBuf;
use webp2gif::color::parse_color;
use webp2gif::progress::{NoProgress, ProgressBar, ProgressReporter};
use webp2gif::*;

type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Converts a directory of animated WebP files to GIFs")
        .arg(Arg::new("input")
            .long("input")
            .short('i')
            .help("Directory to search for .webp files")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .default_value("."))
        .arg(Arg::new("output")
            .long("output")
            .short('o')
            .help("Directory to write GIFs to")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .default_value("output_gif"))
        .arg(flag("overwrite", "Replace existing GIFs and frame directories"))
        .arg(flag("include-static", "Convert (and export) single-frame images too"))
        .arg(flag("recursive", "Search subdirectories"))
        .arg(Arg::new("workers")
            .long("workers")
            .help("Number of files converted at the same time [default: half of the CPUs]")
            .value_name("num")
            .value_parser(value_parser!(usize)))
        .arg(flag("use-processes", "Run every conversion in a separate process"))
        .arg(flag("transparent-gif", "Keep transparency instead of flattening onto the matte color"))
        .arg(Arg::new("matte")
            .long("matte")
            .help("Background color, as #RRGGBB or R,G,B")
            .value_name("color")
            .default_value("#FFFFFF"))
        .arg(Arg::new("alpha-threshold")
            .long("alpha-threshold")
            .help("Pixels with alpha at or below this are transparent (with --transparent-gif)")
            .value_name("0-255")
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64))
            .default_value("0"))
        .arg(flag("no-optimize", "Keep unused palette entries"))
        .arg(flag("no-dither", "Map to the palette without dithering"))
        .arg(flag("preserve-structure", "Mirror input subdirectories in the output directories"))
        .arg(flag("gif-inplace", "Write each GIF next to its source file"))
        .arg(flag("export-png-frames", "Also write every frame as a PNG"))
        .arg(Arg::new("png-output")
            .long("png-output")
            .help("Directory for the PNG frame directories")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .default_value("output_png_frames"))
        .arg(flag("png-inplace", "Write PNG frame directories next to their source files"))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .help("Log every frame")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .help("Do not show a progress bar")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("worker-job")
            .long(&WORKER_ARG[2..])
            .hide(true)
            .action(ArgAction::SetTrue))
}

fn bin_main() -> BinResult<()> {
    let matches = command().get_matches_from(wild::args_os());

    env_logger::Builder::new()
        .filter_level(if matches.get_flag("verbose") { LevelFilter::Debug } else { LevelFilter::Info })
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();

    if matches.get_flag("worker-job") {
        serve_one_job(io::stdin().lock(), io::stdout().lock())?;
        return Ok(());
    }

    let config = BatchConfig {
        input_root: path_arg(&matches, "input")?,
        recursive: matches.get_flag("recursive"),
        workers: match matches.get_one::<usize>("workers") {
            Some(&n) => n.max(1),
            None => default_workers(),
        },
        parallelism: if matches.get_flag("use-processes") { Parallelism::current_exe()? } else { Parallelism::Threads },
        overwrite: matches.get_flag("overwrite"),
    };

    let compositing = if matches.get_flag("transparent-gif") {
        let threshold = matches.get_one::<i64>("alpha-threshold").copied().unwrap_or(0);
        Compositing::Transparent {
            matte: parse_color(matches.get_one::<String>("matte").map_or("#FFFFFF", |s| s.as_str())),
            alpha_threshold: threshold.clamp(0, 255) as u8,
        }
    } else {
        Compositing::Matte
    };

    let preserve = matches.get_flag("preserve-structure");
    let gif = GifBatch {
        output_root: path_arg(&matches, "output")?,
        layout: Layout::from_flags(preserve, matches.get_flag("gif-inplace")),
        settings: Settings {
            skip_static: !matches.get_flag("include-static"),
            compositing,
            optimize: !matches.get_flag("no-optimize"),
            dither: !matches.get_flag("no-dither"),
        },
    };

    let quiet = matches.get_flag("quiet");
    let mut progress = reporter(quiet, "GIF ");
    convert_all(&config, &gif, &mut *progress)?;

    if matches.get_flag("export-png-frames") {
        let png = PngBatch {
            output_root: path_arg(&matches, "png-output")?,
            layout: Layout::from_flags(preserve, matches.get_flag("png-inplace")),
            include_static: matches.get_flag("include-static"),
        };
        let mut progress = reporter(quiet, "PNG ");
        export_all(&config, &png, &mut *progress)?;
    }
    Ok(())
}

fn path_arg(matches: &ArgMatches, name: &str) -> BinResult<PathBuf> {
    Ok(matches.get_one::<PathBuf>(name).ok_or_else(|| format!("Missing {name}"))?.clone())
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get() / 2).unwrap_or(1).max(1)
}

fn reporter(quiet: bool, label: &'static str) -> Box<dyn ProgressReporter> {
    if quiet {
        Box::new(NoProgress {})
    } else {
        Box::new(ProgressBar::new(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn defaults() {
        let m = command().get_matches_from(["webp2gif"]);
        assert_eq!(PathBuf::from("."), path_arg(&m, "input").unwrap());
        assert_eq!(PathBuf::from("output_gif"), path_arg(&m, "output").unwrap());
        assert_eq!(PathBuf::from("output_png_frames"), path_arg(&m, "png-output").unwrap());
        assert!(!m.get_flag("worker-job"));
        assert!(default_workers() >= 1);
    }

    #[test]
    fn negative_threshold_is_accepted() {
        let m = command().get_matches_from(["webp2gif", "--transparent-gif", "--alpha-threshold", "-5"]);
        assert_eq!(Some(&-5), m.get_one::<i64>("alpha-threshold"));
        let m = command().get_matches_from(["webp2gif", WORKER_ARG]);
        assert!(m.get_flag("worker-job"));
    }
}
