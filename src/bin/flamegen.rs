// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate flamegen;
extern crate image;
#[macro_use]
extern crate log;
extern crate num_cpus;
extern crate rand;

use clap::{App, Arg, ArgMatches};
use failure::{err_msg, Error};
use flamegen::iterator::fit_camera;
use flamegen::{
    random_genome, Genome, IsaacRng, ProcessAction, RandomOptions, RenderSettings, RenderStatus,
    Renderer,
};
use image::png::PNGEncoder;
use image::ColorType;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Splits `"640x480"`-style arguments.
fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    let index = s.find(separator)?;
    let left = T::from_str(&s[..index]).ok()?;
    let right = T::from_str(&s[index + 1..]).ok()?;
    Some((left, right))
}

fn validate_pair<T: FromStr + PartialOrd>(
    s: &str,
    separator: char,
    low: T,
    parse_err: &str,
    range_err: &str,
) -> Result<(), String> {
    let (left, right) = parse_pair::<T>(s, separator).ok_or_else(|| parse_err.to_string())?;
    if left < low || right < low {
        return Err(range_err.to_string());
    }
    Ok(())
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    parse_err: &str,
    range_err: &str,
) -> Result<(), String> {
    let value = T::from_str(s).map_err(|_| parse_err.to_string())?;
    if value < low || value > high {
        return Err(range_err.to_string());
    }
    Ok(())
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const QUALITY: &str = "quality";
const SUPERSAMPLE: &str = "supersample";
const THREADS: &str = "threads";
const SEED: &str = "seed";
const SYMMETRY: &str = "symmetry";
const XFORMS: &str = "xforms";
const FRAMES: &str = "frames";
const TRANSPARENT: &str = "transparent";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("flamegen")
        .version("0.1.0")
        .about("Fractal flame renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output PNG file; animations number their frames"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("640x480")
                .validator(|s| {
                    validate_pair::<u16>(
                        &s,
                        'x',
                        1,
                        "Could not parse output image size",
                        "Output image must be at least 1x1",
                    )
                })
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(QUALITY)
                .required(false)
                .long(QUALITY)
                .short("q")
                .takes_value(true)
                .default_value("50")
                .validator(|s| {
                    validate_range(
                        &s,
                        0.01,
                        100_000.0,
                        "Could not parse quality",
                        "Quality must be between 0.01 and 100000",
                    )
                })
                .help("Samples per output pixel"),
        )
        .arg(
            Arg::with_name(SUPERSAMPLE)
                .required(false)
                .long(SUPERSAMPLE)
                .short("S")
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        4,
                        "Could not parse supersample",
                        "Supersample must be between 1 and 4",
                    )
                })
                .help("Histogram cells per output pixel, on each axis"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of render threads [default: all cores]"),
        )
        .arg(
            Arg::with_name(SEED)
                .required(false)
                .long(SEED)
                .takes_value(true)
                .validator(|s| {
                    u64::from_str(&s)
                        .map(|_| ())
                        .map_err(|_| "Could not parse seed".to_string())
                })
                .help("Seed for the genome and the render [default: random]"),
        )
        .arg(
            Arg::with_name(SYMMETRY)
                .required(false)
                .long(SYMMETRY)
                .takes_value(true)
                .allow_hyphen_values(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        -12,
                        12,
                        "Could not parse symmetry",
                        "Symmetry must be between -12 and 12",
                    )
                })
                .help("Rotational symmetry order; negative adds a mirror, 0 picks one"),
        )
        .arg(
            Arg::with_name(XFORMS)
                .required(false)
                .long(XFORMS)
                .short("x")
                .takes_value(true)
                .default_value("4")
                .validator(|s| {
                    validate_range(
                        &s,
                        2,
                        12,
                        "Could not parse xform count",
                        "Xform count must be between 2 and 12",
                    )
                })
                .help("Largest number of xforms in a random genome"),
        )
        .arg(
            Arg::with_name(FRAMES)
                .required(false)
                .long(FRAMES)
                .short("f")
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        10_000,
                        "Could not parse frame count",
                        "Frame count must be between 1 and 10000",
                    )
                })
                .help("Frames of an animation between two random genomes"),
        )
        .arg(
            Arg::with_name(TRANSPARENT)
                .long(TRANSPARENT)
                .help("Leave the background transparent"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>, Error> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(s) => T::from_str(s)
            .map(Some)
            .map_err(|_| err_msg(format!("Could not parse {}", name))),
    }
}

fn write_image(outfile: &Path, pixels: &[u8], bounds: (usize, usize)) -> Result<(), Error> {
    let output = File::create(outfile)?;
    let encoder = PNGEncoder::new(output);
    encoder.encode(pixels, bounds.0 as u32, bounds.1 as u32, ColorType::RGBA(8))?;
    Ok(())
}

/// `out.png` for a still; `out-0000.png`, `out-0001.png`, ... for frames.
fn frame_path(output: &str, index: usize, frames: usize) -> PathBuf {
    let path = Path::new(output);
    if frames == 1 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    path.with_file_name(format!("{}-{:04}.png", stem, index))
}

fn make_genome(opts: &RandomOptions, matches: &ArgMatches, rng: &mut IsaacRng) -> Result<Genome, Error> {
    let (width, height) = value::<String>(matches, SIZE)?
        .and_then(|s| parse_pair::<u16>(&s, 'x'))
        .ok_or_else(|| err_msg("Could not parse output image size"))?;
    let mut genome = random_genome(opts, rng);
    genome.width = width as usize;
    genome.height = height as usize;
    genome.quality = value(matches, QUALITY)?.unwrap_or(genome.quality);
    genome.supersample = value(matches, SUPERSAMPLE)?.unwrap_or(genome.supersample);
    if !fit_camera(&mut genome, 0.9, rng) {
        warn!("could not estimate the attractor's extent, keeping the default camera");
    }
    Ok(genome)
}

fn run() -> Result<(), Error> {
    let matches = args();
    let output = matches
        .value_of(OUTPUT)
        .ok_or_else(|| err_msg("An output file is required"))?;
    let seed = value(&matches, SEED)?.unwrap_or_else(rand::random::<u64>);
    let frames: usize = value(&matches, FRAMES)?.unwrap_or(1);
    info!("seed {}", seed);

    let opts = RandomOptions {
        max_xforms: value(&matches, XFORMS)?.unwrap_or(4),
        symmetry: value(&matches, SYMMETRY)?,
        ..RandomOptions::default()
    };
    let mut rng = IsaacRng::from_u64(seed);
    let first = make_genome(&opts, &matches, &mut rng)?;

    let mut settings = RenderSettings {
        seed,
        transparency: matches.is_present(TRANSPARENT),
        ..RenderSettings::default()
    };
    if let Some(threads) = value(&matches, THREADS)? {
        settings.threads = threads;
    }

    let mut renderer = Renderer::new(settings);
    if frames > 1 {
        let mut last = make_genome(&opts, &matches, &mut rng)?;
        last.time = 1.0;
        renderer.set_keyframes(vec![first, last], ProcessAction::FullRender);
    } else {
        renderer.set_genome(first, ProcessAction::FullRender);
    }

    let mut pixels = vec![0u8; renderer.final_buffer_size()];
    for index in 0..frames {
        let time = if frames > 1 {
            index as f64 / (frames - 1) as f64
        } else {
            0.0
        };
        match renderer.run(&mut pixels, time, 0, false, 0) {
            RenderStatus::Ok => {}
            RenderStatus::Abort => return Err(err_msg("Render aborted")),
            RenderStatus::Error => return Err(err_msg(renderer.error_report().to_string())),
        }
        let comments = renderer.image_comments();
        info!(
            "frame {}: {} iterations, {} bad values, {:?}",
            index, comments.num_iters, comments.bad_vals, comments.runtime
        );
        let (width, height) = renderer
            .current_genome()
            .map(|g| (g.width, g.height))
            .ok_or_else(|| err_msg("Renderer finished without a genome"))?;
        write_image(&frame_path(output, index, frames), &pixels, (width, height))?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
