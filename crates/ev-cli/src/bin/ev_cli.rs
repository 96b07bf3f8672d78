use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{GrayImage, Rgb, RgbImage};
use serde::Serialize;

use ev_core::Xy;
use ev_graph::{Segment, Thickness};
use ev_map::{EqualizeValues, MapConfig, PixelMap, from_json, to_json};

#[derive(Parser, Debug)]
#[command(name = "ev_cli")]
#[command(about = "Vectorize edge bitmaps and inspect the resulting maps")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(name = "vectorize")]
    Vectorize(VectorizeArgs),
    #[command(name = "svg")]
    Svg(SvgArgs),
    #[command(name = "overlay")]
    Overlay(OverlayArgs),
    #[command(name = "stats")]
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, default_value_t = 128)]
    threshold: u8,
    #[arg(long, default_value_t = 1.0)]
    tolerance: f32,
    #[arg(long, default_value_t = 1.0)]
    curve_preference: f32,
    #[arg(long)]
    is_360: bool,
}

#[derive(Args, Debug, Clone)]
struct VectorizeArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, required = true)]
    out: PathBuf,
    #[arg(long)]
    equalize: bool,
    #[arg(long, default_value_t = 0.05)]
    ignore: f32,
    #[arg(long, default_value_t = 0.35)]
    short: f32,
    #[arg(long, default_value_t = 0.75)]
    medium: f32,
}

#[derive(Args, Debug, Clone)]
struct SvgArgs {
    #[arg(long, required = true)]
    map: PathBuf,
    #[arg(long, required = true)]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct OverlayArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, required = true)]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, required = true)]
    out: PathBuf,
    #[arg(long, default_value_t = 0.05)]
    ignore: f32,
    #[arg(long, default_value_t = 0.35)]
    short: f32,
    #[arg(long, default_value_t = 0.75)]
    medium: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ThresholdsDto {
    short: usize,
    medium: usize,
    long: usize,
}

#[derive(Debug, Clone, Serialize)]
struct ThicknessCountsDto {
    none: usize,
    normal: usize,
    thick: usize,
}

#[derive(Debug, Clone, Serialize)]
struct StatsDto {
    width: usize,
    height: usize,
    is_360: bool,
    edge_pixels: usize,
    chain_count: usize,
    loop_count: usize,
    node_count: usize,
    segment_count: usize,
    curve_count: usize,
    chain_pixels: usize,
    thresholds: ThresholdsDto,
    thickness: ThicknessCountsDto,
}

const CHAIN_PALETTE: [Rgb<u8>; 6] = [
    Rgb([230, 60, 60]),
    Rgb([60, 140, 230]),
    Rgb([60, 180, 90]),
    Rgb([235, 160, 40]),
    Rgb([170, 90, 220]),
    Rgb([40, 190, 190]),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Vectorize(args) => run_vectorize(args),
        Command::Svg(args) => run_svg(args),
        Command::Overlay(args) => run_overlay(args),
        Command::Stats(args) => run_stats(args),
    }
}

fn run_vectorize(args: VectorizeArgs) -> Result<()> {
    let mut map = build_map(&args.common)?;

    if args.equalize {
        let thresholds = map.equalize(EqualizeValues {
            ignore: args.ignore,
            short: args.short,
            medium: args.medium,
        });
        tracing::info!(
            short = thresholds.short,
            medium = thresholds.medium,
            long = thresholds.long,
            "equalized chain thickness"
        );
    }

    let json = to_json(&map).context("serializing vector map")?;
    fs::write(&args.out, json).with_context(|| format!("writing map {}", args.out.display()))?;

    tracing::info!(
        chains = map.chain_count(),
        nodes = map.node_count(),
        "vectorized {}",
        args.common.input.display()
    );
    Ok(())
}

fn run_svg(args: SvgArgs) -> Result<()> {
    let json = fs::read_to_string(&args.map)
        .with_context(|| format!("reading map {}", args.map.display()))?;
    let map = from_json(&json, MapConfig::default())
        .with_context(|| format!("parsing map {}", args.map.display()))?;

    let svg = render_svg(&map);
    fs::write(&args.out, svg).with_context(|| format!("writing svg {}", args.out.display()))?;
    Ok(())
}

fn run_overlay(args: OverlayArgs) -> Result<()> {
    let luma = load_luma(&args.common.input)?;
    let map = map_from_luma(&luma, &args.common)?;

    let mut rgb = image::DynamicImage::ImageLuma8(luma).to_rgb8();
    draw_map(&mut rgb, &map);
    rgb.save(&args.out)
        .with_context(|| format!("writing overlay {}", args.out.display()))?;
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let mut map = build_map(&args.common)?;
    let thresholds = map.equalize(EqualizeValues {
        ignore: args.ignore,
        short: args.short,
        medium: args.medium,
    });

    let mut thickness = ThicknessCountsDto {
        none: 0,
        normal: 0,
        thick: 0,
    };
    let mut loop_count = 0;
    let mut segment_count = 0;
    let mut curve_count = 0;
    let mut chain_pixels = 0;
    for (_, chain) in map.chains() {
        match chain.thickness() {
            Thickness::None => thickness.none += 1,
            Thickness::Normal => thickness.normal += 1,
            Thickness::Thick => thickness.thick += 1,
        }
        if chain.is_loop() {
            loop_count += 1;
        }
        segment_count += chain.segments().len();
        curve_count += chain.segments().iter().filter(|s| s.is_curve()).count();
        chain_pixels += chain.pixel_count();
    }

    let edge_pixels = map
        .grid()
        .positions()
        .filter(|&p| map.grid().is_edge(p))
        .count();

    write_json(
        &args.out,
        &StatsDto {
            width: map.width(),
            height: map.height(),
            is_360: map.is_360(),
            edge_pixels,
            chain_count: map.chain_count(),
            loop_count,
            node_count: map.node_count(),
            segment_count,
            curve_count,
            chain_pixels,
            thresholds: ThresholdsDto {
                short: thresholds.short,
                medium: thresholds.medium,
                long: thresholds.long,
            },
            thickness,
        },
    )
}

fn build_map(common: &CommonArgs) -> Result<PixelMap> {
    let luma = load_luma(&common.input)?;
    map_from_luma(&luma, common)
}

fn load_luma(path: &Path) -> Result<GrayImage> {
    let dyn_img =
        image::open(path).with_context(|| format!("opening input image {}", path.display()))?;
    Ok(dyn_img.to_luma8())
}

fn map_from_luma(luma: &GrayImage, common: &CommonArgs) -> Result<PixelMap> {
    let (w, h) = luma.dimensions();
    let edges: Vec<u8> = luma
        .pixels()
        .map(|p| u8::from(p.0[0] >= common.threshold))
        .collect();

    let config = MapConfig {
        tolerance_px: common.tolerance,
        curve_preference: common.curve_preference,
        ..MapConfig::default()
    };
    PixelMap::from_bitmap(w as usize, h as usize, common.is_360, &edges, config)
        .with_context(|| format!("vectorizing {}", common.input.display()))
}

fn render_svg(map: &PixelMap) -> String {
    let width = map.width();
    let height = map.height();
    let px = height as f32;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    svg.push('\n');
    svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

    for (_, chain) in map.chains() {
        let Some(first) = chain.segments().first() else {
            continue;
        };
        let mut d = format!("M {}", path_point(first.start_point(), px));
        for segment in chain.segments() {
            match segment {
                Segment::Straight(s) => {
                    d.push_str(&format!(" L {}", path_point(s.b, px)));
                }
                Segment::Curve(c) => {
                    d.push_str(&format!(
                        " Q {} {}",
                        path_point(c.control, px),
                        path_point(c.b, px)
                    ));
                }
            }
        }
        if chain.is_loop() {
            d.push_str(" Z");
        }
        svg.push_str(&format!(
            r#"  <path d="{d}" fill="none" stroke="{color}" stroke-width="{stroke:.1}" stroke-linecap="round"/>"#,
            color = thickness_color(chain.thickness()),
            stroke = map.draw_px(chain),
        ));
        svg.push('\n');
    }

    for node in map.nodes() {
        svg.push_str(&format!(
            r#"  <circle cx="{}" cy="{}" r="1.5" fill="seagreen"/>"#,
            node.position.x, node.position.y
        ));
        svg.push('\n');
    }

    svg.push_str("</svg>\n");
    svg
}

fn path_point(p: ev_core::Point2f, px: f32) -> String {
    format!("{:.2} {:.2}", p.x * px, p.y * px)
}

fn thickness_color(thickness: Thickness) -> &'static str {
    match thickness {
        Thickness::None => "steelblue",
        Thickness::Normal => "darkorange",
        Thickness::Thick => "firebrick",
    }
}

fn draw_map(img: &mut RgbImage, map: &PixelMap) {
    for (id, chain) in map.chains() {
        let color = CHAIN_PALETTE[id.0 as usize % CHAIN_PALETTE.len()];
        for &p in chain.pixels() {
            put_px(img, p, color);
        }
    }
    for node in map.nodes() {
        draw_dot(img, node.position, Rgb([255, 255, 0]));
    }
}

fn draw_dot(img: &mut RgbImage, p: Xy, color: Rgb<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put_px(img, Xy::new(p.x + dx, p.y + dy), color);
        }
    }
}

fn put_px(img: &mut RgbImage, p: Xy, color: Rgb<u8>) {
    if p.x < 0 || p.y < 0 {
        return;
    }
    let (x, y) = (p.x as u32, p.y as u32);
    if x >= img.width() || y >= img.height() {
        return;
    }
    img.put_pixel(x, y, color);
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(path, bytes).with_context(|| format!("writing json {}", path.display()))
}
