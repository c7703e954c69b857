use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use kiln_engine::atlas::{AtlasBuilder, BuildEvent, FrameOptions, FrameSetup};
use kiln_engine::image::{Rgba, RgbaImage};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::source::{shared, BitmapSource, GlyphSource, SvgSource};
use kiln_engine::time::FrameClock;

const DIAMOND: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="48" height="48">
  <path d="M24 2 L46 24 L24 46 L2 24 Z" fill="#e0a030" stroke="#604010" stroke-width="2"/>
</svg>"##;

const RING: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64">
  <circle cx="32" cy="32" r="26" fill="none" stroke="#3090e0" stroke-width="8"/>
</svg>"##;

const PULSE_FRAMES: u32 = 8;
const GLYPHS: &str = "KILN";

/// Usage: `kiln-studio [OUT_DIR] [FONT_PATH]`
fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "kiln-out".to_owned()));
    let font_path = args.next();

    let mut clock = FrameClock::new();
    clock.set_fps(30.0).context("invalid frame rate")?;

    let builder = Rc::new(RefCell::new(AtlasBuilder::new()));
    builder.borrow_mut().add_event_listener(|event| match event {
        BuildEvent::Progress(p) => log::debug!("atlas progress {:.0}%", p * 100.0),
        BuildEvent::Complete => log::info!("atlas complete"),
        BuildEvent::Failed(err) => log::error!("atlas failed: {err}"),
    });

    queue_shapes(&mut builder.borrow_mut())?;
    queue_pulse(&mut builder.borrow_mut());
    match load_font(font_path.as_deref()) {
        Some(bytes) => queue_glyphs(&mut builder.borrow_mut(), &bytes)?,
        None => log::warn!("no font found, skipping glyph frames"),
    }

    AtlasBuilder::build_async(&builder, &mut clock).context("failed to start atlas build")?;
    clock.run_until(|_| !builder.borrow().is_running());

    log::info!(
        "clock: {} ticks, {:.2} fps measured, {:.3} ms per tick",
        clock.ticks(),
        clock.measured_fps(None),
        clock.measured_tick_time(None)
    );

    let builder = builder.borrow();
    let sheet = builder.sprite_sheet().context("atlas build produced no sprite sheet")?;
    let written = sheet
        .save(&out_dir, "kiln")
        .with_context(|| format!("failed to write sprite sheet to {}", out_dir.display()))?;

    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn queue_shapes(builder: &mut AtlasBuilder) -> Result<()> {
    let diamond = DIAMOND
        .parse::<SvgSource>()
        .context("diamond svg")?
        .with_registration(24.0, 24.0);
    let ring = RING
        .parse::<SvgSource>()
        .context("ring svg")?
        .with_registration(32.0, 32.0);

    let diamond = shared(diamond);
    builder.add_frame(diamond.clone());
    builder.add_frame_with(diamond, FrameOptions::default().scale(0.5));
    builder.add_frame(shared(ring));
    Ok(())
}

/// One bitmap source redrawn with a growing disc for each animation frame.
fn queue_pulse(builder: &mut AtlasBuilder) {
    let size = 32;
    let pulse = shared(BitmapSource::new(disc(size, 1.0)).with_registration(16.0, 16.0));

    let first = builder.queued().len();
    for step in 0..PULSE_FRAMES {
        let radius = 2.0 + step as f32 * 14.0 / (PULSE_FRAMES - 1) as f32;
        let setup = FrameSetup::new(pulse.clone(), disc(size, radius), |src: &mut BitmapSource, img| {
            src.set_image(img.clone())
        });
        builder.add_frame_with(pulse.clone(), FrameOptions::default().setup(setup));
    }

    let frames = (first..builder.queued().len()).collect();
    builder.add_animation("pulse", frames, Some("pulse".to_owned()), Some(0.5));
}

fn queue_glyphs(builder: &mut AtlasBuilder, font: &[u8]) -> Result<()> {
    let Some(first_char) = GLYPHS.chars().next() else {
        return Ok(());
    };
    let glyph = GlyphSource::from_font_bytes(font, first_char, 48.0)
        .context("failed to load font")?
        .with_color(Rgba([240, 240, 240, 255]));
    let glyph = shared(glyph);

    let first = builder.queued().len();
    for ch in GLYPHS.chars() {
        let Some(rect) = glyph.borrow().glyph_bounds(ch) else {
            log::warn!("glyph {ch:?} has no outline, skipping");
            continue;
        };
        let setup = FrameSetup::new(glyph.clone(), ch, |g: &mut GlyphSource, ch| g.set_char(*ch));
        builder.add_frame_with(glyph.clone(), FrameOptions::default().rect(rect).setup(setup));
    }

    let frames = (first..builder.queued().len()).collect();
    builder.add_animation("title", frames, None, Some(0.25));
    Ok(())
}

fn disc(size: u32, radius: f32) -> RgbaImage {
    let c = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - c;
        let dy = y as f32 + 0.5 - c;
        let d = (dx * dx + dy * dy).sqrt();
        let alpha = (radius - d + 0.5).clamp(0.0, 1.0);
        Rgba([220, 60, 60, (alpha * 255.0) as u8])
    })
}

fn load_font(explicit: Option<&str>) -> Option<Vec<u8>> {
    if let Some(path) = explicit {
        return match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("cannot read font {path}: {err}");
                None
            }
        };
    }

    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}
