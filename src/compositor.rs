//! Off-screen rendering of the overlay panels.
//!
//! Frames are drawn into a premultiplied RGBA [`Pixmap`] with `tiny-skia`;
//! text is shaped and rasterised by `cosmic-text` and blended in by hand.
//! The platform layer converts the finished surface to BGRA for the layered
//! window.

use std::fmt::Write as _;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use tiny_skia::{
    Color, FillRule, Paint, Path, PathBuilder, Pixmap, PremultipliedColorU8, Rect as SkRect, Stroke,
    Transform,
};
use tracing::debug;

use crate::config::{CpuMode, OverlayConfig, PanelColors, Rgba};
use crate::error::OverlayError;
use crate::layout::{Panel, PanelLayout, Section, CORE_BAR_GAP, CORE_BAR_WIDTH, CORE_ROWS, PANEL_PADDING};
use crate::metrics::{HistorySeries, MetricHistory, MetricSnapshot, HISTORY_LEN};

/// Space kept free above the sparkline for the label row.
const SPARKLINE_HEADROOM: f32 = 14.0;
const FILL_ALPHA: u8 = 45;
const STROKE_WIDTH: f32 = 1.2;
/// Surfaces shorter than this put the value in the label row. Small-icon
/// taskbars (30px, floored to the 32px minimum) fall below it.
const INLINE_VALUE_HEIGHT: i32 = 36;
/// Top of the per-core bar grid.
const CORE_GRID_TOP: i32 = 10;
const CORE_ROW_GAP: i32 = 2;

const DIVIDER: Rgba = Rgba::rgb(0x3C, 0x3C, 0x3C);
const LABEL: Rgba = Rgba::rgb(0x80, 0x80, 0x80);
const CORE_BAR_BACKGROUND: Rgba = Rgba::rgb(0x30, 0x30, 0x30);
const SHADOW: Rgba = Rgba {
    r: 0,
    g: 0,
    b: 0,
    a: 200,
};

#[cfg(windows)]
const FONT_FAMILY: Family<'static> = Family::Name("Segoe UI");
#[cfg(not(windows))]
const FONT_FAMILY: Family<'static> = Family::SansSerif;

/// 6.5pt and 7.5pt at 96 DPI.
const LABEL_FONT_PX: f32 = 6.5 * 96.0 / 72.0;
const VALUE_FONT_PX: f32 = 7.5 * 96.0 / 72.0;

/// Format a byte rate with a binary unit suffix.
pub fn format_speed(bytes_per_sec: f32) -> String {
    let mut out = String::new();
    write_speed(&mut out, bytes_per_sec);
    out
}

/// [`format_speed`] into an existing buffer.
pub fn write_speed(out: &mut String, bytes_per_sec: f32) {
    const KIB: f32 = 1024.0;
    const MIB: f32 = KIB * 1024.0;
    const GIB: f32 = MIB * 1024.0;

    let bps = if bytes_per_sec.is_finite() { bytes_per_sec.max(0.0) } else { 0.0 };
    let _ = if bps >= GIB {
        write!(out, "{:.1}GB/s", bps / GIB)
    } else if bps >= MIB {
        write!(out, "{:.1}MB/s", bps / MIB)
    } else if bps >= KIB {
        write!(out, "{:.0}KB/s", bps / KIB)
    } else {
        write!(out, "{:.0}B/s", bps)
    };
}

/// Green at 0, yellow at 0.5, red at 1.
pub fn heat_color(fraction: f32) -> Rgba {
    let p = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    if p <= 0.5 {
        Rgba::rgb((p * 2.0 * 255.0) as u8, 200, 0)
    } else {
        Rgba::rgb(255, ((1.0 - (p - 0.5) * 2.0) * 200.0) as u8, 0)
    }
}

/// Where a panel's value readout goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePlacement {
    /// Centred in the lower part of the panel.
    Body,
    /// Right-aligned in the label row.
    Inline,
}

pub fn value_placement(height: i32) -> ValuePlacement {
    if height < INLINE_VALUE_HEIGHT {
        ValuePlacement::Inline
    } else {
        ValuePlacement::Body
    }
}

/// Copy a premultiplied RGBA surface into a BGRA buffer, as GDI DIBs expect.
pub fn copy_to_bgra(src: &Pixmap, dst: &mut [u8]) {
    for (out, px) in dst.chunks_exact_mut(4).zip(src.data().chunks_exact(4)) {
        out[0] = px[2];
        out[1] = px[1];
        out[2] = px[0];
        out[3] = px[3];
    }
}

/// Everything one frame is drawn from.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub snapshot: &'a MetricSnapshot,
    pub history: &'a MetricHistory,
    /// Network sparkline ceiling in bytes/sec.
    pub net_scale: f32,
    pub config: &'a OverlayConfig,
    pub layout: &'a PanelLayout,
    pub height: i32,
}

#[derive(Clone, Copy)]
enum FontRole {
    Label,
    Value,
}

#[derive(Clone, Copy)]
enum Align {
    Start,
    End,
    Center,
}

/// Text box in surface pixels.
#[derive(Clone, Copy)]
struct TextBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Shapes and rasterises short strings with two reusable buffers.
struct TextPainter {
    font_system: FontSystem,
    cache: SwashCache,
    label: Buffer,
    value: Buffer,
}

impl TextPainter {
    fn new() -> Self {
        let mut font_system = FontSystem::new();
        let mut label = Buffer::new(&mut font_system, Metrics::new(LABEL_FONT_PX, LABEL_FONT_PX + 2.0));
        let mut value = Buffer::new(&mut font_system, Metrics::new(VALUE_FONT_PX, VALUE_FONT_PX + 3.0));
        label.set_size(&mut font_system, None, None);
        value.set_size(&mut font_system, None, None);

        Self {
            font_system,
            cache: SwashCache::new(),
            label,
            value,
        }
    }

    /// Draw `text` aligned inside `area`, with a 1px drop shadow first.
    fn draw(&mut self, pixmap: &mut Pixmap, role: FontRole, text: &str, color: Rgba, area: TextBox, align: Align) {
        let (buffer, weight) = match role {
            FontRole::Label => (&mut self.label, Weight::NORMAL),
            FontRole::Value => (&mut self.value, Weight::BOLD),
        };

        let attrs = Attrs::new().family(FONT_FAMILY).weight(weight);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let text_width = buffer.layout_runs().map(|run| run.line_w).fold(0.0, f32::max);
        let text_height = buffer.metrics().line_height;

        let x = match align {
            Align::Start => area.x,
            Align::End => area.x + area.width - text_width,
            Align::Center => area.x + (area.width - text_width) / 2.0,
        };
        let y = match align {
            Align::Center => area.y + (area.height - text_height) / 2.0,
            _ => area.y,
        };
        let (ox, oy) = (x.round() as i32, y.round() as i32);

        for (dx, dy, tint) in [(1, 1, SHADOW), (0, 0, color)] {
            let tint = cosmic_text::Color::rgba(tint.r, tint.g, tint.b, tint.a);
            buffer.draw(&mut self.font_system, &mut self.cache, tint, |gx, gy, w, h, c| {
                blend_rect(pixmap, ox + dx + gx, oy + dy + gy, w, h, Rgba { r: c.r(), g: c.g(), b: c.b(), a: c.a() });
            });
        }
    }
}

/// Source-over blend of a solid colour into a clipped rectangle.
fn blend_rect(pixmap: &mut Pixmap, x: i32, y: i32, w: u32, h: u32, color: Rgba) {
    if color.a == 0 {
        return;
    }
    let (pw, ph) = (pixmap.width() as i32, pixmap.height() as i32);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w as i32).min(pw);
    let y1 = (y + h as i32).min(ph);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let sa = color.a as u32;
    let premul = |c: u8| ((c as u32 * sa + 127) / 255) as u8;
    let (sr, sg, sb) = (premul(color.r), premul(color.g), premul(color.b));
    let inv = 255 - sa;
    let over = |s: u8, d: u8| s.saturating_add(((d as u32 * inv + 127) / 255) as u8);

    let pixels = pixmap.pixels_mut();
    for row in y0..y1 {
        for col in x0..x1 {
            let idx = (row * pw + col) as usize;
            let dst = pixels[idx];
            let blended = PremultipliedColorU8::from_rgba(
                over(sr, dst.red()),
                over(sg, dst.green()),
                over(sb, dst.blue()),
                over(sa as u8, dst.alpha()),
            );
            if let Some(px) = blended {
                pixels[idx] = px;
            }
        }
    }
}

/// Paints, text buffers and scratch space, built once and reused every frame.
struct DrawResources {
    text: TextPainter,
    fill: Paint<'static>,
    line: Paint<'static>,
    stroke: Stroke,
    samples: Vec<f32>,
    spare_path: Option<Path>,
    value: String,
}

impl DrawResources {
    fn new() -> Self {
        let mut fill = Paint::default();
        fill.anti_alias = true;
        let mut line = Paint::default();
        line.anti_alias = true;

        Self {
            text: TextPainter::new(),
            fill,
            line,
            stroke: Stroke {
                width: STROKE_WIDTH,
                ..Stroke::default()
            },
            samples: vec![0.0; HISTORY_LEN],
            spare_path: None,
            value: String::with_capacity(16),
        }
    }
}

/// Owns the overlay surface and renders frames into it.
pub struct Compositor {
    surface: Option<Pixmap>,
    res: DrawResources,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            surface: None,
            res: DrawResources::new(),
        }
    }

    /// Last rendered surface, if any.
    pub fn surface(&self) -> Option<&Pixmap> {
        self.surface.as_ref()
    }

    /// Draw every enabled panel left to right and return the surface.
    ///
    /// The surface is reallocated when the layout width or height changed.
    /// If that allocation fails the frame is skipped and the next call
    /// retries.
    pub fn render(&mut self, frame: Frame<'_>) -> Result<&Pixmap, OverlayError> {
        let width = frame.layout.width().max(1) as u32;
        let height = frame.height.max(1) as u32;

        let stale = self
            .surface
            .as_ref()
            .map_or(true, |s| s.width() != width || s.height() != height);
        if stale {
            self.surface = None;
            let pixmap = Pixmap::new(width, height).ok_or(OverlayError::SurfaceAllocation { width, height })?;
            debug!("Allocated {}x{} overlay surface", width, height);
            self.surface = Some(pixmap);
        }

        let Some(pixmap) = self.surface.as_mut() else {
            return Err(OverlayError::SurfaceAllocation { width, height });
        };

        // Alpha 1 keeps the background visually clear but hit-testable
        pixmap.fill(Color::from_rgba8(0, 0, 0, 1));

        let colors = frame.config.colors();
        let placement = value_placement(frame.height);
        for (index, section) in frame.layout.sections().iter().enumerate() {
            if index > 0 {
                draw_divider(pixmap, &mut self.res, section.x, frame.height);
            }
            draw_panel(pixmap, &mut self.res, &frame, &colors, placement, section);
        }

        Ok(pixmap)
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_divider(pixmap: &mut Pixmap, res: &mut DrawResources, x: i32, height: i32) {
    if let Some(rect) = SkRect::from_xywh(x as f32, 2.0, 1.0, (height - 4) as f32) {
        res.line.set_color_rgba8(DIVIDER.r, DIVIDER.g, DIVIDER.b, 255);
        pixmap.fill_rect(rect, &res.line, Transform::identity(), None);
    }
}

fn draw_panel(
    pixmap: &mut Pixmap,
    res: &mut DrawResources,
    frame: &Frame<'_>,
    colors: &PanelColors,
    placement: ValuePlacement,
    section: &Section,
) {
    let snap = frame.snapshot;
    let history = frame.history;

    match section.panel {
        Panel::NetUp => {
            draw_sparkline(pixmap, res, &history.net_up, section, frame.height, frame.net_scale, colors.net_up);
            res.value.clear();
            write_speed(&mut res.value, snap.net_up_bps);
            draw_labelled_value(pixmap, res, section, frame.height, placement, colors.net_up);
        }
        Panel::NetDown => {
            draw_sparkline(pixmap, res, &history.net_down, section, frame.height, frame.net_scale, colors.net_down);
            res.value.clear();
            write_speed(&mut res.value, snap.net_down_bps);
            draw_labelled_value(pixmap, res, section, frame.height, placement, colors.net_down);
        }
        Panel::Cpu => match frame.config.cpu_mode {
            CpuMode::Aggregate => {
                draw_sparkline(pixmap, res, &history.cpu, section, frame.height, 100.0, colors.cpu);
                res.value.clear();
                let _ = write!(res.value, "{:.0}%", snap.cpu_total);
                draw_labelled_value(pixmap, res, section, frame.height, placement, colors.cpu);
            }
            CpuMode::PerCore => draw_core_grid(pixmap, res, snap, section, frame.height, colors.cpu),
        },
        Panel::Gpu => draw_gpu(pixmap, res, frame, colors, placement, section),
        Panel::Memory => {
            draw_sparkline(pixmap, res, &history.memory, section, frame.height, 100.0, colors.memory);
            res.value.clear();
            let _ = write!(res.value, "{:.0}%", snap.mem_percent);
            draw_labelled_value(pixmap, res, section, frame.height, placement, colors.memory);
        }
    }
}

fn label_row(section: &Section, height: i32) -> TextBox {
    TextBox {
        x: (section.x + 3) as f32,
        y: 1.0,
        width: (section.width - 6) as f32,
        height: height as f32 * 0.45,
    }
}

fn value_body(section: &Section, height: i32) -> TextBox {
    TextBox {
        x: (section.x + 2) as f32,
        y: height as f32 * 0.42,
        width: (section.width - 4) as f32,
        height: height as f32 * 0.58,
    }
}

/// Dim panel label plus the value currently in `res.value`.
fn draw_labelled_value(
    pixmap: &mut Pixmap,
    res: &mut DrawResources,
    section: &Section,
    height: i32,
    placement: ValuePlacement,
    color: Rgba,
) {
    let row = label_row(section, height);
    res.text.draw(pixmap, FontRole::Label, section.panel.label(), LABEL, row, Align::Start);

    match placement {
        ValuePlacement::Inline => {
            res.text.draw(pixmap, FontRole::Label, &res.value, color, row, Align::End);
        }
        ValuePlacement::Body => {
            let body = value_body(section, height);
            res.text.draw(pixmap, FontRole::Value, &res.value, color, body, Align::Center);
        }
    }
}

/// GPU panel: util% and temperature share one section.
fn draw_gpu(
    pixmap: &mut Pixmap,
    res: &mut DrawResources,
    frame: &Frame<'_>,
    colors: &PanelColors,
    placement: ValuePlacement,
    section: &Section,
) {
    let config = frame.config;
    let snap = frame.snapshot;

    draw_sparkline(pixmap, res, &frame.history.gpu, section, frame.height, 100.0, colors.gpu);

    if config.show_gpu_util && config.show_gpu_temp {
        let row = label_row(section, frame.height);
        res.text.draw(pixmap, FontRole::Label, section.panel.label(), LABEL, row, Align::Start);

        res.value.clear();
        let _ = write!(res.value, "{:.0}%", snap.gpu_util);
        res.text.draw(pixmap, FontRole::Label, &res.value, colors.gpu, row, Align::End);

        res.value.clear();
        let _ = write!(res.value, "{}\u{00B0}C", snap.gpu_temp_c);
        let (role, area, align) = match placement {
            ValuePlacement::Body => (FontRole::Value, value_body(section, frame.height), Align::Center),
            // No room for a second line; the temperature takes the centre of the row
            ValuePlacement::Inline => (FontRole::Label, row, Align::Center),
        };
        res.text.draw(pixmap, role, &res.value, colors.gpu_temp, area, align);
        return;
    }

    res.value.clear();
    let color = if config.show_gpu_util {
        let _ = write!(res.value, "{:.0}%", snap.gpu_util);
        colors.gpu
    } else {
        let _ = write!(res.value, "{}\u{00B0}C", snap.gpu_temp_c);
        colors.gpu_temp
    };
    draw_labelled_value(pixmap, res, section, frame.height, placement, color);
}

/// Filled area chart of `series` over the whole section.
fn draw_sparkline(
    pixmap: &mut Pixmap,
    res: &mut DrawResources,
    series: &HistorySeries,
    section: &Section,
    height: i32,
    scale: f32,
    color: Rgba,
) {
    res.samples.resize(series.capacity(), 0.0);
    series.snapshot_into(&mut res.samples);

    let n = res.samples.len();
    if n < 2 || section.width < 2 {
        return;
    }

    let scale = if scale > 0.0 && scale.is_finite() { scale } else { 100.0 };
    let left = section.x as f32;
    let width = section.width as f32;
    let bottom = height as f32;
    let max_h = (bottom - SPARKLINE_HEADROOM).max(1.0);

    let point = |i: usize, v: f32| {
        let fraction = if v.is_finite() { (v / scale).clamp(0.0, 1.0) } else { 0.0 };
        (left + i as f32 / (n - 1) as f32 * width, bottom - fraction * max_h)
    };

    // Area under the curve
    let mut pb = res.spare_path.take().map(Path::clear).unwrap_or_else(PathBuilder::new);
    pb.move_to(left, bottom);
    for (i, v) in res.samples.iter().enumerate() {
        let (x, y) = point(i, *v);
        pb.line_to(x, y);
    }
    pb.line_to(left + width, bottom);
    pb.close();

    if let Some(area) = pb.finish() {
        res.fill.set_color_rgba8(color.r, color.g, color.b, FILL_ALPHA);
        pixmap.fill_path(&area, &res.fill, FillRule::Winding, Transform::identity(), None);
        res.spare_path = Some(area);
    }

    // Edge
    let mut pb = res.spare_path.take().map(Path::clear).unwrap_or_else(PathBuilder::new);
    for (i, v) in res.samples.iter().enumerate() {
        let (x, y) = point(i, *v);
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }

    if let Some(edge) = pb.finish() {
        res.line.set_color_rgba8(color.r, color.g, color.b, 255);
        pixmap.stroke_path(&edge, &res.line, &res.stroke, Transform::identity(), None);
        res.spare_path = Some(edge);
    }
}

/// Per-core heat bars in a fixed three-row grid.
fn draw_core_grid(
    pixmap: &mut Pixmap,
    res: &mut DrawResources,
    snap: &MetricSnapshot,
    section: &Section,
    height: i32,
    cpu_color: Rgba,
) {
    let cores = snap.cpu_per_core.len();
    let columns = cores.max(1).div_ceil(CORE_ROWS);
    let grid_x = section.x + PANEL_PADDING;
    let grid_w = section.width - 2 * PANEL_PADDING;

    let header = TextBox {
        x: grid_x as f32,
        y: 1.0,
        width: grid_w as f32,
        height: 9.0,
    };
    res.text.draw(pixmap, FontRole::Label, section.panel.label(), LABEL, header, Align::Start);
    res.value.clear();
    let _ = write!(res.value, "{:.0}%", snap.cpu_total);
    res.text.draw(pixmap, FontRole::Label, &res.value, cpu_color, header, Align::End);

    let rows = CORE_ROWS as i32;
    let row_h = ((height - CORE_GRID_TOP - (rows - 1) * CORE_ROW_GAP) / rows).max(1);

    for (index, usage) in snap.cpu_per_core.iter().enumerate() {
        let row = (index / columns) as i32;
        let col = (index % columns) as i32;
        let bar_x = (grid_x + col * (CORE_BAR_WIDTH + CORE_BAR_GAP)) as f32;
        let row_top = CORE_GRID_TOP + row * (row_h + CORE_ROW_GAP);

        let fraction = (usage / 100.0).clamp(0.0, 1.0);
        let bar_h = ((fraction * row_h as f32) as i32).max(1);

        if let Some(bg) = SkRect::from_xywh(bar_x, row_top as f32, CORE_BAR_WIDTH as f32, row_h as f32) {
            res.line
                .set_color_rgba8(CORE_BAR_BACKGROUND.r, CORE_BAR_BACKGROUND.g, CORE_BAR_BACKGROUND.b, 255);
            pixmap.fill_rect(bg, &res.line, Transform::identity(), None);
        }

        let heat = heat_color(fraction);
        let bar_y = (row_top + row_h - bar_h) as f32;
        if let Some(bar) = SkRect::from_xywh(bar_x, bar_y, CORE_BAR_WIDTH as f32, bar_h as f32) {
            res.line.set_color_rgba8(heat.r, heat.g, heat.b, 255);
            pixmap.fill_rect(bar, &res.line, Transform::identity(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MIN_HEIGHT, PANEL_WIDTH};

    fn history(cores: usize) -> MetricHistory {
        MetricHistory::new(cores)
    }

    fn only_memory() -> OverlayConfig {
        OverlayConfig {
            show_net_up: false,
            show_net_down: false,
            show_cpu: false,
            show_gpu_util: false,
            show_gpu_temp: false,
            ..OverlayConfig::default()
        }
    }

    fn only(panel: Panel) -> OverlayConfig {
        OverlayConfig {
            show_net_down: panel == Panel::NetDown,
            show_cpu: panel == Panel::Cpu,
            show_memory: panel == Panel::Memory,
            ..only_memory()
        }
    }

    fn render(config: &OverlayConfig, snapshot: &MetricSnapshot, history: &MetricHistory, net_scale: f32, height: i32) -> Pixmap {
        let layout = PanelLayout::new(config, snapshot.cpu_per_core.len());
        Compositor::new()
            .render(Frame {
                snapshot,
                history,
                net_scale,
                config,
                layout: &layout,
                height,
            })
            .unwrap()
            .clone()
    }

    fn alpha_at(surface: &Pixmap, x: u32, y: u32) -> u8 {
        surface.pixel(x, y).unwrap().alpha()
    }

    /// Most opaque row of column `x` below the label row.
    fn stroke_row(surface: &Pixmap, x: u32) -> (u32, u8) {
        (SPARKLINE_HEADROOM as u32..surface.height())
            .map(|y| (y, alpha_at(surface, x, y)))
            .max_by_key(|&(_, a)| a)
            .unwrap()
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(0.0), "0B/s");
        assert_eq!(format_speed(500.0), "500B/s");
        assert_eq!(format_speed(1023.0), "1023B/s");
        assert_eq!(format_speed(1024.0), "1KB/s");
        assert_eq!(format_speed(2048.0), "2KB/s");
        assert_eq!(format_speed(1_048_576.0), "1.0MB/s");
        assert_eq!(format_speed(3.0 * 1_048_576.0), "3.0MB/s");
        assert_eq!(format_speed(1_073_741_824.0), "1.0GB/s");
        assert_eq!(format_speed(5.0 * 1_073_741_824.0), "5.0GB/s");
        assert_eq!(format_speed(-10.0), "0B/s");
        assert_eq!(format_speed(f32::NAN), "0B/s");
    }

    #[test]
    fn test_heat_ramp() {
        assert_eq!(heat_color(0.0), Rgba::rgb(0, 200, 0));
        assert_eq!(heat_color(0.5), Rgba::rgb(255, 200, 0));
        assert_eq!(heat_color(1.0), Rgba::rgb(255, 0, 0));
        assert_eq!(heat_color(0.25), Rgba::rgb(127, 200, 0));
        assert_eq!(heat_color(0.75), Rgba::rgb(255, 100, 0));
        assert_eq!(heat_color(3.0), heat_color(1.0));
    }

    #[test]
    fn test_value_placement() {
        assert_eq!(value_placement(MIN_HEIGHT), ValuePlacement::Inline);
        assert_eq!(value_placement(35), ValuePlacement::Inline);
        assert_eq!(value_placement(36), ValuePlacement::Body);
        assert_eq!(value_placement(40), ValuePlacement::Body);
        assert_eq!(value_placement(48), ValuePlacement::Body);
    }

    #[test]
    fn test_copy_to_bgra_swaps_channels() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        pixmap.fill(Color::from_rgba8(10, 20, 30, 255));
        let mut out = [0u8; 4];
        copy_to_bgra(&pixmap, &mut out);
        assert_eq!(out, [30, 20, 10, 255]);
    }

    #[test]
    fn test_blend_rect_is_clipped_and_keeps_premultiplied_invariant() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(Color::from_rgba8(0, 0, 0, 1));
        blend_rect(&mut pixmap, -2, -2, 4, 4, Rgba { r: 255, g: 128, b: 0, a: 128 });

        let px = pixmap.pixel(1, 1).unwrap();
        assert!(px.alpha() >= 128);
        assert!(px.red() <= px.alpha());
        assert_eq!(pixmap.pixel(2, 2).unwrap().alpha(), 1);
    }

    #[test]
    fn test_single_panel_has_no_divider_and_clear_background() {
        let config = only_memory();
        let layout = PanelLayout::new(&config, 4);
        let snapshot = MetricSnapshot::default();
        let history = history(4);

        let mut compositor = Compositor::new();
        let surface = compositor
            .render(Frame {
                snapshot: &snapshot,
                history: &history,
                net_scale: 1_048_576.0,
                config: &config,
                layout: &layout,
                height: 40,
            })
            .unwrap();

        assert_eq!(surface.width(), PANEL_WIDTH as u32);
        assert_eq!(surface.height(), 40);
        // Left edge, mid-height: no divider and no text
        assert_eq!(surface.pixel(0, 20).unwrap().alpha(), 1);
    }

    #[test]
    fn test_divider_between_panels_and_surface_resizes() {
        let mut config = only_memory();
        let history = history(4);
        let snapshot = MetricSnapshot::default();
        let mut compositor = Compositor::new();

        let layout = PanelLayout::new(&config, 4);
        let width = compositor
            .render(Frame {
                snapshot: &snapshot,
                history: &history,
                net_scale: 1_048_576.0,
                config: &config,
                layout: &layout,
                height: 40,
            })
            .unwrap()
            .width();
        assert_eq!(width, 70);

        config.show_cpu = true;
        let layout = PanelLayout::new(&config, 4);
        let surface = compositor
            .render(Frame {
                snapshot: &snapshot,
                history: &history,
                net_scale: 1_048_576.0,
                config: &config,
                layout: &layout,
                height: 40,
            })
            .unwrap();
        assert_eq!(surface.width(), 140);

        let divider = surface.pixel(70, 20).unwrap();
        assert_eq!(
            (divider.red(), divider.green(), divider.blue(), divider.alpha()),
            (0x3C, 0x3C, 0x3C, 255)
        );
    }

    #[test]
    fn test_core_grid_colours_busy_core_red() {
        let config = OverlayConfig {
            cpu_mode: CpuMode::PerCore,
            ..only_memory()
        };
        let config = OverlayConfig {
            show_cpu: true,
            show_memory: false,
            ..config
        };
        let layout = PanelLayout::new(&config, 3);
        let snapshot = MetricSnapshot {
            cpu_per_core: vec![100.0, 0.0, 0.0],
            ..MetricSnapshot::default()
        };
        let history = history(3);
        let mut compositor = Compositor::new();
        let surface = compositor
            .render(Frame {
                snapshot: &snapshot,
                history: &history,
                net_scale: 1_048_576.0,
                config: &config,
                layout: &layout,
                height: 48,
            })
            .unwrap();

        // Three cores, one column: core 0 fills the first row completely
        let row_h = (48 - 10 - 4) / 3;
        let busy = surface.pixel(PANEL_PADDING as u32 + 4, (10 + row_h / 2) as u32).unwrap();
        assert_eq!((busy.red(), busy.green(), busy.blue()), (255, 0, 0));

        // Core 1 is idle: 1px green sliver at the bottom, background above
        let idle_top = surface.pixel(PANEL_PADDING as u32 + 4, (10 + row_h + 2 + 1) as u32).unwrap();
        assert_eq!((idle_top.red(), idle_top.green(), idle_top.blue()), (0x30, 0x30, 0x30));
    }

    #[test]
    fn test_sparkline_sits_below_headroom_with_translucent_fill() {
        let config = only(Panel::Cpu);
        let snapshot = MetricSnapshot {
            cpu_total: 50.0,
            cpu_per_core: vec![50.0; 4],
            ..MetricSnapshot::default()
        };
        let mut history = history(4);
        for _ in 0..HISTORY_LEN {
            history.cpu.push(50.0);
        }
        let surface = render(&config, &snapshot, &history, 1_048_576.0, 48);

        // Column 5 is clear of the label and of the centred value text
        for y in 14..=28 {
            assert_eq!(alpha_at(&surface, 5, y), 1, "y = {y}");
        }

        // 50% of the 34px below the headroom: stroke around y = 31
        let (row, alpha) = stroke_row(&surface, 5);
        assert!((30..=32).contains(&row), "stroke at {row}");
        assert!(alpha >= 120, "stroke alpha {alpha}");

        for y in 33..48 {
            let a = alpha_at(&surface, 5, y);
            assert!((44..=48).contains(&a), "fill alpha {a} at y = {y}");
        }
    }

    #[test]
    fn test_network_sparkline_follows_scale() {
        let config = only(Panel::NetDown);
        let snapshot = MetricSnapshot {
            net_down_bps: 512.0 * 1024.0,
            cpu_per_core: vec![0.0; 4],
            ..MetricSnapshot::default()
        };
        let mut history = history(4);
        for _ in 0..HISTORY_LEN {
            history.net_down.push(512.0 * 1024.0);
        }

        // Half of a 1 MiB/s ceiling, then an eighth of 4 MiB/s
        let (tall, _) = stroke_row(&render(&config, &snapshot, &history, 1_048_576.0, 48), 5);
        let (low, _) = stroke_row(&render(&config, &snapshot, &history, 4.0 * 1_048_576.0, 48), 5);
        assert!((30..=32).contains(&tall), "stroke at {tall}");
        assert!((43..=45).contains(&low), "stroke at {low}");
    }

    #[test]
    fn test_label_text_has_dark_shadow() {
        let config = only_memory();
        let snapshot = MetricSnapshot {
            cpu_per_core: vec![0.0; 4],
            ..MetricSnapshot::default()
        };
        let surface = render(&config, &snapshot, &history(4), 1_048_576.0, 48);

        let mut text = 0;
        let mut shadow = 0;
        for y in 0..14 {
            for x in 0..40 {
                let px = surface.pixel(x, y).unwrap();
                if px.red() >= 0x40 {
                    text += 1;
                } else if px.alpha() >= 100 && px.red().max(px.green()).max(px.blue()) < 40 {
                    shadow += 1;
                }
            }
        }
        assert!(text > 0, "no label pixels");
        assert!(shadow > 0, "no shadow pixels");
    }

    #[test]
    fn test_short_surface_keeps_value_in_label_row() {
        let config = only_memory();
        let snapshot = MetricSnapshot {
            mem_percent: 88.0,
            cpu_per_core: vec![0.0; 4],
            ..MetricSnapshot::default()
        };
        let history = history(4);

        // Idle sparkline hugs the bottom row, so anything above it is text
        let short = render(&config, &snapshot, &history, 1_048_576.0, MIN_HEIGHT);
        for y in 14..=29 {
            for x in 0..PANEL_WIDTH as u32 {
                assert_eq!(alpha_at(&short, x, y), 1, "({x}, {y})");
            }
        }

        let tall = render(&config, &snapshot, &history, 1_048_576.0, 48);
        let body_text = (14..=45).any(|y| (0..PANEL_WIDTH as u32).any(|x| alpha_at(&tall, x, y) > 1));
        assert!(body_text, "value missing from the body");
    }
}
