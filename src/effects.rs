use rand::Rng;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::Frame;

/// Colour stops, interpolated evenly. The last stop should repeat the first for smooth cycling.
pub type Palette = &'static [(f64, f64, f64)];

/// Yellow -> red -> pink
pub const SUNSET: Palette = &[
    (234.0, 179.0, 8.0),
    (239.0, 68.0, 68.0),
    (219.0, 39.0, 119.0),
    (234.0, 179.0, 8.0),
];

/// Teal -> green -> cyan
pub const LAGOON: Palette = &[
    (20.0, 184.0, 166.0),
    (34.0, 197.0, 94.0),
    (6.0, 182.0, 212.0),
    (20.0, 184.0, 166.0),
];

/// Orange -> amber -> yellow
pub const EMBER: Palette = &[
    (249.0, 115.0, 22.0),
    (245.0, 158.0, 11.0),
    (250.0, 204.0, 21.0),
    (249.0, 115.0, 22.0),
];

/// Indigo -> purple -> pink
pub const DUSK: Palette = &[
    (99.0, 102.0, 241.0),
    (168.0, 85.0, 247.0),
    (244.0, 114.0, 182.0),
    (99.0, 102.0, 241.0),
];

pub const MAX_PARTICLES: usize = 20;
pub const PARTICLE_CHARS: &[char] = &['\u{00b7}', '\u{2218}', '\u{2022}', '\u{25e6}', '\u{20b9}'];

/// Interpolate along a palette for a position in 0.0..1.0
pub fn gradient_color(palette: Palette, t: f64) -> Color {
    match palette.len() {
        0 => return Color::Reset,
        1 => {
            let (r, g, b) = palette[0];
            return Color::Rgb(r as u8, g as u8, b as u8);
        }
        _ => {}
    }
    let t = t.rem_euclid(1.0);
    let segments = (palette.len() - 1) as f64;
    let scaled = t * segments;
    let idx = (scaled as usize).min(palette.len() - 2);
    let frac = scaled - idx as f64;

    let (r1, g1, b1) = palette[idx];
    let (r2, g2, b2) = palette[idx + 1];

    let r = (r1 + (r2 - r1) * frac) as u8;
    let g = (g1 + (g2 - g1) * frac) as u8;
    let b = (b1 + (b2 - b1) * frac) as u8;

    Color::Rgb(r, g, b)
}

/// One span per character, coloured along the palette and shifted by `phase`.
pub fn gradient_line(text: &str, palette: Palette, phase: f64) -> Line<'static> {
    let count = text.chars().count().max(1) as f64;
    let spans: Vec<Span<'static>> = text
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let t = phase + i as f64 / count;
            Span::styled(c.to_string(), Style::new().fg(gradient_color(palette, t)))
        })
        .collect();
    Line::from(spans)
}

fn dim(color: Color, brightness: f64) -> Color {
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(
            (r as f64 * brightness) as u8,
            (g as f64 * brightness) as u8,
            (b as f64 * brightness) as u8,
        ),
        other => other,
    }
}

pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    pub drift: f64,
    pub brightness: f64,
    pub char_idx: usize,
    /// Position along the palette.
    pub hue: f64,
}

impl Particle {
    /// Spawn below the visible area so it floats upward.
    pub fn new(width: u16, height: u16) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            x: rng.gen_range(0.0..width.max(1) as f64),
            y: height as f64 + rng.gen_range(0.0..5.0),
            speed: rng.gen_range(0.15..0.45),
            drift: rng.gen_range(-0.1..0.1),
            brightness: 0.0,
            char_idx: rng.gen_range(0..PARTICLE_CHARS.len()),
            hue: rng.gen_range(0.0..1.0),
        }
    }

    /// Spawn somewhere inside the viewport, for the first frame.
    pub fn seeded(width: u16, height: u16) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            x: rng.gen_range(0.0..width.max(1) as f64),
            y: rng.gen_range(0.0..height.max(1) as f64),
            speed: rng.gen_range(0.15..0.45),
            drift: rng.gen_range(-0.1..0.1),
            brightness: rng.gen_range(0.2..0.6),
            char_idx: rng.gen_range(0..PARTICLE_CHARS.len()),
            hue: rng.gen_range(0.0..1.0),
        }
    }

    pub fn tick(&mut self) {
        self.y -= self.speed;
        self.x += self.drift;
        if self.y > 0.0 {
            self.brightness = (self.brightness + 0.08).min(0.6);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.y < -1.0
    }
}

pub fn pre_seed_particles(width: u16, height: u16) -> Vec<Particle> {
    (0..MAX_PARTICLES)
        .map(|_| Particle::seeded(width, height))
        .collect()
}

/// Advance existing particles, cull dead ones, maybe spawn one more.
pub fn tick_particles(particles: &mut Vec<Particle>, width: u16, height: u16) {
    for p in particles.iter_mut() {
        p.tick();
    }
    particles.retain(|p| !p.is_dead());
    let mut rng = rand::thread_rng();
    if particles.len() < MAX_PARTICLES && rng.gen_range(0..3) == 0 {
        particles.push(Particle::new(width, height));
    }
}

fn paint_particles(particles: &[Particle], palette: Palette, buf: &mut Buffer, area: Rect) {
    for p in particles {
        if p.x < 0.0 || p.y < 0.0 {
            continue;
        }
        let (x, y) = (p.x as u16, p.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }
        let color = dim(gradient_color(palette, p.hue), p.brightness);
        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_char(PARTICLE_CHARS[p.char_idx % PARTICLE_CHARS.len()])
                .set_fg(color);
        }
    }
}

pub fn render_particles(particles: &[Particle], palette: Palette, frame: &mut Frame, area: Rect) {
    paint_particles(particles, palette, frame.buffer_mut(), area);
}
