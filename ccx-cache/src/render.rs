//! Artifact Renderer
//!
//! Draws the cache summary into a fixed-size PNG: title, total count,
//! refresh time, top-5 ranking and attribution footer. Text uses the
//! built-in 8x8 bitmap font scaled up; the same lines are stored in PNG
//! text chunks so the content can be read back without OCR.
//!
//! The artifact lives at one fixed path and every render replaces it.

use crate::error::{CacheError, CacheResult};
use ccx_common::db::RankedCountry;
use chrono::{DateTime, Utc};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgb, RgbImage};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const ARTIFACT_WIDTH: u32 = 800;
pub const ARTIFACT_HEIGHT: u32 = 400;

pub const TITLE: &str = "Country API Data Summary";
pub const RANKING_HEADING: &str = "Top 5 Countries by Estimated GDP:";
pub const EMPTY_RANKING_PLACEHOLDER: &str = "No data available.";
pub const FOOTER: &str = "Data powered by restcountries.com and open.er-api.com";

const GLYPH_SIZE: u32 = 8;
const MARGIN_X: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([0xf0, 0xf0, 0xf0]);
const TITLE_COLOR: Rgb<u8> = Rgb([0x00, 0x55, 0xaa]);
const BODY_COLOR: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);
const HEADING_COLOR: Rgb<u8> = Rgb([0x00, 0x00, 0x00]);
const FOOTER_COLOR: Rgb<u8> = Rgb([0x99, 0x99, 0x99]);

/// Everything drawn on the artifact
#[derive(Debug, Clone)]
pub struct Summary {
    pub total_countries: i64,
    pub refreshed_at: DateTime<Utc>,
    pub top: Vec<RankedCountry>,
}

impl Summary {
    /// Summary shown before any refresh has run
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            total_countries: 0,
            refreshed_at: now,
            top: Vec::new(),
        }
    }
}

/// Text lines of a rendered summary, top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLines {
    pub title: String,
    pub total: String,
    pub timestamp: String,
    pub heading: String,
    /// Ranked entries, or the placeholder line when there are none
    pub ranking: Vec<String>,
    pub footer: String,
}

impl SummaryLines {
    pub fn all(&self) -> Vec<&str> {
        let mut lines = vec![
            self.title.as_str(),
            self.total.as_str(),
            self.timestamp.as_str(),
            self.heading.as_str(),
        ];
        lines.extend(self.ranking.iter().map(String::as_str));
        lines.push(self.footer.as_str());
        lines
    }
}

/// Lay out the text content of a summary
pub fn summary_lines(summary: &Summary) -> SummaryLines {
    let ranking = if summary.top.is_empty() {
        vec![EMPTY_RANKING_PLACEHOLDER.to_string()]
    } else {
        summary
            .top
            .iter()
            .enumerate()
            .map(|(index, country)| {
                format!(
                    "{}. {} ({})",
                    index + 1,
                    country.name,
                    format_amount(country.estimated_gdp)
                )
            })
            .collect()
    };

    SummaryLines {
        title: TITLE.to_string(),
        total: format!("Total Countries Cached: {}", summary.total_countries),
        timestamp: format!("Last Refreshed: {}", format_timestamp(summary.refreshed_at)),
        heading: RANKING_HEADING.to_string(),
        ranking,
        footer: FOOTER.to_string(),
    }
}

/// Render a summary to PNG bytes
pub fn render_png(summary: &Summary) -> CacheResult<Vec<u8>> {
    let lines = summary_lines(summary);
    let canvas = draw(&lines);

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, ARTIFACT_WIDTH, ARTIFACT_HEIGHT);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder
            .add_text_chunk("Title".to_string(), latin1(&lines.title))
            .map_err(render_error)?;
        encoder
            .add_text_chunk("Description".to_string(), latin1(&lines.all().join("\n")))
            .map_err(render_error)?;

        let mut writer = encoder.write_header().map_err(render_error)?;
        writer.write_image_data(canvas.as_raw()).map_err(render_error)?;
        writer.finish().map_err(render_error)?;
    }

    Ok(bytes)
}

/// Render `summary` and replace the artifact at `path`
///
/// The image is written to a uniquely named sibling temp file and renamed
/// into place, so readers never see a partially written artifact and
/// concurrent writers never share a temp file.
pub fn write_artifact(path: &Path, summary: &Summary) -> CacheResult<PathBuf> {
    let bytes = render_png(summary)?;
    persist_bytes(path, &bytes, true)?;

    info!(
        path = %path.display(),
        bytes = bytes.len(),
        ranked = summary.top.len(),
        "Summary image saved"
    );
    Ok(path.to_path_buf())
}

/// Read the artifact, rendering a placeholder first if none exists yet
///
/// The placeholder never replaces an artifact that appeared while it was
/// being rendered.
pub fn read_or_create_artifact(path: &Path) -> CacheResult<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => return Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    info!(path = %path.display(), "Image not found, generating placeholder");
    let bytes = render_png(&Summary::placeholder(ccx_common::time::now()))?;
    if !persist_bytes(path, &bytes, false)? {
        debug!(path = %path.display(), "Artifact appeared while rendering placeholder, keeping it");
    }
    Ok(std::fs::read(path)?)
}

/// [`write_artifact`] on the blocking pool
pub async fn save_artifact(path: PathBuf, summary: Summary) -> CacheResult<PathBuf> {
    tokio::task::spawn_blocking(move || write_artifact(&path, &summary))
        .await
        .map_err(|e| CacheError::Render(format!("Task join error: {}", e)))?
}

/// [`read_or_create_artifact`] on the blocking pool
pub async fn load_artifact(path: PathBuf) -> CacheResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || read_or_create_artifact(&path))
        .await
        .map_err(|e| CacheError::Render(format!("Task join error: {}", e)))?
}

/// Move `bytes` onto `path` through a temp file in the same directory
///
/// Returns `Ok(false)` when `overwrite` is off and `path` already exists.
fn persist_bytes(path: &Path, bytes: &[u8], overwrite: bool) -> CacheResult<bool> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;

    if overwrite {
        tmp.persist(path).map_err(|e| e.error)?;
        return Ok(true);
    }

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Whole-unit dollar amount with comma grouping, e.g. `$1,234,568`
pub fn format_amount(amount: Option<f64>) -> String {
    let value = match amount {
        Some(v) if v.is_finite() => v.round(),
        _ => return "n/a".to_string(),
    };

    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Medium-style UTC timestamp, e.g. `Oct 28, 2025, 1:05:09 PM UTC`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y, %-I:%M:%S %p UTC").to_string()
}

fn draw(lines: &SummaryLines) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(ARTIFACT_WIDTH, ARTIFACT_HEIGHT, BACKGROUND);

    draw_centered(&mut canvas, &lines.title, 24, 3, TITLE_COLOR);
    draw_text(&mut canvas, &lines.total, MARGIN_X, 90, 2, BODY_COLOR);
    draw_text(&mut canvas, &lines.timestamp, MARGIN_X, 122, 2, BODY_COLOR);
    draw_text(&mut canvas, &lines.heading, MARGIN_X, 178, 2, HEADING_COLOR);

    let mut y = 214;
    for line in &lines.ranking {
        draw_text(&mut canvas, line, MARGIN_X + 16, y, 2, BODY_COLOR);
        y += 28;
    }

    draw_centered(&mut canvas, &lines.footer, ARTIFACT_HEIGHT - 28, 1, FOOTER_COLOR);
    canvas
}

fn draw_centered(canvas: &mut RgbImage, text: &str, y: u32, scale: u32, color: Rgb<u8>) {
    let width = text.chars().count() as u32 * GLYPH_SIZE * scale;
    let x = ARTIFACT_WIDTH.saturating_sub(width) / 2;
    draw_text(canvas, text, x, y, scale, color);
}

/// Draw text left to right; glyphs past the right edge are clipped
fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    let advance = GLYPH_SIZE * scale;
    for (index, ch) in text.chars().enumerate() {
        let origin_x = x + index as u32 * advance;
        if origin_x + advance > canvas.width() {
            break;
        }
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < canvas.width() && py < canvas.height() {
                            canvas.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
    }
}

/// tEXt chunks hold Latin-1 only
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 256 { c } else { '?' })
        .collect()
}

fn render_error(err: png::EncodingError) -> CacheError {
    CacheError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 28, 13, 5, 9).unwrap()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_format_amount_groups_and_rounds() {
        assert_eq!(format_amount(Some(0.0)), "$0");
        assert_eq!(format_amount(Some(999.4)), "$999");
        assert_eq!(format_amount(Some(1000.5)), "$1,001");
        assert_eq!(format_amount(Some(1_234_567_890.2)), "$1,234,567,890");
        assert_eq!(format_amount(Some(-12_345.0)), "-$12,345");
        assert_eq!(format_amount(None), "n/a");
        assert_eq!(format_amount(Some(f64::NAN)), "n/a");
    }

    #[test]
    fn test_format_timestamp_is_utc_medium_style() {
        assert_eq!(format_timestamp(stamp()), "Oct 28, 2025, 1:05:09 PM UTC");
    }

    #[test]
    fn test_ranking_lines() {
        let summary = Summary {
            total_countries: 250,
            refreshed_at: stamp(),
            top: vec![
                RankedCountry {
                    name: "United States of America".to_string(),
                    estimated_gdp: Some(494_712_345_678.9),
                },
                RankedCountry {
                    name: "China".to_string(),
                    estimated_gdp: Some(300_000_000.0),
                },
            ],
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines.total, "Total Countries Cached: 250");
        assert_eq!(lines.timestamp, "Last Refreshed: Oct 28, 2025, 1:05:09 PM UTC");
        assert_eq!(
            lines.ranking,
            vec![
                "1. United States of America ($494,712,345,679)".to_string(),
                "2. China ($300,000,000)".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_ranking_renders_placeholder_line() {
        let lines = summary_lines(&Summary::placeholder(stamp()));
        assert_eq!(lines.ranking, vec![EMPTY_RANKING_PLACEHOLDER.to_string()]);
    }

    #[test]
    fn test_png_has_fixed_dimensions_and_text() {
        let bytes = render_png(&Summary::placeholder(stamp())).unwrap();

        let decoder = png::Decoder::new(Cursor::new(bytes.clone()));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, ARTIFACT_WIDTH);
        assert_eq!(reader.info().height, ARTIFACT_HEIGHT);

        assert!(contains(&bytes, TITLE));
        assert!(contains(&bytes, EMPTY_RANKING_PLACEHOLDER));
    }

    #[test]
    fn test_non_latin_names_are_encoded() {
        let summary = Summary {
            total_countries: 1,
            refreshed_at: stamp(),
            top: vec![RankedCountry {
                name: "日本".to_string(),
                estimated_gdp: Some(1.0),
            }],
        };
        let bytes = render_png(&summary).unwrap();
        assert!(contains(&bytes, "1. ?? ($1)"));
    }

    #[test]
    fn test_write_artifact_overwrites() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache").join("summary.png");

        write_artifact(&path, &Summary::placeholder(stamp())).unwrap();
        let first = std::fs::read(&path).unwrap();

        let summary = Summary {
            total_countries: 1,
            refreshed_at: stamp(),
            top: vec![RankedCountry {
                name: "Malta".to_string(),
                estimated_gdp: Some(42.0),
            }],
        };
        write_artifact(&path, &summary).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_ne!(first, second);
        assert!(contains(&second, "1. Malta ($42)"));
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("summary.png")]);
    }

    #[test]
    fn test_read_or_create_generates_placeholder() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("summary.png");

        let bytes = read_or_create_artifact(&path).unwrap();
        assert!(!bytes.is_empty());
        assert!(path.exists());
        assert!(contains(&bytes, EMPTY_RANKING_PLACEHOLDER));
    }

    #[test]
    fn test_placeholder_never_replaces_existing_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("summary.png");

        let summary = Summary {
            total_countries: 1,
            refreshed_at: stamp(),
            top: vec![RankedCountry {
                name: "Malta".to_string(),
                estimated_gdp: Some(42.0),
            }],
        };
        write_artifact(&path, &summary).unwrap();
        let real = std::fs::read(&path).unwrap();

        assert!(!persist_bytes(&path, b"placeholder", false).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), real);
        assert_eq!(read_or_create_artifact(&path).unwrap(), real);
    }

    async fn write_then_read(path: PathBuf, write: bool) -> CacheResult<Vec<u8>> {
        if write {
            save_artifact(path.clone(), Summary::placeholder(stamp())).await?;
        }
        load_artifact(path).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers_all_succeed() {
        for round in 0..20 {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("cache").join("summary.png");

            let mut tasks = Vec::new();
            for i in 0..8 {
                let path = path.clone();
                tasks.push(tokio::spawn(write_then_read(path, i % 4 == 0)));
            }

            for task in tasks {
                let bytes = task
                    .await
                    .unwrap()
                    .unwrap_or_else(|e| panic!("round {}: {}", round, e));
                assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
            }
        }
    }
}
