//! ROI extraction: connected components of a binary mask plus their
//! geometric descriptors.
//!
//! Labelling delegates to
//! [`imageproc::region_labelling::connected_components`]
//! (8-connectivity); descriptor geometry builds on `geo` for the convex
//! hull and the minimal rotated bounding rectangle. Hull points are
//! pixel *corners*, not centers, so a single pixel already spans a unit
//! square and area-based descriptors stay consistent with the pixel
//! count.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use geo::{Area, ConvexHull, MinimumRotatedRect, MultiPoint, Point as GeoPoint, Polygon};

use crate::roi::{Roi, RoiPoint};

/// Which mask value counts as foreground during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskPolarity {
    /// Nonzero pixels are foreground.
    #[default]
    Bright,
    /// Zero pixels are foreground.
    Dark,
}

/// Options for one extraction call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Which mask value counts as foreground.
    #[serde(default)]
    pub polarity: MaskPolarity,
    /// Components with a smaller surface are discarded (inclusive
    /// bound).
    #[serde(default)]
    pub min_surface: Option<u32>,
    /// Components with a larger surface are discarded (inclusive
    /// bound).
    #[serde(default)]
    pub max_surface: Option<u32>,
}

/// One component's raw pixel data, gathered before descriptors are
/// computed.
struct Component {
    pixels: Vec<(u32, u32)>,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Extract ROI records from a binary mask.
///
/// Components are ordered by descending surface (ties broken top-to-
/// bottom, left-to-right) and numbered from 0. An all-background mask
/// yields an empty list.
#[must_use]
pub fn extract(mask: &GrayImage, options: &ExtractOptions) -> Vec<Roi> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    // Normalize polarity so labelling always sees foreground as 255.
    let foreground = GrayImage::from_fn(width, height, |x, y| {
        let set = match options.polarity {
            MaskPolarity::Bright => mask.get_pixel(x, y).0[0] > 0,
            MaskPolarity::Dark => mask.get_pixel(x, y).0[0] == 0,
        };
        Luma([if set { 255 } else { 0 }])
    });

    let labels = connected_components(&foreground, Connectivity::Eight, Luma([0u8]));

    let mut components: std::collections::BTreeMap<u32, Component> =
        std::collections::BTreeMap::new();
    for y in 0..height {
        for x in 0..width {
            let label = labels.get_pixel(x, y).0[0];
            if label == 0 {
                continue;
            }
            let entry = components.entry(label).or_insert(Component {
                pixels: Vec::new(),
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
            entry.pixels.push((x, y));
            entry.min_x = entry.min_x.min(x);
            entry.min_y = entry.min_y.min(y);
            entry.max_x = entry.max_x.max(x);
            entry.max_y = entry.max_y.max(y);
        }
    }

    let mut components: Vec<Component> = components
        .into_values()
        .filter(|component| {
            let surface = component.pixels.len() as u32;
            options.min_surface.is_none_or(|min| surface >= min)
                && options.max_surface.is_none_or(|max| surface <= max)
        })
        .collect();

    components.sort_by(|a, b| {
        b.pixels
            .len()
            .cmp(&a.pixels.len())
            .then(a.min_y.cmp(&b.min_y))
            .then(a.min_x.cmp(&b.min_x))
    });

    components
        .iter()
        .enumerate()
        .map(|(id, component)| describe(id as u32, component))
        .collect()
}

/// Compute every descriptor for one component.
fn describe(id: u32, component: &Component) -> Roi {
    let width = component.max_x - component.min_x + 1;
    let height = component.max_y - component.min_y + 1;
    let surface = component.pixels.len() as u32;

    let occupancy = Occupancy::of(component, width, height);
    let (perimeter, boundary) = occupancy.perimeter_and_boundary(component);
    let filled = occupancy.filled_surface(surface, width, height);

    let hull = hull_of(&boundary);
    let hull_vertices = ring_vertices(&hull);
    let hull_area = hull.unsigned_area();

    let (feret_min, feret_max) = feret_diameters(&hull_vertices);

    let surface_f = f64::from(surface);
    let solidity = if hull_area > 0.0 {
        (surface_f / hull_area).min(1.0)
    } else {
        1.0
    };
    let roundness = if feret_max > 0.0 {
        4.0 * surface_f / (std::f64::consts::PI * feret_max * feret_max)
    } else {
        0.0
    };
    let sphericity = if perimeter > 0.0 {
        2.0 * (std::f64::consts::PI * surface_f).sqrt() / perimeter
    } else {
        0.0
    };
    let aspect_ratio = if feret_max > 0.0 {
        feret_min / feret_max
    } else {
        0.0
    };
    let fill_ratio = if filled > 0 {
        surface_f / f64::from(filled)
    } else {
        1.0
    };

    let min_bounding_rect = minimal_bounding_rect(&hull, component);

    Roi {
        id,
        column: component.min_x,
        row: component.min_y,
        width,
        height,
        surface,
        perimeter,
        feret_min,
        feret_max,
        aspect_ratio,
        roundness,
        solidity,
        sphericity,
        fill_ratio,
        convex_hull: hull_vertices,
        min_bounding_rect,
    }
}

/// Bitmap of one component over its bounding box.
struct Occupancy {
    cells: Vec<bool>,
    min_x: u32,
    min_y: u32,
    width: u32,
}

impl Occupancy {
    fn of(component: &Component, width: u32, height: u32) -> Self {
        let mut cells = vec![false; (width as usize) * (height as usize)];
        for &(x, y) in &component.pixels {
            let index =
                (y - component.min_y) as usize * width as usize + (x - component.min_x) as usize;
            cells[index] = true;
        }
        Self {
            cells,
            min_x: component.min_x,
            min_y: component.min_y,
            width,
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        let local_x = x - i64::from(self.min_x);
        let local_y = y - i64::from(self.min_y);
        if local_x < 0 || local_y < 0 || local_x >= i64::from(self.width) {
            return false;
        }
        let index = local_y as usize * self.width as usize + local_x as usize;
        self.cells.get(index).copied().unwrap_or(false)
    }

    /// Exposed pixel-side count, plus the corner points of every
    /// boundary pixel (the only pixels that can contribute hull
    /// vertices).
    fn perimeter_and_boundary(&self, component: &Component) -> (f64, Vec<(f64, f64)>) {
        let mut exposed_sides = 0u64;
        let mut corners = Vec::new();
        for &(x, y) in &component.pixels {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let neighbors = [(xi - 1, yi), (xi + 1, yi), (xi, yi - 1), (xi, yi + 1)];
            let exposed = neighbors
                .iter()
                .filter(|&&(nx, ny)| !self.contains(nx, ny))
                .count();
            if exposed > 0 {
                exposed_sides += exposed as u64;
                let (xf, yf) = (f64::from(x), f64::from(y));
                corners.extend_from_slice(&[
                    (xf, yf),
                    (xf + 1.0, yf),
                    (xf, yf + 1.0),
                    (xf + 1.0, yf + 1.0),
                ]);
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let perimeter = exposed_sides as f64;
        (perimeter, corners)
    }

    /// Surface plus enclosed holes: background cells of the bounding
    /// box that cannot reach its border without crossing the component.
    fn filled_surface(&self, surface: u32, width: u32, height: u32) -> u32 {
        let w = width as usize;
        let h = height as usize;
        let mut reachable = vec![false; w * h];
        let mut queue = std::collections::VecDeque::new();

        // Seed with every background cell on the bounding box border.
        for x in 0..w {
            for y in [0, h - 1] {
                let index = y * w + x;
                if !self.cells[index] && !reachable[index] {
                    reachable[index] = true;
                    queue.push_back((x, y));
                }
            }
        }
        for y in 0..h {
            for x in [0, w - 1] {
                let index = y * w + x;
                if !self.cells[index] && !reachable[index] {
                    reachable[index] = true;
                    queue.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let mut visit = |nx: usize, ny: usize| {
                let index = ny * w + nx;
                if !self.cells[index] && !reachable[index] {
                    reachable[index] = true;
                    queue.push_back((nx, ny));
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < h {
                visit(x, y + 1);
            }
        }

        let escaped = reachable.iter().filter(|&&r| r).count() as u32;
        let holes = width * height - surface - escaped;
        surface + holes
    }
}

/// Convex hull of a set of points.
fn hull_of(points: &[(f64, f64)]) -> Polygon<f64> {
    let multi = MultiPoint::new(
        points
            .iter()
            .map(|&(x, y)| GeoPoint::new(x, y))
            .collect::<Vec<_>>(),
    );
    multi.convex_hull()
}

/// The distinct vertices of a polygon's exterior ring (the closing
/// duplicate dropped).
fn ring_vertices(polygon: &Polygon<f64>) -> Vec<RoiPoint> {
    let coords: Vec<RoiPoint> = polygon
        .exterior()
        .coords()
        .map(|c| RoiPoint::new(c.x, c.y))
        .collect();
    match coords.split_last() {
        Some((last, rest)) if rest.first() == Some(last) => rest.to_vec(),
        _ => coords,
    }
}

/// Minimum and maximum caliper widths over the hull.
///
/// The maximum is the largest pairwise vertex distance; the minimum is
/// the smallest width measured perpendicular to a hull edge (rotating-
/// calipers property: the minimal width is always attained at an edge).
fn feret_diameters(vertices: &[RoiPoint]) -> (f64, f64) {
    if vertices.len() < 2 {
        return (0.0, 0.0);
    }

    let mut max = 0.0_f64;
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            max = max.max(a.distance(*b));
        }
    }

    let mut min = f64::INFINITY;
    let n = vertices.len();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let edge_len = a.distance(b);
        if edge_len == 0.0 {
            continue;
        }
        let normal_x = -(b.y - a.y) / edge_len;
        let normal_y = (b.x - a.x) / edge_len;
        let width = vertices
            .iter()
            .map(|v| ((v.x - a.x) * normal_x + (v.y - a.y) * normal_y).abs())
            .fold(0.0_f64, f64::max);
        min = min.min(width);
    }
    if !min.is_finite() {
        min = 0.0;
    }

    (min, max)
}

/// Corners of the minimal rotated bounding rectangle, falling back to
/// the axis-aligned box for degenerate hulls.
fn minimal_bounding_rect(hull: &Polygon<f64>, component: &Component) -> [RoiPoint; 4] {
    if let Some(rect) = hull.minimum_rotated_rect() {
        let vertices = ring_vertices(&rect);
        if vertices.len() == 4 {
            return [vertices[0], vertices[1], vertices[2], vertices[3]];
        }
    }
    let left = f64::from(component.min_x);
    let top = f64::from(component.min_y);
    let right = f64::from(component.max_x) + 1.0;
    let bottom = f64::from(component.max_y) + 1.0;
    [
        RoiPoint::new(left, top),
        RoiPoint::new(right, top),
        RoiPoint::new(right, bottom),
        RoiPoint::new(left, bottom),
    ]
}
