//! Binary mask to polygons, one per connected component
//!
//! Components are labeled with a stack flood fill. Each component's
//! boundary is assembled from the pixel sides it shares with the outside,
//! oriented so the component lies on the left, and chained into rings
//! through the pixel-corner lattice. At a corner touched diagonally by two
//! component pixels the chain turns right under 8-connectivity (joining
//! them) and left under 4-connectivity (keeping them apart).

use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};
use moundscan_core::raster::{GeoTransform, Raster};
use moundscan_core::vector::{Feature, FeatureCollection};
use moundscan_core::{CancelToken, Error, Result};
use std::collections::HashMap;

/// Pixel adjacency used to group foreground pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbors only
    Four,
    /// Edge and corner neighbors
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] =
            [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Work bounds and adjacency for [`vectorize`]
#[derive(Debug, Clone)]
pub struct VectorizeParams {
    pub connectivity: Connectivity,
    /// Maximum number of mask pixels that may be scanned
    pub max_pixels: u64,
    /// Maximum number of polygon vertices emitted in total
    pub max_vertices: Option<u64>,
}

impl Default for VectorizeParams {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            max_pixels: 10_000_000_000_000,
            max_vertices: None,
        }
    }
}

/// Connected components of a mask
#[derive(Debug, Clone)]
pub struct Components {
    /// 0 for background, `1..=count` for components
    labels: Raster<u32>,
    pixels: Vec<Vec<(usize, usize)>>,
}

impl Components {
    pub fn count(&self) -> usize {
        self.pixels.len()
    }

    pub fn labels(&self) -> &Raster<u32> {
        &self.labels
    }

    /// Pixels (row, col) of component `id` (1-based)
    pub fn pixels(&self, id: u32) -> &[(usize, usize)] {
        id.checked_sub(1)
            .and_then(|i| self.pixels.get(i as usize))
            .map_or(&[], |p| p.as_slice())
    }

    /// Component ids paired with their pixel lists
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[(usize, usize)])> {
        self.pixels
            .iter()
            .enumerate()
            .map(|(i, p)| (i as u32 + 1, p.as_slice()))
    }

    fn label(&self, row: isize, col: isize) -> u32 {
        let (rows, cols) = self.labels.shape();
        if row < 0 || col < 0 || row as usize >= rows || col as usize >= cols {
            return 0;
        }
        unsafe { self.labels.get_unchecked(row as usize, col as usize) }
    }
}

/// Label connected foreground (non-zero) pixels in row-major discovery order
pub fn label_components(mask: &Raster<u8>, connectivity: Connectivity) -> Components {
    let (rows, cols) = mask.shape();
    let mut labels: Raster<u32> = mask.with_same_meta(rows, cols);
    let mut pixels = Vec::new();
    let offsets = connectivity.offsets();

    for r in 0..rows {
        for c in 0..cols {
            if mask.data()[(r, c)] == 0 || labels.data()[(r, c)] != 0 {
                continue;
            }
            let id = pixels.len() as u32 + 1;
            labels.data_mut()[(r, c)] = id;
            let mut members = Vec::new();
            let mut stack = vec![(r, c)];
            while let Some((cr, cc)) = stack.pop() {
                members.push((cr, cc));
                for &(dr, dc) in offsets {
                    let nr = cr as isize + dr;
                    let nc = cc as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if mask.data()[(nr, nc)] != 0 && labels.data()[(nr, nc)] == 0 {
                        labels.data_mut()[(nr, nc)] = id;
                        stack.push((nr, nc));
                    }
                }
            }
            members.sort_unstable();
            pixels.push(members);
        }
    }

    Components { labels, pixels }
}

/// Polygons of a mask plus the components they were traced from
#[derive(Debug, Clone)]
pub struct Vectorized {
    pub components: Components,
    /// One polygon per component; feature id and `component` attribute hold the label
    pub polygons: FeatureCollection,
}

/// Convert a binary mask into one polygon per connected component.
///
/// # Errors
/// * `ResourceLimit` if the mask has more than `max_pixels` pixels or the
///   polygons would exceed `max_vertices`
/// * `Cancelled` if `cancel` fires between components
pub fn vectorize(mask: &Raster<u8>, params: &VectorizeParams, cancel: &CancelToken) -> Result<Vectorized> {
    let scanned = mask.len() as u64;
    if scanned > params.max_pixels {
        return Err(Error::ResourceLimit {
            what: "pixels",
            actual: scanned,
            limit: params.max_pixels,
        });
    }

    let components = label_components(mask, params.connectivity);
    let transform = *mask.transform();
    let mut polygons = FeatureCollection::new();
    let mut vertices = 0u64;

    for (id, pixels) in components.iter() {
        cancel.check()?;
        let polygon = trace_component(&components, id, pixels, params.connectivity, &transform);
        vertices += polygon_vertices(&polygon);
        if let Some(limit) = params.max_vertices
            && vertices > limit
        {
            return Err(Error::ResourceLimit {
                what: "vertices",
                actual: vertices,
                limit,
            });
        }

        let mut feature = Feature::new(polygon).with_property("component", id as i64);
        feature.id = Some(id.to_string());
        polygons.push(feature);
    }

    Ok(Vectorized { components, polygons })
}

fn polygon_vertices(polygon: &Polygon<f64>) -> u64 {
    let ring = |ls: &LineString<f64>| ls.0.len().saturating_sub(1) as u64;
    ring(polygon.exterior()) + polygon.interiors().iter().map(ring).sum::<u64>()
}

/// Step direction on the corner lattice as (d_row, d_col)
type Dir = (isize, isize);

fn turn_right((dr, dc): Dir) -> Dir {
    (dc, -dr)
}

fn turn_left((dr, dc): Dir) -> Dir {
    (-dc, dr)
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: (isize, isize),
    dir: Dir,
}

impl Edge {
    fn to(&self) -> (isize, isize) {
        (self.from.0 + self.dir.0, self.from.1 + self.dir.1)
    }
}

fn trace_component(
    components: &Components,
    id: u32,
    pixels: &[(usize, usize)],
    connectivity: Connectivity,
    transform: &GeoTransform,
) -> Polygon<f64> {
    let inside = |r: isize, c: isize| components.label(r, c) == id;

    let mut edges = Vec::with_capacity(pixels.len() * 2);
    for &(r, c) in pixels {
        let (r, c) = (r as isize, c as isize);
        if !inside(r - 1, c) {
            edges.push(Edge { from: (r, c + 1), dir: (0, -1) });
        }
        if !inside(r + 1, c) {
            edges.push(Edge { from: (r + 1, c), dir: (0, 1) });
        }
        if !inside(r, c - 1) {
            edges.push(Edge { from: (r, c), dir: (1, 0) });
        }
        if !inside(r, c + 1) {
            edges.push(Edge { from: (r + 1, c + 1), dir: (-1, 0) });
        }
    }

    let mut outgoing: HashMap<(isize, isize), Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let successor = |k: usize| -> usize {
        let edge = edges[k];
        let candidates = outgoing.get(&edge.to()).map_or(&[][..], |v| v.as_slice());
        if let [only] = candidates {
            return *only;
        }
        let preferred = match connectivity {
            Connectivity::Eight => turn_right(edge.dir),
            Connectivity::Four => turn_left(edge.dir),
        };
        candidates
            .iter()
            .copied()
            .find(|&i| edges[i].dir == preferred)
            .or_else(|| candidates.first().copied())
            .unwrap_or(k)
    };

    let mut used = vec![false; edges.len()];
    let mut exterior: Option<(f64, Vec<(isize, isize)>)> = None;
    let mut holes = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut k = start;
        loop {
            used[k] = true;
            let next = successor(k);
            if edges[next].dir != edges[k].dir {
                ring.push(edges[k].to());
            }
            k = next;
            if k == start || used[k] {
                break;
            }
        }

        // component on the left: exterior rings enclose positive area
        let area = lattice_area(&ring);
        if area > 0.0 {
            if exterior.as_ref().is_none_or(|(a, _)| area > *a) {
                if let Some((_, previous)) = exterior.replace((area, ring)) {
                    holes.push(previous);
                }
            } else {
                holes.push(ring);
            }
        } else {
            holes.push(ring);
        }
    }

    let to_line = |ring: &[(isize, isize)]| -> LineString<f64> {
        ring.iter()
            .map(|&(r, c)| {
                let (x, y) = transform.pixel_to_geo_f(c as f64, r as f64);
                Coord { x, y }
            })
            .collect()
    };
    let exterior = exterior.map_or_else(|| LineString::new(vec![]), |(_, ring)| to_line(&ring));
    let interiors = holes.iter().map(|ring| to_line(ring)).collect();
    Polygon::new(exterior, interiors).orient(Direction::Default)
}

/// Signed area of a corner-lattice ring with y pointing up
fn lattice_area(ring: &[(isize, isize)]) -> f64 {
    let n = ring.len();
    let twice: isize = (0..n)
        .map(|i| {
            let (r1, c1) = ring[i];
            let (r2, c2) = ring[(i + 1) % n];
            c1 * -r2 - c2 * -r1
        })
        .sum();
    twice as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    fn mask(text: &str) -> Raster<u8> {
        let lines: Vec<&str> = text.split_whitespace().collect();
        let data = lines
            .iter()
            .flat_map(|l| l.chars().map(|ch| u8::from(ch == '#')))
            .collect();
        Raster::from_vec(data, lines.len(), lines[0].len())
            .unwrap()
            .with_transform(GeoTransform::north_up(0.0, 100.0, 2.0))
    }

    fn polygons(m: &Raster<u8>, connectivity: Connectivity) -> Vec<Polygon<f64>> {
        let params = VectorizeParams { connectivity, ..Default::default() };
        vectorize(m, &params, &CancelToken::new())
            .unwrap()
            .polygons
            .into_iter()
            .filter_map(|f| match f.geometry {
                Some(geo::Geometry::Polygon(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    const BLOCKS: &str = "
        ##....
        ##....
        ..#...
        ......
        .###..
        .#.#..
        .###..";

    #[test]
    fn test_connectivity_changes_component_count() {
        let m = mask(BLOCKS);
        assert_eq!(label_components(&m, Connectivity::Eight).count(), 2);
        let four = label_components(&m, Connectivity::Four);
        assert_eq!(four.count(), 3);
        assert_eq!(four.pixels(2), &[(2, 2)]);
        assert_eq!(four.labels().get(4, 1).unwrap(), 3);
        assert!(four.pixels(9).is_empty());
    }

    #[test]
    fn test_polygon_area_matches_pixels() {
        let m = mask(BLOCKS);
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let vectorized =
                vectorize(&m, &VectorizeParams { connectivity, ..Default::default() }, &CancelToken::new()).unwrap();
            for (feature, (_, pixels)) in vectorized.polygons.iter().zip(vectorized.components.iter()) {
                let Some(geo::Geometry::Polygon(p)) = &feature.geometry else {
                    panic!("expected polygon");
                };
                assert!((p.unsigned_area() - 4.0 * pixels.len() as f64).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ring_component_has_hole() {
        let polys = polygons(&mask(BLOCKS), Connectivity::Eight);
        let ring = &polys[1];
        assert_eq!(ring.interiors().len(), 1);
        assert_eq!(ring.exterior().0.len(), 5);
        assert!((ring.unsigned_area() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_diagonal_pixels_join_under_eight_connectivity() {
        let polys = polygons(&mask(BLOCKS), Connectivity::Eight);
        // 2x2 block plus one diagonal pixel: 8 corners
        assert_eq!(polys[0].exterior().0.len(), 9);
        assert!(polys[0].interiors().is_empty());
        assert!((polys[0].unsigned_area() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_diamond_encloses_center() {
        let m = mask(".#. #.# .#.");
        let eight = polygons(&m, Connectivity::Eight);
        assert_eq!(eight.len(), 1);
        assert_eq!(eight[0].interiors().len(), 1);
        assert!((eight[0].unsigned_area() - 16.0).abs() < 1e-9);
        assert_eq!(polygons(&m, Connectivity::Four).len(), 4);
    }

    #[test]
    fn test_map_coordinates() {
        let polys = polygons(&mask("... .#. ..."), Connectivity::Eight);
        let xs: Vec<f64> = polys[0].exterior().0.iter().map(|c| c.x).collect();
        let ys: Vec<f64> = polys[0].exterior().0.iter().map(|c| c.y).collect();
        assert_eq!(xs.iter().cloned().fold(f64::INFINITY, f64::min), 2.0);
        assert_eq!(xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 4.0);
        assert_eq!(ys.iter().cloned().fold(f64::INFINITY, f64::min), 96.0);
        assert_eq!(ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 98.0);
    }

    #[test]
    fn test_empty_mask() {
        let out = vectorize(&mask("... ..."), &VectorizeParams::default(), &CancelToken::new()).unwrap();
        assert!(out.polygons.is_empty());
        assert_eq!(out.components.count(), 0);
    }

    #[test]
    fn test_work_limits() {
        let m = mask(BLOCKS);
        let params = VectorizeParams { max_pixels: 10, ..Default::default() };
        assert!(matches!(
            vectorize(&m, &params, &CancelToken::new()),
            Err(Error::ResourceLimit { what: "pixels", actual: 42, limit: 10 })
        ));

        let params = VectorizeParams { max_vertices: Some(10), ..Default::default() };
        assert!(matches!(
            vectorize(&m, &params, &CancelToken::new()),
            Err(Error::ResourceLimit { what: "vertices", .. })
        ));
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            vectorize(&mask(BLOCKS), &VectorizeParams::default(), &cancel),
            Err(Error::Cancelled)
        ));
    }
}
