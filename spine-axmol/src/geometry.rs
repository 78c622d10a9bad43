//! Polygon triangulation and the convex clipper used by clipping attachments.

type Point = [f32; 2];

/// Ear-clipping triangulator with convex decomposition.
#[derive(Debug, Default)]
pub(crate) struct Triangulator;

impl Triangulator {
    pub(crate) fn triangulate(&self, polygon: &[Point]) -> Vec<u16> {
        let mut count = polygon.len();
        if count < 3 {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (0..count).collect();
        let mut concave: Vec<bool> = (0..count)
            .map(|i| is_concave(i, count, polygon, &indices))
            .collect();
        let mut triangles = Vec::with_capacity((count - 2) * 3);

        while count > 3 {
            let mut previous = count - 1;
            let mut i = 0usize;
            let mut next = 1usize;

            'search: loop {
                'ear: {
                    if concave[i] {
                        break 'ear;
                    }
                    let p1 = polygon[indices[previous]];
                    let p2 = polygon[indices[i]];
                    let p3 = polygon[indices[next]];
                    let mut ii = (next + 1) % count;
                    while ii != previous {
                        if concave[ii] {
                            let v = polygon[indices[ii]];
                            if positive_area(p3, p1, v)
                                && positive_area(p1, p2, v)
                                && positive_area(p2, p3, v)
                            {
                                break 'ear;
                            }
                        }
                        ii = (ii + 1) % count;
                    }
                    break 'search;
                }

                if next == 0 {
                    while i > 0 && concave[i] {
                        i -= 1;
                    }
                    break 'search;
                }
                previous = i;
                i = next;
                next = (next + 1) % count;
            }

            triangles.push(indices[(count + i - 1) % count] as u16);
            triangles.push(indices[i] as u16);
            triangles.push(indices[(i + 1) % count] as u16);
            indices.remove(i);
            concave.remove(i);
            count -= 1;

            let previous_index = (count + i - 1) % count;
            let next_index = if i == count { 0 } else { i };
            concave[previous_index] = is_concave(previous_index, count, polygon, &indices);
            concave[next_index] = is_concave(next_index, count, polygon, &indices);
        }

        if count == 3 {
            triangles.extend([indices[2] as u16, indices[0] as u16, indices[1] as u16]);
        }
        triangles
    }

    /// Merges a triangulation back into convex polygons.
    pub(crate) fn decompose(&self, polygon: &[Point], triangles: &[u16]) -> Vec<Vec<Point>> {
        let mut polygons: Vec<Vec<Point>> = Vec::new();
        let mut polygon_indices: Vec<Vec<usize>> = Vec::new();

        let mut current: Vec<Point> = Vec::new();
        let mut current_indices: Vec<usize> = Vec::new();
        let mut fan_base: Option<usize> = None;
        let mut last_winding = 0;

        for tri in triangles.chunks_exact(3) {
            let (t1, t2, t3) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (p1, p2, p3) = (polygon[t1], polygon[t2], polygon[t3]);

            // Extend the current fan while it stays convex.
            if fan_base == Some(t1) && current.len() >= 2 {
                let o = current.len() - 2;
                let winding1 = winding(current[o], current[o + 1], p3);
                let winding2 = winding(p3, current[0], current[1]);
                if winding1 == last_winding && winding2 == last_winding {
                    current.push(p3);
                    current_indices.push(t3);
                    continue;
                }
            }

            if !current.is_empty() {
                polygons.push(std::mem::take(&mut current));
                polygon_indices.push(std::mem::take(&mut current_indices));
            }
            current = vec![p1, p2, p3];
            current_indices = vec![t1, t2, t3];
            last_winding = winding(p1, p2, p3);
            fan_base = Some(t1);
        }
        if !current.is_empty() {
            polygons.push(current);
            polygon_indices.push(current_indices);
        }

        // Go through the list of polygons and try to merge the remaining triangles.
        let n = polygons.len();
        for i in 0..n {
            let (Some(&first_index), Some(&last_index)) =
                (polygon_indices[i].first(), polygon_indices[i].last())
            else {
                continue;
            };
            let len = polygons[i].len();
            let mut prev_prev = polygons[i][len - 2];
            let mut prev = polygons[i][len - 1];
            let first = polygons[i][0];
            let second = polygons[i][1];
            let winding0 = winding(prev_prev, prev, first);
            let mut last_index = last_index;

            let mut ii = 0usize;
            while ii < n {
                if ii == i || polygon_indices[ii].len() != 3 {
                    ii += 1;
                    continue;
                }
                let other = &polygon_indices[ii];
                if other[0] != first_index || other[1] != last_index {
                    ii += 1;
                    continue;
                }
                let other_last = other[2];
                let p3 = polygons[ii][2];
                if winding(prev_prev, prev, p3) == winding0
                    && winding(p3, first, second) == winding0
                {
                    polygons[ii].clear();
                    polygon_indices[ii].clear();
                    polygons[i].push(p3);
                    polygon_indices[i].push(other_last);
                    last_index = other_last;
                    prev_prev = prev;
                    prev = p3;
                    ii = 0;
                    continue;
                }
                ii += 1;
            }
        }

        polygons.retain(|p| !p.is_empty());
        polygons
    }
}

fn positive_area(p1: Point, p2: Point, p3: Point) -> bool {
    p1[0] * (p3[1] - p2[1]) + p2[0] * (p1[1] - p3[1]) + p3[0] * (p2[1] - p1[1]) >= 0.0
}

fn is_concave(index: usize, count: usize, polygon: &[Point], indices: &[usize]) -> bool {
    let previous = polygon[indices[(count + index - 1) % count]];
    let current = polygon[indices[index]];
    let next = polygon[indices[(index + 1) % count]];
    !positive_area(previous, current, next)
}

fn winding(p1: Point, p2: Point, p3: Point) -> i32 {
    let px = p2[0] - p1[0];
    let py = p2[1] - p1[1];
    if p3[0] * py - p3[1] * px + px * p1[1] - p1[0] * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Reverses counter-clockwise polygons so every polygon winds clockwise.
fn make_clockwise(polygon: &mut [Point]) {
    let n = polygon.len();
    if n < 3 {
        return;
    }
    let mut area = polygon[n - 1][0] * polygon[0][1] - polygon[0][0] * polygon[n - 1][1];
    for w in polygon.windows(2) {
        area += w[0][0] * w[1][1] - w[1][0] * w[0][1];
    }
    if area < 0.0 {
        return;
    }
    polygon.reverse();
}

/// Clips triangles against the convex decomposition of the active clipping attachment.
///
/// Output buffers are reused between calls; [`release`](Self::release) frees them.
#[derive(Debug, Default)]
pub struct SkeletonClipper {
    triangulator: Triangulator,
    end_slot: Option<usize>,
    active: bool,
    clipping_polygons: Vec<Vec<Point>>,
    clip_output: Vec<Point>,
    scratch: Vec<Point>,
    clipped_positions: Vec<Point>,
    clipped_uvs: Vec<Point>,
    clipped_triangles: Vec<u16>,
}

impl SkeletonClipper {
    /// Starts clipping with the given world-space polygon; ignored while already clipping.
    ///
    /// Returns the number of convex polygons clipped against.
    pub fn clip_start(&mut self, end_slot: Option<usize>, polygon: &[Point]) -> usize {
        if self.active || polygon.len() < 3 {
            return 0;
        }
        self.active = true;
        self.end_slot = end_slot;

        let mut clipping_polygon = polygon.to_vec();
        make_clockwise(&mut clipping_polygon);
        let triangles = self.triangulator.triangulate(&clipping_polygon);
        self.clipping_polygons = self.triangulator.decompose(&clipping_polygon, &triangles);
        for poly in &mut self.clipping_polygons {
            make_clockwise(poly);
            poly.push(poly[0]);
        }
        self.clipping_polygons.len()
    }

    /// Ends clipping if `slot_index` is the active clip's end slot.
    pub fn clip_end_slot(&mut self, slot_index: usize) {
        if self.active && self.end_slot == Some(slot_index) {
            self.clip_end();
        }
    }

    pub fn clip_end(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.end_slot = None;
        self.clipping_polygons.clear();
        self.clip_output.clear();
        self.scratch.clear();
    }

    pub fn is_clipping(&self) -> bool {
        self.active
    }

    /// Clips a triangle list; results are read through the `clipped_*` accessors.
    pub fn clip_triangles(&mut self, positions: &[Point], triangles: &[u16], uvs: &[Point]) {
        self.clipped_positions.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        let mut index: u16 = 0;

        'triangles: for tri in triangles.chunks_exact(3) {
            let v = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let [p1, p2, p3] = v.map(|i| positions[i]);
            let [uv1, uv2, uv3] = v.map(|i| uvs[i]);

            for polygon in &self.clipping_polygons {
                let clipped = clip(
                    &mut self.clip_output,
                    &mut self.scratch,
                    [p1, p2, p3],
                    polygon,
                );
                if !clipped {
                    self.clipped_positions.extend([p1, p2, p3]);
                    self.clipped_uvs.extend([uv1, uv2, uv3]);
                    self.clipped_triangles
                        .extend([index, index + 1, index + 2]);
                    index = index.wrapping_add(3);
                    continue 'triangles;
                }
                if self.clip_output.is_empty() {
                    continue;
                }

                // Barycentric UVs for the new vertices.
                let d0 = p2[1] - p3[1];
                let d1 = p3[0] - p2[0];
                let d2 = p1[0] - p3[0];
                let d4 = p3[1] - p1[1];
                let d = 1.0 / (d0 * d2 + d1 * (p1[1] - p3[1]));
                for &[x, y] in &self.clip_output {
                    self.clipped_positions.push([x, y]);
                    let c0 = x - p3[0];
                    let c1 = y - p3[1];
                    let a = (d0 * c0 + d1 * c1) * d;
                    let b = (d4 * c0 + d2 * c1) * d;
                    let c = 1.0 - a - b;
                    self.clipped_uvs.push([
                        uv1[0] * a + uv2[0] * b + uv3[0] * c,
                        uv1[1] * a + uv2[1] * b + uv3[1] * c,
                    ]);
                }

                let count = self.clip_output.len() as u16;
                for ii in 1..count.saturating_sub(1) {
                    self.clipped_triangles
                        .extend([index, index + ii, index + ii + 1]);
                }
                index = index.wrapping_add(count);
            }
        }
    }

    pub fn clipped_positions(&self) -> &[Point] {
        &self.clipped_positions
    }

    pub fn clipped_uvs(&self) -> &[Point] {
        &self.clipped_uvs
    }

    pub fn clipped_triangles(&self) -> &[u16] {
        &self.clipped_triangles
    }

    /// Frees all scratch storage. Clipping state is reset.
    pub fn release(&mut self) {
        *self = Self::default();
    }
}

/// Clips a triangle against a closed clockwise convex polygon (first point repeated last).
///
/// Returns `false` when the triangle is entirely inside. Otherwise `out` receives the clipped
/// polygon, empty when nothing remains.
fn clip(out: &mut Vec<Point>, scratch: &mut Vec<Point>, triangle: [Point; 3], area: &[Point]) -> bool {
    let mut clipped = false;
    let mut input = scratch;
    let mut output = out;
    input.clear();
    input.extend([triangle[0], triangle[1], triangle[2], triangle[0]]);
    output.clear();

    let last_edge = area.len() - 2;
    for i in 0..=last_edge {
        let [edge_x, edge_y] = area[i];
        let [edge_x2, edge_y2] = area[i + 1];
        let delta_x = edge_x - edge_x2;
        let delta_y = edge_y - edge_y2;
        let output_start = output.len();

        let intersect = |from: Point, to: Point| -> Point {
            let c0 = to[1] - from[1];
            let c2 = to[0] - from[0];
            let s = c0 * (edge_x2 - edge_x) - c2 * (edge_y2 - edge_y);
            if s.abs() > 1.0e-6 {
                let ua = (c2 * (edge_y - from[1]) - c0 * (edge_x - from[0])) / s;
                [
                    edge_x + (edge_x2 - edge_x) * ua,
                    edge_y + (edge_y2 - edge_y) * ua,
                ]
            } else {
                [edge_x, edge_y]
            }
        };

        for w in input.windows(2) {
            let (from, to) = (w[0], w[1]);
            let side2 = delta_x * (to[1] - edge_y2) - delta_y * (to[0] - edge_x2) > 0.0;
            if delta_x * (from[1] - edge_y2) - delta_y * (from[0] - edge_x2) > 0.0 {
                if side2 {
                    output.push(to);
                    continue;
                }
                output.push(intersect(from, to));
            } else if side2 {
                output.push(intersect(from, to));
                output.push(to);
            }
            clipped = true;
        }

        if output_start == output.len() {
            // All edges outside.
            output.clear();
            input.clear();
            return true;
        }
        output.push(output[0]);
        if i == last_edge {
            break;
        }
        std::mem::swap(&mut input, &mut output);
        output.clear();
    }

    output.pop();
    if last_edge % 2 == 1 {
        // The result ended in the scratch buffer; move it to `out`.
        std::mem::swap(input, output);
    }
    clipped
}
