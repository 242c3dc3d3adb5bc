//! Connected-component extraction and area moments.

use ndarray::Array2;

/// One connected region of a binary mask, summarized by its area moments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// Zeroth moment: pixel count.
    pub area: f64,
    /// First moment about x (sum of column indices).
    pub m10: f64,
    /// First moment about y (sum of row indices).
    pub m01: f64,
}

impl Blob {
    /// Centroid `(cx, cy)` from the first moments, or `None` for a
    /// degenerate blob with zero area.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.area == 0.0 {
            return None;
        }
        Some((self.m10 / self.area, self.m01 / self.area))
    }
}

/// Find all 8-connected components of a binary mask.
///
/// Blobs are returned in the order their first pixel is encountered during a
/// row-major scan. Callers that select "the largest" blob inherit this scan
/// order as the tie-break between equal areas; the ordering is an accepted
/// artifact of the mask representation, not a semantic guarantee.
pub fn find_blobs(mask: &Array2<u8>) -> Vec<Blob> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut blobs = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if mask[[row, col]] == 0 || visited[[row, col]] {
                continue;
            }

            let mut blob = Blob {
                area: 0.0,
                m10: 0.0,
                m01: 0.0,
            };
            visited[[row, col]] = true;
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                blob.area += 1.0;
                blob.m10 += c as f64;
                blob.m01 += r as f64;

                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = r as i64 + dr;
                        let nc = c as i64 + dc;
                        if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if mask[[nr, nc]] != 0 && !visited[[nr, nc]] {
                            visited[[nr, nc]] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
            }

            blobs.push(blob);
        }
    }

    blobs
}
