use disc_align_core::{GrayImage, GrayImageView};

/// 3x3 Sobel derivatives, row-major, same size as the source.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub dx: Vec<i16>,
    pub dy: Vec<i16>,
}

impl Gradients {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> (i16, i16) {
        let i = y * self.width + x;
        (self.dx[i], self.dy[i])
    }
}

/// Mirror index without repeating the edge pixel (`dcb|abcd|cba`).
#[inline]
fn reflect101(i: isize, n: isize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

pub fn sobel(src: &GrayImageView<'_>) -> Gradients {
    let (w, h) = (src.width, src.height);
    let mut dx = vec![0i16; w * h];
    let mut dy = vec![0i16; w * h];
    let px = |x: isize, y: isize| -> i32 {
        src.get(reflect101(x, w as isize), reflect101(y, h as isize)) as i32
    };

    for y in 0..h as isize {
        for x in 0..w as isize {
            let (tl, t, tr) = (px(x - 1, y - 1), px(x, y - 1), px(x + 1, y - 1));
            let (l, r) = (px(x - 1, y), px(x + 1, y));
            let (bl, b, br) = (px(x - 1, y + 1), px(x, y + 1), px(x + 1, y + 1));

            let i = y as usize * w + x as usize;
            dx[i] = ((tr + 2 * r + br) - (tl + 2 * l + bl)) as i16;
            dy[i] = ((bl + 2 * b + br) - (tl + 2 * t + tr)) as i16;
        }
    }

    Gradients {
        width: w,
        height: h,
        dx,
        dy,
    }
}

const CANNY_SHIFT: i64 = 15;
// tan(22.5 deg) in Q15
const TG22: i64 = 13573;

/// Canny edge map (255 = edge) from precomputed Sobel derivatives.
///
/// Uses the L1 magnitude `|dx| + |dy|`, 4-direction non-maximum suppression
/// and 8-connected hysteresis between `low` and `high`.
pub fn canny(grad: &Gradients, low: f32, high: f32) -> GrayImage {
    let (w, h) = (grad.width, grad.height);
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    let mag: Vec<i32> = grad
        .dx
        .iter()
        .zip(&grad.dy)
        .map(|(&gx, &gy)| (gx as i32).abs() + (gy as i32).abs())
        .collect();
    let m_at = |x: usize, y: usize| mag[y * w + x];

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if (m as f32) <= low {
                continue;
            }
            let (xs, ys) = (grad.dx[i] as i64, grad.dy[i] as i64);
            let ax = xs.abs();
            let ay = ys.abs() << CANNY_SHIFT;
            let tg22x = ax * TG22;

            let is_max = if ay < tg22x {
                m > m_at(x - 1, y) && m >= m_at(x + 1, y)
            } else {
                let tg67x = tg22x + (ax << (CANNY_SHIFT + 1));
                if ay > tg67x {
                    m > m_at(x, y - 1) && m >= m_at(x, y + 1)
                } else {
                    let s: isize = if (xs ^ ys) < 0 { -1 } else { 1 };
                    let xa = (x as isize - s) as usize;
                    let xb = (x as isize + s) as usize;
                    m > m_at(xa, y - 1) && m > m_at(xb, y + 1)
                }
            };

            if !is_max {
                continue;
            }
            if (m as f32) > high {
                state[i] = 2;
                stack.push(i);
            } else {
                state[i] = 1;
            }
        }
    }

    while let Some(i) = stack.pop() {
        out.data[i] = 255;
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if state[j] == 1 {
                    state[j] = 2;
                    stack.push(j);
                }
            }
        }
    }

    out
}
