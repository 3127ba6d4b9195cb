//! Nearest-neighbour descriptor matching and the ambiguity (ratio) test.

use serde::{Deserialize, Serialize};

use crate::sift::Descriptor;

/// A correspondence between a query and a train descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    /// L2 distance between the two descriptors.
    pub distance: f32,
}

#[inline]
fn l2_sq(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// The two nearest train descriptors for every query descriptor.
///
/// Implementation note: exact brute-force search. Entries hold fewer than two
/// matches when `train` has fewer than two descriptors. Ties keep the lower
/// train index first.
pub fn knn2(query: &[Descriptor], train: &[Descriptor]) -> Vec<Vec<Match>> {
    query
        .iter()
        .enumerate()
        .map(|(qi, q)| {
            let mut best: Option<(usize, f32)> = None;
            let mut second: Option<(usize, f32)> = None;
            for (ti, t) in train.iter().enumerate() {
                let d = l2_sq(q, t);
                match best {
                    Some((_, bd)) if d >= bd => {
                        if second.is_none_or(|(_, sd)| d < sd) {
                            second = Some((ti, d));
                        }
                    }
                    _ => {
                        second = best;
                        best = Some((ti, d));
                    }
                }
            }
            [best, second]
                .into_iter()
                .flatten()
                .map(|(ti, d)| Match {
                    query_idx: qi,
                    train_idx: ti,
                    distance: d.sqrt(),
                })
                .collect()
        })
        .collect()
}

/// Keep the nearest match of every pair whose distance is below `ratio`
/// times the second-nearest distance. Entries with fewer than two
/// neighbours are dropped.
pub fn ratio_test(knn: &[Vec<Match>], ratio: f32) -> Vec<Match> {
    knn.iter()
        .filter_map(|pair| match pair.as_slice() {
            [m0, m1, ..] if m0.distance < ratio * m1.distance => Some(*m0),
            _ => None,
        })
        .collect()
}
