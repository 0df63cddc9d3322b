/// A perfect binary tree of partial sums over a fixed number of leaves.
///
/// The leaves are padded up to the next power of two (`width`) with zeros, so the
/// tree always has `log2(width) + 1` levels. Nodes are stored flat, heap style:
/// node 1 is the root, node `k` has children `2k` and `2k + 1`, and leaf `i`
/// lives at `width + i`.
///
/// Invariant: every internal node holds exactly the sum of its two children.
/// Leaf writes restore it by recomputing the ancestors of the leaf only.
#[derive(Debug, Clone, PartialEq)]
pub struct SumTree {
    len: usize,
    width: usize,
    nodes: Vec<f64>,
}

impl SumTree {
    /// Creates a new `SumTree` with `len` zero leaves.
    pub fn new(len: usize) -> Self {
        let width = len.max(1).next_power_of_two();

        Self {
            len,
            width,
            nodes: vec![0.; 2 * width],
        }
    }

    /// Creates a new `SumTree` holding `leaves`.
    ///
    /// # Arguments
    /// * `leaves` - The leaf values, its length is the number of leaves.
    ///
    /// # Returns
    /// A tree whose internal nodes are the bottom-up sums of `leaves`.
    pub fn from_leaves(leaves: &[f64]) -> Self {
        let mut tree = Self::new(leaves.len());
        let width = tree.width;

        tree.nodes[width..width + leaves.len()].copy_from_slice(leaves);
        for k in (1..width).rev() {
            tree.nodes[k] = tree.nodes[2 * k] + tree.nodes[2 * k + 1];
        }

        tree
    }

    /// Returns the number of (unpadded) leaves.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of leaves after padding.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of levels, leaves and root included.
    pub fn levels(&self) -> usize {
        self.width.trailing_zeros() as usize + 1
    }

    /// Returns the sum of every leaf.
    pub fn total(&self) -> f64 {
        self.nodes[1]
    }

    pub fn leaf(&self, i: usize) -> f64 {
        self.nodes[self.width + i]
    }

    /// Returns the value stored at heap position `k`.
    pub(crate) fn node(&self, k: usize) -> f64 {
        self.nodes[k]
    }

    /// Overwrites leaf `i` and restores the sums on its path to the root.
    ///
    /// # Panics
    /// If `i` is not a leaf of this tree.
    pub fn set(&mut self, i: usize, value: f64) {
        assert!(i < self.len, "leaf {i} out of bounds for {} leaves", self.len);

        let mut k = self.width + i;
        self.nodes[k] = value;

        while k > 1 {
            k /= 2;
            self.nodes[k] = self.nodes[2 * k] + self.nodes[2 * k + 1];
        }
    }

    /// Adds `delta` to leaf `i`, see `set`.
    pub fn update(&mut self, i: usize, delta: f64) {
        self.set(i, self.leaf(i) + delta);
    }

    /// Draws a leaf with probability proportional to its value.
    ///
    /// # Arguments
    /// * `u` - A uniform draw in `[0, 1)`.
    pub fn sample(&self, u: f64) -> usize {
        descend(self.width, u, |k| self.nodes[k])
    }

    /// Checks the children-sum invariant on every internal node.
    pub fn is_consistent(&self) -> bool {
        (1..self.width).all(|k| self.nodes[k] == self.nodes[2 * k] + self.nodes[2 * k + 1])
    }
}

/// Inverse-CDF descent over a virtual tree of `width` leaves.
///
/// `weight(k)` gives the mass below heap position `k`; it must be additive over
/// children. At each level the draw is compared against the left subtree mass
/// and, when it falls past it, the left mass is subtracted before moving right.
/// Subtrees without mass are never entered.
pub(crate) fn descend<W>(width: usize, u: f64, weight: W) -> usize
where
    W: Fn(usize) -> f64,
{
    let mut k = 1;
    let mut target = u * weight(1);

    while k < width {
        let left = weight(2 * k);
        let right = weight(2 * k + 1);

        if target < left || right <= 0. {
            k *= 2;
        } else {
            target -= left;
            k = 2 * k + 1;
        }
    }

    k - width
}
