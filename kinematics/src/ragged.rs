use ndarray::Array2;

/// Per-event variable-length sequences, stored as one flat buffer plus row
/// offsets (the layout jagged ROOT branches arrive in). `offsets` has one
/// entry per row plus a trailing end marker; row `i` is
/// `data[offsets[i]..offsets[i+1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Ragged<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T> Ragged<T> {
    /// Assemble from flat storage and offsets. The offsets must start at 0,
    /// be non-decreasing, and end at `data.len()`; anything else means the
    /// caller lost track of row boundaries.
    pub fn from_flat(data: Vec<T>, offsets: Vec<usize>) -> Self {
        assert!(offsets.first() == Some(&0), "ragged offsets must start at 0");
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "ragged offsets must be non-decreasing");
        assert!(offsets.last() == Some(&data.len()), "ragged offsets must end at the data length");
        Self { data, offsets }
    }

    /// A container with no rows at all; grow it with [`Ragged::push_row`].
    pub fn new() -> Self {
        Self { data: vec![], offsets: vec![0] }
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Vec<T>>) -> Self {
        let mut data = vec![];
        let mut offsets = vec![0];
        for row in rows {
            data.extend(row);
            offsets.push(data.len());
        }
        Self { data, offsets }
    }

    /// Number of rows (events).
    pub fn len(&self) -> usize { self.offsets.len() - 1 }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn count(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    /// Per-row lengths.
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn flat(&self) -> &[T] { &self.data }

    pub fn offsets(&self) -> &[usize] { &self.offsets }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        self.offsets.windows(2).map(move |w| &self.data[w[0]..w[1]])
    }

    /// True if `other` has identical row boundaries.
    pub fn same_shape<U>(&self, other: &Ragged<U>) -> bool {
        self.offsets == other.offsets
    }

    pub fn push_row(&mut self, row: impl IntoIterator<Item = T>) {
        self.data.extend(row);
        self.offsets.push(self.data.len());
    }
}

impl<T: Copy> Ragged<T> {
    /// Element-wise transform preserving row structure.
    pub fn map<R: Copy>(&self, f: impl FnMut(T) -> R) -> Ragged<R> {
        Ragged {
            data: self.data.iter().copied().map(f).collect(),
            offsets: self.offsets.clone(),
        }
    }

    /// Keep the elements whose mask entry is true, compressing each row.
    /// Mask and data must have identical shape.
    pub fn filter(&self, keep: &Ragged<bool>) -> Ragged<T> {
        assert!(self.same_shape(keep), "element mask shape differs from data shape");
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.offsets.len());
        offsets.push(0);
        for (row, krow) in self.iter().zip(keep.iter()) {
            data.extend(row.iter().zip(krow).filter(|(_, &k)| k).map(|(&v, _)| v));
            offsets.push(data.len());
        }
        Ragged { data, offsets }
    }

    /// Keep whole rows (events) whose mask entry is true.
    pub fn select_rows(&self, keep: &[bool]) -> Ragged<T> {
        assert_eq!(self.len(), keep.len(), "event mask length differs from event count");
        let mut out = Ragged::new();
        for (row, &k) in self.iter().zip(keep) {
            if k { out.push_row(row.iter().copied()) }
        }
        out
    }

    /// Row-wise concatenation: row i of the result is row i of `self`
    /// followed by row i of `other`.
    pub fn concat(&self, other: &Ragged<T>) -> Ragged<T> {
        assert_eq!(self.len(), other.len(), "cannot concatenate ragged sequences with different event counts");
        let mut out = Ragged::new();
        for (a, b) in self.iter().zip(other.iter()) {
            out.push_row(a.iter().chain(b).copied());
        }
        out
    }

    /// Pad (and clip) every row to `width`, filling the tail with `fill`.
    /// The result is the dense (n_rows × width) array serialization wants.
    pub fn pad(&self, width: usize, fill: T) -> Array2<T> {
        let mut out = Array2::from_elem((self.len(), width), fill);
        for (i, row) in self.iter().enumerate() {
            for (j, &v) in row.iter().take(width).enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }

    /// Per-row sort permutation by a key, descending. Returned as a ragged
    /// sequence of within-row indices, applied with `take`.
    pub fn argsort_desc_by<K: PartialOrd>(&self, key: impl Fn(T) -> K) -> Ragged<usize> {
        let mut out = Ragged::new();
        for row in self.iter() {
            let mut idx: Vec<usize> = (0..row.len()).collect();
            // stable, so equal keys keep their original order
            idx.sort_by(|&a, &b| key(row[b]).partial_cmp(&key(row[a]))
                        .expect("cannot sort on NaN key"));
            out.push_row(idx);
        }
        out
    }

    /// Reorder each row by a row of within-row indices.
    pub fn take(&self, order: &Ragged<usize>) -> Ragged<T> {
        assert_eq!(self.len(), order.len(), "take: event counts differ");
        let mut out = Ragged::new();
        for (row, ord) in self.iter().zip(order.iter()) {
            out.push_row(ord.iter().map(|&j| row[j]));
        }
        out
    }

    /// Broadcast every element of a row of `self` against every element of
    /// the corresponding row of `other`: row i of the result holds
    /// `f(self[i][j], other[i][k])` for all (j, k), j-major. Feed the result
    /// to [`Ragged::argmin_along_axis`] with the two original shapes.
    pub fn pairwise_apply<U: Copy, R: Copy>(
        &self,
        other: &Ragged<U>,
        mut f: impl FnMut(T, U) -> R,
    ) -> Ragged<R> {
        assert_eq!(self.len(), other.len(), "pairwise_apply: event counts differ");
        let mut out = Ragged::new();
        for (arow, brow) in self.iter().zip(other.iter()) {
            out.push_row(arow.iter().flat_map(|&a| brow.iter().map(move |&b| (a, b)))
                         .map(|(a, b)| f(a, b))
                         .collect::<Vec<_>>());
        }
        out
    }
}

impl Ragged<f64> {
    /// Interpret each row as a j-major (outer × inner) matrix — the layout
    /// produced by [`Ragged::pairwise_apply`] — and take, for every outer
    /// element, the inner index of the row minimum together with the
    /// minimum itself.
    ///
    /// Ties resolve to the lowest inner index (strict-< scan), so repeated
    /// runs over the same input always pick the same candidate. An empty
    /// inner axis yields `None`: argmin over nothing is not an error here,
    /// it is "no candidate". A NaN distance loses to any real one and can
    /// only win a row made entirely of NaNs.
    pub fn argmin_along_axis(&self, outer: &Ragged<impl Copy>, inner: &Ragged<impl Copy>) -> Ragged<Option<(usize, f64)>> {
        assert_eq!(self.len(), outer.len(), "argmin_along_axis: event counts differ");
        assert_eq!(self.len(), inner.len(), "argmin_along_axis: event counts differ");
        let mut out = Ragged::new();
        for (i, row) in self.iter().enumerate() {
            let n_outer = outer.count(i);
            let n_inner = inner.count(i);
            assert_eq!(row.len(), n_outer * n_inner,
                       "argmin_along_axis: matrix row does not factor into outer × inner");
            let mut best = Vec::with_capacity(n_outer);
            for j in 0..n_outer {
                let candidates = &row[j * n_inner..(j + 1) * n_inner];
                let mut min: Option<(usize, f64)> = None;
                for (k, &d) in candidates.iter().enumerate() {
                    let better = match min {
                        None => true,
                        Some((_, m)) => d < m || (m.is_nan() && !d.is_nan()),
                    };
                    if better {
                        min = Some((k, d));
                    }
                }
                best.push(min);
            }
            out.push_row(best);
        }
        out
    }
}
