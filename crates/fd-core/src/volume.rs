use crate::Error;

/// Extents of a `[projection][row][column]` volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dims3 {
    pub num_proj: usize,
    pub num_rows: usize,
    pub num_cols: usize,
}

impl Dims3 {
    pub fn new(num_proj: usize, num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_proj,
            num_rows,
            num_cols,
        }
    }

    /// Total element count, or `None` on overflow.
    pub fn checked_len(&self) -> Option<usize> {
        self.num_proj
            .checked_mul(self.num_rows)?
            .checked_mul(self.num_cols)
    }

    /// Total element count, or `Error::SizeOverflow`.
    pub fn try_len(&self) -> Result<usize, Error> {
        self.checked_len().ok_or(Error::SizeOverflow {
            num_proj: self.num_proj,
            num_rows: self.num_rows,
            num_cols: self.num_cols,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.num_rows * self.num_cols
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    dims: Dims3,
    data: Vec<T>,
}

impl<T> Volume<T> {
    pub fn from_vec(
        num_proj: usize,
        num_rows: usize,
        num_cols: usize,
        data: Vec<T>,
    ) -> Result<Self, Error> {
        let dims = Dims3::new(num_proj, num_rows, num_cols);
        let expected = dims.try_len()?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    pub fn num_proj(&self) -> usize {
        self.dims.num_proj
    }

    pub fn num_rows(&self) -> usize {
        self.dims.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.dims.num_cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn as_view(&self) -> VolumeView<'_, T> {
        VolumeView {
            dims: self.dims,
            data: &self.data,
        }
    }

    pub fn as_view_mut(&mut self) -> VolumeViewMut<'_, T> {
        VolumeViewMut {
            dims: self.dims,
            data: &mut self.data,
        }
    }
}

impl<T: Clone> Volume<T> {
    pub fn new_fill(num_proj: usize, num_rows: usize, num_cols: usize, value: T) -> Self {
        let dims = Dims3::new(num_proj, num_rows, num_cols);
        let len = dims.checked_len().expect("volume size overflow");
        Self {
            dims,
            data: vec![value; len],
        }
    }
}

/// Borrowed, contiguous view over a caller-owned volume buffer.
#[derive(Debug, Clone, Copy)]
pub struct VolumeView<'a, T> {
    dims: Dims3,
    data: &'a [T],
}

impl<'a, T> VolumeView<'a, T> {
    pub fn from_slice(
        num_proj: usize,
        num_rows: usize,
        num_cols: usize,
        data: &'a [T],
    ) -> Result<Self, Error> {
        let dims = Dims3::new(num_proj, num_rows, num_cols);
        let expected = dims.try_len()?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    pub fn num_proj(&self) -> usize {
        self.dims.num_proj
    }

    pub fn num_rows(&self) -> usize {
        self.dims.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.dims.num_cols
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    pub fn row(&self, p: usize, r: usize) -> &'a [T] {
        assert!(
            p < self.dims.num_proj && r < self.dims.num_rows,
            "row index out of bounds"
        );
        let start = (p * self.dims.num_rows + r) * self.dims.num_cols;
        &self.data[start..start + self.dims.num_cols]
    }

    /// One projection as a row-major `num_rows × num_cols` slice.
    pub fn frame(&self, p: usize) -> &'a [T] {
        assert!(p < self.dims.num_proj, "projection index out of bounds");
        let len = self.dims.frame_len();
        &self.data[p * len..(p + 1) * len]
    }

    pub fn get(&self, p: usize, r: usize, c: usize) -> Option<&'a T> {
        if p >= self.dims.num_proj || r >= self.dims.num_rows || c >= self.dims.num_cols {
            return None;
        }
        self.data
            .get((p * self.dims.num_rows + r) * self.dims.num_cols + c)
    }
}

#[derive(Debug)]
pub struct VolumeViewMut<'a, T> {
    dims: Dims3,
    data: &'a mut [T],
}

impl<'a, T> VolumeViewMut<'a, T> {
    pub fn from_slice_mut(
        num_proj: usize,
        num_rows: usize,
        num_cols: usize,
        data: &'a mut [T],
    ) -> Result<Self, Error> {
        let dims = Dims3::new(num_proj, num_rows, num_cols);
        let expected = dims.try_len()?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    pub fn num_proj(&self) -> usize {
        self.dims.num_proj
    }

    pub fn num_rows(&self) -> usize {
        self.dims.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.dims.num_cols
    }

    pub fn as_slice(&self) -> &[T] {
        &*self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut *self.data
    }

    pub fn row(&self, p: usize, r: usize) -> &[T] {
        assert!(
            p < self.dims.num_proj && r < self.dims.num_rows,
            "row index out of bounds"
        );
        let start = (p * self.dims.num_rows + r) * self.dims.num_cols;
        &self.data[start..start + self.dims.num_cols]
    }

    pub fn row_mut(&mut self, p: usize, r: usize) -> &mut [T] {
        assert!(
            p < self.dims.num_proj && r < self.dims.num_rows,
            "row index out of bounds"
        );
        let start = (p * self.dims.num_rows + r) * self.dims.num_cols;
        &mut self.data[start..start + self.dims.num_cols]
    }

    pub fn get_mut(&mut self, p: usize, r: usize, c: usize) -> Option<&mut T> {
        if p >= self.dims.num_proj || r >= self.dims.num_rows || c >= self.dims.num_cols {
            return None;
        }
        self.data
            .get_mut((p * self.dims.num_rows + r) * self.dims.num_cols + c)
    }

    pub fn as_view(&self) -> VolumeView<'_, T> {
        VolumeView {
            dims: self.dims,
            data: &*self.data,
        }
    }
}

/// Widens integer detector counts, e.g. raw 16-bit frames, to `f32`.
pub fn to_f32_u16(vol: &VolumeView<'_, u16>) -> Volume<f32> {
    Volume {
        dims: vol.dims(),
        data: vol.as_slice().iter().map(|&v| v as f32).collect(),
    }
}
