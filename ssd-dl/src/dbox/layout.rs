use crate::common::*;

/// The position of one default box in the feature map pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub map: usize,
    pub row: usize,
    pub col: usize,
    pub variant: usize,
}

/// The footprint of one feature map in the flat default box order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, CopyGetters)]
pub struct MapLayout {
    #[get_copy = "pub"]
    h: usize,
    #[get_copy = "pub"]
    w: usize,
    /// Default boxes per cell.
    #[get_copy = "pub"]
    variants: usize,
    /// The flat index of the first box of this map.
    #[get_copy = "pub"]
    offset: usize,
}

impl MapLayout {
    pub fn num_boxes(&self) -> usize {
        self.h * self.w * self.variants
    }

    /// The flat index of a box within the whole grid. Cells are row-major and
    /// the variants of a cell are contiguous.
    pub fn flat_index(&self, row: usize, col: usize, variant: usize) -> usize {
        debug_assert!(row < self.h && col < self.w && variant < self.variants);
        self.offset + (row * self.w + col) * self.variants + variant
    }
}

/// The ordering contract between the default box grid and the flattened
/// network predictions.
///
/// Feature maps are concatenated in configuration order. Within a map, cells
/// are visited row by row and each cell lists its variants in order, matching
/// a channel-last flattening of `(variants * k, h, w)` prediction maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridLayout {
    maps: Vec<MapLayout>,
    num_boxes: usize,
}

impl GridLayout {
    /// Build the layout from `[h, w, variants]` triples, one per feature map.
    pub fn new<I>(shapes: I) -> Result<Self>
    where
        I: IntoIterator<Item = [usize; 3]>,
    {
        let mut offset = 0;
        let maps = shapes
            .into_iter()
            .enumerate()
            .map(|(index, [h, w, variants])| {
                ensure!(
                    h > 0 && w > 0,
                    "feature map {} must have a positive size, but get {}x{}",
                    index,
                    h,
                    w
                );
                ensure!(
                    variants > 0,
                    "feature map {} must have at least one default box per cell",
                    index
                );
                let map = MapLayout {
                    h,
                    w,
                    variants,
                    offset,
                };
                offset += map.num_boxes();
                Ok(map)
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(!maps.is_empty(), "at least one feature map is required");

        Ok(Self {
            maps,
            num_boxes: offset,
        })
    }

    pub fn maps(&self) -> &[MapLayout] {
        &self.maps
    }

    pub fn num_maps(&self) -> usize {
        self.maps.len()
    }

    pub fn num_boxes(&self) -> usize {
        self.num_boxes
    }

    /// The flat index of a grid position, or `None` if it is out of range.
    pub fn flat_index(&self, index: GridIndex) -> Option<usize> {
        let GridIndex {
            map,
            row,
            col,
            variant,
        } = index;
        let layout = self.maps.get(map)?;
        (row < layout.h && col < layout.w && variant < layout.variants)
            .then(|| layout.flat_index(row, col, variant))
    }

    /// The grid position of a flat index, or `None` if it is out of range.
    pub fn grid_index(&self, flat: usize) -> Option<GridIndex> {
        if flat >= self.num_boxes {
            return None;
        }
        let map = self
            .maps
            .partition_point(|layout| layout.offset + layout.num_boxes() <= flat);
        let layout = &self.maps[map];
        let local = flat - layout.offset;
        let cell = local / layout.variants;

        Some(GridIndex {
            map,
            row: cell / layout.w,
            col: cell % layout.w,
            variant: local % layout.variants,
        })
    }

    /// Visit every grid position in flat order.
    pub fn iter(&self) -> impl Iterator<Item = GridIndex> + '_ {
        self.maps.iter().enumerate().flat_map(|(map, layout)| {
            let MapLayout { h, w, variants, .. } = *layout;
            (0..h).flat_map(move |row| {
                (0..w).flat_map(move |col| {
                    (0..variants).map(move |variant| GridIndex {
                        map,
                        row,
                        col,
                        variant,
                    })
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_agrees_with_flat_index() {
        let layout = GridLayout::new([[3, 2, 4], [2, 2, 6], [1, 1, 4]]).unwrap();
        assert_eq!(layout.num_boxes(), 3 * 2 * 4 + 2 * 2 * 6 + 4);

        let mut count = 0;
        for (flat, index) in layout.iter().enumerate() {
            assert_eq!(layout.flat_index(index), Some(flat));
            assert_eq!(layout.grid_index(flat), Some(index));
            count += 1;
        }
        assert_eq!(count, layout.num_boxes());
        assert_eq!(layout.grid_index(layout.num_boxes()), None);
    }

    #[test]
    fn closed_form_index() {
        let layout = GridLayout::new([[2, 2, 2]]).unwrap();
        let index = GridIndex {
            map: 0,
            row: 1,
            col: 0,
            variant: 1,
        };
        // (row * w + col) * variants + variant
        assert_eq!(layout.flat_index(index), Some((1 * 2 + 0) * 2 + 1));
    }

    #[test]
    fn out_of_range_positions() {
        let layout = GridLayout::new([[2, 3, 2]]).unwrap();
        let index = GridIndex {
            map: 0,
            row: 0,
            col: 3,
            variant: 0,
        };
        assert_eq!(layout.flat_index(index), None);
        assert_eq!(layout.flat_index(GridIndex { map: 1, ..index }), None);
    }

    #[test]
    fn reject_malformed_layouts() {
        assert!(GridLayout::new(Vec::<[usize; 3]>::new()).is_err());
        assert!(GridLayout::new([[0, 2, 2]]).is_err());
        assert!(GridLayout::new([[2, 2, 0]]).is_err());
    }
}
