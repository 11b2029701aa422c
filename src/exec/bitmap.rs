//! Construction of result bitmaps.
//!
//! A result bitmap is a [`BooleanArray`]: value bits carry the match, the null
//! buffer carries validity. Rows that are invalid always have a false value bit.

use arrow::{
    array::{Array, BooleanArray, BooleanBufferBuilder},
    buffer::{BooleanBuffer, NullBuffer},
};

/// `len` rows, none matching, all valid.
pub(crate) fn all_false(len: usize) -> BooleanArray {
    BooleanArray::new(BooleanBuffer::new_unset(len), None)
}

/// Bitmap for rows `[start, start + len)` given the sorted offsets of every
/// matching row in the segment.
///
/// Cost is proportional to the matches inside the range.
pub(crate) fn from_sorted_offsets(offsets: &[usize], start: usize, len: usize) -> BooleanArray {
    let lo = offsets.partition_point(|offset| *offset < start);
    let hi = offsets.partition_point(|offset| *offset < start + len);
    let mut bits = BooleanBufferBuilder::new(len);
    bits.append_n(len, false);
    for offset in &offsets[lo..hi] {
        bits.set_bit(offset - start, true);
    }
    BooleanArray::new(bits.finish(), None)
}

/// Row-by-row bitmap builder used by the scan strategies.
pub(crate) struct BitmapBuilder {
    values: BooleanBufferBuilder,
    validity: BooleanBufferBuilder,
    invalid: usize,
}

impl BitmapBuilder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: BooleanBufferBuilder::new(capacity),
            validity: BooleanBufferBuilder::new(capacity),
            invalid: 0,
        }
    }

    /// A valid row.
    pub(crate) fn append(&mut self, matched: bool) {
        self.values.append(matched);
        self.validity.append(true);
    }

    /// A row whose outcome is unknown: null, missing path or incompatible value.
    pub(crate) fn append_invalid(&mut self) {
        self.values.append(false);
        self.validity.append(false);
        self.invalid += 1;
    }

    /// Appends every row of an existing bitmap.
    pub(crate) fn extend_from(&mut self, bitmap: &BooleanArray) {
        for row in 0..bitmap.len() {
            if bitmap.is_valid(row) {
                self.append(bitmap.value(row));
            } else {
                self.append_invalid();
            }
        }
    }

    pub(crate) fn finish(mut self) -> BooleanArray {
        let values = self.values.finish();
        let validity = self.validity.finish();
        let nulls = (self.invalid > 0).then(|| NullBuffer::new(validity));
        BooleanArray::new(values, nulls)
    }
}
