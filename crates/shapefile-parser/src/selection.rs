//! Outcome of applying an id filter and a select box to a file.
//!
//! An empty selection is an expected result, not an error: callers decide
//! whether "nothing to do" is worth reporting.

use std::fmt;

use tile_common::BoundingBox;

/// Why a selection came out empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmptySelection {
    /// No record carries an id accepted by the validator.
    NoValidIds,
    /// The select box does not intersect the file's overall bbox.
    OutsideSelectBox {
        file_bbox: BoundingBox,
        select_bbox: BoundingBox,
    },
}

impl fmt::Display for EmptySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptySelection::NoValidIds => write!(f, "no record has a valid id"),
            EmptySelection::OutsideSelectBox {
                file_bbox,
                select_bbox,
            } => write!(
                f,
                "select box [{}] is outside file bbox [{}]",
                select_bbox, file_bbox
            ),
        }
    }
}

/// A value, or the reason there is nothing to work on.
#[derive(Debug)]
pub enum Selection<T> {
    Selected(T),
    Empty(EmptySelection),
}

impl<T> Selection<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty(_))
    }

    /// The selected value, discarding the empty reason.
    pub fn selected(self) -> Option<T> {
        match self {
            Selection::Selected(v) => Some(v),
            Selection::Empty(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Selection<U> {
        match self {
            Selection::Selected(v) => Selection::Selected(f(v)),
            Selection::Empty(reason) => Selection::Empty(reason),
        }
    }
}
