//! Which item IDs a backfill should visit.

use crate::{Error, Result, item::ItemId};

/// The IDs a backfill run walks, in the order it walks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSelection {
  /// Descending inclusive range `start..=end` with `start >= end >= 1`.
  Range { start: ItemId, end: ItemId },
  /// An explicit list, visited in the given order.
  List(Vec<ItemId>),
}

impl IdSelection {
  /// Build a descending range, rejecting `start < end` and non-positive ends.
  pub fn range(start: ItemId, end: ItemId) -> Result<Self> {
    if start < end || end < 1 {
      return Err(Error::InvalidRange { start, end });
    }
    Ok(Self::Range { start, end })
  }

  /// Parse a comma-separated list such as `"8863,121003"`. A lone ID is a
  /// one-element list.
  pub fn parse_list(input: &str) -> Result<Self> {
    if input.trim().is_empty() {
      return Err(Error::EmptyList);
    }
    let ids = input
      .split(',')
      .map(|raw| {
        let raw = raw.trim();
        match raw.parse::<ItemId>() {
          Ok(id) if id >= 1 => Ok(id),
          _ => Err(Error::InvalidId(raw.to_owned())),
        }
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self::List(ids))
  }

  pub fn len(&self) -> u64 {
    match self {
      Self::Range { start, end } => (start - end + 1) as u64,
      Self::List(ids) => ids.len() as u64,
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Lazily split the selection into batches of at most `size` IDs.
  pub fn batches(&self, size: usize) -> Batches<'_> {
    let size = size.max(1);
    match self {
      Self::Range { start, end } => Batches::Range { next: *start, end: *end, size },
      Self::List(ids) => Batches::List(ids.chunks(size)),
    }
  }
}

/// Iterator returned by [`IdSelection::batches`].
pub enum Batches<'a> {
  Range { next: ItemId, end: ItemId, size: usize },
  List(std::slice::Chunks<'a, ItemId>),
}

impl Iterator for Batches<'_> {
  type Item = Vec<ItemId>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      Self::Range { next, end, size } => {
        if *next < *end {
          return None;
        }
        let stop = (*next - *size as ItemId + 1).max(*end);
        let batch: Vec<ItemId> = (stop..=*next).rev().collect();
        *next = stop - 1;
        Some(batch)
      }
      Self::List(chunks) => chunks.next().map(<[ItemId]>::to_vec),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_rejects_ascending_bounds() {
    assert!(matches!(
      IdSelection::range(1, 5),
      Err(Error::InvalidRange { start: 1, end: 5 })
    ));
    assert!(IdSelection::range(5, 0).is_err());
    assert!(IdSelection::range(5, 5).is_ok());
  }

  #[test]
  fn range_batches_descend_with_partial_tail() {
    let sel = IdSelection::range(10, 1).unwrap();
    assert_eq!(sel.len(), 10);
    let batches: Vec<_> = sel.batches(4).collect();
    assert_eq!(batches, vec![
      vec![10, 9, 8, 7],
      vec![6, 5, 4, 3],
      vec![2, 1],
    ]);
  }

  #[test]
  fn parse_list_trims_and_validates() {
    let sel = IdSelection::parse_list(" 3, 1 ,2").unwrap();
    assert_eq!(sel, IdSelection::List(vec![3, 1, 2]));

    let single = IdSelection::parse_list("8863").unwrap();
    assert_eq!(single.len(), 1);

    assert!(matches!(IdSelection::parse_list("1,,2"), Err(Error::InvalidId(_))));
    assert!(matches!(IdSelection::parse_list("1,abc"), Err(Error::InvalidId(_))));
    assert!(matches!(IdSelection::parse_list("-4"), Err(Error::InvalidId(_))));
    assert!(matches!(IdSelection::parse_list("  "), Err(Error::EmptyList)));
  }

  #[test]
  fn list_batches_keep_given_order() {
    let sel = IdSelection::List(vec![9, 2, 7, 4, 1]);
    let batches: Vec<_> = sel.batches(2).collect();
    assert_eq!(batches, vec![vec![9, 2], vec![7, 4], vec![1]]);
  }
}
