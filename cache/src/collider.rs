//! Merging of two newest-first id lists into one bounded list.
//!
//! Both inputs are expected to be sorted by descending id with no
//! duplicates, which is how stream id lists are kept.

/// Combines two descending id lists into at most `max_results` ids.
pub trait ListCollider: Send + Sync {
  fn collide(&self, sorted: &[i64], other: &[i64], max_results: usize) -> Vec<i64>;
}

/// Intersection ("AND"): ids present in both lists.
///
/// Each id of `other` is located in `sorted` by interpolation search, with
/// the lower bound carried forward since both lists descend.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolationListCollider;

impl InterpolationListCollider {
  /// Finds `target` in `list[low..=high]` (descending). Returns the index of
  /// the match, or the first index holding a smaller id when absent.
  fn search(list: &[i64], target: i64, mut low: usize, mut high: usize) -> Result<usize, usize> {
    while low <= high && high < list.len() {
      let first = list[low];
      let last = list[high];
      if target > first {
        return Err(low);
      }
      if target < last {
        return Err(high + 1);
      }
      if first == last {
        return if first == target { Ok(low) } else { Err(low) };
      }
      // first > last here; interpolate the probe between the two ends.
      let span = (first as i128) - (last as i128);
      let offset = ((first as i128 - target as i128) * (high - low) as i128) / span;
      let probe = low + offset as usize;
      let value = list[probe];
      if value == target {
        return Ok(probe);
      } else if value > target {
        low = probe + 1;
      } else {
        if probe == 0 {
          return Err(0);
        }
        high = probe - 1;
      }
    }
    Err(low)
  }
}

impl ListCollider for InterpolationListCollider {
  fn collide(&self, sorted: &[i64], other: &[i64], max_results: usize) -> Vec<i64> {
    let mut out = Vec::new();
    if sorted.is_empty() || other.is_empty() || max_results == 0 {
      return out;
    }
    let mut low = 0usize;
    for &target in other {
      if low >= sorted.len() || out.len() >= max_results {
        break;
      }
      match Self::search(sorted, target, low, sorted.len() - 1) {
        Ok(index) => {
          if out.last() != Some(&target) {
            out.push(target);
          }
          low = index + 1;
        }
        Err(index) => low = index,
      }
    }
    out
  }
}

/// Union ("OR"): every id from either list, merged by descending id.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionListCollider;

impl ListCollider for UnionListCollider {
  fn collide(&self, sorted: &[i64], other: &[i64], max_results: usize) -> Vec<i64> {
    let mut out = Vec::with_capacity((sorted.len() + other.len()).min(max_results));
    let (mut i, mut j) = (0, 0);
    while out.len() < max_results && (i < sorted.len() || j < other.len()) {
      let next = match (sorted.get(i), other.get(j)) {
        (Some(&a), Some(&b)) if a == b => {
          i += 1;
          j += 1;
          a
        }
        (Some(&a), Some(&b)) if a > b => {
          i += 1;
          a
        }
        (_, Some(&b)) => {
          j += 1;
          b
        }
        (Some(&a), None) => {
          i += 1;
          a
        }
        (None, None) => break,
      };
      if out.last() != Some(&next) {
        out.push(next);
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intersection_of_disjoint_lists_is_empty() {
    let result = InterpolationListCollider.collide(&[9, 7, 5], &[8, 6, 4], 10);
    assert!(result.is_empty());
  }

  #[test]
  fn intersection_keeps_descending_order() {
    let result = InterpolationListCollider.collide(&[10, 8, 6, 4, 2], &[9, 8, 4, 3, 2], 10);
    assert_eq!(result, vec![8, 4, 2]);
  }

  #[test]
  fn intersection_is_capped() {
    let result = InterpolationListCollider.collide(&[5, 4, 3, 2, 1], &[5, 4, 3, 2, 1], 2);
    assert_eq!(result, vec![5, 4]);
  }

  #[test]
  fn intersection_handles_uneven_spacing() {
    let sorted = [1_000_000, 999_999, 50, 49, 48, 2, 1];
    let result = InterpolationListCollider.collide(&sorted, &[999_999, 48, 1], 10);
    assert_eq!(result, vec![999_999, 48, 1]);
  }

  #[test]
  fn intersection_handles_extreme_ids() {
    let sorted = [i64::MAX, 0, i64::MIN];
    let result = InterpolationListCollider.collide(&sorted, &[i64::MAX, 5, i64::MIN], 10);
    assert_eq!(result, vec![i64::MAX, i64::MIN]);
  }

  #[test]
  fn union_merges_and_dedups() {
    let result = UnionListCollider.collide(&[9, 7, 5], &[8, 7, 1], 10);
    assert_eq!(result, vec![9, 8, 7, 5, 1]);
  }

  #[test]
  fn union_is_capped() {
    let result = UnionListCollider.collide(&[9, 7, 5], &[8, 6], 3);
    assert_eq!(result, vec![9, 8, 7]);
  }
}
