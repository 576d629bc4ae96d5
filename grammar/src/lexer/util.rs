/// Returns the index of the interval containing `char`. `char_intervals` holds
/// the sorted lower bounds of the intervals and always starts with 0.
pub fn find_char_interval(char: u32, char_intervals: &[u32]) -> u32 {
  let mut lo = 0;
  let mut hi = char_intervals.len();

  while lo < hi {
    let mid = (lo + hi) / 2;
    if char_intervals[mid] > char {
      hi = mid;
    } else {
      lo = mid + 1;
    }
  }

  lo as u32 - 1
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intervals() {
    let intervals = [0, 48, 58, 97];
    assert_eq!(find_char_interval(0, &intervals), 0);
    assert_eq!(find_char_interval('0' as u32, &intervals), 1);
    assert_eq!(find_char_interval('9' as u32, &intervals), 1);
    assert_eq!(find_char_interval(':' as u32, &intervals), 2);
    assert_eq!(find_char_interval(0x1f4a9, &intervals), 3);
  }
}
