pub(super) const OPEN: &[u8] = b"#{";
pub(super) const CLOSE: u8 = b'}';

/// Position of the next open marker at or after `start`.
pub(super) fn find_open(bytes: &[u8], start: usize) -> Option<usize> {
    bytes
        .get(start..)?
        .windows(OPEN.len())
        .position(|w| w == OPEN)
        .map(|pos| start + pos)
}

/// Position of the next close marker at or after `start`.
pub(super) fn find_close(bytes: &[u8], start: usize) -> Option<usize> {
    bytes
        .get(start..)?
        .iter()
        .position(|b| *b == CLOSE)
        .map(|pos| start + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_markers_from_offset() {
        let bytes = b"a=#{a} and b=#{b}";
        assert_eq!(find_open(bytes, 0), Some(2));
        assert_eq!(find_open(bytes, 3), Some(13));
        assert_eq!(find_close(bytes, 4), Some(5));
        assert_eq!(find_open(bytes, 99), None);
    }
}
