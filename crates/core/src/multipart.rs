//! Multipart part arithmetic
//!
//! Splits a file into contiguous byte ranges within S3's part limits.

/// Minimum part size: 5 MiB (S3 requirement, except for the last part)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Part size to use for a file, growing `chunk_size` when the file would
/// otherwise need more than [`MAX_PARTS`] parts
pub fn effective_part_size(file_size: u64, chunk_size: u64) -> u64 {
    let chunk_size = chunk_size.max(1);
    if file_size.div_ceil(chunk_size) <= MAX_PARTS {
        chunk_size
    } else {
        file_size.div_ceil(MAX_PARTS).max(chunk_size)
    }
}

/// Calculate number of parts for a file
pub fn calculate_parts(file_size: u64, part_size: u64) -> u64 {
    file_size.div_ceil(part_size.max(1))
}

/// Get byte range `(start, end)` for a 1-based part number
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start, end)
}

/// A planned part: number, offset and length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: i32,
    pub offset: u64,
    pub length: u64,
}

/// All parts of a file of `file_size` bytes cut at `part_size`
pub fn part_ranges(file_size: u64, part_size: u64) -> Vec<PartRange> {
    let count = calculate_parts(file_size, part_size);
    (1..=count as i32)
        .map(|part_number| {
            let (start, end) = part_byte_range(part_number, part_size, file_size);
            PartRange {
                part_number,
                offset: start,
                length: end - start,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_calculate_parts() {
        assert_eq!(calculate_parts(100, 10), 10);
        assert_eq!(calculate_parts(101, 10), 11);
        assert_eq!(calculate_parts(99, 10), 10);
    }

    #[test]
    fn test_part_byte_range() {
        assert_eq!(part_byte_range(1, 100, 250), (0, 100));
        assert_eq!(part_byte_range(2, 100, 250), (100, 200));
        assert_eq!(part_byte_range(3, 100, 250), (200, 250));
    }

    #[test]
    fn test_thirty_mb_in_twenty_five_mb_parts() {
        let parts = part_ranges(30 * MB, 25 * MB);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].length, 25 * MB);
        assert_eq!(parts[1].offset, 25 * MB);
        assert_eq!(parts[1].length, 5 * MB);
    }

    #[test]
    fn test_ranges_cover_file_exactly() {
        let size = 1_000_003;
        let parts = part_ranges(size, 4096);
        let total: u64 = parts.iter().map(|p| p.length).sum();
        assert_eq!(total, size);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].offset + pair[0].length, pair[1].offset);
            assert_eq!(pair[0].part_number + 1, pair[1].part_number);
        }
    }

    #[test]
    fn test_effective_part_size_grows_for_huge_files() {
        let huge = 25 * MB * 20_000;
        let size = effective_part_size(huge, 25 * MB);
        assert!(size > 25 * MB);
        assert!(calculate_parts(huge, size) <= MAX_PARTS);
    }

    #[test]
    fn test_effective_part_size_keeps_chunk() {
        assert_eq!(effective_part_size(30 * MB, 25 * MB), 25 * MB);
    }
}
