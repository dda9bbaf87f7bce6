use crate::data::{PartRequest, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};
use crate::error::IntentError;

pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Splits `size` bytes into parts of `preferred_part_size`, clamped to the
/// allowed range. The part size grows when the file would otherwise need
/// more than [`MAX_PARTS`] parts. An empty file is one empty part.
pub fn plan_parts(size: u64, preferred_part_size: u64) -> Result<Vec<PartRequest>, IntentError> {
    let mut part_size = preferred_part_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
    let mut count = size.div_ceil(part_size).max(1);
    if count > MAX_PARTS as u64 {
        part_size = size.div_ceil(MAX_PARTS as u64);
        if part_size > MAX_PART_SIZE {
            return Err(IntentError::FileTooLarge(size));
        }
        count = size.div_ceil(part_size);
    }

    let mut parts = Vec::with_capacity(count as usize);
    let mut remaining = size;
    for part_number in 1..=count as u32 {
        let this = remaining.min(part_size);
        parts.push(PartRequest {
            part_number,
            part_size: this,
        });
        remaining -= this;
    }
    Ok(parts)
}
