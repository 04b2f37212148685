//! Batch checks run before any file enters a slot.

use thiserror::Error;

use super::{SelectedFile, SlotSpec};

const MIB: u64 = 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Please select at least one image.")]
    Empty,

    #[error("Unknown upload section {0}.")]
    UnknownSlot(usize),

    #[error("{name} is not an image. Please upload only image files.")]
    NotAnImage { name: String, media_type: String },

    #[error("{name} is larger than {} MB.", .limit / MIB)]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Please upload at most {max} image(s) here.")]
    TooMany { slot: usize, max: usize, current: usize, offered: usize },

    #[error("Please add at least {min} image(s) to section {}.", .slot + 1)]
    TooFew { slot: usize, min: usize, current: usize },
}

pub fn check_media_type(file: &SelectedFile) -> Result<(), Rejection> {
    if file.media_type.trim().to_ascii_lowercase().starts_with("image/") {
        Ok(())
    } else {
        Err(Rejection::NotAnImage { name: file.name.clone(), media_type: file.media_type.clone() })
    }
}

pub fn check_size(file: &SelectedFile, limit: u64) -> Result<(), Rejection> {
    if file.size() <= limit {
        Ok(())
    } else {
        Err(Rejection::TooLarge { name: file.name.clone(), size: file.size(), limit })
    }
}

/// The whole batch is refused when it does not fit; it is never truncated.
pub fn check_capacity(slot: usize, bounds: SlotSpec, current: usize, offered: usize) -> Result<(), Rejection> {
    if current + offered <= bounds.max {
        Ok(())
    } else {
        Err(Rejection::TooMany { slot, max: bounds.max, current, offered })
    }
}

pub fn check_minimum(slot: usize, bounds: SlotSpec, current: usize) -> Result<(), Rejection> {
    if current >= bounds.min {
        Ok(())
    } else {
        Err(Rejection::TooFew { slot, min: bounds.min, current })
    }
}

pub fn validate_batch(slot: usize, bounds: SlotSpec, current: usize, files: &[SelectedFile], limit: u64) -> Result<(), Rejection> {
    if files.is_empty() {
        return Err(Rejection::Empty);
    }
    for file in files {
        check_media_type(file)?;
        check_size(file, limit)?;
    }
    check_capacity(slot, bounds, current, files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, media_type: &str, len: usize) -> SelectedFile {
        SelectedFile::new(name, media_type, vec![0; len])
    }

    #[test]
    fn rejects_non_images_and_oversized() {
        let limit = 5 * MIB;
        let pdf = file("manual.pdf", "application/pdf", 10);
        assert!(matches!(validate_batch(0, SlotSpec::between(1, 6), 0, &[pdf], limit), Err(Rejection::NotAnImage { .. })));

        let huge = file("huge.png", "image/png", (limit + 1) as usize);
        let err = validate_batch(0, SlotSpec::between(1, 6), 0, &[huge], limit).unwrap_err();
        assert_eq!(err.to_string(), "huge.png is larger than 5 MB.");

        let exact = file("exact.png", "image/png", limit as usize);
        assert!(validate_batch(0, SlotSpec::between(1, 6), 0, &[exact], limit).is_ok());
    }

    #[test]
    fn one_bad_file_spoils_the_batch() {
        let batch = [file("a.jpg", "image/jpeg", 1), file("b.txt", "text/plain", 1)];
        assert!(validate_batch(0, SlotSpec::between(1, 6), 0, &batch, MIB).is_err());
    }

    #[test]
    fn capacity_counts_existing_files() {
        assert!(check_capacity(0, SlotSpec::between(1, 6), 4, 2).is_ok());
        assert_eq!(
            check_capacity(2, SlotSpec::between(1, 6), 5, 2),
            Err(Rejection::TooMany { slot: 2, max: 6, current: 5, offered: 2 })
        );
        assert_eq!(validate_batch(0, SlotSpec::SINGLE, 0, &[], MIB), Err(Rejection::Empty));
    }

    #[test]
    fn minimum_message_is_one_based() {
        let err = check_minimum(0, SlotSpec::SINGLE, 0).unwrap_err();
        assert_eq!(err.to_string(), "Please add at least 1 image(s) to section 1.");
    }
}
