//! Tests for masked nearest-pixel geolocation.

use geolocation::{FlagMask, GeolocationError, Locator, PixelIndex, PixelMatch, PIPELINE_PATIENCE};
use test_utils::{swath_dataset, with_flags};

// ============================================================================
// Unmasked search
// ============================================================================

#[test]
fn test_finds_nearest_pixel() {
    let ds = swath_dataset(10, 10, 10.0, 30.0, 0.1);
    let locator = Locator::default();

    let found = locator.locate(&ds, 10.52, 30.71).unwrap();
    assert_eq!(found, PixelMatch::Found(PixelIndex { row: 5, col: 7 }));
}

#[test]
fn test_out_of_window_on_one_axis() {
    let ds = swath_dataset(10, 10, 10.0, 30.0, 0.1);
    let locator = Locator::new(FlagMask::Land, PIPELINE_PATIENCE);

    // Latitude is inside the swath but longitude is 1 degree past its edge
    let result = locator.locate(&ds, 10.5, 31.9).unwrap();
    assert_eq!(result, PixelMatch::OutOfWindow);
    assert_eq!(result.as_signed(), (-1, -1));
}

// ============================================================================
// Masking
// ============================================================================

#[test]
fn test_single_valid_pixel_is_found_from_anywhere_in_window() {
    let ds = with_flags(swath_dataset(5, 5, 10.0, 30.0, 0.1), 2.0, &[(2, 3)]);
    let locator = Locator::new(FlagMask::Land, PIPELINE_PATIENCE);

    for (lat, lon) in [(10.2, 30.3), (10.05, 30.15), (10.35, 30.45)] {
        assert_eq!(
            locator.locate(&ds, lat, lon).unwrap(),
            PixelMatch::Found(PixelIndex { row: 2, col: 3 }),
            "query ({}, {})",
            lat,
            lon
        );
    }
}

#[test]
fn test_single_valid_pixel_outside_window() {
    let ds = with_flags(swath_dataset(5, 5, 10.0, 30.0, 0.1), 2.0, &[(2, 3)]);
    let locator = Locator::new(FlagMask::Land, PIPELINE_PATIENCE);

    // Pixel (0, 0) is nearest but masked; (2, 3) is 0.3 deg away in longitude
    assert_eq!(locator.locate(&ds, 10.2, 30.0).unwrap(), PixelMatch::OutOfWindow);
}

#[test]
fn test_mask_only_applies_to_selected_bits() {
    // Flag 1 does not intersect the land bit
    let ds = with_flags(swath_dataset(3, 3, 0.0, 0.0, 1.0), 1.0, &[]);
    let locator = Locator::default();
    assert_eq!(
        locator.locate(&ds, 1.0, 1.0).unwrap(),
        PixelMatch::Found(PixelIndex { row: 1, col: 1 })
    );
}

#[test]
fn test_all_masked_is_an_error() {
    let ds = with_flags(swath_dataset(3, 3, 0.0, 0.0, 1.0), 2.0, &[]);
    let err = Locator::default().locate(&ds, 1.0, 1.0).unwrap_err();
    assert!(matches!(err, GeolocationError::AllMasked(_)));
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn test_missing_coordinates() {
    let ds = test_utils::grid_dataset("sst", &[0.0], &[0.0], |_, _| 1.0);
    // 1-D lat/lon axes are not a swath
    let err = Locator::default().locate(&ds, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, GeolocationError::ShapeMismatch(_)));
}
