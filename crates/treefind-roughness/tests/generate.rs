//! Doubt maps written from and to GeoTIFF files.

use treefind_raster::{GeoReference, Grid, RasterTile};
use treefind_roughness::{DoubtValues, RoughnessEngine, RoughnessParams};

fn rough_tile() -> RasterTile {
    let samples = Grid::from_fn(24, 24, |row, col| {
        let rough = (6..18).contains(&row) && (6..18).contains(&col);
        if rough && (row + col) % 2 == 0 {
            215.0
        } else {
            210.0
        }
    });
    RasterTile::new(
        samples,
        GeoReference::projected(566_000.0, 245_000.0, 0.5, 2180),
        Some(-9999.0),
    )
}

#[test]
fn test_mask_output_keeps_source_georeference() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("tile.tif");
    let dst = dir.path().join("tile.doubt.tif");
    rough_tile().write(&src).unwrap();

    let values = RoughnessEngine::default().generate(&src, &dst, false).unwrap();
    let mask = match values {
        DoubtValues::Mask(mask) => mask,
        DoubtValues::Score(_) => panic!("default engine should emit a mask"),
    };

    let written = RasterTile::from_file(&dst).unwrap();
    assert_eq!(written.georeference(), rough_tile().georeference());
    assert_eq!(written.dimensions(), (24, 24));
    assert_eq!(written.nodata(), None);

    let expected: Vec<f32> = mask.data().iter().map(|&v| v as f32).collect();
    assert_eq!(written.samples().data(), expected.as_slice());
    assert_eq!(written.samples().get(12, 12), 1.0);
    assert_eq!(written.samples().get(0, 0), 0.0);
}

#[test]
fn test_continuous_output_and_previews() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("tile.tif");
    let dst = dir.path().join("tile.doubt.tif");
    rough_tile().write(&src).unwrap();

    let engine = RoughnessEngine::new(RoughnessParams {
        binarize: false,
        ..RoughnessParams::default()
    });
    engine.generate(&src, &dst, true).unwrap();

    let written = RasterTile::from_file(&dst).unwrap();
    assert!(written
        .samples()
        .data()
        .iter()
        .all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(written.samples().get(12, 12), 1.0);
    assert_eq!(written.nodata(), Some(-9999.0));

    for suffix in [".png", ".binarized.png", ".binarized_morph.png"] {
        let preview = dir.path().join(format!("tile.doubt.tif{suffix}"));
        assert!(preview.exists(), "missing preview {}", preview.display());
    }
}
