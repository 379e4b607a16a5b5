use image::ImageReader;
use stainseg::core::PixelCalibration;
use stainseg::ops::StainProfile;
use stainseg::{
    BrightfieldInfo, CancelToken, MemoryHierarchy, RgbImageSource, ThresholdConfig,
    ThresholdPipeline,
};

#[cfg(feature = "tracing")]
use stainseg::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use stainseg::core::init_from_env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    init_from_env(log::LevelFilter::Info)?;

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: threshold_image <image_path> [config.json] [pixel_size_um]");
        return Ok(());
    };
    let config = match args.next() {
        Some(cfg) => ThresholdConfig::load_json(cfg)?,
        None => ThresholdConfig {
            roi: None,
            ..ThresholdConfig::default()
        },
    };
    let pixel_size: f64 = match args.next() {
        Some(v) => v.parse()?,
        None => 1.0,
    };

    let img = ImageReader::open(path)?.decode()?.to_rgb8();
    let source = RgbImageSource::new(img, PixelCalibration::square(pixel_size));
    let stains = BrightfieldInfo {
        rgb: true,
        brightfield: true,
        stains: Some(StainProfile::h_dab()),
    };

    let pipeline = ThresholdPipeline::new(config, source, stains)?;
    let mut hierarchy = MemoryHierarchy::new();
    let report = pipeline.run(&mut hierarchy, &CancelToken::new())?;

    println!("{report}");
    for id in report.inserted() {
        if let Some(annotation) = hierarchy.get(id) {
            println!(
                "{id:?}: {:.1} px² at full resolution",
                annotation.geometry().area()
            );
        }
    }
    Ok(())
}
