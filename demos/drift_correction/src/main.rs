use argh::FromArgs;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use driftcorr::geometry::{pointcloud::PointCloud, RigidTransform};
use driftcorr::icp::{IcpAligner, IcpConfig, PointIndex};

#[derive(FromArgs)]
/// Simulate a drifted live point cloud and correct it against a reference cloud
struct Args {
    /// number of reference points
    #[argh(option, default = "20000")]
    num_points: usize,

    /// number of live points sampled from the reference
    #[argh(option, default = "2000")]
    num_query: usize,

    /// drift rotation about the Y axis in degrees
    #[argh(option, default = "5.0")]
    angle_deg: f64,

    /// drift translation along X
    #[argh(option, default = "0.02")]
    tx: f64,

    /// drift translation along Z
    #[argh(option, default = "-0.01")]
    tz: f64,

    /// amplitude of the uniform noise added to the live points
    #[argh(option, default = "0.0")]
    noise: f64,

    /// seed of the random generator
    #[argh(option, default = "0")]
    seed: u64,

    /// path to a JSON file with the alignment configuration
    #[argh(option)]
    config: Option<PathBuf>,

    /// build the reference index on a background thread
    #[argh(switch)]
    background: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_str::<IcpConfig>(&std::fs::read_to_string(path)?)?,
        None => IcpConfig::default(),
    };
    log::info!("Alignment config: {:?}", config);

    let mut rng = StdRng::seed_from_u64(args.seed);

    // the reference stands in for the vertices of a scanned environment
    let reference = PointCloud::new(
        (0..args.num_points)
            .map(|_| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
            .collect(),
    );
    println!(
        "Reference cloud: #{} points, bounds {:?} - {:?}",
        reference.len(),
        reference.min_bound(),
        reference.max_bound()
    );

    let drift = RigidTransform::from_axis_angle(
        &[0.0, 1.0, 0.0],
        args.angle_deg.to_radians(),
        [args.tx, 0.0, args.tz],
    )?;

    // the live cloud sees a drifted copy of the first points of the reference
    let num_query = args.num_query.min(reference.len());
    let mut query = PointCloud::new(reference.points()[..num_query].to_vec())
        .transformed(&drift)?
        .into_points();
    if args.noise > 0.0 {
        for c in query.iter_mut().flatten() {
            *c += rng.random_range(-args.noise..args.noise);
        }
    }
    let query = PointCloud::new(query);
    println!(
        "Live cloud: #{} points, centroid {:?}",
        query.len(),
        query.centroid()
    );

    let index = if args.background {
        let pending = PointIndex::build_in_background(reference.into_points())?;
        let mut polls = 0usize;
        while !pending.is_ready() {
            polls += 1;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        log::info!("Index ready after {} polls", polls);
        pending.wait()?
    } else {
        PointIndex::from_cloud(reference)?
    };

    let now = std::time::Instant::now();
    let mut aligner = IcpAligner::new(&index, config)?;
    let result = aligner.align(query.points(), &RigidTransform::identity())?;
    let elapsed = now.elapsed();

    let residual = result.transform.compose(&drift);
    let (axis, angle) = result.transform.axis_angle();
    let report = serde_json::json!({
        "transform": result.transform,
        "expected": drift.inverse(),
        "axis": axis,
        "angle_deg": angle.to_degrees(),
        "iterations": result.iterations,
        "rmse": result.rmse,
        "converged": result.converged,
        "rotation_error_deg": residual.rotation_angle().to_degrees(),
        "translation_error": residual.translation(),
        "elapsed_ms": elapsed.as_secs_f64() * 1e3,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
