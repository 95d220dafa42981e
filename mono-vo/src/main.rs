use arrsac::Arrsac;
use klt::Klt;
use log::*;
use mono_vo::{
    GroundTruth, ImageSequence, MotionUpdate, Odometry, PoseSolver, Settings, TrajectoryPlot,
};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use vo_core::nalgebra::Point2;
use vo_core::CameraIntrinsics;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "mono-vo",
    about = "Monocular visual odometry over a KITTI-style image sequence"
)]
struct Opt {
    /// The file where the accumulated trajectory is written as `x y z` lines.
    #[structopt(short, long, default_value = "trajectory.txt")]
    output: PathBuf,
    /// Render the top-down trajectory to this image when the run finishes.
    #[structopt(long)]
    plot: Option<PathBuf>,
    /// The ground-truth pose file used to resolve metric scale.
    ///
    /// Without it every motion gate rejects and the trajectory stays at the
    /// bootstrap pose.
    #[structopt(short, long)]
    poses: Option<PathBuf>,
    /// The maximum number of frames to process.
    #[structopt(long, default_value = "1000")]
    max_frames: usize,
    /// Re-detection floor for the tracked feature count.
    #[structopt(long, default_value = "2000")]
    min_features: usize,
    /// Scale floor of the motion validity gate.
    #[structopt(long, default_value = "0.1")]
    min_scale: f64,
    /// The FAST detector threshold.
    #[structopt(long, default_value = "20")]
    fast_threshold: u8,
    /// The focal length.
    ///
    /// Default values are for KITTI odometry sequence 00.
    #[structopt(long, default_value = "718.8560")]
    focal: f64,
    /// The x optical center coordinate.
    #[structopt(long, default_value = "607.1928")]
    x_center: f64,
    /// The y optical center coordinate.
    #[structopt(long, default_value = "185.2157")]
    y_center: f64,
    /// The inlier threshold for the consensus process.
    #[structopt(long, default_value = "0.0001")]
    consensus_threshold: f64,
    /// Directory containing the sequentially numbered image files.
    #[structopt(parse(from_os_str))]
    images: PathBuf,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let intrinsics = CameraIntrinsics::identity()
        .focal(opt.focal)
        .principal_point(Point2::new(opt.x_center, opt.y_center));

    let ground_truth = match &opt.poses {
        Some(path) => match GroundTruth::from_path(path) {
            Ok(truth) => truth,
            Err(error) => {
                warn!(
                    "unable to read ground truth {} ({}); scale degraded to zero",
                    path.display(),
                    error
                );
                GroundTruth::empty()
            }
        },
        None => {
            info!("no ground-truth file given; every motion update will be rejected");
            GroundTruth::empty()
        }
    };

    let settings = Settings {
        max_frames: opt.max_frames,
        min_features: opt.min_features,
        min_scale: opt.min_scale,
    };
    let klt = Klt::new(opt.fast_threshold);
    let solver = PoseSolver::new(Arrsac::new(
        opt.consensus_threshold,
        Pcg64::from_seed([5; 32]),
    ));

    let sequence = ImageSequence::new(&opt.images);
    let (first, second) = sequence
        .bootstrap_pair()
        .expect("failed to read the two bootstrap frames");
    let mut odometry = Odometry::bootstrap(
        klt,
        klt,
        solver,
        intrinsics,
        ground_truth,
        settings,
        first,
        second,
    )
    .expect("failed to bootstrap from the first two frames");

    let mut output =
        BufWriter::new(File::create(&opt.output).expect("failed to create the output file"));
    let mut plot = opt.plot.as_ref().map(|_| TrajectoryPlot::new());

    for index in 2..settings.max_frames {
        let frame = match sequence.frame(index) {
            Some(frame) => frame,
            None => {
                info!("frame source exhausted at frame {}", index);
                break;
            }
        };
        let report = odometry.advance(frame);
        match report.update {
            MotionUpdate::Applied { scale } => {
                debug!("frame {}: integrated motion with scale {}", report.frame, scale)
            }
            MotionUpdate::Rejected { scale } => debug!(
                "frame {}: motion rejected by the gate (scale {})",
                report.frame, scale
            ),
            MotionUpdate::Degenerate => {}
        }
        let position = report.pose.position();
        writeln!(output, "{} {} {}", position.x, position.y, position.z)
            .expect("failed to write the trajectory");
        if let Some(plot) = &mut plot {
            plot.mark(&report.pose);
        }
    }

    let position = odometry.pose().position();
    info!(
        "finished after {} frames at position {} {} {}",
        odometry.frame(),
        position.x,
        position.y,
        position.z
    );

    if let (Some(plot), Some(path)) = (plot, &opt.plot) {
        plot.save(path).expect("failed to save the trajectory plot");
        info!("trajectory plot saved to {}", path.display());
    }
}
