use log::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use vo_core::nalgebra::Point3;

/// The result of resolving the scale for a frame. Degraded conditions are
/// explicit so callers decide policy instead of silently reading a zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// The inter-frame ground-truth distance. Always non-negative.
    Resolved(f64),
    /// The source is missing, the frame index is out of range, or a record
    /// was malformed.
    Unavailable,
}

/// A ground-truth trajectory in the KITTI odometry format: one 12-element
/// row-major 3x4 pose matrix per line, one line per frame. Only the
/// translation elements (3, 7 and 11) are consumed.
///
/// Monocular pose estimation cannot observe the magnitude of the camera's
/// translation, so the trajectory accumulator asks this source for the
/// distance actually travelled between consecutive frames.
pub struct GroundTruth {
    positions: Vec<Option<Point3<f64>>>,
}

impl GroundTruth {
    /// A source without any records. Every lookup is `Unavailable`.
    pub fn empty() -> Self {
        Self {
            positions: Vec::new(),
        }
    }

    /// Builds a source directly from per-frame positions.
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        Self {
            positions: positions.into_iter().map(Some).collect(),
        }
    }

    /// Reads a KITTI pose file. Malformed lines are kept as absent records
    /// so the frame indexing stays aligned with the file.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let truth = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!("loaded {} ground-truth poses", truth.len());
        Ok(truth)
    }

    /// Reads KITTI pose records from any buffered reader.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut positions = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let position = parse_position(&line?);
            if position.is_none() {
                warn!("malformed ground-truth record on line {}", index);
            }
            positions.push(position);
        }
        Ok(Self { positions })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The Euclidean distance between the ground-truth positions at `frame`
    /// and `frame - 1`. Deterministic for a given source and index.
    /// `Unavailable` when either record does not exist; frame 0 has no
    /// predecessor and is always `Unavailable`.
    pub fn resolve(&self, frame: usize) -> Scale {
        if frame == 0 || frame >= self.positions.len() {
            return Scale::Unavailable;
        }
        match (self.positions[frame - 1], self.positions[frame]) {
            (Some(previous), Some(current)) => Scale::Resolved((current - previous).norm()),
            _ => Scale::Unavailable,
        }
    }
}

fn parse_position(line: &str) -> Option<Point3<f64>> {
    let fields: Vec<f64> = line
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() != 12 {
        return None;
    }
    Some(Point3::new(fields[3], fields[7], fields[11]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
1 0 0 0 0 1 0 0 0 0 1 0
1 0 0 3 0 1 0 4 0 0 1 0
1 0 0 3 0 1 0 4 0 0 1 12
";

    #[test]
    fn resolves_interframe_distances() {
        let truth = GroundTruth::from_reader(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(truth.len(), 3);
        // 3-4-5 triangle between frames 0 and 1.
        assert_eq!(truth.resolve(1), Scale::Resolved(5.0));
        assert_eq!(truth.resolve(2), Scale::Resolved(12.0));
    }

    #[test]
    fn out_of_range_is_unavailable() {
        let truth = GroundTruth::from_reader(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(truth.resolve(0), Scale::Unavailable);
        assert_eq!(truth.resolve(3), Scale::Unavailable);
        assert_eq!(truth.resolve(1000), Scale::Unavailable);
        assert_eq!(GroundTruth::empty().resolve(1), Scale::Unavailable);
    }

    #[test]
    fn malformed_records_are_unavailable() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\nnot a pose line\n1 0 0 2 0 1 0 0 0 0 1 0\n";
        let truth = GroundTruth::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(truth.len(), 3);
        assert_eq!(truth.resolve(1), Scale::Unavailable);
        assert_eq!(truth.resolve(2), Scale::Unavailable);
    }

    #[test]
    fn resolved_scale_is_never_negative() {
        let truth = GroundTruth::from_positions(vec![
            Point3::new(4.0, 2.0, -7.0),
            Point3::new(-1.0, 0.5, 3.0),
            Point3::new(-1.0, 0.5, 3.0),
        ]);
        for frame in 1..3 {
            match truth.resolve(frame) {
                Scale::Resolved(scale) => assert!(scale >= 0.0),
                Scale::Unavailable => panic!("expected a resolved scale"),
            }
        }
        // Identical consecutive positions resolve to exactly zero.
        assert_eq!(truth.resolve(2), Scale::Resolved(0.0));
    }
}
