/// Side length of the universe cube. Coordinates land in [-SPAN/2, SPAN/2).
pub const SPAN: u32 = 10_000;

/// Per-axis multipliers for the focal-word hash (x, y, z).
/// Distinct primes so a permuted word does not land on a mirrored axis.
pub const AXIS_PRIMES: [i64; 3] = [3, 5, 7];

/// Focal word used when a text normalizes to nothing.
pub const SENTINEL_WORD: &str = "whisper";

/// Label shown when no word qualifies as a lighthouse.
pub const FALLBACK_LABEL: &str = "Whisper";

/// Minimum length for a word to be considered as a label.
pub const MIN_LABEL_LEN: usize = 4;

/// Camera standoff added on the z axis so the viewpoint stays outside the bubble.
pub const STANDOFF_Z: f64 = 20.0;

/// Similarity must exceed this before it produces any attraction.
pub const ATTRACTION_THRESHOLD: f64 = 0.2;

/// Outward push applied per entropy step, scaled by 1 / (views + 1).
pub const ENTROPY_PUSH: f64 = 0.01;

/// Distance from the origin past which unobserved bubbles may dissipate.
pub const VOID_RADIUS: f64 = 50_000.0;

/// Bubbles with fewer views than this are dissipation candidates.
pub const VIEW_FLOOR: u64 = 5;

/// Fraction of the remaining distance a warping camera covers per step.
pub const GLIDE_FACTOR: f64 = 0.05;

/// A warp ends once the camera is closer than this to its target.
pub const ARRIVAL_DISTANCE: f64 = 1.0;

/// Shared key space every client publishes bubbles under.
pub const NAMESPACE: &str = "universal-bubble-verse-v1";

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
