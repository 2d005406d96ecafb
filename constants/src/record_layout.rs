/// Column layout of the processed per-point record array

/// Number of columns in a processed record
pub const RECORD_FIELDS: usize = 10;

pub const COL_X: usize = 0;
pub const COL_Y: usize = 1;
pub const COL_Z: usize = 2;
/// Raw intensity, stored where downstream tooling expects colour
pub const COL_INTENSITY: usize = 3;
pub const COL_NORMAL: usize = 4;
/// Raw instance id, standing in for a geometric segment id
pub const COL_SEGMENT_ID: usize = 7;
pub const COL_SEMANTIC_LABEL: usize = 8;
pub const COL_INSTANCE_LABEL: usize = 9;

/// Raw point files carry x, y, z and intensity
pub const RAW_POINT_FIELDS: usize = 4;

/// Raw coordinates are captured in millimetres
pub const MILLIMETRES_PER_METRE: f64 = 1000.0;

/// Normals are not estimated; every point gets this constant
pub const PLACEHOLDER_NORMAL: [f32; 3] = [1.0, 1.0, 1.0];

/// Raw instance id marking unlabelled points
pub const RAW_IGNORE_INSTANCE: i64 = 0;

/// Processed instance label marking points excluded from evaluation
pub const IGNORE_INSTANCE_LABEL: i64 = -1;

/// Multiplier packing the semantic class above the instance index in
/// ground-truth codes. Scenes with 1000 or more instances collide.
pub const GT_CLASS_STRIDE: i64 = 1000;

/// Colour statistics reported for intensity-only captures
pub const PLACEHOLDER_COLOUR_MEAN: [f64; 1] = [0.5];
pub const PLACEHOLDER_COLOUR_STD: [f64; 1] = [0.5];

/// File name suffixes of the three raw arrays of a scene
pub const POINT_FILE_SUFFIX: &str = "_point.npy";
pub const INSTANCE_FILE_SUFFIX: &str = "_ins_label.npy";
pub const SEMANTIC_FILE_SUFFIX: &str = "_sem_label.npy";
