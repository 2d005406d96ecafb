/// Default colour written for every class in the label database
pub const DEFAULT_CLASS_COLOUR: [u8; 3] = [255, 255, 255];

pub struct ClassInfo {
    pub id: u32,
    pub name: &'static str,
}

/// Semantic classes of the wheat head capture sessions
pub const CLASS_MAP: &[ClassInfo] = &[
    ClassInfo {
        id: 0,
        name: "stem",
    },
    ClassInfo {
        id: 1,
        name: "leaves",
    },
    ClassInfo {
        id: 2,
        name: "wheat-heads",
    },
];
