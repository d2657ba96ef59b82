// src/palette.rs

use crate::types::Color;
use std::collections::HashMap;

// ============================================================================
// FIXED PALETTE
// ============================================================================

/// Rotating fallback palette for identities without a semantic class color.
pub const PALETTE: [Color; 8] = [
    Color::rgb(0xFF, 0x57, 0x22), // deep orange
    Color::rgb(0x21, 0x96, 0xF3), // blue
    Color::rgb(0x4C, 0xAF, 0x50), // green
    Color::rgb(0xFF, 0x98, 0x00), // amber
    Color::rgb(0x9C, 0x27, 0xB0), // purple
    Color::rgb(0x00, 0xBC, 0xD4), // cyan
    Color::rgb(0xFF, 0xEB, 0x3B), // yellow
    Color::rgb(0x79, 0x55, 0x48), // brown
];

/// Semantic color for a detection class, matched case-insensitively.
pub fn class_color(label: &str) -> Option<Color> {
    match label.to_lowercase().as_str() {
        "person" => Some(Color::rgb(0xFF, 0x57, 0x22)),
        "vehicle" | "car" => Some(Color::rgb(0x21, 0x96, 0xF3)),
        "truck" => Some(Color::rgb(0x3F, 0x51, 0xB5)),
        "bicycle" => Some(Color::rgb(0x4C, 0xAF, 0x50)),
        "motorcycle" => Some(Color::rgb(0xFF, 0x98, 0x00)),
        "face_cover" => Some(Color::rgb(0x9C, 0x27, 0xB0)),
        _ => None,
    }
}

// ============================================================================
// COLOR REGISTRY
// ============================================================================

/// Stable per-identity color assignments.
///
/// An identity keeps the color it was first given for as long as the registry
/// lives, regardless of how many renders happen in between. First-seen
/// identities take their semantic class color when one exists, otherwise the
/// next palette slot. The palette wraps after eight identities, so distinct
/// identities can share a color; same for identities whose classes share a
/// semantic color.
#[derive(Debug, Default)]
pub struct ColorRegistry {
    assigned: HashMap<String, Color>,
    next_slot: usize,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the color for one detection.
    ///
    /// `index` is the record's position within the current render pass; it
    /// picks a palette color for anonymous records, which are never
    /// remembered. `preferred` is the semantic class color, consulted only
    /// when the identity is first seen.
    pub fn color_for(
        &mut self,
        identity: Option<&str>,
        index: usize,
        preferred: Option<Color>,
    ) -> Color {
        let Some(id) = identity else {
            return PALETTE[index % PALETTE.len()];
        };
        if let Some(color) = self.assigned.get(id) {
            return *color;
        }
        let color = match preferred {
            Some(c) => c,
            None => {
                let c = PALETTE[self.next_slot % PALETTE.len()];
                self.next_slot += 1;
                c
            }
        };
        self.assigned.insert(id.to_string(), color);
        color
    }

    /// The remembered assignment, if the identity has been seen.
    pub fn get(&self, identity: &str) -> Option<Color> {
        self.assigned.get(identity).copied()
    }

    /// Forget all assignments and restart the palette rotation.
    pub fn clear(&mut self) {
        self.assigned.clear();
        self.next_slot = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================
