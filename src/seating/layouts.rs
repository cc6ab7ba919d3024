use crate::error::{Result, SeatingError};
use crate::seating::seat_id::{SeatId, MAX_ROWS};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_LAYOUT_ID: &str = "usa-traditional";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Seat,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTemplate {
    pub id: String,
    pub name: String,
    pub country: String,
    pub description: String,
    pub rows: usize,
    pub cols: usize,
    pub seat_pattern: Vec<Cell>,
}

impl LayoutTemplate {
    /// Rebuilds a layout from a persisted chart snapshot.
    pub fn from_snapshot(
        id: &str,
        name: &str,
        rows: usize,
        cols: usize,
        seat_pattern: Vec<Cell>,
    ) -> Result<Self> {
        if rows > MAX_ROWS {
            return Err(SeatingError::TooManyRows(rows));
        }
        let cells = rows.checked_mul(cols).filter(|n| *n > 0);
        if cells != Some(seat_pattern.len()) {
            return Err(SeatingError::PatternMismatch {
                rows,
                cols,
                actual: seat_pattern.len(),
            });
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            country: String::new(),
            description: String::new(),
            rows,
            cols,
            seat_pattern,
        })
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.seat_pattern.get(row * self.cols + col).copied()
    }

    pub fn is_seat(&self, seat: &SeatId) -> bool {
        self.cell(seat.row(), seat.col()) == Some(Cell::Seat)
    }

    /// Seat cells in row-major order.
    pub fn seat_ids(&self) -> Vec<SeatId> {
        let mut out = Vec::with_capacity(self.total_seats());
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.cell(row, col) == Some(Cell::Seat) {
                    if let Ok(id) = SeatId::new(row, col) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    pub fn total_seats(&self) -> usize {
        self.seat_pattern.iter().filter(|c| **c == Cell::Seat).count()
    }

    /// Pattern as rows of 1 (seat) / 0 (empty), the shape the student view draws.
    pub fn pattern_grid(&self) -> Vec<Vec<u8>> {
        self.seat_pattern
            .chunks(self.cols)
            .map(|row| row.iter().map(|c| u8::from(*c == Cell::Seat)).collect())
            .collect()
    }
}

enum Pattern {
    Full,
    Rows(&'static [&'static str]),
}

struct TemplateDef {
    id: &'static str,
    name: &'static str,
    country: &'static str,
    rows: usize,
    cols: usize,
    description: &'static str,
    pattern: Pattern,
}

const GROUPED_4X6: &[&str] = &["SS.SS.", "SS.SS.", "......", "SS.SS."];
const RING_5X6: &[&str] = &["SSSSSS", "S....S", "S....S", "S....S", "SSSSSS"];

// `S` is a seat, `.` is an aisle or open floor.
const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        id: "usa-traditional",
        name: "USA Traditional Rows",
        country: "United States",
        rows: 5,
        cols: 6,
        description: "Classic American classroom with forward-facing rows",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "uk-grouped",
        name: "UK Grouped Tables",
        country: "United Kingdom",
        rows: 4,
        cols: 6,
        description: "British style with clusters of 4-6 students",
        pattern: Pattern::Rows(GROUPED_4X6),
    },
    TemplateDef {
        id: "finland-flexible",
        name: "Finland Flexible Learning",
        country: "Finland",
        rows: 4,
        cols: 5,
        description: "Open arrangement promoting collaboration",
        pattern: Pattern::Rows(&["SS.SS", "S...S", ".SSS.", "SS.SS"]),
    },
    TemplateDef {
        id: "japan-columns",
        name: "Japan Orderly Columns",
        country: "Japan",
        rows: 6,
        cols: 6,
        description: "Structured columns with precise spacing",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "singapore-ushape",
        name: "Singapore U-Shape",
        country: "Singapore",
        rows: 4,
        cols: 7,
        description: "U-shaped arrangement for discussion",
        pattern: Pattern::Rows(&["SSS.SSS", "S.....S", "S.....S", "SSS.SSS"]),
    },
    TemplateDef {
        id: "germany-pairs",
        name: "Germany Partner Desks",
        country: "Germany",
        rows: 5,
        cols: 4,
        description: "Traditional paired seating",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "netherlands-circle",
        name: "Netherlands Discussion Circle",
        country: "Netherlands",
        rows: 5,
        cols: 5,
        description: "Circular arrangement for equality",
        pattern: Pattern::Rows(&[".SSS.", "S...S", "S...S", "S...S", ".SSS."]),
    },
    TemplateDef {
        id: "sweden-collaborative",
        name: "Sweden Collaborative Pods",
        country: "Sweden",
        rows: 4,
        cols: 6,
        description: "Small group pods for teamwork",
        pattern: Pattern::Rows(GROUPED_4X6),
    },
    TemplateDef {
        id: "south-korea-focused",
        name: "South Korea Focused Rows",
        country: "South Korea",
        rows: 7,
        cols: 5,
        description: "Dense arrangement for large classes",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "australia-flexible",
        name: "Australia Flexible Zones",
        country: "Australia",
        rows: 4,
        cols: 6,
        description: "Mixed zones for different activities",
        pattern: Pattern::Rows(&["SS..SS", "SS..SS", "..SS..", "SSSSSS"]),
    },
    TemplateDef {
        id: "canada-inclusive",
        name: "Canada Inclusive Circle",
        country: "Canada",
        rows: 5,
        cols: 6,
        description: "Open circle promoting inclusion",
        pattern: Pattern::Rows(RING_5X6),
    },
    TemplateDef {
        id: "france-traditional",
        name: "France Classic Arrangement",
        country: "France",
        rows: 5,
        cols: 5,
        description: "Traditional French classroom setup",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "italy-grouped",
        name: "Italy Social Groups",
        country: "Italy",
        rows: 4,
        cols: 5,
        description: "Groups of 4-5 for discussion",
        pattern: Pattern::Rows(&["SS.SS", "SS.SS", ".....", "SS.SS"]),
    },
    TemplateDef {
        id: "spain-horseshoe",
        name: "Spain Horseshoe Setup",
        country: "Spain",
        rows: 4,
        cols: 6,
        description: "Horseshoe for teacher interaction",
        pattern: Pattern::Rows(&["SSSSSS", "S....S", "S....S", "SS..SS"]),
    },
    TemplateDef {
        id: "norway-outdoor",
        name: "Norway Nature-Inspired",
        country: "Norway",
        rows: 4,
        cols: 5,
        description: "Flexible outdoor-indoor hybrid",
        pattern: Pattern::Rows(&["S.S.S", ".SSS.", "SS.SS", ".SSS."]),
    },
    TemplateDef {
        id: "denmark-democratic",
        name: "Denmark Democratic Circle",
        country: "Denmark",
        rows: 5,
        cols: 5,
        description: "Equal participation circle",
        pattern: Pattern::Rows(&[".SSS.", "SS.SS", "S...S", "SS.SS", ".SSS."]),
    },
    TemplateDef {
        id: "new-zealand-mixed",
        name: "New Zealand Mixed Learning",
        country: "New Zealand",
        rows: 4,
        cols: 6,
        description: "Mixed individual and group areas",
        pattern: Pattern::Rows(&["SS.SSS", "SS.SSS", "......", "SSSSSS"]),
    },
    TemplateDef {
        id: "switzerland-precision",
        name: "Switzerland Precise Grid",
        country: "Switzerland",
        rows: 5,
        cols: 5,
        description: "Orderly Swiss precision",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "china-large-class",
        name: "China Large Classroom",
        country: "China",
        rows: 8,
        cols: 6,
        description: "High-capacity traditional rows",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "india-flexible",
        name: "India Flexible Groups",
        country: "India",
        rows: 5,
        cols: 6,
        description: "Adaptable group arrangements",
        pattern: Pattern::Rows(&["SS.SS.", "SS.SS.", "......", "SSSSSS", "SSSSSS"]),
    },
    TemplateDef {
        id: "brazil-community",
        name: "Brazil Community Circle",
        country: "Brazil",
        rows: 5,
        cols: 6,
        description: "Community-focused circular setup",
        pattern: Pattern::Rows(RING_5X6),
    },
    TemplateDef {
        id: "israel-discussion",
        name: "Israel Discussion Format",
        country: "Israel",
        rows: 4,
        cols: 5,
        description: "Setup for Socratic discussion",
        pattern: Pattern::Rows(&["SS.SS", "S...S", "S...S", "SSSSS"]),
    },
    TemplateDef {
        id: "tamilnadu-government",
        name: "Tamil Nadu Government School",
        country: "Tamil Nadu, India",
        rows: 6,
        cols: 5,
        description: "Standard TN government school with rows for 30-40 students",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "tamilnadu-cbse",
        name: "Tamil Nadu CBSE Pattern",
        country: "Tamil Nadu, India",
        rows: 5,
        cols: 6,
        description: "CBSE curriculum classroom with grouped seating",
        pattern: Pattern::Rows(&["SS.SS.", "SS.SS.", "SS.SS.", "......", "SSSSSS"]),
    },
    TemplateDef {
        id: "tamilnadu-matriculation",
        name: "Tamil Nadu Matriculation",
        country: "Tamil Nadu, India",
        rows: 7,
        cols: 5,
        description: "Matriculation school traditional bench seating",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "tamilnadu-smart-class",
        name: "Tamil Nadu Smart Classroom",
        country: "Tamil Nadu, India",
        rows: 4,
        cols: 6,
        description: "Modern smart classroom with U-shape for digital learning",
        pattern: Pattern::Rows(&["SSSSSS", "S....S", "S....S", "SSSSSS"]),
    },
    TemplateDef {
        id: "tamilnadu-activity",
        name: "Tamil Nadu Activity-Based",
        country: "Tamil Nadu, India",
        rows: 5,
        cols: 5,
        description: "Activity-based learning with flexible group zones",
        pattern: Pattern::Rows(&["SS.SS", "SS.SS", ".....", "SSSSS", "SSSSS"]),
    },
    TemplateDef {
        id: "lecture-hall-50",
        name: "Lecture Hall - 50 Seats",
        country: "Global",
        rows: 5,
        cols: 10,
        description: "Standard lecture hall with center aisle for 50 students",
        pattern: Pattern::Rows(&[
            "SSSS..SSSS",
            "SSSS..SSSS",
            "SSSS..SSSS",
            "SSSS..SSSS",
            "SSSSSSSSSS",
        ]),
    },
    TemplateDef {
        id: "auditorium-60",
        name: "Auditorium - 60 Seats",
        country: "Global",
        rows: 6,
        cols: 10,
        description: "Tiered auditorium seating with aisles",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "large-traditional-70",
        name: "Large Traditional - 70 Seats",
        country: "Global",
        rows: 7,
        cols: 10,
        description: "Large classroom with traditional row arrangement",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "university-lecture-80",
        name: "University Lecture Hall - 80 Seats",
        country: "Global",
        rows: 8,
        cols: 10,
        description: "University-style lecture hall with tiered seating",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "mega-classroom-90",
        name: "Mega Classroom - 90 Seats",
        country: "Global",
        rows: 9,
        cols: 10,
        description: "High-capacity classroom for large groups",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "assembly-hall-100",
        name: "Assembly Hall - 100 Seats",
        country: "Global",
        rows: 10,
        cols: 10,
        description: "Maximum capacity assembly hall or large lecture room",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "large-with-aisles-60",
        name: "Large Class with Aisles - 60",
        country: "Global",
        rows: 8,
        cols: 10,
        description: "Strategic aisle placement for 60 students",
        pattern: Pattern::Rows(&[
            "SSS.SS.SSS",
            "SSS.SS.SSS",
            "SSS.SS.SSS",
            "SSS.SS.SSS",
            "..........",
            "SSS.SS.SSS",
            "SSS.SS.SSS",
            "SSS.SS.SSS",
        ]),
    },
    TemplateDef {
        id: "india-government-large",
        name: "India Government Large - 80",
        country: "India",
        rows: 10,
        cols: 8,
        description: "Large Indian government school classroom",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "china-mega-class",
        name: "China Mega Class - 90",
        country: "China",
        rows: 10,
        cols: 9,
        description: "High-density Chinese classroom for large student groups",
        pattern: Pattern::Full,
    },
    TemplateDef {
        id: "brazil-community-large",
        name: "Brazil Community Large - 75",
        country: "Brazil",
        rows: 10,
        cols: 9,
        description: "Large community classroom with flexible sections",
        pattern: Pattern::Rows(&[
            "SSS.SSS.S",
            "SSS.SSS.S",
            "SSS.SSS.S",
            "SSS.SSS.S",
            "SSS.SSS.S",
            ".........",
            "SSSSSSSSS",
            "SSSSSSSSS",
            "SSSSSSSSS",
            "SSSSSSSSS",
        ]),
    },
    TemplateDef {
        id: "philippines-large-class",
        name: "Philippines Large Class - 85",
        country: "Philippines",
        rows: 10,
        cols: 10,
        description: "High-capacity Philippine classroom",
        pattern: Pattern::Rows(&[
            "SSSS..SSSS",
            "SSSS..SSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "SSSSSSSSSS",
            "..........",
        ]),
    },
];

fn build(def: &TemplateDef) -> LayoutTemplate {
    let seat_pattern = match def.pattern {
        Pattern::Full => vec![Cell::Seat; def.rows * def.cols],
        Pattern::Rows(rows) => rows
            .iter()
            .flat_map(|r| r.chars())
            .map(|c| if c == 'S' { Cell::Seat } else { Cell::Empty })
            .collect(),
    };
    LayoutTemplate {
        id: def.id.to_string(),
        name: def.name.to_string(),
        country: def.country.to_string(),
        description: def.description.to_string(),
        rows: def.rows,
        cols: def.cols,
        seat_pattern,
    }
}

pub fn catalog() -> &'static [LayoutTemplate] {
    static CATALOG: OnceLock<Vec<LayoutTemplate>> = OnceLock::new();
    CATALOG.get_or_init(|| TEMPLATES.iter().map(build).collect())
}

pub fn find(id: &str) -> Option<&'static LayoutTemplate> {
    catalog().iter().find(|t| t.id == id)
}

pub fn get(id: &str) -> Result<&'static LayoutTemplate> {
    find(id).ok_or_else(|| SeatingError::UnknownLayout(id.to_string()))
}

pub fn default_layout() -> &'static LayoutTemplate {
    // The catalog is static and always carries its default entry.
    find(DEFAULT_LAYOUT_ID).unwrap_or(&catalog()[0])
}
