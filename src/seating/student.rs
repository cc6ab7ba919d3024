use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    TopPerformer,
    Excellent,
    NeedsFocus,
    Average,
}

impl BehaviorTag {
    pub fn from_xp(xp: u32) -> Self {
        if xp > 2500 {
            BehaviorTag::TopPerformer
        } else if xp > 2000 {
            BehaviorTag::Excellent
        } else if xp < 1500 {
            BehaviorTag::NeedsFocus
        } else {
            BehaviorTag::Average
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorTag::TopPerformer => "top_performer",
            BehaviorTag::Excellent => "excellent",
            BehaviorTag::NeedsFocus => "needs_focus",
            BehaviorTag::Average => "average",
        }
    }

    fn rank(self) -> u8 {
        match self {
            BehaviorTag::TopPerformer => 4,
            BehaviorTag::Excellent => 3,
            BehaviorTag::Average => 2,
            BehaviorTag::NeedsFocus => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub xp: u32,
    pub attendance_rate: Option<f64>,
    pub behavior_tag: BehaviorTag,
    pub grade_level: Option<String>,
}

impl Student {
    pub fn new(id: &str, first_name: &str, last_name: &str, xp: u32) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            xp,
            attendance_rate: None,
            behavior_tag: BehaviorTag::from_xp(xp),
            grade_level: None,
        }
    }

    pub fn with_attendance(mut self, rate: Option<f64>) -> Self {
        self.attendance_rate = rate;
        self
    }

    pub fn with_grade_level(mut self, grade_level: Option<String>) -> Self {
        self.grade_level = grade_level;
        self
    }

    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolSort {
    #[default]
    Name,
    Xp,
    Attendance,
    Behavior,
}

impl PoolSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "xp" => Some(Self::Xp),
            "attendance" => Some(Self::Attendance),
            "behavior" => Some(Self::Behavior),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Xp => "xp",
            Self::Attendance => "attendance",
            Self::Behavior => "behavior",
        }
    }

    fn compare(self, a: &Student, b: &Student) -> Ordering {
        match self {
            Self::Name => a.first_name.cmp(&b.first_name),
            Self::Xp => b.xp.cmp(&a.xp),
            Self::Attendance => {
                let ra = a.attendance_rate.unwrap_or(0.0);
                let rb = b.attendance_rate.unwrap_or(0.0);
                rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
            }
            Self::Behavior => b.behavior_tag.rank().cmp(&a.behavior_tag.rank()),
        }
    }
}

/// Search-and-sort over the unassigned pool. The search matches either name,
/// case-insensitively. The sort is stable, so ties keep pool order.
pub fn filter_and_sort<'a>(pool: &'a [Student], search: &str, sort: PoolSort) -> Vec<&'a Student> {
    let needle = search.trim().to_lowercase();
    let mut out: Vec<&Student> = pool
        .iter()
        .filter(|s| {
            needle.is_empty()
                || s.first_name.to_lowercase().contains(&needle)
                || s.last_name.to_lowercase().contains(&needle)
        })
        .collect();
    out.sort_by(|a, b| sort.compare(a, b));
    out
}
