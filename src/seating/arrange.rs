use crate::seating::layouts::LayoutTemplate;
use crate::seating::seat_id::SeatId;
use crate::seating::student::{BehaviorTag, Student};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrangement {
    /// Seat placements in row-major order.
    pub placements: Vec<(SeatId, String)>,
    /// Students left over once the seats ran out, in interleave order.
    pub unassigned: Vec<String>,
}

/// Orders the roster top tier, average, needs focus, round robin, so that
/// strong and struggling students end up spread across the room.
pub fn interleave(roster: &[Student]) -> Vec<&Student> {
    let mut top = Vec::new();
    let mut average = Vec::new();
    let mut focus = Vec::new();
    for s in roster {
        match s.behavior_tag {
            BehaviorTag::TopPerformer | BehaviorTag::Excellent => top.push(s),
            BehaviorTag::NeedsFocus => focus.push(s),
            BehaviorTag::Average => average.push(s),
        }
    }

    let rounds = top.len().max(average.len()).max(focus.len());
    let mut out = Vec::with_capacity(roster.len());
    for i in 0..rounds {
        for bucket in [&top, &average, &focus] {
            if let Some(s) = bucket.get(i) {
                out.push(*s);
            }
        }
    }
    out
}

pub fn auto_arrange(roster: &[Student], layout: &LayoutTemplate) -> Arrangement {
    let ordered = interleave(roster);
    let seats = layout.seat_ids();
    let filled = seats.len().min(ordered.len());

    let placements = seats
        .into_iter()
        .zip(ordered.iter())
        .map(|(seat, s)| (seat, s.id.clone()))
        .collect();
    let unassigned = ordered[filled..].iter().map(|s| s.id.clone()).collect();
    Arrangement {
        placements,
        unassigned,
    }
}
