use crate::error::{Result, SeatingError};
use crate::seating::layouts::LayoutTemplate;
use crate::seating::seat_id::SeatId;
use crate::seating::store::AssignmentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    Pool,
    Seat(SeatId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDrag {
    pub student_id: String,
    pub source: DragSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Placed {
        seat: SeatId,
        bumped: Option<String>,
    },
    /// Target is an aisle or outside the grid; the gesture stays pending.
    NotASeat,
    NothingPicked,
}

/// Pick-up / drop gesture state, independent of any UI event system.
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pending: Option<PendingDrag>,
}

impl DragState {
    pub fn pending(&self) -> Option<&PendingDrag> {
        self.pending.as_ref()
    }

    /// Starts a gesture. The source must match where the store has the student.
    pub fn pick_up(
        &mut self,
        store: &AssignmentStore,
        student_id: &str,
        source: DragSource,
    ) -> Result<()> {
        if store.student(student_id).is_none() {
            return Err(SeatingError::UnknownStudent(student_id.to_string()));
        }
        let matches = match source {
            DragSource::Pool => store.is_unassigned(student_id),
            DragSource::Seat(seat) => {
                store.occupant(&seat).map(|s| s.id.as_str()) == Some(student_id)
            }
        };
        if !matches {
            return Err(SeatingError::DragOriginMismatch {
                student: student_id.to_string(),
                origin: match source {
                    DragSource::Pool => "the unassigned pool".to_string(),
                    DragSource::Seat(seat) => seat.to_string(),
                },
            });
        }
        self.pending = Some(PendingDrag {
            student_id: student_id.to_string(),
            source,
        });
        Ok(())
    }

    /// Finishes a gesture on `target`. The origin seat is vacated by the same
    /// store call that fills the target.
    pub fn drop_on(
        &mut self,
        store: &mut AssignmentStore,
        layout: &LayoutTemplate,
        target: SeatId,
    ) -> Result<DropOutcome> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(DropOutcome::NothingPicked);
        };
        if !layout.is_seat(&target) {
            return Ok(DropOutcome::NotASeat);
        }
        let bumped = store.assign(target, &pending.student_id)?;
        self.pending = None;
        Ok(DropOutcome::Placed {
            seat: target,
            bumped,
        })
    }

    pub fn cancel(&mut self) -> Option<PendingDrag> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seating::layouts;
    use crate::seating::student::Student;

    fn seat(s: &str) -> SeatId {
        s.parse().unwrap()
    }

    fn store() -> AssignmentStore {
        AssignmentStore::new(vec![
            Student::new("x", "X", "X", 1000),
            Student::new("y", "Y", "Y", 2000),
        ])
    }

    #[test]
    fn pool_to_seat() {
        let mut s = store();
        let layout = layouts::default_layout();
        let mut drag = DragState::default();
        drag.pick_up(&s, "x", DragSource::Pool).unwrap();
        let out = drag.drop_on(&mut s, layout, seat("B2")).unwrap();
        assert_eq!(out, DropOutcome::Placed { seat: seat("B2"), bumped: None });
        assert!(drag.pending().is_none());
        assert!(s.is_partitioned());
    }

    #[test]
    fn seat_to_occupied_seat_bumps_and_vacates_origin() {
        let mut s = store();
        let layout = layouts::default_layout();
        s.assign(seat("A1"), "x").unwrap();
        s.assign(seat("A2"), "y").unwrap();

        let mut drag = DragState::default();
        drag.pick_up(&s, "x", DragSource::Seat(seat("A1"))).unwrap();
        let out = drag.drop_on(&mut s, layout, seat("A2")).unwrap();
        assert_eq!(
            out,
            DropOutcome::Placed { seat: seat("A2"), bumped: Some("y".to_string()) }
        );
        assert!(s.occupant(&seat("A1")).is_none());
        assert!(s.is_unassigned("y"));
        assert!(s.is_partitioned());
    }

    #[test]
    fn drop_on_aisle_is_noop() {
        let mut s = store();
        let layout = layouts::get("netherlands-circle").unwrap();
        let mut drag = DragState::default();
        drag.pick_up(&s, "x", DragSource::Pool).unwrap();
        assert_eq!(drag.drop_on(&mut s, layout, seat("A1")).unwrap(), DropOutcome::NotASeat);
        assert_eq!(drag.drop_on(&mut s, layout, seat("Z9")).unwrap(), DropOutcome::NotASeat);
        assert_eq!(s.assigned_count(), 0);
        assert!(drag.pending().is_some());
    }

    #[test]
    fn drop_without_pickup_is_noop() {
        let mut s = store();
        let mut drag = DragState::default();
        let out = drag
            .drop_on(&mut s, layouts::default_layout(), seat("A1"))
            .unwrap();
        assert_eq!(out, DropOutcome::NothingPicked);
        assert_eq!(s.assigned_count(), 0);
    }

    #[test]
    fn pickup_checks_origin() {
        let mut s = store();
        s.assign(seat("A1"), "x").unwrap();
        let mut drag = DragState::default();
        assert!(matches!(
            drag.pick_up(&s, "x", DragSource::Pool),
            Err(SeatingError::DragOriginMismatch { .. })
        ));
        assert!(matches!(
            drag.pick_up(&s, "y", DragSource::Seat(seat("A1"))),
            Err(SeatingError::DragOriginMismatch { .. })
        ));
        assert!(matches!(
            drag.pick_up(&s, "ghost", DragSource::Pool),
            Err(SeatingError::UnknownStudent(_))
        ));
        assert!(drag.pending().is_none());
    }

    #[test]
    fn cancel_clears_pending() {
        let s = store();
        let mut drag = DragState::default();
        drag.pick_up(&s, "y", DragSource::Pool).unwrap();
        assert_eq!(drag.cancel().unwrap().student_id, "y");
        assert!(drag.cancel().is_none());
    }
}
