use crate::error::{Result, SeatingError};
use crate::seating::arrange::Arrangement;
use crate::seating::gateway::SeatAssignment;
use crate::seating::layouts::LayoutTemplate;
use crate::seating::seat_id::SeatId;
use crate::seating::student::Student;
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// Seat map plus the unassigned pool for one class roster.
///
/// Every roster student is in exactly one of the two: a seat, or the pool.
/// Each mutation below keeps that partition intact.
#[derive(Debug, Clone)]
pub struct AssignmentStore {
    roster: Vec<Student>,
    index: HashMap<String, usize>,
    seats: BTreeMap<SeatId, String>,
    pool: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

impl AssignmentStore {
    pub fn new(roster: Vec<Student>) -> Self {
        let index = roster
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let pool = roster.iter().map(|s| s.id.clone()).collect();
        Self {
            roster,
            index,
            seats: BTreeMap::new(),
            pool,
        }
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.index.get(id).map(|i| &self.roster[*i])
    }

    pub fn occupant(&self, seat: &SeatId) -> Option<&Student> {
        self.seats.get(seat).and_then(|id| self.student(id))
    }

    pub fn seat_of(&self, student_id: &str) -> Option<SeatId> {
        self.seats
            .iter()
            .find(|(_, id)| id.as_str() == student_id)
            .map(|(seat, _)| *seat)
    }

    pub fn is_unassigned(&self, student_id: &str) -> bool {
        self.pool.iter().any(|id| id == student_id)
    }

    /// Seated students in row-major seat order.
    pub fn assigned(&self) -> Vec<(SeatId, &Student)> {
        self.seats
            .iter()
            .filter_map(|(seat, id)| self.student(id).map(|s| (*seat, s)))
            .collect()
    }

    pub fn unassigned(&self) -> Vec<Student> {
        self.pool
            .iter()
            .filter_map(|id| self.student(id).cloned())
            .collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.seats.len()
    }

    /// Places `student_id` on `seat`, taking them from wherever they were.
    /// A previous occupant goes back to the pool; their id is returned.
    pub fn assign(&mut self, seat: SeatId, student_id: &str) -> Result<Option<String>> {
        if !self.index.contains_key(student_id) {
            return Err(SeatingError::UnknownStudent(student_id.to_string()));
        }
        if self.seats.get(&seat).map(String::as_str) == Some(student_id) {
            return Ok(None);
        }

        if let Some(from) = self.seat_of(student_id) {
            self.seats.remove(&from);
        } else {
            self.pool.retain(|id| id != student_id);
        }

        let bumped = self.seats.insert(seat, student_id.to_string());
        if let Some(prev) = &bumped {
            self.pool.push(prev.clone());
        }
        Ok(bumped)
    }

    /// Empties `seat`, returning its occupant to the pool.
    pub fn unassign(&mut self, seat: &SeatId) -> Option<String> {
        let prev = self.seats.remove(seat)?;
        self.pool.push(prev.clone());
        Some(prev)
    }

    pub fn reset(&mut self) {
        self.seats.clear();
        self.pool = self.roster.iter().map(|s| s.id.clone()).collect();
    }

    /// Rebuilds the seat map from persisted `(seat_id, student_id)` rows.
    ///
    /// Rows naming a student that is no longer on the roster, a malformed seat
    /// id, or a seat/student already placed by an earlier row are skipped.
    pub fn load_persisted<'a, I>(&mut self, rows: I) -> LoadReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.seats.clear();
        let mut report = LoadReport::default();
        for (raw_seat, student_id) in rows {
            let Ok(seat) = raw_seat.parse::<SeatId>() else {
                warn!("skipping persisted assignment with bad seat id {raw_seat:?}");
                report.skipped += 1;
                continue;
            };
            if !self.index.contains_key(student_id) {
                warn!("student not found for persisted assignment: {student_id}");
                report.skipped += 1;
                continue;
            }
            if self.seats.contains_key(&seat) || self.seats.values().any(|id| id == student_id) {
                warn!("skipping duplicate persisted assignment {raw_seat} -> {student_id}");
                report.skipped += 1;
                continue;
            }
            self.seats.insert(seat, student_id.to_string());
            report.loaded += 1;
        }
        self.pool = self
            .roster
            .iter()
            .filter(|s| !self.seats.values().any(|id| *id == s.id))
            .map(|s| s.id.clone())
            .collect();
        report
    }

    /// Replaces the whole state with a computed arrangement.
    pub fn apply(&mut self, arrangement: &Arrangement) {
        self.seats = arrangement
            .placements
            .iter()
            .map(|(seat, id)| (*seat, id.clone()))
            .collect();
        self.pool = arrangement.unassigned.clone();
    }

    /// Occupied seats that are not seat cells of `layout`.
    pub fn off_layout(&self, layout: &LayoutTemplate) -> Vec<SeatId> {
        self.seats
            .keys()
            .filter(|seat| !layout.is_seat(seat))
            .copied()
            .collect()
    }

    /// The full assignment set, in the row shape the gateway persists.
    pub fn to_assignments(&self) -> Vec<SeatAssignment> {
        self.seats
            .iter()
            .map(|(seat, student_id)| SeatAssignment::new(*seat, student_id))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn is_partitioned(&self) -> bool {
        use std::collections::HashSet;
        let seated: HashSet<&str> = self.seats.values().map(String::as_str).collect();
        let pooled: HashSet<&str> = self.pool.iter().map(String::as_str).collect();
        seated.len() == self.seats.len()
            && pooled.len() == self.pool.len()
            && seated.is_disjoint(&pooled)
            && seated.len() + pooled.len() == self.roster.len()
            && self.roster.iter().all(|s| seated.contains(s.id.as_str()) || pooled.contains(s.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(s: &str) -> SeatId {
        s.parse().unwrap()
    }

    fn roster() -> Vec<Student> {
        ["x", "y", "z", "w"]
            .iter()
            .map(|id| Student::new(id, id, id, 1800))
            .collect()
    }

    #[test]
    fn new_store_has_everyone_in_pool() {
        let store = AssignmentStore::new(roster());
        assert_eq!(store.unassigned().len(), 4);
        assert_eq!(store.assigned_count(), 0);
        assert!(store.is_partitioned());
    }

    #[test]
    fn assigning_into_occupied_seat_bumps_occupant_once() {
        let mut store = AssignmentStore::new(roster());
        assert_eq!(store.assign(seat("A1"), "x").unwrap(), None);
        assert_eq!(store.assign(seat("A1"), "y").unwrap(), Some("x".to_string()));

        assert_eq!(store.occupant(&seat("A1")).unwrap().id, "y");
        let pooled: Vec<String> = store.unassigned().into_iter().map(|s| s.id).collect();
        assert_eq!(pooled.iter().filter(|id| *id == "x").count(), 1);
        assert!(!store.is_unassigned("y"));
        assert!(store.is_partitioned());
    }

    #[test]
    fn moving_a_seated_student_clears_the_origin() {
        let mut store = AssignmentStore::new(roster());
        store.assign(seat("A1"), "x").unwrap();
        store.assign(seat("B2"), "x").unwrap();
        assert!(store.occupant(&seat("A1")).is_none());
        assert_eq!(store.seat_of("x"), Some(seat("B2")));
        assert_eq!(store.assigned_count(), 1);
        assert!(store.is_partitioned());
    }

    #[test]
    fn reassigning_to_same_seat_is_noop() {
        let mut store = AssignmentStore::new(roster());
        store.assign(seat("A1"), "x").unwrap();
        assert_eq!(store.assign(seat("A1"), "x").unwrap(), None);
        assert_eq!(store.assigned_count(), 1);
        assert!(store.is_partitioned());
    }

    #[test]
    fn unknown_student_is_rejected() {
        let mut store = AssignmentStore::new(roster());
        let err = store.assign(seat("A1"), "ghost").unwrap_err();
        assert!(matches!(err, SeatingError::UnknownStudent(_)));
        assert!(store.is_partitioned());
    }

    #[test]
    fn partition_holds_over_mixed_sequence() {
        let mut store = AssignmentStore::new(roster());
        let steps = [
            ("A1", "x"),
            ("A2", "y"),
            ("A1", "z"),
            ("A2", "x"),
            ("C3", "w"),
            ("C3", "y"),
            ("A1", "w"),
        ];
        for (s, id) in steps {
            store.assign(seat(s), id).unwrap();
            assert!(store.is_partitioned(), "after {} -> {}", s, id);
        }
        store.unassign(&seat("A2"));
        assert!(store.is_partitioned());
    }

    #[test]
    fn reset_restores_roster_order() {
        let mut store = AssignmentStore::new(roster());
        store.assign(seat("A1"), "z").unwrap();
        store.assign(seat("A2"), "x").unwrap();
        store.reset();
        let ids: Vec<String> = store.unassigned().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["x", "y", "z", "w"]);
        assert!(store.to_assignments().is_empty());
    }

    #[test]
    fn load_skips_stale_and_malformed_rows() {
        let mut store = AssignmentStore::new(roster());
        let report = store.load_persisted(vec![
            ("A1", "x"),
            ("A2", "gone"),
            ("??", "y"),
            ("A1", "z"),
            ("B1", "x"),
            ("B2", "w"),
        ]);
        assert_eq!(report, LoadReport { loaded: 2, skipped: 4 });
        assert_eq!(store.occupant(&seat("A1")).unwrap().id, "x");
        assert_eq!(store.occupant(&seat("B2")).unwrap().id, "w");
        let pooled: Vec<String> = store.unassigned().into_iter().map(|s| s.id).collect();
        assert_eq!(pooled, vec!["y", "z"]);
        assert!(store.is_partitioned());
    }

    #[test]
    fn assignments_carry_decoded_coordinates() {
        let mut store = AssignmentStore::new(roster());
        store.assign(seat("C3"), "x").unwrap();
        store.assign(seat("A10"), "y").unwrap();
        let rows = store.to_assignments();
        assert_eq!(rows[0].seat_id.to_string(), "A10");
        assert_eq!((rows[0].row_index, rows[0].col_index), (0, 9));
        assert_eq!((rows[1].row_index, rows[1].col_index), (2, 2));
    }

    #[test]
    fn off_layout_lists_seats_missing_from_new_pattern() {
        let mut store = AssignmentStore::new(roster());
        store.assign(seat("A1"), "x").unwrap();
        store.assign(seat("A3"), "y").unwrap();
        let circle = crate::seating::layouts::get("netherlands-circle").unwrap();
        assert_eq!(store.off_layout(circle), vec![seat("A1")]);
    }
}
