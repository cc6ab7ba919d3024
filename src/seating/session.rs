use crate::error::{Result, SeatingError};
use crate::seating::arrange;
use crate::seating::drag::{DragSource, DragState, DropOutcome, PendingDrag};
use crate::seating::gateway::{AssignmentMethod, NewChart, SeatingGateway};
use crate::seating::layouts::{self, LayoutTemplate};
use crate::seating::seat_id::{self, SeatId};
use crate::seating::store::{AssignmentStore, LoadReport};
use crate::seating::student::Student;
use log::{error, info, warn};
use serde::Serialize;

/// Controller state behind one class's seating view.
///
/// Mutations stay in memory until `save`, `reset` or `auto_arrange` pushes the
/// whole assignment set through a [`SeatingGateway`].
#[derive(Debug, Clone)]
pub struct SeatingSession {
    class_id: String,
    layout: LayoutTemplate,
    chart_id: Option<String>,
    layout_dirty: bool,
    store: AssignmentStore,
    drag: DragState,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReport {
    pub chart_found: bool,
    pub loaded_assignments: usize,
    pub skipped_assignments: usize,
    pub unknown_layout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistOutcome {
    pub persisted: bool,
    pub saved_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoArrangeOutcome {
    pub placed: usize,
    pub unassigned: usize,
    #[serde(flatten)]
    pub persist: PersistOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub seat_id: SeatId,
    pub row_index: usize,
    pub col_index: usize,
    pub initials: String,
    pub student: Student,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingView {
    pub student_id: String,
    pub from_seat: Option<SeatId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub class_id: String,
    pub chart_id: Option<String>,
    pub layout: LayoutTemplate,
    pub total_seats: usize,
    pub roster_size: usize,
    pub seats: Vec<SeatView>,
    pub unassigned: Vec<Student>,
    pub off_layout_seats: Vec<SeatId>,
    pub pending: Option<PendingView>,
    pub error: Option<String>,
}

impl SeatingSession {
    pub fn new(class_id: &str, roster: Vec<Student>, layout: LayoutTemplate) -> Self {
        Self {
            class_id: class_id.to_string(),
            layout,
            chart_id: None,
            layout_dirty: false,
            store: AssignmentStore::new(roster),
            drag: DragState::default(),
            last_error: None,
        }
    }

    /// Hydrates a session from the roster and whatever chart is saved for the class.
    pub fn open(
        class_id: &str,
        roster: Vec<Student>,
        default_layout: &LayoutTemplate,
        gateway: &dyn SeatingGateway,
    ) -> Result<(Self, OpenReport)> {
        let snapshot = gateway.fetch_chart(class_id)?;
        let mut session = Self::new(class_id, roster, default_layout.clone());
        let mut report = OpenReport::default();

        let Some(chart) = snapshot.seating_chart else {
            return Ok((session, report));
        };
        report.chart_found = true;
        session.chart_id = Some(chart.id.clone());
        session.layout = match layouts::find(&chart.layout_template_id) {
            Some(t) => t.clone(),
            None => {
                warn!("layout not found: {}; using the chart's stored pattern", chart.layout_template_id);
                report.unknown_layout = Some(chart.layout_template_id.clone());
                chart.layout().unwrap_or_else(|e| {
                    warn!("stored pattern for chart {} is unusable: {e}", chart.id);
                    default_layout.clone()
                })
            }
        };

        // Coordinates are stored beside the label; rows where they disagree are not trusted.
        let (consistent, mismatched): (Vec<_>, Vec<_>) =
            snapshot.assignments.iter().partition(|a| {
                seat_id::decode(&a.seat_id).map_or(true, |(row, col)| {
                    (row as i64, col as i64) == (a.row_index, a.col_index)
                })
            });
        for a in &mismatched {
            warn!(
                "skipping persisted assignment {} at ({}, {}): coordinates disagree",
                a.seat_id, a.row_index, a.col_index
            );
        }
        let LoadReport { loaded, skipped } = session.store.load_persisted(
            consistent
                .iter()
                .map(|a| (a.seat_id.as_str(), a.student_id.as_str())),
        );
        report.loaded_assignments = loaded;
        report.skipped_assignments = skipped + mismatched.len();
        info!(
            "opened seating for class {}: {} seats filled, {} skipped",
            class_id, loaded, skipped
        );
        session.warn_off_layout();
        Ok((session, report))
    }

    pub fn chart_id(&self) -> Option<&str> {
        self.chart_id.as_deref()
    }

    pub fn layout(&self) -> &LayoutTemplate {
        &self.layout
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    pub fn pending(&self) -> Option<&PendingDrag> {
        self.drag.pending()
    }

    /// Switches layout without touching assignments. Returns the occupied
    /// seats that the new layout has no seat for.
    pub fn set_layout(&mut self, layout: LayoutTemplate) -> Vec<SeatId> {
        if layout.id != self.layout.id {
            self.layout_dirty = self.chart_id.is_some();
        }
        self.layout = layout;
        self.warn_off_layout()
    }

    fn warn_off_layout(&self) -> Vec<SeatId> {
        let off = self.store.off_layout(&self.layout);
        if !off.is_empty() {
            warn!(
                "{} assigned seat(s) are not seats in layout {}: {:?}",
                off.len(),
                self.layout.id,
                off.iter().map(|s| s.to_string()).collect::<Vec<_>>()
            );
        }
        off
    }

    pub fn pick_up(&mut self, student_id: &str, from_seat: Option<SeatId>) -> Result<()> {
        let source = match from_seat {
            Some(seat) => DragSource::Seat(seat),
            None => DragSource::Pool,
        };
        self.drag.pick_up(&self.store, student_id, source)
    }

    pub fn drop_on(&mut self, seat: SeatId) -> Result<DropOutcome> {
        self.drag.drop_on(&mut self.store, &self.layout, seat)
    }

    pub fn cancel_drag(&mut self) -> Option<PendingDrag> {
        self.drag.cancel()
    }

    /// Direct placement, for callers that do not use the drag protocol.
    pub fn assign(&mut self, seat: SeatId, student_id: &str) -> Result<Option<String>> {
        if !self.layout.is_seat(&seat) {
            return Err(SeatingError::NotASeat(seat.to_string()));
        }
        self.drag.cancel();
        self.store.assign(seat, student_id)
    }

    pub fn unassign(&mut self, seat: &SeatId) -> Option<String> {
        self.drag.cancel();
        self.store.unassign(seat)
    }

    /// Pushes the full assignment set, creating the chart first if needed.
    pub fn save(&mut self, gateway: &dyn SeatingGateway, method: AssignmentMethod) -> Result<usize> {
        let result = self.persist(gateway, method);
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                error!("saving seating for class {} failed: {e}", self.class_id);
                self.last_error = Some(format!("Failed to save seating arrangement: {e}"));
            }
        }
        result
    }

    fn persist(&mut self, gateway: &dyn SeatingGateway, method: AssignmentMethod) -> Result<usize> {
        let chart_id = match &self.chart_id {
            Some(id) => id.clone(),
            None => {
                let chart = gateway.create_chart(&NewChart::from_layout(&self.class_id, &self.layout))?;
                if chart.layout_template_id != self.layout.id {
                    self.layout_dirty = true;
                }
                self.chart_id = Some(chart.id.clone());
                chart.id
            }
        };
        if self.layout_dirty {
            gateway.update_layout(&chart_id, &self.layout)?;
            self.layout_dirty = false;
        }
        gateway.replace_assignments(&chart_id, &self.store.to_assignments(), method)
    }

    /// Clears every seat. If a chart exists the empty set is persisted too;
    /// a failure there is logged and reported but does not undo the reset.
    pub fn reset(&mut self, gateway: &dyn SeatingGateway) -> PersistOutcome {
        self.drag.cancel();
        self.store.reset();
        let Some(chart_id) = self.chart_id.clone() else {
            return PersistOutcome {
                persisted: false,
                saved_count: 0,
                error: None,
            };
        };
        match gateway.replace_assignments(&chart_id, &[], AssignmentMethod::Manual) {
            Ok(n) => PersistOutcome {
                persisted: true,
                saved_count: n,
                error: None,
            },
            Err(e) => {
                error!("clearing assignments on chart {chart_id} failed: {e}");
                PersistOutcome {
                    persisted: false,
                    saved_count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Arranges the whole roster, then saves. The arrangement is kept even
    /// when the save fails.
    pub fn auto_arrange(&mut self, gateway: &dyn SeatingGateway) -> AutoArrangeOutcome {
        self.drag.cancel();
        let arrangement = arrange::auto_arrange(self.store.roster(), &self.layout);
        self.store.apply(&arrangement);

        let persist = match self.save(gateway, AssignmentMethod::AiAutoArrange) {
            Ok(n) => PersistOutcome {
                persisted: true,
                saved_count: n,
                error: None,
            },
            Err(e) => PersistOutcome {
                persisted: false,
                saved_count: 0,
                error: Some(e.to_string()),
            },
        };
        AutoArrangeOutcome {
            placed: arrangement.placements.len(),
            unassigned: arrangement.unassigned.len(),
            persist,
        }
    }

    pub fn view(&self) -> SessionView {
        let seats = self
            .store
            .assigned()
            .into_iter()
            .map(|(seat, s)| SeatView {
                seat_id: seat,
                row_index: seat.row(),
                col_index: seat.col(),
                initials: s.initials(),
                student: s.clone(),
            })
            .collect();
        SessionView {
            class_id: self.class_id.clone(),
            chart_id: self.chart_id.clone(),
            layout: self.layout.clone(),
            total_seats: self.layout.total_seats(),
            roster_size: self.store.roster().len(),
            seats,
            unassigned: self.store.unassigned(),
            off_layout_seats: self.store.off_layout(&self.layout),
            pending: self.drag.pending().map(|p| PendingView {
                student_id: p.student_id.clone(),
                from_seat: match p.source {
                    DragSource::Seat(seat) => Some(seat),
                    DragSource::Pool => None,
                },
            }),
            error: self.last_error.clone(),
        }
    }
}
