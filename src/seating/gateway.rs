use crate::error::{Result, SeatingError};
use crate::seating::layouts::{Cell, LayoutTemplate};
use crate::seating::seat_id::{self, SeatId};
use chrono::Utc;
use log::info;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit label stored with a save. Nothing branches on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    #[default]
    Manual,
    AiAutoArrange,
}

impl AssignmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentMethod::Manual => "manual",
            AssignmentMethod::AiAutoArrange => "ai_auto_arrange",
        }
    }
}

/// One row of a full-replace save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAssignment {
    pub student_id: String,
    pub seat_id: SeatId,
    pub row_index: usize,
    pub col_index: usize,
}

impl SeatAssignment {
    pub fn new(seat: SeatId, student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            seat_id: seat,
            row_index: seat.row(),
            col_index: seat.col(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingChart {
    pub id: String,
    pub class_id: String,
    pub layout_template_id: String,
    pub layout_name: String,
    pub rows: usize,
    pub cols: usize,
    pub total_seats: usize,
    pub seat_pattern: Vec<Cell>,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub activated_at: String,
}

impl SeatingChart {
    pub fn layout(&self) -> Result<LayoutTemplate> {
        LayoutTemplate::from_snapshot(
            &self.layout_template_id,
            &self.layout_name,
            self.rows,
            self.cols,
            self.seat_pattern.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAssignment {
    pub seat_id: String,
    pub student_id: String,
    pub row_index: i64,
    pub col_index: i64,
    pub assignment_method: String,
    pub assigned_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub seating_chart: Option<SeatingChart>,
    pub assignments: Vec<PersistedAssignment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChart {
    pub class_id: String,
    pub layout_template_id: String,
    pub layout_name: String,
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub total_seats: Option<usize>,
    pub seat_pattern: Vec<Cell>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewChart {
    pub fn from_layout(class_id: &str, layout: &LayoutTemplate) -> Self {
        Self {
            class_id: class_id.to_string(),
            layout_template_id: layout.id.clone(),
            layout_name: layout.name.clone(),
            rows: layout.rows,
            cols: layout.cols,
            total_seats: Some(layout.total_seats()),
            seat_pattern: layout.seat_pattern.clone(),
            name: None,
            description: Some(layout.description.clone()),
        }
    }
}

/// Where seating charts and their assignments live.
pub trait SeatingGateway {
    /// A missing chart is `Ok` with `seating_chart: None`.
    fn fetch_chart(&self, class_id: &str) -> Result<ChartSnapshot>;

    /// Returns the class's chart, creating it if the class has none yet.
    fn create_chart(&self, new: &NewChart) -> Result<SeatingChart>;

    /// Overwrites the chart's whole assignment set. Returns the row count.
    fn replace_assignments(
        &self,
        chart_id: &str,
        rows: &[SeatAssignment],
        method: AssignmentMethod,
    ) -> Result<usize>;

    /// Points an existing chart at a different layout, keeping its assignments.
    fn update_layout(&self, chart_id: &str, layout: &LayoutTemplate) -> Result<()>;
}

pub struct SqliteGateway<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteGateway<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn chart_by_class(&self, class_id: &str) -> Result<Option<SeatingChart>> {
        self.conn
            .query_row(
                &format!("{CHART_SELECT} WHERE class_id = ?"),
                [class_id],
                chart_from_row,
            )
            .optional()
            .map_err(SeatingError::from)
    }
}

const CHART_SELECT: &str = "SELECT id, class_id, layout_template_id, layout_name, rows, cols,
        total_seats, seat_pattern, name, description, is_active,
        created_at, updated_at, activated_at
     FROM seating_charts";

fn chart_from_row(r: &Row<'_>) -> rusqlite::Result<SeatingChart> {
    let pattern_raw: String = r.get(7)?;
    let seat_pattern: Vec<Cell> = serde_json::from_str(&pattern_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    Ok(SeatingChart {
        id: r.get(0)?,
        class_id: r.get(1)?,
        layout_template_id: r.get(2)?,
        layout_name: r.get(3)?,
        rows: dimension(r, 4)?,
        cols: dimension(r, 5)?,
        total_seats: dimension(r, 6)?,
        seat_pattern,
        name: r.get(8)?,
        description: r.get(9)?,
        is_active: r.get::<_, i64>(10)? != 0,
        created_at: r.get(11)?,
        updated_at: r.get(12)?,
        activated_at: r.get(13)?,
    })
}

// Negative values read as 0, which `LayoutTemplate::from_snapshot` rejects.
fn dimension(r: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    Ok(usize::try_from(r.get::<_, i64>(idx)?).unwrap_or(0))
}

impl SeatingGateway for SqliteGateway<'_> {
    fn fetch_chart(&self, class_id: &str) -> Result<ChartSnapshot> {
        let Some(chart) = self.chart_by_class(class_id)? else {
            return Ok(ChartSnapshot::default());
        };
        let mut stmt = self.conn.prepare(
            "SELECT seat_id, student_id, row_index, col_index, assignment_method, assigned_at
             FROM seat_assignments
             WHERE chart_id = ?
             ORDER BY row_index, col_index",
        )?;
        let assignments = stmt
            .query_map([&chart.id], |r| {
                Ok(PersistedAssignment {
                    seat_id: r.get(0)?,
                    student_id: r.get(1)?,
                    row_index: r.get(2)?,
                    col_index: r.get(3)?,
                    assignment_method: r.get(4)?,
                    assigned_at: r.get(5)?,
                })
            })
            .and_then(|it| it.collect::<std::result::Result<Vec<_>, _>>())?;
        Ok(ChartSnapshot {
            seating_chart: Some(chart),
            assignments,
        })
    }

    fn create_chart(&self, new: &NewChart) -> Result<SeatingChart> {
        let layout = LayoutTemplate::from_snapshot(
            &new.layout_template_id,
            &new.layout_name,
            new.rows,
            new.cols,
            new.seat_pattern.clone(),
        )?;
        let class_exists = self
            .conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [&new.class_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if !class_exists {
            return Err(SeatingError::ClassNotFound(new.class_id.clone()));
        }

        let now = Utc::now();
        let stamp = now.to_rfc3339();
        let name = new
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} - {}", new.layout_name, now.format("%Y-%m-%d")));
        let pattern_json = serde_json::to_string(&layout.seat_pattern)?;
        let inserted = self.conn.execute(
            "INSERT INTO seating_charts(
               id, class_id, layout_template_id, layout_name, rows, cols, total_seats,
               seat_pattern, name, description, is_active, created_at, updated_at, activated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
             ON CONFLICT(class_id) DO NOTHING",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                new.class_id,
                new.layout_template_id,
                new.layout_name,
                layout.rows as i64,
                layout.cols as i64,
                layout.total_seats() as i64,
                pattern_json,
                name,
                new.description.clone().unwrap_or_default(),
                stamp,
                stamp,
                stamp,
            ],
        )?;
        let chart = self
            .chart_by_class(&new.class_id)?
            .ok_or_else(|| SeatingError::ChartNotFound(new.class_id.clone()))?;
        if inserted == 0 {
            info!("class {} already has chart {}; reusing it", new.class_id, chart.id);
        } else {
            info!("created seating chart {} for class {}", chart.id, new.class_id);
        }
        Ok(chart)
    }

    fn replace_assignments(
        &self,
        chart_id: &str,
        rows: &[SeatAssignment],
        method: AssignmentMethod,
    ) -> Result<usize> {
        for row in rows {
            let label = seat_id::encode(row.row_index, row.col_index).ok();
            if label != Some(row.seat_id.to_string()) {
                return Err(SeatingError::InvalidSeatId(format!(
                    "{} at ({}, {})",
                    row.seat_id, row.row_index, row.col_index
                )));
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        let class_id: String = tx
            .query_row("SELECT class_id FROM seating_charts WHERE id = ?", [chart_id], |r| {
                r.get(0)
            })
            .optional()?
            .ok_or_else(|| SeatingError::ChartNotFound(chart_id.to_string()))?;
        {
            let mut on_roster =
                tx.prepare("SELECT 1 FROM students WHERE id = ? AND class_id = ?")?;
            for row in rows {
                if !on_roster.exists((&row.student_id, &class_id))? {
                    return Err(SeatingError::UnknownStudent(row.student_id.clone()));
                }
            }
        }

        let stamp = Utc::now().to_rfc3339();
        tx.execute("DELETE FROM seat_assignments WHERE chart_id = ?", [chart_id])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO seat_assignments(
                   chart_id, seat_id, student_id, row_index, col_index, assignment_method, assigned_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                insert.execute(rusqlite::params![
                    chart_id,
                    row.seat_id.to_string(),
                    row.student_id,
                    row.row_index as i64,
                    row.col_index as i64,
                    method.as_str(),
                    stamp,
                ])?;
            }
        }
        tx.execute(
            "UPDATE seating_charts SET is_active = 1, updated_at = ?, activated_at = ? WHERE id = ?",
            (&stamp, &stamp, chart_id),
        )?;
        tx.commit()?;

        info!(
            "saved {} seat assignments on chart {} ({})",
            rows.len(),
            chart_id,
            method.as_str()
        );
        Ok(rows.len())
    }

    fn update_layout(&self, chart_id: &str, layout: &LayoutTemplate) -> Result<()> {
        let pattern_json = serde_json::to_string(&layout.seat_pattern)?;
        let changed = self.conn.execute(
            "UPDATE seating_charts
             SET layout_template_id = ?, layout_name = ?, rows = ?, cols = ?,
                 total_seats = ?, seat_pattern = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                layout.id,
                layout.name,
                layout.rows as i64,
                layout.cols as i64,
                layout.total_seats() as i64,
                pattern_json,
                Utc::now().to_rfc3339(),
                chart_id,
            ],
        )?;
        if changed == 0 {
            return Err(SeatingError::ChartNotFound(chart_id.to_string()));
        }
        Ok(())
    }
}
