use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::db;
use crate::seating::session::SeatingSession;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Open seating controllers keyed by class id.
    pub sessions: HashMap<String, SeatingSession>,
}

impl AppState {
    /// Switches to `path`, dropping every session bound to the old workspace.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.sessions.clear();
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        Ok(())
    }
}
