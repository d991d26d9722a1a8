use rusqlite::{params, Connection};

use crate::error::Result;
use crate::types::Plan;

/// Initialise the plans table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS plans (
            id          TEXT PRIMARY KEY,
            goal        TEXT NOT NULL,
            steps_json  TEXT NOT NULL,
            status      TEXT NOT NULL,
            channel     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_plans_status ON plans(status);",
    )
}

pub fn save_plan(conn: &Connection, plan: &Plan) -> Result<()> {
    let steps_json = serde_json::to_string(&plan.steps)?;
    let status = plan.status.to_string();
    conn.execute(
        "INSERT INTO plans (id, goal, steps_json, status, channel, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET steps_json = ?3, status = ?4, updated_at = ?7",
        params![
            plan.id,
            plan.goal,
            steps_json,
            status,
            plan.channel,
            plan.created_at.to_rfc3339(),
            plan.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn load_plan(conn: &Connection, plan_id: &str) -> Result<Option<Plan>> {
    let row = conn.query_row(
        "SELECT id, goal, steps_json, status, channel, created_at, updated_at
         FROM plans WHERE id = ?1",
        params![plan_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    );

    let (id, goal, steps_json, status, channel, created_at, updated_at) = match row {
        Ok(r) => r,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let steps = serde_json::from_str(&steps_json)?;
    let status = match status.as_str() {
        "executing" => crate::types::PlanStatus::Executing,
        "completed" => crate::types::PlanStatus::Completed,
        "failed" => crate::types::PlanStatus::Failed,
        _ => crate::types::PlanStatus::Planning,
    };

    Ok(Some(Plan {
        id,
        goal,
        steps,
        status,
        channel,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    }))
}

pub fn list_pending(conn: &Connection) -> Result<Vec<Plan>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM plans WHERE status IN ('planning', 'executing') ORDER BY created_at",
    )?;
    let ids: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    drop(stmt);

    let mut plans = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(p) = load_plan(conn, &id)? {
            plans.push(p);
        }
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlanStep;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn round_trips_a_plan() {
        let conn = memory_conn();
        let plan = Plan::new(
            "abc123".to_string(),
            "ship the feature".to_string(),
            vec![PlanStep::new(1, "write code", Some("write_file".to_string()))],
            "discord:general".to_string(),
        );
        save_plan(&conn, &plan).unwrap();

        let loaded = load_plan(&conn, "abc123").unwrap().unwrap();
        assert_eq!(loaded.goal, "ship the feature");
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].tool.as_deref(), Some("write_file"));
    }

    #[test]
    fn missing_plan_returns_none() {
        let conn = memory_conn();
        assert!(load_plan(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn list_pending_excludes_completed() {
        let conn = memory_conn();
        let mut done = Plan::new("done1".into(), "g".into(), vec![], "discord:c".into());
        done.status = crate::types::PlanStatus::Completed;
        save_plan(&conn, &done).unwrap();

        let planning = Plan::new("plan1".into(), "g".into(), vec![], "discord:c".into());
        save_plan(&conn, &planning).unwrap();

        let pending = list_pending(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "plan1");
    }
}
