use sqlx::SqlitePool;

/// Run database migrations, creating required tables and indexes if they
/// do not exist. Safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY,
            email TEXT,
            state TEXT,
            zip_code TEXT,
            birth_date TEXT,
            effective_date TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        "CREATE TABLE IF NOT EXISTS campaign_types (
            name TEXT PRIMARY KEY,
            respect_exclusion_windows INTEGER NOT NULL DEFAULT 1,
            enable_followups INTEGER NOT NULL DEFAULT 1,
            days_before_event INTEGER NOT NULL DEFAULT 0,
            target_all_contacts INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 10,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        "CREATE TABLE IF NOT EXISTS campaign_instances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_type TEXT NOT NULL REFERENCES campaign_types(name),
            instance_name TEXT NOT NULL,
            email_template TEXT,
            sms_template TEXT,
            active_start_date TEXT,
            active_end_date TEXT,
            metadata TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (campaign_type, instance_name)
        )",
        "CREATE TABLE IF NOT EXISTS contact_campaigns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL REFERENCES contacts(id),
            campaign_instance_id INTEGER NOT NULL REFERENCES campaign_instances(id),
            trigger_date TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            metadata TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (contact_id, campaign_instance_id, trigger_date)
        )",
        "CREATE TABLE IF NOT EXISTS email_schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            email_type TEXT NOT NULL,
            scheduled_send_date TEXT NOT NULL,
            scheduled_send_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pre-scheduled',
            skip_reason TEXT,
            priority INTEGER NOT NULL DEFAULT 10,
            campaign_instance_id INTEGER,
            email_template TEXT,
            sms_template TEXT,
            scheduler_run_id TEXT,
            event_year INTEGER,
            event_month INTEGER,
            event_day INTEGER,
            actual_send_datetime TEXT,
            metadata TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (contact_id, email_type, scheduled_send_date)
        )",
        "CREATE INDEX IF NOT EXISTS email_schedules_status_date_idx
            ON email_schedules (status, scheduled_send_date)",
        "CREATE INDEX IF NOT EXISTS email_schedules_contact_idx
            ON email_schedules (contact_id)",
        "CREATE TABLE IF NOT EXISTS scheduler_checkpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scheduler_run_id TEXT UNIQUE NOT NULL,
            run_timestamp TEXT NOT NULL,
            contacts_processed INTEGER,
            emails_scheduled INTEGER,
            emails_skipped INTEGER,
            status TEXT NOT NULL,
            error_message TEXT,
            completed_at TEXT
        )",
        "CREATE TABLE IF NOT EXISTS tracking_clicks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            tracking_url TEXT,
            clicked_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS tracking_clicks_contact_idx
            ON tracking_clicks (contact_id, clicked_at)",
        "CREATE TABLE IF NOT EXISTS contact_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            metadata TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        "CREATE INDEX IF NOT EXISTS contact_events_contact_idx
            ON contact_events (contact_id, event_type, created_at)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
