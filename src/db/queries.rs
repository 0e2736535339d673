pub const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_disabled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    plan TEXT NOT NULL CHECK (plan IN ('FREE', 'PRO')),
    status TEXT NOT NULL CHECK (status IN ('PENDING_PAYMENT', 'ACTIVE')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL UNIQUE,
    name TEXT,
    room TEXT,
    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_seen_at TEXT,
    created_at TEXT NOT NULL
);
"#,
    "CREATE INDEX IF NOT EXISTS idx_devices_user_id ON devices (user_id);",
    r#"
CREATE TABLE IF NOT EXISTS residents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    room TEXT NOT NULL,
    device_id INTEGER UNIQUE REFERENCES devices(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resident_id INTEGER REFERENCES residents(id) ON DELETE SET NULL,
    device_id INTEGER REFERENCES devices(id) ON DELETE SET NULL,
    elderly TEXT NOT NULL,
    room TEXT NOT NULL,
    type TEXT NOT NULL,
    confidence REAL NOT NULL,
    confidence_percent INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'New' CHECK (status IN ('New', 'Acknowledged', 'Resolved')),
    time TEXT NOT NULL,
    media_url TEXT,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    acknowledged_at TEXT,
    resolved_at TEXT
);
"#,
    "CREATE INDEX IF NOT EXISTS idx_alerts_created_at ON alerts (created_at);",
    "CREATE INDEX IF NOT EXISTS idx_alerts_resident_status ON alerts (resident_id, status);",
    "CREATE INDEX IF NOT EXISTS idx_alerts_device_type_status ON alerts (device_id, type, status);",
    r#"
CREATE TABLE IF NOT EXISTS push_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    platform TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
];

// ---------- users ----------

pub const INSERT_USER: &str = r#"
INSERT INTO users (email, password_hash, is_disabled, created_at, updated_at)
VALUES (?1, ?2, 0, ?3, ?3)
RETURNING *;
"#;

pub const SELECT_USER_BY_EMAIL: &str = "SELECT * FROM users WHERE email = ?1;";

pub const SELECT_USER_BY_ID: &str = "SELECT * FROM users WHERE id = ?1;";

pub const SELECT_USERS: &str = "SELECT * FROM users ORDER BY created_at DESC, id DESC;";

pub const UPDATE_USER_DISABLED: &str = r#"
UPDATE users SET is_disabled = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *;
"#;

pub const COUNT_USERS: &str = "SELECT COUNT(*) FROM users;";

// ---------- subscriptions ----------

pub const SELECT_SUBSCRIPTION_BY_USER: &str = "SELECT * FROM subscriptions WHERE user_id = ?1;";

pub const UPSERT_SUBSCRIPTION: &str = r#"
INSERT INTO subscriptions (user_id, plan, status, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?4)
ON CONFLICT (user_id) DO UPDATE
SET plan = excluded.plan,
    status = excluded.status,
    updated_at = excluded.updated_at
RETURNING *;
"#;

pub const CONFIRM_PAYMENT: &str = r#"
UPDATE subscriptions
SET plan = 'PRO',
    status = 'ACTIVE',
    updated_at = ?2
WHERE user_id = ?1
RETURNING *;
"#;

pub const COUNT_ACTIVE_PRO_SUBSCRIPTIONS: &str =
    "SELECT COUNT(*) FROM subscriptions WHERE plan = 'PRO' AND status = 'ACTIVE';";

// ---------- devices ----------

/// Creates the device on first contact. A disabled device matches the
/// conflict target but fails the WHERE, so no row comes back.
pub const HEARTBEAT_UPSERT: &str = r#"
INSERT INTO devices (device_id, name, room, is_active, last_seen_at, created_at)
VALUES (?1, ?2, ?3, 1, ?4, ?4)
ON CONFLICT (device_id) DO UPDATE
SET last_seen_at = excluded.last_seen_at,
    name = COALESCE(excluded.name, devices.name),
    room = COALESCE(excluded.room, devices.room)
WHERE devices.is_active = 1
RETURNING *;
"#;

pub const INSERT_DEVICE: &str = r#"
INSERT INTO devices (device_id, name, room, is_active, created_at)
VALUES (?1, ?2, ?3, 1, ?4)
RETURNING *;
"#;

pub const SELECT_ACTIVE_DEVICES: &str = "SELECT * FROM devices WHERE is_active = 1 ORDER BY id ASC;";

pub const SELECT_ALL_DEVICES: &str = "SELECT * FROM devices ORDER BY id ASC;";

pub const SELECT_DEVICE_BY_ID: &str = "SELECT * FROM devices WHERE id = ?1;";

pub const SELECT_DEVICE_BY_EXTERNAL_ID: &str = "SELECT * FROM devices WHERE device_id = ?1;";

pub const SELECT_DEVICES_BY_USER: &str = "SELECT * FROM devices WHERE user_id = ?1 ORDER BY id ASC;";

pub const UPDATE_DEVICE: &str = r#"
UPDATE devices
SET name = CASE WHEN ?2 THEN ?3 ELSE name END,
    room = CASE WHEN ?4 THEN ?5 ELSE room END,
    is_active = COALESCE(?6, is_active)
WHERE id = ?1
RETURNING *;
"#;

pub const DISABLE_DEVICE: &str = "UPDATE devices SET is_active = 0 WHERE id = ?1 RETURNING *;";

/// Quota check and owner write in one statement.
pub const CLAIM_DEVICE: &str = r#"
UPDATE devices
SET user_id = ?2
WHERE device_id = ?1
  AND is_active = 1
  AND (user_id IS NULL OR user_id = ?2)
  AND (SELECT COUNT(*) FROM devices WHERE user_id = ?2) < ?3
RETURNING *;
"#;

pub const COUNT_DEVICES_BY_USER: &str = "SELECT COUNT(*) FROM devices WHERE user_id = ?1;";

pub const COUNT_DEVICES: &str = "SELECT COUNT(*) FROM devices;";

pub const SELECT_SWEEP_CANDIDATES: &str = r#"
SELECT * FROM devices WHERE is_active = 1 AND last_seen_at IS NOT NULL ORDER BY id ASC;
"#;

// ---------- residents ----------

pub const SELECT_RESIDENTS_WITH_DEVICE: &str = r#"
SELECT r.*,
       d.device_id AS device_external_id,
       d.name AS device_name,
       d.room AS device_room,
       d.is_active AS device_is_active,
       d.last_seen_at AS device_last_seen_at
FROM residents r
LEFT JOIN devices d ON d.id = r.device_id
ORDER BY r.id ASC;
"#;

pub const SELECT_RESIDENT_BY_ID: &str = "SELECT * FROM residents WHERE id = ?1;";

pub const SELECT_RESIDENT_BY_NAME: &str = "SELECT * FROM residents WHERE name = ?1;";

pub const SELECT_RESIDENT_BY_DEVICE: &str = "SELECT * FROM residents WHERE device_id = ?1;";

pub const INSERT_RESIDENT: &str = r#"
INSERT INTO residents (name, room, created_at) VALUES (?1, ?2, ?3) RETURNING *;
"#;

pub const UPDATE_RESIDENT: &str = r#"
UPDATE residents
SET name = COALESCE(?2, name),
    room = COALESCE(?3, room)
WHERE id = ?1
RETURNING *;
"#;

pub const SET_RESIDENT_DEVICE: &str = "UPDATE residents SET device_id = ?2 WHERE id = ?1 RETURNING *;";

pub const COUNT_ACTIVE_ALERTS_FOR_RESIDENT: &str = r#"
SELECT COUNT(*) FROM alerts WHERE resident_id = ?1 AND status IN ('New', 'Acknowledged');
"#;

pub const DELETE_RESIDENT_IF_IDLE: &str = r#"
DELETE FROM residents
WHERE id = ?1
  AND NOT EXISTS (
        SELECT 1 FROM alerts WHERE resident_id = ?1 AND status IN ('New', 'Acknowledged')
      );
"#;

// ---------- alerts ----------

pub const INSERT_ALERT: &str = r#"
INSERT INTO alerts (
    resident_id, device_id, elderly, room, type, confidence, confidence_percent,
    status, time, media_url, source, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'New', ?8, ?9, ?10, ?11)
RETURNING id;
"#;

macro_rules! alert_view {
    ($tail:literal) => {
        concat!(
            "SELECT a.*, r.name AS resident_name, d.device_id AS device_external_id ",
            "FROM alerts a ",
            "LEFT JOIN residents r ON r.id = a.resident_id ",
            "LEFT JOIN devices d ON d.id = COALESCE(a.device_id, r.device_id) ",
            $tail
        )
    };
}

pub const SELECT_ALERT_VIEWS: &str =
    alert_view!("ORDER BY a.created_at DESC, a.id DESC LIMIT ?1;");

pub const SELECT_ALERT_VIEW_BY_ID: &str = alert_view!("WHERE a.id = ?1;");

pub const SELECT_OWNED_ALERT_VIEWS: &str =
    alert_view!("WHERE d.user_id = ?1 ORDER BY a.created_at DESC, a.id DESC LIMIT ?2;");

pub const SELECT_OWNED_ALERT_VIEW_BY_ID: &str = alert_view!("WHERE a.id = ?1 AND d.user_id = ?2;");

pub const SELECT_ALERT_STATUS: &str = "SELECT status FROM alerts WHERE id = ?1;";

/// Old column values are visible inside SET, so each timestamp is only
/// written on the transition into its status. ?4 is the target's rank; the
/// WHERE refuses to move backwards.
pub const UPDATE_ALERT_STATUS: &str = r#"
UPDATE alerts
SET status = ?2,
    acknowledged_at = CASE WHEN ?2 = 'Acknowledged' AND status <> 'Acknowledged' THEN ?3 ELSE acknowledged_at END,
    resolved_at = CASE WHEN ?2 = 'Resolved' AND status <> 'Resolved' THEN ?3 ELSE resolved_at END
WHERE id = ?1
  AND (CASE status WHEN 'New' THEN 0 WHEN 'Acknowledged' THEN 1 ELSE 2 END) <= ?4
RETURNING id;
"#;

pub const UPDATE_ALERT_MEDIA: &str = "UPDATE alerts SET media_url = ?2 WHERE id = ?1 RETURNING id;";

pub const COUNT_ALERTS_SINCE: &str = "SELECT COUNT(*) FROM alerts WHERE created_at >= ?1;";

pub const SELECT_RECENT_ALERTS_ENRICHED: &str = r#"
SELECT a.*,
       r.name AS resident_name,
       d.device_id AS device_external_id,
       d.name AS device_name,
       u.email AS owner_email
FROM alerts a
LEFT JOIN residents r ON r.id = a.resident_id
LEFT JOIN devices d ON d.id = COALESCE(a.device_id, r.device_id)
LEFT JOIN users u ON u.id = d.user_id
ORDER BY a.created_at DESC, a.id DESC
LIMIT ?1;
"#;

/// Dedup key is the device: one open offline alert per device.
pub const INSERT_OFFLINE_ALERT: &str = r#"
INSERT INTO alerts (
    resident_id, device_id, elderly, room, type, confidence, confidence_percent,
    status, time, source, created_at
)
SELECT NULL, ?1, ?2, ?3, ?4, 1.0, 100, 'New', ?5, ?6, ?7
WHERE NOT EXISTS (
    SELECT 1 FROM alerts
    WHERE device_id = ?1 AND type = ?4 AND status = 'New' AND elderly = ?2
);
"#;

// ---------- push tokens ----------

pub const UPSERT_PUSH_TOKEN: &str = r#"
INSERT INTO push_tokens (token, platform, created_at, updated_at)
VALUES (?1, ?2, ?3, ?3)
ON CONFLICT (token) DO UPDATE
SET platform = excluded.platform,
    updated_at = excluded.updated_at
RETURNING *;
"#;

pub const SELECT_PUSH_TOKENS_BY_PLATFORM: &str = r#"
SELECT * FROM push_tokens WHERE platform = ?1 ORDER BY id ASC LIMIT ?2;
"#;

pub const DELETE_PUSH_TOKEN: &str = "DELETE FROM push_tokens WHERE token = ?1;";
