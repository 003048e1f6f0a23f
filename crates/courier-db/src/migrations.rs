use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rooms (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            author      TEXT NOT NULL,
            text        TEXT,
            image       TEXT,
            ts          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, ts, id);

        -- One row per (message, user) acknowledgement. The primary key
        -- makes read receipts idempotent at the schema level.
        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user        TEXT NOT NULL,
            PRIMARY KEY (message_id, user)
        );

        CREATE TABLE IF NOT EXISTS devices (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            last_seen   INTEGER NOT NULL
        );

        -- Pending commands as first-class rows, FIFO by seq. Kept out of the
        -- devices table so re-registration can never clobber a queue.
        CREATE TABLE IF NOT EXISTS device_commands (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id   TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            cmd_id      TEXT NOT NULL,
            kind        TEXT NOT NULL,
            payload     TEXT NOT NULL,
            ts          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_device_commands_device
            ON device_commands(device_id, seq);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
