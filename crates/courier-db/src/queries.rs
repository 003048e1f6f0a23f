use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use courier_types::events::CommandRequest;
use courier_types::models::{Command, Device, Message, Room, RoomId};

use crate::{Database, StoreError, StoreResult};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Database {
    // -- Rooms --

    /// Create a room by name, or return the existing one. Duplicate names
    /// are resolved idempotently instead of erroring.
    pub fn create_room(&self, name: &str) -> StoreResult<Room> {
        if name.is_empty() {
            return Err(StoreError::InvalidInput("room name required".into()));
        }

        let now = now_millis();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO rooms (name, created_at) VALUES (?1, ?2)",
                params![name, now],
            )?;
            let room = conn.query_row(
                "SELECT id, name, created_at FROM rooms WHERE name = ?1",
                [name],
                room_from_row,
            )?;
            Ok(room)
        })
    }

    pub fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM rooms ORDER BY id DESC")?;
            let rooms = stmt
                .query_map([], room_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rooms)
        })
    }

    /// Delete a room and, via cascade, all its messages and read receipts.
    /// Runs in one transaction; a concurrent append either lands fully
    /// before this (and is deleted with the room) or observes the room gone.
    pub fn delete_room(&self, room_id: RoomId) -> StoreResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM rooms WHERE id = ?1", [room_id.0])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("room"));
            }
            tx.commit()?;
            Ok(())
        })
    }

    // -- Messages --

    /// Append a message to a room's log. The id and timestamp are assigned
    /// here; `read_by` starts empty. Durable once this returns.
    pub fn append_message(
        &self,
        room_id: RoomId,
        author: &str,
        text: Option<&str>,
        image: Option<&str>,
    ) -> StoreResult<Message> {
        let text = text.filter(|t| !t.is_empty());
        let image = image.filter(|i| !i.is_empty());
        if text.is_none() && image.is_none() {
            return Err(StoreError::InvalidInput(
                "message needs text or an image".into(),
            ));
        }

        let ts = now_millis();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            // Room existence is checked inside the same transaction as the
            // insert, so an append can never land in a half-deleted room.
            let room_exists = tx
                .query_row("SELECT 1 FROM rooms WHERE id = ?1", [room_id.0], |_| Ok(()))
                .optional()?
                .is_some();
            if !room_exists {
                return Err(StoreError::NotFound("room"));
            }

            tx.execute(
                "INSERT INTO messages (room_id, author, text, image, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![room_id.0, author, text, image, ts],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Message {
                id,
                room_id,
                author: author.to_string(),
                text: text.map(String::from),
                image: image.map(String::from),
                ts,
                read_by: Vec::new(),
            })
        })
    }

    /// Messages of a room in ascending `(ts, id)` order. `since` restricts
    /// to messages with a strictly greater timestamp, for incremental sync.
    pub fn list_messages(&self, room_id: RoomId, since: Option<i64>) -> StoreResult<Vec<Message>> {
        let since = since.unwrap_or(i64::MIN);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, author, text, image, ts FROM messages
                 WHERE room_id = ?1 AND ts > ?2
                 ORDER BY ts ASC, id ASC",
            )?;
            let mut messages = stmt
                .query_map(params![room_id.0, since], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        room_id: RoomId(row.get(1)?),
                        author: row.get(2)?,
                        text: row.get(3)?,
                        image: row.get(4)?,
                        ts: row.get(5)?,
                        read_by: Vec::new(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
            let mut reads = read_sets(conn, &ids)?;
            for message in &mut messages {
                if let Some(users) = reads.remove(&message.id) {
                    message.read_by = users;
                }
            }

            Ok(messages)
        })
    }

    /// Record that `user` has read a message. Idempotent; repeats are
    /// no-ops. Returns the message's room id so the caller can notify
    /// that room's subscribers.
    pub fn mark_read(&self, message_id: i64, user: &str) -> StoreResult<RoomId> {
        self.with_conn(|conn| {
            let room_id: Option<i64> = conn
                .query_row(
                    "SELECT room_id FROM messages WHERE id = ?1",
                    [message_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(room_id) = room_id else {
                return Err(StoreError::NotFound("message"));
            };

            conn.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user) VALUES (?1, ?2)",
                params![message_id, user],
            )?;

            Ok(RoomId(room_id))
        })
    }

    // -- Devices --

    /// Upsert a device. Re-registration refreshes name and last_seen but
    /// never touches pending commands.
    pub fn register_device(&self, id: &str, name: &str) -> StoreResult<()> {
        if id.is_empty() {
            return Err(StoreError::InvalidInput("device id required".into()));
        }

        let now = now_millis();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO devices (id, name, last_seen) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, last_seen = excluded.last_seen",
                params![id, name, now],
            )?;
            Ok(())
        })
    }

    pub fn get_device(&self, id: &str) -> StoreResult<Option<Device>> {
        self.with_conn(|conn| {
            let device = conn
                .query_row(
                    "SELECT id, name, last_seen FROM devices WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(Device {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            last_seen: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(device)
        })
    }

    /// FIFO-append a command to a device's queue. Unregistered device is an
    /// error here (unlike drain, where empty is the valid answer).
    pub fn enqueue_command(&self, device_id: &str, req: &CommandRequest) -> StoreResult<Command> {
        let payload = serde_json::to_string(&req.payload)
            .map_err(|e| StoreError::InvalidInput(format!("bad command payload: {e}")))?;
        let cmd = Command {
            id: req
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: req.kind.clone(),
            payload: req.payload.clone(),
            ts: now_millis(),
        };

        self.with_conn(|conn| {
            let registered = conn
                .query_row("SELECT 1 FROM devices WHERE id = ?1", [device_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !registered {
                return Err(StoreError::NotFound("device"));
            }

            conn.execute(
                "INSERT INTO device_commands (device_id, cmd_id, kind, payload, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![device_id, cmd.id, cmd.kind, payload, cmd.ts],
            )?;
            Ok(cmd)
        })
    }

    /// Atomically take and clear a device's queue, refreshing `last_seen`.
    /// One transaction: a command is handed to exactly one drain, and an
    /// enqueue racing this lands either before the select or after the
    /// delete. Empty queue and unknown device both drain to an empty list.
    pub fn drain_commands(&self, device_id: &str) -> StoreResult<Vec<Command>> {
        let now = now_millis();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let cmds = {
                let mut stmt = tx.prepare(
                    "SELECT cmd_id, kind, payload, ts FROM device_commands
                     WHERE device_id = ?1 ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map([device_id], |row| {
                    Ok(Command {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        // A corrupt payload must not wedge the whole queue.
                        payload: serde_json::from_str(&row.get::<_, String>(2)?)
                            .unwrap_or(serde_json::Value::Null),
                        ts: row.get(3)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            tx.execute(
                "DELETE FROM device_commands WHERE device_id = ?1",
                [device_id],
            )?;
            tx.execute(
                "UPDATE devices SET last_seen = ?1 WHERE id = ?2",
                params![now, device_id],
            )?;
            tx.commit()?;

            Ok(cmds)
        })
    }
}

fn room_from_row(row: &rusqlite::Row) -> rusqlite::Result<Room> {
    Ok(Room {
        id: RoomId(row.get(0)?),
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

/// Batch-fetch the read sets for a list of message ids in one query.
fn read_sets(conn: &Connection, message_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<String>>> {
    if message_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT message_id, user FROM message_reads WHERE message_id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let mut map: HashMap<i64, Vec<String>> = HashMap::new();
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (message_id, user) = row?;
        map.entry(message_id).or_default().push(user);
    }

    Ok(map)
}
