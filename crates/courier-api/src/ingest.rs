use courier_types::events::GatewayEvent;
use courier_types::models::{Message, RoomId};

use crate::error::join_error;
use crate::{ApiError, AppState};

/// The one ingestion path for every message producer. The live web POST and
/// the device report both land here: durable append first, then fanout to
/// the room's subscribers, then the stored message back to the caller.
///
/// Append errors propagate untouched. Fanout happens after the write and
/// cannot fail a request; a subscriber problem never rolls persistence back.
pub async fn submit(
    state: &AppState,
    room_id: RoomId,
    author: String,
    text: Option<String>,
    image: Option<String>,
) -> Result<Message, ApiError> {
    let db = state.db.clone();
    let message = tokio::task::spawn_blocking(move || {
        db.append_message(room_id, &author, text.as_deref(), image.as_deref())
    })
    .await
    .map_err(join_error)??;

    state
        .dispatcher
        .publish(
            room_id,
            GatewayEvent::NewMessage {
                room_id,
                message: message.clone(),
            },
        )
        .await;

    Ok(message)
}

/// Author identity for device-relayed messages that carry none.
pub fn device_author(user: Option<String>) -> String {
    user.filter(|u| !u.is_empty())
        .unwrap_or_else(|| "phone".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_db::{Database, StoreError};
    use courier_gateway::Dispatcher;
    use courier_types::events::GatewayEvent;
    use courier_types::models::RoomId;

    use crate::uploads::UploadStore;
    use crate::{ApiError, AppState, AppStateInner};

    use super::submit;

    async fn test_state() -> AppState {
        let dir = std::env::temp_dir().join(format!("courier-test-{}", uuid::Uuid::new_v4()));
        Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            dispatcher: Dispatcher::new(),
            jwt_secret: "test-secret".into(),
            uploads: UploadStore::new(dir).await.unwrap(),
        })
    }

    #[tokio::test]
    async fn submit_appends_and_fans_out() {
        let state = test_state().await;
        let room = state.db.create_room("general").unwrap();

        let (conn, mut rx) = state.dispatcher.register_connection().await;
        state.dispatcher.subscribe(conn, room.id).await;

        let message = submit(&state, room.id, "alice".into(), Some("hi".into()), None)
            .await
            .unwrap();

        // Durable before return.
        let stored = state.db.list_messages(room.id, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, message.id);

        // Fanout carries the stored message.
        match rx.try_recv().unwrap() {
            GatewayEvent::NewMessage {
                room_id,
                message: delivered,
            } => {
                assert_eq!(room_id, room.id);
                assert_eq!(delivered.id, message.id);
                assert_eq!(delivered.text.as_deref(), Some("hi"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn submit_rejects_empty_message_without_storing() {
        let state = test_state().await;
        let room = state.db.create_room("general").unwrap();

        let result = submit(&state, room.id, "alice".into(), None, None).await;
        assert!(matches!(
            result,
            Err(ApiError::Store(StoreError::InvalidInput(_)))
        ));
        assert!(state.db.list_messages(room.id, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_to_unknown_room_is_not_found() {
        let state = test_state().await;
        let result = submit(&state, RoomId(99), "alice".into(), Some("hi".into()), None).await;
        assert!(matches!(
            result,
            Err(ApiError::Store(StoreError::NotFound(_)))
        ));
    }
}
