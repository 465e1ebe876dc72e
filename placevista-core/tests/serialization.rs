use placevista_core::*;
use serde_json::{self as json, Value};

fn parse(json_str: &str) -> Value {
    json::from_str(json_str).expect("valid json")
}

fn sample_message() -> Message {
    Message {
        id: 7,
        author_id: "u1".to_string(),
        text: Some("hi".to_string()),
        attachment_ref: None,
        location: None,
        created_at: "2025-11-02T10:20:35Z".to_string(),
    }
}

/*
    Un sendMessage arriva dal client come { type, payload } in camelCase.
    L'autore non fa parte del payload: lo aggiunge il server con into_input.
*/
#[test]
fn ws_send_message_from_client_json() {
    let raw = r#"{
        "type": "sendMessage",
        "payload": {
            "clientMsgId": "11111111-1111-4111-8111-111111111111",
            "text": "ciao",
            "location": { "latitude": 48.85, "longitude": 2.35 },
            "sentAt": "2025-11-02T10:20:30Z"
        }
    }"#;
    let parsed: WsMessage = json::from_str(raw).expect("deserialize");
    let sm = match parsed {
        WsMessage::SendMessage(sm) => sm,
        other => panic!("expected SendMessage, got {:?}", other),
    };
    assert_eq!(sm.client_msg_id.as_deref(), Some("11111111-1111-4111-8111-111111111111"));
    assert_eq!(sm.sent_at.as_deref(), Some("2025-11-02T10:20:30Z"));

    let input = sm.into_input("u1");
    assert_eq!(input.author_id, "u1");
    assert_eq!(input.text.as_deref(), Some("ciao"));
    assert_eq!(
        input.location,
        Some(Location::Coordinates { latitude: 48.85, longitude: 2.35 })
    );
    assert!(input.attachment_ref.is_none());
}

/*
    Un messaggio con solo attachmentRef: i campi assenti non compaiono nel JSON.
*/
#[test]
fn ws_message_omits_absent_content_fields() {
    let m = Message {
        text: None,
        attachment_ref: Some("img://abc".to_string()),
        ..sample_message()
    };
    let s = json::to_string(&WsMessage::Message(m.clone())).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["type"], "message");
    assert_eq!(v["payload"]["id"], 7);
    assert_eq!(v["payload"]["authorId"], "u1");
    assert_eq!(v["payload"]["attachmentRef"], "img://abc");
    assert_eq!(v["payload"]["createdAt"], m.created_at);
    let payload = v["payload"].as_object().expect("object payload");
    assert!(!payload.contains_key("text"), "text should be omitted");
    assert!(!payload.contains_key("location"), "location should be omitted");

    let back: WsMessage = json::from_str(&s).expect("deserialize");
    assert_eq!(back, WsMessage::Message(m));
}

/*
    Location: le coordinate sono un oggetto, un luogo libero è una stringa.
*/
#[test]
fn location_wire_forms() {
    let coords = Location::Coordinates { latitude: -33.86, longitude: 151.2 };
    assert_eq!(
        json::to_value(&coords).expect("serialize"),
        serde_json::json!({ "latitude": -33.86, "longitude": 151.2 })
    );

    let place: Location = json::from_value(serde_json::json!("Paris, France")).expect("deserialize");
    assert_eq!(place, Location::Place("Paris, France".to_string()));
}

#[test]
fn location_validity() {
    assert!(Location::Coordinates { latitude: 90.0, longitude: -180.0 }.is_valid());
    assert!(!Location::Coordinates { latitude: 91.0, longitude: 0.0 }.is_valid());
    assert!(!Location::Coordinates { latitude: 0.0, longitude: f64::NAN }.is_valid());
    assert!(Location::Place("Rome".to_string()).is_valid());
    assert!(!Location::Place("   ".to_string()).is_valid());
}

/*
    Lo snapshot è un frame "history" con i messaggi in ordine; last_id è l'ultimo.
*/
#[test]
fn ws_history_frame() {
    let first = sample_message();
    let second = Message { id: 9, ..sample_message() };
    let history = History { messages: vec![first, second], has_more: true };
    assert_eq!(history.last_id(), Some(9));
    assert_eq!(History::default().last_id(), None);

    let v = parse(&json::to_string(&WsMessage::History(history)).expect("serialize"));
    assert_eq!(v["type"], "history");
    assert_eq!(v["payload"]["messages"][0]["id"], 7);
    assert_eq!(v["payload"]["messages"][1]["id"], 9);
    assert_eq!(v["payload"]["hasMore"], true);

    // un client vecchio che non manda hasMore ottiene false
    let old: History = json::from_str(r#"{"messages":[]}"#).expect("deserialize");
    assert!(!old.has_more);
}

/*
    Ack ok porta messageId e createdAt; ack di errore porta solo l'errore.
*/
#[test]
fn ws_ack_ok_and_error() {
    let m = sample_message();
    let ok = Ack::ok(Some("c-1".to_string()), &m);
    let v = parse(&json::to_string(&WsMessage::Ack(ok)).expect("serialize"));
    assert_eq!(v["type"], "ack");
    assert_eq!(v["payload"]["inReplyTo"], "c-1");
    assert_eq!(v["payload"]["status"], "ok");
    assert_eq!(v["payload"]["messageId"], 7);
    assert_eq!(v["payload"]["createdAt"], m.created_at);
    assert!(v["payload"]["error"].is_null());

    let err = Ack::error(None, Error::new("validation_error", "authorId is required"));
    let v = parse(&json::to_string(&WsMessage::Ack(err)).expect("serialize"));
    assert_eq!(v["payload"]["status"], "error");
    assert_eq!(v["payload"]["error"]["code"], "validation_error");
    assert!(v["payload"]["messageId"].is_null());
    assert!(v["payload"]["inReplyTo"].is_null());
}

/*
    MessageInput via HTTP: authorId mancante diventa stringa vuota (rifiutata poi dal server),
    non un errore di deserializzazione.
*/
#[test]
fn message_input_without_author_deserializes() {
    let input: MessageInput = json::from_str(r#"{"text":"hello"}"#).expect("deserialize");
    assert_eq!(input.author_id, "");
    assert_eq!(input.text.as_deref(), Some("hello"));

    let built = MessageInput::attachment("u1", "img://abc");
    let v = json::to_value(&built).expect("serialize");
    assert_eq!(v, serde_json::json!({ "authorId": "u1", "attachmentRef": "img://abc" }));
}

#[test]
fn connect_query_uses_camel_case() {
    let q: ConnectQuery = json::from_value(serde_json::json!({ "userId": "u1", "after": 3 })).expect("deserialize");
    assert_eq!(q.user_id.as_deref(), Some("u1"));
    assert_eq!(q.after, Some(3));
}

#[test]
fn utils_produce_valid_values() {
    assert!(placevista_core::utils::time::is_rfc3339(&now_timestamp()));
    assert_ne!(new_connection_id(), new_connection_id());
    assert_eq!(new_client_msg_id().len(), 36);
}
