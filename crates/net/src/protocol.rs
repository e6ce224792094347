//! Network protocol event types
//!
//! Every event is one JSON text frame on the connection's WebSocket:
//! `{"event": "<name>", "data": <payload>}`. Events without a payload omit
//! `data`.

use livepoll_core::{ChatMessage, NewPoll, OptionResult, Participant, Poll, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Subscribe this connection to the teacher audience
    TeacherJoin,
    StudentJoin(StudentJoin),
    CreatePoll(CreatePoll),
    SubmitAnswer(OptionChoice),
    SetCorrectAnswer(OptionChoice),
    RemoveStudent(RemoveStudent),
    SendMessage(SendMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentJoin {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
    /// Seconds
    pub time_limit: Option<u64>,
    pub correct_answer_index: Option<usize>,
}

impl From<CreatePoll> for NewPoll {
    fn from(req: CreatePoll) -> Self {
        NewPoll {
            question: req.question,
            options: req.options,
            time_limit_secs: req.time_limit,
            correct_answer_index: req.correct_answer_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChoice {
    pub option_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveStudent {
    pub student_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub message: String,
    pub sender_name: String,
    pub sender_type: Role,
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    TeacherConnected(TeacherSnapshot),
    StudentConnected(StudentSnapshot),
    PollCreated(PollUpdate),
    PollResultsUpdated(PollUpdate),
    PollEnded(PollEnded),
    StudentJoined(Participant),
    /// Full roster
    StudentsUpdated(Vec<Participant>),
    StudentLeft(Participant),
    StudentRemoved(Participant),
    /// Teacher audience only
    StudentAnswered(StudentAnswered),
    NewMessage(ChatMessage),
    /// Sent right before the server closes the connection
    RemovedByTeacher,
    Error(ErrorPayload),
}

/// Initial state for a teacher connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSnapshot {
    pub current_poll: Option<Poll>,
    pub students: Vec<Participant>,
    /// Archive in creation order
    pub polls: Vec<Poll>,
}

/// Initial state for a newly admitted student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    pub student: Participant,
    pub current_poll: Option<Poll>,
    pub time_remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdate {
    pub poll: Poll,
    pub time_remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollEnded {
    pub poll: Poll,
    pub results: Vec<OptionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswered {
    pub student_name: String,
    pub answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

impl ErrorPayload {
    /// Error for a frame that could not be decoded
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: "PROTOCOL_ERROR".into(),
        }
    }
}

impl From<&livepoll_core::Error> for ErrorPayload {
    fn from(err: &livepoll_core::Error) -> Self {
        Self {
            message: err.to_string(),
            code: err.code().into(),
        }
    }
}

impl ClientEvent {
    /// Deserialize an event from a text frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Decode an inbound frame, reporting failures as protocol errors
    pub fn decode(text: &str) -> crate::Result<Self> {
        Self::from_json(text).map_err(|e| Error::Protocol(format!("Invalid event: {e}")))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::TeacherJoin => "teacher-join",
            ClientEvent::StudentJoin(_) => "student-join",
            ClientEvent::CreatePoll(_) => "create-poll",
            ClientEvent::SubmitAnswer(_) => "submit-answer",
            ClientEvent::SetCorrectAnswer(_) => "set-correct-answer",
            ClientEvent::RemoveStudent(_) => "remove-student",
            ClientEvent::SendMessage(_) => "send-message",
        }
    }
}

impl ServerEvent {
    /// Serialize event to a text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::TeacherConnected(_) => "teacher-connected",
            ServerEvent::StudentConnected(_) => "student-connected",
            ServerEvent::PollCreated(_) => "poll-created",
            ServerEvent::PollResultsUpdated(_) => "poll-results-updated",
            ServerEvent::PollEnded(_) => "poll-ended",
            ServerEvent::StudentJoined(_) => "student-joined",
            ServerEvent::StudentsUpdated(_) => "students-updated",
            ServerEvent::StudentLeft(_) => "student-left",
            ServerEvent::StudentRemoved(_) => "student-removed",
            ServerEvent::StudentAnswered(_) => "student-answered",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::RemovedByTeacher => "removed-by-teacher",
            ServerEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_teacher_join_without_data() {
        let event = ClientEvent::from_json(r#"{"event":"teacher-join"}"#).unwrap();
        assert_eq!(event, ClientEvent::TeacherJoin);
    }

    #[test]
    fn test_parse_create_poll() {
        let event = ClientEvent::from_json(
            r#"{"event":"create-poll","data":{"question":"Q?","options":["Yes","No"],"timeLimit":30,"correctAnswerIndex":0}}"#,
        )
        .unwrap();

        match event {
            ClientEvent::CreatePoll(req) => {
                let poll: NewPoll = req.into();
                assert_eq!(poll.question, "Q?");
                assert_eq!(poll.options, ["Yes", "No"]);
                assert_eq!(poll.time_limit_secs, Some(30));
                assert_eq!(poll.correct_answer_index, Some(0));
            }
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_create_poll_optional_fields() {
        let event = ClientEvent::from_json(
            r#"{"event":"create-poll","data":{"question":"Q?","options":["A","B"],"correctAnswerIndex":null}}"#,
        )
        .unwrap();
        let ClientEvent::CreatePoll(req) = event else {
            panic!("Wrong event");
        };
        assert!(req.time_limit.is_none());
        assert!(req.correct_answer_index.is_none());
    }

    #[test]
    fn test_parse_payload_events() {
        let id = Uuid::new_v4();
        let cases = [
            (
                json!({"event": "submit-answer", "data": {"optionId": id}}),
                ClientEvent::SubmitAnswer(OptionChoice { option_id: id }),
            ),
            (
                json!({"event": "set-correct-answer", "data": {"optionId": id}}),
                ClientEvent::SetCorrectAnswer(OptionChoice { option_id: id }),
            ),
            (
                json!({"event": "remove-student", "data": {"studentId": id}}),
                ClientEvent::RemoveStudent(RemoveStudent { student_id: id }),
            ),
            (
                json!({"event": "student-join", "data": {"name": "Alice"}}),
                ClientEvent::StudentJoin(StudentJoin { name: "Alice".into() }),
            ),
            (
                json!({"event": "send-message", "data": {"message": "hi", "senderName": "Alice", "senderType": "student"}}),
                ClientEvent::SendMessage(SendMessage {
                    message: "hi".into(),
                    sender_name: "Alice".into(),
                    sender_type: Role::Student,
                }),
            ),
        ];

        for (value, expected) in cases {
            let parsed = ClientEvent::from_json(&value.to_string()).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.name(), value["event"]);
        }
    }

    #[test]
    fn test_malformed_events_rejected() {
        for text in [
            "not json",
            r#"{"event":"dance"}"#,
            r#"{"event":"student-join"}"#,
            r#"{"event":"submit-answer","data":{"optionId":"not-a-uuid"}}"#,
            r#"{"event":"send-message","data":{"message":"hi","senderName":"A","senderType":"parent"}}"#,
            r#"{"event":"create-poll","data":{"question":"Q","options":["A","B"],"timeLimit":-5}}"#,
        ] {
            assert!(ClientEvent::from_json(text).is_err(), "{text}");
        }
    }

    #[test]
    fn test_decode_reports_protocol_error() {
        let err = ClientEvent::decode(r#"{"event":"dance"}"#).unwrap_err();
        assert!(matches!(&err, Error::Protocol(reason) if reason.starts_with("Invalid event")));
        assert!(err.to_string().starts_with("Protocol error: Invalid event"));

        let event = ClientEvent::decode(r#"{"event":"teacher-join"}"#).unwrap();
        assert_eq!(event, ClientEvent::TeacherJoin);
    }

    #[test]
    fn test_server_event_shape() {
        let event = ServerEvent::StudentAnswered(StudentAnswered {
            student_name: "Alice".into(),
            answer_text: "Yes".into(),
        });
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "student-answered", "data": {"studentName": "Alice", "answerText": "Yes"}})
        );

        let value: serde_json::Value =
            serde_json::from_str(&ServerEvent::RemovedByTeacher.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "removed-by-teacher"}));
    }

    #[test]
    fn test_error_payload_from_core_error() {
        let payload = ErrorPayload::from(&livepoll_core::Error::PollInProgress);
        assert_eq!(payload.code, "POLL_IN_PROGRESS");
        assert!(payload.message.starts_with("Cannot create new poll"));

        let event = ServerEvent::Error(payload);
        let decoded = ServerEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.name(), "error");
    }
}
