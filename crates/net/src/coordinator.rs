//! Session coordinator
//!
//! A single task owns the [`Session`] and the [`BroadcastRouter`]. Connection
//! handlers, the poll timer, and the HTTP projections talk to it only
//! through [`Command`]s, so every mutation is applied one at a time in
//! arrival order.

use chrono::Utc;
use livepoll_core::{
    ChatRelay, EndedPoll, NewPoll, Participant, PermissionMatrix, Poll, PollLimits, Role,
    Scorecard, Session, SessionAction,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{
    ClientEvent, ErrorPayload, PollUpdate, SendMessage, ServerEvent, StudentAnswered,
    StudentSnapshot, TeacherSnapshot,
};
use crate::router::{Audience, BroadcastRouter, Outbound};
use crate::timer::PollTimer;

/// Depth of the coordinator's command queue
const COMMAND_QUEUE: usize = 256;

/// Messages processed by the coordinator task
#[derive(Debug)]
pub enum Command {
    /// A socket opened; `tx` feeds its writer task
    Connect {
        conn_id: Uuid,
        tx: mpsc::Sender<Outbound>,
    },
    Client {
        conn_id: Uuid,
        event: ClientEvent,
    },
    /// A frame that failed to decode
    Malformed {
        conn_id: Uuid,
        reason: String,
    },
    Disconnect {
        conn_id: Uuid,
    },
    /// Sent by the poll timer
    PollExpired {
        poll_id: Uuid,
    },
    ListPolls {
        reply: oneshot::Sender<Vec<Poll>>,
    },
    ListStudents {
        reply: oneshot::Sender<Vec<Participant>>,
    },
    Scorecard {
        reply: oneshot::Sender<Option<Scorecard>>,
    },
    Health {
        reply: oneshot::Sender<HealthReport>,
    },
    /// Close every connection and stop
    Shutdown,
}

/// Liveness summary served on `/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub connections: usize,
    pub participants: usize,
    pub active_poll: Option<Uuid>,
}

/// Cloneable handle to the coordinator task
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::CoordinatorClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| Error::CoordinatorClosed)
    }

    pub async fn connect(&self, conn_id: Uuid, tx: mpsc::Sender<Outbound>) -> Result<()> {
        self.send(Command::Connect { conn_id, tx }).await
    }

    pub async fn client_event(&self, conn_id: Uuid, event: ClientEvent) -> Result<()> {
        self.send(Command::Client { conn_id, event }).await
    }

    pub async fn malformed(&self, conn_id: Uuid, reason: impl Into<String>) -> Result<()> {
        self.send(Command::Malformed {
            conn_id,
            reason: reason.into(),
        })
        .await
    }

    pub async fn disconnect(&self, conn_id: Uuid) -> Result<()> {
        self.send(Command::Disconnect { conn_id }).await
    }

    /// Archive in creation order, the active poll included
    pub async fn polls(&self) -> Result<Vec<Poll>> {
        self.request(|reply| Command::ListPolls { reply }).await
    }

    pub async fn students(&self) -> Result<Vec<Participant>> {
        self.request(|reply| Command::ListStudents { reply }).await
    }

    /// Grades for the newest poll, `None` before the first one
    pub async fn scorecard(&self) -> Result<Option<Scorecard>> {
        self.request(|reply| Command::Scorecard { reply }).await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.request(|reply| Command::Health { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// Start the coordinator task
pub fn spawn(limits: PollLimits) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let coordinator = Coordinator {
        session: Session::new(limits),
        router: BroadcastRouter::new(),
        timer: PollTimer::new(),
        commands: tx.downgrade(),
    };
    let task = tokio::spawn(coordinator.run(rx));
    (CoordinatorHandle { tx }, task)
}

struct Coordinator {
    session: Session,
    router: BroadcastRouter,
    timer: PollTimer,
    /// Weak so the queue closes once every handle is dropped
    commands: mpsc::WeakSender<Command>,
}

impl Coordinator {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!("Session coordinator started");
        while let Some(command) = rx.recv().await {
            if let Command::Shutdown = command {
                break;
            }
            self.handle(command);
        }

        self.timer.cancel();
        self.router.close_all();
        info!("Session coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { conn_id, tx } => {
                self.router.register(conn_id, tx);
                debug!(conn_id = %conn_id, connections = self.router.len(), "Connection registered");
            }
            Command::Client { conn_id, event } => self.handle_client(conn_id, event),
            Command::Malformed { conn_id, reason } => {
                debug!(conn_id = %conn_id, reason = %reason, "Malformed frame");
                self.router.emit(
                    Audience::Connection(conn_id),
                    &ServerEvent::Error(ErrorPayload::protocol(reason)),
                );
            }
            Command::Disconnect { conn_id } => self.disconnect(conn_id),
            Command::PollExpired { poll_id } => {
                if let Some(ended) = self.session.expire_poll(poll_id, Utc::now()) {
                    self.finish_poll(ended);
                }
            }
            Command::ListPolls { reply } => {
                let _ = reply.send(self.session.polls().to_vec());
            }
            Command::ListStudents { reply } => {
                let _ = reply.send(self.session.participants());
            }
            Command::Scorecard { reply } => {
                let _ = reply.send(self.session.scorecard());
            }
            Command::Health { reply } => {
                let _ = reply.send(HealthReport {
                    status: "ok",
                    connections: self.router.len(),
                    participants: self.session.registry().count(),
                    active_poll: self.session.active_poll().map(|p| p.id),
                });
            }
            Command::Shutdown => {}
        }
    }

    fn handle_client(&mut self, conn_id: Uuid, event: ClientEvent) {
        if !self.router.contains(conn_id) {
            debug!(conn_id = %conn_id, event = event.name(), "Event from closed connection ignored");
            return;
        }

        let name = event.name();
        let result = match event {
            ClientEvent::TeacherJoin => self.teacher_join(conn_id),
            ClientEvent::StudentJoin(req) => self.student_join(conn_id, &req.name),
            ClientEvent::CreatePoll(req) => self.create_poll(conn_id, req.into()),
            ClientEvent::SubmitAnswer(choice) => self.submit_answer(conn_id, choice.option_id),
            ClientEvent::SetCorrectAnswer(choice) => {
                self.set_correct_answer(conn_id, choice.option_id)
            }
            ClientEvent::RemoveStudent(req) => self.remove_student(conn_id, req.student_id),
            ClientEvent::SendMessage(msg) => self.send_message(msg),
        };

        if let Err(err) = result {
            debug!(conn_id = %conn_id, event = name, code = err.code(), error = %err, "Event rejected");
            self.router.emit(
                Audience::Connection(conn_id),
                &ServerEvent::Error(ErrorPayload::from(&err)),
            );
        }
    }

    fn require(&self, conn_id: Uuid, action: SessionAction) -> livepoll_core::Result<()> {
        PermissionMatrix::require(self.router.role(conn_id), action)
    }

    fn teacher_join(&mut self, conn_id: Uuid) -> livepoll_core::Result<()> {
        if self.router.role(conn_id) == Some(Role::Student) {
            return Err(livepoll_core::Error::validation(
                "Already joined as a student",
            ));
        }
        self.router.set_role(conn_id, Role::Teacher);
        info!(conn_id = %conn_id, "Teacher joined");

        let snapshot = TeacherSnapshot {
            current_poll: self.session.current_poll().cloned(),
            students: self.session.participants(),
            polls: self.session.polls().to_vec(),
        };
        self.router.emit(
            Audience::Connection(conn_id),
            &ServerEvent::TeacherConnected(snapshot),
        );
        Ok(())
    }

    fn student_join(&mut self, conn_id: Uuid, name: &str) -> livepoll_core::Result<()> {
        if self.router.role(conn_id) == Some(Role::Teacher) {
            return Err(livepoll_core::Error::validation(
                "Teachers cannot join as students",
            ));
        }
        let now = Utc::now();
        let student = self.session.join(conn_id, name, now)?;
        self.router.set_role(conn_id, Role::Student);

        let snapshot = StudentSnapshot {
            student: student.clone(),
            current_poll: self.session.current_poll().cloned(),
            time_remaining_ms: millis(self.session.time_remaining(now)),
        };
        self.router.emit(
            Audience::Connection(conn_id),
            &ServerEvent::StudentConnected(snapshot),
        );
        self.router
            .emit(Audience::Teachers, &ServerEvent::StudentJoined(student));
        self.router.emit(
            Audience::Teachers,
            &ServerEvent::StudentsUpdated(self.session.participants()),
        );
        Ok(())
    }

    fn create_poll(&mut self, conn_id: Uuid, request: NewPoll) -> livepoll_core::Result<()> {
        self.require(conn_id, SessionAction::CreatePoll)?;
        let opened = self.session.create_poll(&request, Utc::now())?;

        if let Some(previous) = opened.superseded {
            self.finish_poll(previous);
        }

        let poll = opened.poll;
        self.timer
            .arm(poll.id, poll.time_limit(), self.commands.clone());
        let time_remaining_ms = poll.time_limit_ms;
        self.router.emit(
            Audience::Everyone,
            &ServerEvent::PollCreated(PollUpdate {
                poll,
                time_remaining_ms,
            }),
        );
        Ok(())
    }

    fn submit_answer(&mut self, conn_id: Uuid, option_id: Uuid) -> livepoll_core::Result<()> {
        self.require(conn_id, SessionAction::SubmitAnswer)?;
        let now = Utc::now();
        let accepted = self.session.submit_answer(conn_id, option_id, now)?;

        let time_remaining_ms = millis(accepted.poll.remaining(now));
        self.router.emit(
            Audience::Everyone,
            &ServerEvent::PollResultsUpdated(PollUpdate {
                poll: accepted.poll,
                time_remaining_ms,
            }),
        );
        self.router.emit(
            Audience::Teachers,
            &ServerEvent::StudentAnswered(StudentAnswered {
                student_name: accepted.participant.name,
                answer_text: accepted.answer_text,
            }),
        );

        if let Some(ended) = accepted.completed {
            self.finish_poll(ended);
        }
        Ok(())
    }

    fn set_correct_answer(&mut self, conn_id: Uuid, option_id: Uuid) -> livepoll_core::Result<()> {
        self.require(conn_id, SessionAction::SetCorrectAnswer)?;
        let poll = self.session.set_correct_answer(option_id)?;

        let time_remaining_ms = millis(poll.remaining(Utc::now()));
        self.router.emit(
            Audience::Everyone,
            &ServerEvent::PollResultsUpdated(PollUpdate {
                poll,
                time_remaining_ms,
            }),
        );
        Ok(())
    }

    fn remove_student(&mut self, conn_id: Uuid, student_id: Uuid) -> livepoll_core::Result<()> {
        self.require(conn_id, SessionAction::RemoveStudent)?;
        let departure = self
            .session
            .remove_participant(student_id, Utc::now())
            .ok_or(livepoll_core::Error::UnknownParticipant)?;
        info!(conn_id = %student_id, name = %departure.participant.name, "Student removed by teacher");

        self.router.emit(
            Audience::Connection(student_id),
            &ServerEvent::RemovedByTeacher,
        );
        self.router.close(student_id);
        self.router.emit(
            Audience::Teachers,
            &ServerEvent::StudentRemoved(departure.participant),
        );

        if let Some(ended) = departure.completed {
            self.finish_poll(ended);
        }
        Ok(())
    }

    fn send_message(&mut self, msg: SendMessage) -> livepoll_core::Result<()> {
        let chat = ChatRelay::relay(&msg.message, &msg.sender_name, msg.sender_type, Utc::now())?;
        debug!(sender = %chat.sender_name, sender_type = %chat.sender_type, "Chat message relayed");
        self.router
            .emit(Audience::Everyone, &ServerEvent::NewMessage(chat));
        Ok(())
    }

    fn disconnect(&mut self, conn_id: Uuid) {
        let role = self.router.unregister(conn_id);
        let Some(departure) = self.session.remove_participant(conn_id, Utc::now()) else {
            debug!(conn_id = %conn_id, role = ?role, "Connection closed");
            return;
        };

        info!(conn_id = %conn_id, name = %departure.participant.name, "Student left");
        self.router.emit(
            Audience::Teachers,
            &ServerEvent::StudentLeft(departure.participant),
        );
        if let Some(ended) = departure.completed {
            self.finish_poll(ended);
        }
    }

    /// Cancel the timer and announce a poll that just ended
    fn finish_poll(&mut self, ended: EndedPoll) {
        if self.timer.poll_id() == Some(ended.poll.id) {
            self.timer.cancel();
        } else if self.timer.poll_id().is_some() {
            warn!(poll_id = %ended.poll.id, "Ended poll does not own the armed timer");
        }
        info!(
            poll_id = %ended.poll.id,
            question = %ended.poll.question,
            reason = %ended.reason,
            votes = ended.poll.total_votes(),
            "Poll ended"
        );
        self.router.emit(
            Audience::Everyone,
            &ServerEvent::PollEnded(crate::protocol::PollEnded {
                poll: ended.poll,
                results: ended.results,
            }),
        );
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}
