//! Command dispatch over the session registry and controller

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{Command, Request, Response, SessionParams};
use crate::collab::{Controller, Reply};
use crate::session::{Outline, Phase, SessionGuard, SessionRegistry, SessionState};

/// Routes decoded commands to the controller
pub struct Dispatcher {
    controller: Arc<Controller>,
    registry: Arc<SessionRegistry>,
}

impl Dispatcher {
    pub fn new(controller: Arc<Controller>, registry: Arc<SessionRegistry>) -> Self {
        Self { controller, registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handle one raw request line
    pub async fn dispatch_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line.trim()) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "dispatch_line: malformed request");
                Response::error(format!("Malformed request: {e}"))
            }
        }
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let command = match request.command() {
            Ok(command) => command,
            Err(message) => {
                warn!(kind = %request.kind, %message, "dispatch: rejected");
                return Response::error(message);
            }
        };
        info!(kind = %request.kind, session = ?request.session_id, "dispatch: called");

        if let Command::InitializeSession(params) | Command::GenerateOutline(params) = &command {
            if let Err(message) = params.validate() {
                warn!(kind = %request.kind, %message, "dispatch: invalid session parameters");
                return Response::error(message);
            }
        }

        if !command.is_session_command() {
            return match command {
                Command::GenerateOutline(params) => self.generate_outline(params).await,
                _ => Response::success(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),
            };
        }

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        debug!(%session_id, "dispatch: session command");

        match command {
            Command::EndSession => {
                let ended = self.registry.end(&session_id).await;
                Response::success(json!({"sessionId": session_id, "ended": ended}))
            }
            command => self.session_command(&session_id, command).await,
        }
    }

    async fn session_command(&self, session_id: &str, command: Command) -> Response {
        let creates = matches!(command, Command::InitializeSession(_) | Command::ProcessInput { .. });
        let guard = if creates {
            self.registry.acquire(session_id).await
        } else {
            self.registry.acquire_existing(session_id).await
        };
        let mut guard = match guard {
            Ok(guard) => guard,
            Err(e) => return Response::error(e.to_string()),
        };

        match command {
            Command::InitializeSession(params) => {
                let reply = self
                    .controller
                    .initialize(&mut guard, &params.topic, &params.article_type, params.word_count, params.settings)
                    .await;
                Response::success(session_data(&guard, &reply))
            }
            Command::ProcessInput { input } => {
                if input.trim().is_empty() {
                    return Response::error("Please provide some input.");
                }
                let reply = self.controller.handle(&mut guard, &input).await;
                Response::success(session_data(&guard, &reply))
            }
            Command::AutopilotStep => match self.controller.autopilot_step(&mut guard).await {
                Ok(Some(turn)) => {
                    let mut data = session_data(&guard, &turn.reply);
                    data["answer"] = Value::String(turn.answer);
                    Response::success(data)
                }
                Ok(None) => Response::error("Autopilot is only available while an interview question is pending"),
                Err(e) => Response::error(format!("Could not generate an answer, try again: {e}")),
            },
            Command::GetSession => match serde_json::to_value(&*guard) {
                Ok(session) => Response::success(json!({
                    "sessionId": guard.id,
                    "state": guard.phase().as_str(),
                    "context": guard.context(),
                    "session": session,
                })),
                Err(e) => Response::error(format!("Failed to serialize session: {e}")),
            },
            Command::GetOutline => Response::success(json!({"sessionId": guard.id, "outline": guard.outline})),
            Command::UpdateOutline { outline } => update_outline(&mut guard, outline),
            Command::GetDraft => Response::success(json!({"sessionId": guard.id, "draft": guard.draft})),
            Command::UpdateDraft { draft } => {
                if guard.draft.is_none() {
                    return Response::error("Session has no draft yet");
                }
                guard.draft = Some(draft);
                guard.touch();
                Response::success(json!({"sessionId": guard.id, "draft": guard.draft}))
            }
            Command::GetMessages => Response::success(json!({"sessionId": guard.id, "messages": guard.transcript})),
            Command::GenerateOutline(_) | Command::Ping | Command::EndSession => {
                Response::error("Command does not address a session")
            }
        }
    }

    async fn generate_outline(&self, params: SessionParams) -> Response {
        match self
            .controller
            .generate_outline(&params.topic, &params.article_type, params.word_count, params.settings)
            .await
        {
            Ok(extraction) => {
                let fallback = extraction.is_fallback();
                let outline = extraction.into_inner();
                Response::success(json!({
                    "outline": outline,
                    "fallback": fallback,
                    "state": Phase::OutlineReview.as_str(),
                    "response": self.controller.presenter().outline_proposal(&params.article_type, &outline),
                    "context": {
                        "outline": outline,
                        "topic": params.topic,
                        "articleType": params.article_type,
                        "wordCount": params.word_count,
                    },
                }))
            }
            Err(e) => Response::error(format!("Could not generate an outline, try again: {e}")),
        }
    }
}

fn update_outline(guard: &mut SessionGuard, outline: Outline) -> Response {
    if guard.phase() > Phase::OutlineReview {
        return Response::error(format!("Outline is fixed once the {} phase starts", Phase::Interview));
    }
    guard.outline = Some(outline);
    guard.touch();
    Response::success(json!({"sessionId": guard.id, "outline": guard.outline}))
}

fn session_data(state: &SessionState, reply: &Reply) -> Value {
    json!({
        "sessionId": state.id,
        "response": reply.message,
        "state": reply.phase.as_str(),
        "terminate": reply.terminate,
        "context": state.context(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InterviewPolicy, Locale, presenter_for};
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{GenerationSettings, Generator};
    use crate::prompts::PromptBuilder;

    fn dispatcher(responses: Vec<&str>) -> Dispatcher {
        let generator = Generator::new(
            Arc::new(MockLlmClient::new(responses)),
            GenerationSettings {
                stream: false,
                ..GenerationSettings::default()
            },
        );
        let controller = Controller::new(
            generator,
            PromptBuilder::embedded(),
            InterviewPolicy::default(),
            presenter_for(Locale::En),
        );
        Dispatcher::new(Arc::new(controller), Arc::new(SessionRegistry::default()))
    }

    fn data(response: &Response) -> &Value {
        response.data().unwrap_or_else(|| panic!("expected success, got {response:?}"))
    }

    #[tokio::test]
    async fn test_ping() {
        let response = dispatcher(vec![]).dispatch_line(r#"{"type":"PING"}"#).await;
        assert_eq!(data(&response)["pong"], true);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown() {
        let d = dispatcher(vec![]);
        assert!(!d.dispatch_line("not json").await.is_success());
        assert_eq!(
            d.dispatch_line(r#"{"type":"NOPE"}"#).await,
            Response::error("Unknown command type: NOPE")
        );
        assert!(d.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_process_input_assigns_session_id() {
        let d = dispatcher(vec![]);
        let response = d.dispatch_line(r#"{"type":"PROCESS_INPUT","data":{"input":"hi"}}"#).await;
        let data = data(&response);
        assert_eq!(data["state"], "TOPIC_SELECTION");
        assert!(data["response"].as_str().unwrap().starts_with("Welcome"));

        let id = data["sessionId"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(d.registry().ids().await, vec![id.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let d = dispatcher(vec![]);
        let response = d
            .dispatch_line(r#"{"sessionId":"s","type":"PROCESS_INPUT","data":{"input":"   "}}"#)
            .await;
        assert_eq!(response, Response::error("Please provide some input."));
    }

    #[tokio::test]
    async fn test_initialize_then_update_outline() {
        let d = dispatcher(vec![r#"{"Start": ["a"], "End": []}"#]);
        let init = d
            .dispatch_line(
                r#"{"sessionId":"s1","type":"INITIALIZE_SESSION","data":{"topic":"Tea","articleType":"article","wordCount":500}}"#,
            )
            .await;
        let init = data(&init);
        assert_eq!(init["state"], "OUTLINE_REVIEW");
        assert_eq!(init["context"]["targetLength"], 500);
        assert!(init["context"]["outline"]["Start"].is_array());

        let update = d
            .dispatch_line(r#"{"sessionId":"s1","type":"UPDATE_OUTLINE","data":{"outline":{"Only":[]}}}"#)
            .await;
        assert!(update.is_success());

        let outline = d.dispatch_line(r#"{"sessionId":"s1","type":"GET_OUTLINE"}"#).await;
        assert_eq!(data(&outline)["outline"], serde_json::json!({"Only": []}));
    }

    #[tokio::test]
    async fn test_reinitialize_restarts_interview() {
        let d = dispatcher(vec![
            r#"{"A": [], "B": []}"#,
            "QUESTION: Why tea?",
            r#"{"X": [], "Y": [], "Z": []}"#,
        ]);
        d.dispatch_line(r#"{"sessionId":"s1","type":"INITIALIZE_SESSION","data":{"topic":"Tea","wordCount":500}}"#)
            .await;
        let started = d
            .dispatch_line(r#"{"sessionId":"s1","type":"PROCESS_INPUT","data":{"input":"yes"}}"#)
            .await;
        assert_eq!(data(&started)["state"], "INTERVIEW");

        let again = d
            .dispatch_line(
                r#"{"sessionId":"s1","type":"INITIALIZE_SESSION","data":{"topic":"Coffee","wordCount":700}}"#,
            )
            .await;
        let again = data(&again);
        assert_eq!(again["state"], "OUTLINE_REVIEW");
        assert_eq!(again["context"]["currentSection"], Value::Null);
        assert_eq!(again["context"]["interviewCount"], 0);
        assert_eq!(again["context"]["outline"], serde_json::json!({"X": [], "Y": [], "Z": []}));
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let d = dispatcher(vec![r#"{"A": []}"#]);
        let init = d
            .dispatch_line(r#"{"sessionId":"s1","type":"INITIALIZE_SESSION","data":{"topic":"Tea","wordCount":0}}"#)
            .await;
        assert_eq!(init, Response::error("wordCount must be a positive integer"));
        assert!(d.registry().is_empty().await);

        let outline = d
            .dispatch_line(r#"{"type":"GENERATE_OUTLINE","data":{"topic":"Tea","targetLength":0}}"#)
            .await;
        assert_eq!(outline, Response::error("wordCount must be a positive integer"));

        let blank = d
            .dispatch_line(r#"{"type":"GENERATE_OUTLINE","data":{"topic":"  "}}"#)
            .await;
        assert_eq!(blank, Response::error("topic must not be empty"));
    }

    #[tokio::test]
    async fn test_queries_require_existing_session() {
        let d = dispatcher(vec![]);
        let response = d.dispatch_line(r#"{"sessionId":"ghost","type":"GET_DRAFT"}"#).await;
        assert_eq!(response, Response::error("session 'ghost' not found"));
        assert!(d.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_draft_needs_draft() {
        let d = dispatcher(vec![]);
        d.dispatch_line(r#"{"sessionId":"s","type":"PROCESS_INPUT","data":{"input":"hi"}}"#).await;
        let response = d
            .dispatch_line(r#"{"sessionId":"s","type":"UPDATE_DRAFT","data":{"draft":"x"}}"#)
            .await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_busy_session_rejected() {
        let d = dispatcher(vec![]);
        d.dispatch_line(r#"{"sessionId":"s","type":"PROCESS_INPUT","data":{"input":"hi"}}"#).await;

        let _held = d.registry().acquire("s").await.unwrap();
        let response = d.dispatch_line(r#"{"sessionId":"s","type":"GET_SESSION"}"#).await;
        match response {
            Response::Error { message } => assert!(message.contains("busy")),
            other => panic!("expected busy error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_session() {
        let d = dispatcher(vec![]);
        d.dispatch_line(r#"{"sessionId":"s","type":"PROCESS_INPUT","data":{"input":"hi"}}"#).await;

        let ended = d.dispatch_line(r#"{"sessionId":"s","type":"END_SESSION"}"#).await;
        assert_eq!(data(&ended)["ended"], true);
        let again = d.dispatch_line(r#"{"sessionId":"s","type":"END_SESSION"}"#).await;
        assert_eq!(data(&again)["ended"], false);
    }

    #[tokio::test]
    async fn test_generate_outline_stateless() {
        let d = dispatcher(vec!["nothing useful"]);
        let response = d
            .dispatch_line(r#"{"type":"GENERATE_OUTLINE","data":{"topic":"Trains","articleType":"report","wordCount":900}}"#)
            .await;
        let data = data(&response);
        assert_eq!(data["fallback"], true);
        assert!(data["outline"]["Executive Summary"].is_array());
        assert_eq!(data["context"]["wordCount"], 900);
        assert!(d.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_messages_transcript() {
        let d = dispatcher(vec![]);
        d.dispatch_line(r#"{"sessionId":"s","type":"PROCESS_INPUT","data":{"input":"hi"}}"#).await;
        let response = d.dispatch_line(r#"{"sessionId":"s","type":"GET_MESSAGES"}"#).await;
        let messages = data(&response)["messages"].as_array().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "hi");
    }
}
