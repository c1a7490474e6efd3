//! # Effect Runner
//!
//! Runs the effects returned by `core::update` as tokio tasks. Every task
//! reports back by sending an `Action` through the event loop's channel.
//!
//! Actions are tagged with the generation of the app they belong to. After
//! switching apps the loop bumps its generation and drops anything still
//! arriving from tasks of the previous app.

use std::sync::{Arc, mpsc};

use log::{debug, info, warn};
use tokio::task::AbortHandle;

use crate::api::{ApiError, ChatApi, ChatEvent, SendMessageRequest};
use crate::core::action::{Action, Effect};
use crate::core::state::App;

/// An action plus the generation of the app that produced it.
#[derive(Debug)]
pub struct Envelope {
    pub generation: u64,
    pub action: Action,
}

/// Sending half of the action channel, bound to one app generation.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Envelope>,
    generation: u64,
}

impl Dispatcher {
    pub fn new(tx: mpsc::Sender<Envelope>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the event loop is gone.
    pub fn send(&self, action: Action) -> bool {
        let envelope = Envelope {
            generation: self.generation,
            action,
        };
        if self.tx.send(envelope).is_err() {
            warn!("Failed to send action: receiver dropped");
            return false;
        }
        true
    }
}

/// Whether the event loop should keep going after running effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Executes effects against one Dify app.
pub struct EffectRunner {
    api: Arc<dyn ChatApi>,
    dispatcher: Dispatcher,
    /// Abort handles for the streaming request (used by Escape-to-cancel)
    active_request: Vec<AbortHandle>,
}

impl EffectRunner {
    pub fn new(api: Arc<dyn ChatApi>, dispatcher: Dispatcher) -> Self {
        Self {
            api,
            dispatcher,
            active_request: Vec::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn has_active_request(&self) -> bool {
        !self.active_request.is_empty()
    }

    /// Abort the streaming request, if any.
    pub fn abort_request(&mut self) {
        if !self.active_request.is_empty() {
            info!("Aborting active request");
        }
        for handle in self.active_request.drain(..) {
            handle.abort();
        }
    }

    pub fn run(&mut self, app: &App, effects: Vec<Effect>) -> Flow {
        let mut flow = Flow::Continue;
        for effect in effects {
            debug!("Running effect: {:?}", effect);
            match effect {
                Effect::Quit => flow = Flow::Quit,
                Effect::AbortRequest => self.abort_request(),
                Effect::SendMessage { request, body } => {
                    self.abort_request();
                    self.active_request = self.spawn_send(request, body);
                }
                Effect::FetchConversations => self.spawn_fetch_conversations(app.conversation_limit),
                Effect::FetchHistory(conversation_id) => self.spawn_fetch_history(conversation_id),
                Effect::FetchSuggestions(message_id) => self.spawn_fetch_suggestions(message_id),
                Effect::StopTask {
                    task_id,
                    conversation_id,
                } => self.spawn_stop_task(task_id, conversation_id),
                Effect::SendFeedback(request) => {
                    let conversation_id = app.active_conversation_id().map(str::to_string);
                    let api = self.api.clone();
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        match api.feedback_message(request).await {
                            Ok(()) => {
                                if let Some(conversation_id) = conversation_id {
                                    dispatcher.send(Action::FeedbackSent { conversation_id });
                                }
                            }
                            Err(e) => {
                                dispatcher.send(Action::RequestFailed(format!(
                                    "Feedback failed: {e}"
                                )));
                            }
                        }
                    });
                }
                Effect::RenameConversation(request) => {
                    let api = self.api.clone();
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        let conversation_id = request.conversation_id.clone();
                        let requested = request.name.clone().unwrap_or_default();
                        match api.rename_conversation(request).await {
                            Ok(item) => {
                                let name = if item.name.is_empty() {
                                    requested
                                } else {
                                    item.name
                                };
                                dispatcher.send(Action::ConversationRenamed {
                                    conversation_id,
                                    name,
                                });
                            }
                            Err(e) => {
                                dispatcher
                                    .send(Action::RequestFailed(format!("Rename failed: {e}")));
                            }
                        }
                    });
                }
                Effect::DeleteConversation(conversation_id) => {
                    let api = self.api.clone();
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        match api.delete_conversation(&conversation_id).await {
                            Ok(()) => {
                                dispatcher.send(Action::ConversationDeleted(conversation_id));
                            }
                            Err(e) => {
                                dispatcher
                                    .send(Action::RequestFailed(format!("Delete failed: {e}")));
                            }
                        }
                    });
                }
                Effect::UploadFile(path) => {
                    let api = self.api.clone();
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        info!("Uploading {}", path.display());
                        match api.upload_file(&path).await {
                            Ok(file) => dispatcher.send(Action::FileUploaded(file)),
                            Err(e) => dispatcher.send(Action::UploadFailed(e.to_string())),
                        };
                    });
                }
            }
        }
        flow
    }

    fn spawn_fetch_conversations(&self, limit: Option<u32>) {
        let api = self.api.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            match api.get_conversation_list(limit).await {
                Ok(list) => dispatcher.send(Action::ConversationsLoaded(list.data)),
                Err(e) => dispatcher.send(Action::RequestFailed(format!(
                    "Loading conversations failed: {e}"
                ))),
            };
        });
    }

    fn spawn_fetch_history(&self, conversation_id: String) {
        let api = self.api.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            match api.get_conversation_history(&conversation_id).await {
                Ok(history) => dispatcher.send(Action::HistoryLoaded {
                    conversation_id,
                    items: history.data,
                }),
                Err(e) => dispatcher.send(Action::RequestFailed(format!(
                    "Loading history failed: {e}"
                ))),
            };
        });
    }

    fn spawn_fetch_suggestions(&self, message_id: String) {
        let api = self.api.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            match api.get_next_suggestions(&message_id).await {
                Ok(suggestions) => {
                    dispatcher.send(Action::SuggestionsLoaded {
                        message_id,
                        suggestions,
                    });
                }
                // Suggestions are optional; a failure is not worth an error line
                Err(e) => warn!("Fetching suggestions for {} failed: {}", message_id, e),
            }
        });
    }

    fn spawn_stop_task(&self, task_id: String, conversation_id: String) {
        let api = self.api.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = api.stop_task(&task_id).await {
                warn!("Stopping task {} failed: {}", task_id, e);
            }
            // Refresh either way so the view matches what the server kept
            dispatcher.send(Action::TaskStopped { conversation_id });
        });
    }

    /// Start the streaming request. Returns abort handles for both the
    /// request task and the forwarding task.
    fn spawn_send(&self, request: u64, body: SendMessageRequest) -> Vec<AbortHandle> {
        info!("Spawning chat request {}", request);

        let api = self.api.clone();
        let (chunk_tx, mut chunk_rx) = tokio::sync::mpsc::channel::<ChatEvent>(100);

        let stream_handle = tokio::spawn(async move { api.send_message(body, chunk_tx).await });
        let stream_abort = stream_handle.abort_handle();

        let dispatcher = self.dispatcher.clone();
        let forward_handle = tokio::spawn(async move {
            let mut forwarded = 0usize;
            while let Some(event) = chunk_rx.recv().await {
                forwarded += 1;
                if !dispatcher.send(Action::Stream { request, event }) {
                    return;
                }
            }

            // Channel closed: the request task has finished
            let action = match stream_handle.await {
                Ok(Ok(())) => Action::ResponseDone { request },
                Ok(Err(e)) => Action::ResponseFailed {
                    request,
                    error: describe(&e),
                },
                Err(e) if e.is_cancelled() => {
                    debug!("Stream task cancelled after {} events", forwarded);
                    return;
                }
                Err(e) => Action::ResponseFailed {
                    request,
                    error: format!("Request task failed: {e}"),
                },
            };
            info!("Stream finished: {} events forwarded", forwarded);
            dispatcher.send(action);
        });

        vec![stream_abort, forward_handle.abort_handle()]
    }
}

fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Api { message, .. } if !message.is_empty() => message.clone(),
        other => other.to_string(),
    }
}

/// Load app info, meta and parameters, then the conversation list. When
/// `initial_conversation` is given it is selected before the list arrives
/// so the first conversation doesn't win.
pub fn spawn_boot(
    api: Arc<dyn ChatApi>,
    dispatcher: Dispatcher,
    conversation_limit: Option<u32>,
    initial_conversation: Option<String>,
) -> AbortHandle {
    tokio::spawn(async move {
        info!("Loading app for user {}", api.user());
        let (info, meta, parameters) = tokio::join!(
            api.get_app_info(),
            api.get_app_meta(),
            api.get_app_parameters()
        );
        let loaded = match (info, parameters) {
            (Ok(info), Ok(parameters)) => {
                let meta = meta
                    .inspect_err(|e| warn!("Loading app meta failed: {}", e))
                    .ok();
                Action::AppLoaded {
                    info,
                    meta,
                    parameters,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                dispatcher.send(Action::LoadFailed(describe(&e)));
                return;
            }
        };
        if !dispatcher.send(loaded) {
            return;
        }

        if let Some(id) = initial_conversation {
            dispatcher.send(Action::SelectConversation(id));
        }
        match api.get_conversation_list(conversation_limit).await {
            Ok(list) => dispatcher.send(Action::ConversationsLoaded(list.data)),
            Err(e) => dispatcher.send(Action::LoadFailed(describe(&e))),
        };
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ConversationItem, FeedbackRequest, Rating};
    use crate::test_support::{NoopApi, test_app};
    use std::time::Duration;

    fn channel() -> (Dispatcher, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel();
        (Dispatcher::new(tx, 7), rx)
    }

    fn next(rx: &mpsc::Receiver<Envelope>) -> Envelope {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("expected an action")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_task_reports_task_stopped() {
        let (dispatcher, rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(NoopApi), dispatcher);
        let app = test_app();

        let flow = runner.run(
            &app,
            vec![Effect::StopTask {
                task_id: "t1".into(),
                conversation_id: "c1".into(),
            }],
        );
        assert_eq!(flow, Flow::Continue);

        let envelope = next(&rx);
        assert_eq!(envelope.generation, 7);
        match envelope.action {
            Action::TaskStopped { conversation_id } => assert_eq!(conversation_id, "c1"),
            other => panic!("expected TaskStopped, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_feedback_reports_active_conversation() {
        let (dispatcher, rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(NoopApi), dispatcher);
        let mut app = test_app();
        app.conversations.active_id = Some("c9".into());

        runner.run(
            &app,
            vec![Effect::SendFeedback(FeedbackRequest {
                message_id: "m1".into(),
                rating: Some(Rating::Like),
                content: String::new(),
            })],
        );

        match next(&rx).action {
            Action::FeedbackSent { conversation_id } => assert_eq!(conversation_id, "c9"),
            other => panic!("expected FeedbackSent, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_message_finishes_with_response_done() {
        let (dispatcher, rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(NoopApi), dispatcher);
        let app = test_app();

        runner.run(
            &app,
            vec![Effect::SendMessage {
                request: 7,
                body: SendMessageRequest {
                    query: "hi".into(),
                    user: "test-user".into(),
                    ..Default::default()
                },
            }],
        );
        assert!(runner.has_active_request());
        assert!(matches!(next(&rx).action, Action::ResponseDone { request: 7 }));

        runner.run(&app, vec![Effect::AbortRequest]);
        assert!(!runner.has_active_request());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quit_effect_stops_loop() {
        let (dispatcher, _rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(NoopApi), dispatcher);
        assert_eq!(runner.run(&test_app(), vec![Effect::Quit]), Flow::Quit);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_boot_loads_app_then_conversations() {
        let (dispatcher, rx) = channel();
        spawn_boot(Arc::new(NoopApi), dispatcher, Some(20), Some("c1".into()));

        assert!(matches!(next(&rx).action, Action::AppLoaded { .. }));
        match next(&rx).action {
            Action::SelectConversation(id) => assert_eq!(id, "c1"),
            other => panic!("expected SelectConversation, got {other:?}"),
        }
        assert!(matches!(next(&rx).action, Action::ConversationsLoaded(items) if items.is_empty()));
    }

    #[test]
    fn test_dispatcher_reports_closed_channel() {
        let (dispatcher, rx) = channel();
        drop(rx);
        assert!(!dispatcher.send(Action::ConversationsLoaded(Vec::<ConversationItem>::new())));
    }
}
