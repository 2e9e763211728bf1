//! RTM websocket session
//!
//! One reader loop, one writer task. Each addressed message is handled on its
//! own task; replies come back over a channel so the writer is the only thing
//! touching the socket sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::web::SlackWebClient;
use super::{is_addressed_to, Message};
use crate::dispatcher::Dispatcher;
use crate::error::BotError;

const OUTBOUND_QUEUE: usize = 256;

/// Monotonic ids for outbound frames
#[derive(Debug, Default)]
pub struct MessageIdSequence(AtomicU64);

impl MessageIdSequence {
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// A connected RTM session
pub struct RtmSession {
    bot_user_id: String,
    bot_name: String,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RtmSession {
    /// Start RTM and open its websocket
    pub async fn connect(web: &SlackWebClient, rtm_connect_url: &str) -> Result<Self, BotError> {
        let rtm = web.rtm_connect(rtm_connect_url).await?;

        let (socket, _) = connect_async(rtm.url.as_str())
            .await
            .map_err(|e| BotError::Chat(format!("failed to dial websocket, err={}", e)))?;

        info!(bot_user = %rtm.bot.id, bot_name = %rtm.bot.name, "Connected to Slack RTM");
        Ok(Self {
            bot_user_id: rtm.bot.id,
            bot_name: rtm.bot.name,
            socket,
        })
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Read frames until the socket closes, dispatching addressed messages
    ///
    /// A failing command only produces an error reply; this returns only when
    /// the connection itself is gone.
    pub async fn run(self, dispatcher: Arc<Dispatcher>) -> Result<(), BotError> {
        let bot_user_id = self.bot_user_id;
        let (mut sink, mut stream) = self.socket.split();
        let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

        let writer = tokio::spawn(async move {
            let ids = MessageIdSequence::default();
            while let Some(mut reply) = reply_rx.recv().await {
                reply.id = ids.next_id();
                debug!(id = reply.id, channel = %reply.channel, "Responding");

                let payload = match serde_json::to_string(&reply) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(error = %e, "Failed to encode reply");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(payload)).await {
                    error!(error = %e, "Failed to send reply");
                    break;
                }
            }
        });

        info!("Slackbot listening for messages to process...");
        let outcome = loop {
            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => break Err(BotError::Chat(format!("websocket read failed, err={}", e))),
                None => break Err(BotError::Chat("websocket stream ended".to_string())),
            };

            let text = match frame {
                Frame::Text(text) => text,
                Frame::Close(reason) => {
                    break Err(BotError::Chat(format!("websocket closed: {:?}", reason)))
                }
                _ => continue,
            };

            let msg: Message = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "Failed to read message sent to slackbot");
                    continue;
                }
            };

            if !is_addressed_to(&msg, &bot_user_id) {
                trace!(message = %msg, "Ignoring message");
                continue;
            }

            let dispatcher = Arc::clone(&dispatcher);
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let reply = dispatcher.reply(&msg).await;
                if reply_tx.send(reply).await.is_err() {
                    warn!(message = %msg, "Session closed before reply was sent");
                }
            });
        };

        drop(reply_tx);
        writer.abort();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeCluster;
    use crate::config::{BotConfig, ClusterAccess, CommandGrammar, SlackConfig};
    use crate::identity::DirectoryIdentityResolver;
    use crate::resolver::ResolutionChain;
    use tokio::net::TcpListener;
    use tokio_test::assert_err;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_message_ids_increase() {
        let ids = MessageIdSequence::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[tokio::test]
    async fn test_message_ids_unique_across_tasks() {
        let ids = Arc::new(MessageIdSequence::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = Arc::clone(&ids);
            handles.push(tokio::spawn(async move {
                (0..100).map(|_| ids.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
    }

    fn help_only_dispatcher(web: SlackWebClient, http: reqwest::Client) -> Arc<Dispatcher> {
        let config = BotConfig {
            metadata_server_url: "http://127.0.0.1:9/dev_read".to_string(),
            api_key: "unused".to_string(),
            ad_group_lookup_url: "http://127.0.0.1:9/groups".to_string(),
            ad_user_lookup_url: None,
            slack: SlackConfig {
                token: "xoxb-test".to_string(),
                rtm_connect_url: String::new(),
                api_url: String::new(),
            },
            cluster: ClusterAccess::default(),
            grammar: CommandGrammar::default(),
            http_timeout: None,
        };
        let chain = ResolutionChain::from_config(&config, http.clone());
        let identity = Arc::new(DirectoryIdentityResolver::new(web, http, None));
        Arc::new(Dispatcher::new(
            &config,
            chain,
            identity,
            Arc::new(FakeCluster::default()),
        ))
    }

    #[tokio::test]
    async fn test_session_replies_only_to_addressed_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}", listener.local_addr().unwrap());

        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rtm.connect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "url": ws_url,
                "self": {"id": "U0BOT", "name": "kube2iam"}
            })))
            .mount(&api)
            .await;

        let ws_server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in [
                r#"{"type":"hello"}"#,
                r#"{"type":"message","channel":"C1","user":"U0BOT","text":"<@U0BOT> help"}"#,
                "not json",
                r#"{"type":"message","channel":"C1","user":"U7","text":"help"}"#,
                r#"{"type":"message","channel":"C1","user":"U7","text":"<@U0BOT> help"}"#,
            ] {
                ws.send(Frame::Text(frame.to_string())).await.unwrap();
            }

            let reply = loop {
                match ws.next().await {
                    Some(Ok(Frame::Text(text))) => break text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame {:?}", other),
                }
            };
            ws.close(None).await.unwrap();
            reply
        });

        let http = reqwest::Client::new();
        let web = SlackWebClient::new(http.clone(), api.uri(), "xoxb-test");
        let session = RtmSession::connect(&web, &format!("{}/rtm.connect", api.uri()))
            .await
            .unwrap();
        assert_eq!(session.bot_user_id(), "U0BOT");
        assert_eq!(session.bot_name(), "kube2iam");

        let dispatcher = help_only_dispatcher(web, http);
        let running = tokio::spawn(session.run(dispatcher));

        let reply: Message = serde_json::from_str(&ws_server.await.unwrap()).unwrap();
        assert_eq!(reply.id, 1);
        assert_eq!(reply.channel, "C1");
        assert!(reply.text.starts_with("Supported requests:"));

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert_err!(outcome);
    }
}
